//! 骨骼

use glam::{Mat4, Quat, Vec3};

/// 单根骨骼：静止数据 + 当前姿态
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// -1 为根
    pub parent_index: i32,

    /// 静止姿态下的头部位置（世界空间）
    pub rest_position: Vec3,
    /// 相对父骨骼头部的静止偏移，build_hierarchy 时写入
    pub rest_offset: Vec3,
    pub inverse_bind: Mat4,

    /// 相对静止姿态的平移
    pub pose_translation: Vec3,
    pub pose_rotation: Quat,

    pub local_transform: Mat4,
    pub global_transform: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parent(name, -1, Vec3::ZERO)
    }

    /// 以父骨骼索引和世界空间静止位置创建
    pub fn with_parent(name: impl Into<String>, parent_index: i32, rest_position: Vec3) -> Self {
        let rest = Mat4::from_translation(rest_position);
        Self {
            name: name.into(),
            parent_index,
            rest_position,
            rest_offset: rest_position,
            inverse_bind: rest.inverse(),
            pose_translation: Vec3::ZERO,
            pose_rotation: Quat::IDENTITY,
            local_transform: rest,
            global_transform: rest,
        }
    }

    /// 回到静止姿态
    pub fn reset_pose(&mut self) {
        self.pose_translation = Vec3::ZERO;
        self.pose_rotation = Quat::IDENTITY;
    }

    /// local = T(rest_offset + pose_translation) · R(pose_rotation)
    pub fn update_local_transform(&mut self) {
        self.local_transform = Mat4::from_rotation_translation(
            self.pose_rotation,
            self.rest_offset + self.pose_translation,
        );
    }

    /// 蒙皮矩阵：静止空间 → 当前姿态
    pub fn get_skinning_matrix(&self) -> Mat4 {
        self.global_transform * self.inverse_bind
    }

    pub fn head_position(&self) -> Vec3 {
        self.global_transform.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_skinning_matrix_is_identity() {
        let bone = Bone::with_parent("arm", -1, Vec3::new(1.0, 2.0, 3.0));
        let m = bone.get_skinning_matrix();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert_eq!(bone.head_position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_pose_and_reset() {
        let mut bone = Bone::new("root");
        bone.pose_translation = Vec3::X;
        bone.pose_rotation = Quat::from_rotation_y(0.5);
        bone.update_local_transform();
        assert!((bone.local_transform.w_axis.truncate() - Vec3::X).length() < 1e-6);

        bone.reset_pose();
        bone.update_local_transform();
        assert!(bone.local_transform.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
