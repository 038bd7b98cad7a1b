//! 骨骼管理器

use glam::{Mat4, Quat, Vec3};
use std::collections::{HashMap, VecDeque};

use crate::{Result, SkinError};
use super::{Bone, BoneTransform, PoseSnapshot};

/// 骨骼层级
pub struct Skeleton {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    /// 父骨骼在前的遍历顺序
    sorted_indices: Vec<usize>,
    skinning_matrices: Vec<Mat4>,
    topology_version: u64,
    hierarchy_built: bool,
}

impl Skeleton {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            name_to_index: HashMap::new(),
            sorted_indices: Vec::new(),
            skinning_matrices: Vec::new(),
            topology_version: 0,
            hierarchy_built: false,
        }
    }

    /// 由骨骼列表直接构建层级
    pub fn from_bones(bones: Vec<Bone>) -> Result<Self> {
        let mut skeleton = Self::new();
        for bone in bones {
            skeleton.add_bone(bone);
        }
        skeleton.build_hierarchy()?;
        Ok(skeleton)
    }

    /// 添加骨骼（需要重新 build_hierarchy）
    pub fn add_bone(&mut self, bone: Bone) {
        let index = self.bones.len();
        self.name_to_index.insert(bone.name.clone(), index);
        self.bones.push(bone);
        self.hierarchy_built = false;
        self.topology_version += 1;
    }

    /// 构建骨骼层级并计算逆绑定矩阵
    pub fn build_hierarchy(&mut self) -> Result<()> {
        let bone_count = self.bones.len();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); bone_count];
        let mut roots = Vec::new();
        for (i, bone) in self.bones.iter().enumerate() {
            let parent = bone.parent_index;
            if parent < 0 {
                roots.push(i);
            } else if parent as usize >= bone_count || parent as usize == i {
                return Err(SkinError::Compute(format!(
                    "bone {} ({}) has invalid parent {}",
                    i, bone.name, parent
                )));
            } else {
                children[parent as usize].push(i);
            }
        }

        // 广度优先，保证父骨骼先于子骨骼
        let mut sorted = Vec::with_capacity(bone_count);
        let mut queue: VecDeque<usize> = roots.into_iter().collect();
        while let Some(idx) = queue.pop_front() {
            sorted.push(idx);
            queue.extend(children[idx].iter().copied());
        }
        if sorted.len() != bone_count {
            return Err(SkinError::Compute(
                "bone hierarchy contains a cycle".to_string(),
            ));
        }
        self.sorted_indices = sorted;

        for i in 0..bone_count {
            let pos = self.bones[i].rest_position;
            let parent_idx = self.bones[i].parent_index;

            let offset = if parent_idx >= 0 {
                pos - self.bones[parent_idx as usize].rest_position
            } else {
                pos
            };
            self.bones[i].rest_offset = offset;

            let init_global = Mat4::from_translation(pos);
            self.bones[i].global_transform = init_global;
            self.bones[i].inverse_bind = init_global.inverse();
            self.bones[i].local_transform = Mat4::from_translation(offset);
        }

        // 初始状态下：skinning_matrix = global * inverse_bind = I
        self.skinning_matrices = self
            .bones
            .iter()
            .map(|b| b.get_skinning_matrix())
            .collect();

        self.hierarchy_built = true;
        self.topology_version += 1;
        log::debug!("骨骼层级构建完成: {} 个骨骼", bone_count);
        Ok(())
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// 获取骨骼
    pub fn get_bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn is_built(&self) -> bool {
        self.hierarchy_built
    }

    /// 拓扑版本号，添加骨骼或重建层级时递增
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    /// 重置所有骨骼的动画姿态
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.reset_pose();
        }
    }

    /// 设置骨骼动画平移
    pub fn set_bone_translation(&mut self, index: usize, translation: Vec3) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.pose_translation = translation;
        }
    }

    /// 设置骨骼动画旋转
    pub fn set_bone_rotation(&mut self, index: usize, rotation: Quat) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.pose_rotation = rotation;
        }
    }

    /// 同时设置平移与旋转（缩放不参与骨骼动画）
    pub fn set_bone_pose(&mut self, index: usize, pose: &BoneTransform) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.pose_translation = pose.translation;
            bone.pose_rotation = pose.rotation;
        }
    }

    /// 按父骨骼优先的顺序更新本地、全局变换和蒙皮矩阵
    pub fn update_transforms(&mut self) {
        if !self.hierarchy_built {
            log::warn!("骨骼层级尚未构建，跳过变换更新");
            return;
        }

        for k in 0..self.sorted_indices.len() {
            let idx = self.sorted_indices[k];
            self.bones[idx].update_local_transform();

            let parent_idx = self.bones[idx].parent_index;
            self.bones[idx].global_transform = if parent_idx >= 0 {
                self.bones[parent_idx as usize].global_transform * self.bones[idx].local_transform
            } else {
                self.bones[idx].local_transform
            };
        }

        for (matrix, bone) in self.skinning_matrices.iter_mut().zip(self.bones.iter()) {
            *matrix = bone.get_skinning_matrix();
        }
    }

    /// 获取蒙皮矩阵数组
    pub fn get_skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    /// 拷贝当前姿态；层级未构建时使用单位矩阵
    pub fn snapshot_pose(&self) -> PoseSnapshot {
        let skinning_matrices = if self.hierarchy_built {
            self.skinning_matrices.clone()
        } else {
            vec![Mat4::IDENTITY; self.bones.len()]
        };
        PoseSnapshot {
            skinning_matrices,
            topology_version: self.topology_version,
        }
    }

    /// 直接子骨骼
    pub fn children(&self, index: usize) -> Vec<usize> {
        (0..self.bones.len())
            .filter(|&i| self.bones[i].parent_index == index as i32)
            .collect()
    }

    /// 静止姿态下每根骨骼的线段：头部到子骨骼头部的平均位置（叶子骨骼退化为点）
    pub fn bone_segments(&self) -> Vec<(Vec3, Vec3)> {
        (0..self.bones.len())
            .map(|i| {
                let head = self.bones[i].rest_position;
                let children = self.children(i);
                if children.is_empty() {
                    return (head, head);
                }
                let sum: Vec3 = children
                    .iter()
                    .map(|&c| self.bones[c].rest_position)
                    .sum();
                (head, sum / children.len() as f32)
            })
            .collect()
    }

    /// 每根骨骼所属兄弟组的代表骨骼（组内最小索引）；根骨骼各自成组
    pub fn sibling_groups(&self) -> Vec<usize> {
        let mut first_child: HashMap<i32, usize> = HashMap::new();
        (0..self.bones.len())
            .map(|i| {
                let parent = self.bones[i].parent_index;
                if parent < 0 {
                    return i;
                }
                *first_child.entry(parent).or_insert(i)
            })
            .collect()
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> Skeleton {
        Skeleton::from_bones(vec![
            Bone::with_parent("shoulder", -1, Vec3::ZERO),
            Bone::with_parent("elbow", 0, Vec3::new(1.0, 0.0, 0.0)),
            Bone::with_parent("wrist", 1, Vec3::new(2.0, 0.0, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_rest_pose_skinning_is_identity() {
        let mut skel = arm();
        skel.update_transforms();
        for m in skel.get_skinning_matrices() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
    }

    #[test]
    fn test_rotation_propagates_to_children() {
        let mut skel = arm();
        skel.set_bone_rotation(1, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        skel.update_transforms();

        let wrist = skel.get_bone(2).unwrap().head_position();
        assert!((wrist - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
        // 肩部不受影响
        assert!(skel.get_skinning_matrices()[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_translation_and_reset() {
        let mut skel = arm();
        skel.set_bone_translation(0, Vec3::new(0.0, 0.0, 2.0));
        skel.update_transforms();
        let wrist = skel.get_bone(2).unwrap().head_position();
        assert!((wrist - Vec3::new(2.0, 0.0, 2.0)).length() < 1e-6);

        skel.reset_pose();
        skel.update_transforms();
        for m in skel.get_skinning_matrices() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
    }

    #[test]
    fn test_invalid_parent_is_rejected() {
        let result = Skeleton::from_bones(vec![
            Bone::with_parent("root", -1, Vec3::ZERO),
            Bone::with_parent("bad", 5, Vec3::X),
        ]);
        assert!(matches!(result, Err(SkinError::Compute(_))));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let result = Skeleton::from_bones(vec![
            Bone::with_parent("a", 1, Vec3::ZERO),
            Bone::with_parent("b", 0, Vec3::X),
        ]);
        assert!(matches!(result, Err(SkinError::Compute(_))));
    }

    #[test]
    fn test_topology_version_changes() {
        let mut skel = arm();
        let before = skel.topology_version();
        skel.set_bone_rotation(0, Quat::from_rotation_y(0.3));
        skel.update_transforms();
        assert_eq!(skel.topology_version(), before);

        skel.add_bone(Bone::with_parent("finger", 2, Vec3::new(2.5, 0.0, 0.0)));
        assert_ne!(skel.topology_version(), before);
        assert!(!skel.is_built());
    }

    #[test]
    fn test_segments_and_sibling_groups() {
        let skel = Skeleton::from_bones(vec![
            Bone::with_parent("hips", -1, Vec3::ZERO),
            Bone::with_parent("leg_l", 0, Vec3::new(-1.0, -1.0, 0.0)),
            Bone::with_parent("leg_r", 0, Vec3::new(1.0, -1.0, 0.0)),
        ])
        .unwrap();

        let segments = skel.bone_segments();
        assert!((segments[0].1 - Vec3::new(0.0, -1.0, 0.0)).length() < 1e-6);
        assert_eq!(segments[1].0, segments[1].1);

        assert_eq!(skel.sibling_groups(), vec![0, 1, 1]);
        assert_eq!(skel.find_bone_by_name("leg_r"), Some(2));
    }
}
