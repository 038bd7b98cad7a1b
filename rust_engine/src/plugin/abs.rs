//! 加载器输出的抽象网格与骨骼

use glam::Vec3;

use crate::model::{RestMesh, VertexWeight};
use crate::skeleton::{Bone, BoneTransform, Skeleton};
use crate::Result;

/// 加载器输出的网格
#[derive(Clone, Debug, Default)]
pub struct AbsMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub quads: Vec<[u32; 4]>,
    /// 每顶点 (骨骼索引, 权重)，数量不限
    pub weights: Vec<Vec<(u32, f32)>>,
}

impl AbsMesh {
    /// 转换为静止网格；每顶点只保留最重的四个影响并重新归一化
    pub fn to_rest_mesh(&self) -> Result<RestMesh> {
        let weights = self
            .weights
            .iter()
            .map(|influences| VertexWeight::from_influences(influences))
            .collect();
        RestMesh::new(
            self.vertices.clone(),
            self.triangles.clone(),
            self.quads.clone(),
            weights,
        )
    }
}

/// 加载器输出的骨骼
#[derive(Clone, Debug)]
pub struct AbsBone {
    pub name: String,
    /// 父骨骼索引，-1 为根
    pub parent: i32,
    /// 静止姿态下的世界空间位置
    pub position: Vec3,
    /// 当前动画姿态（相对静止姿态；缩放不参与）
    pub pose: BoneTransform,
}

impl AbsBone {
    pub fn new(name: impl Into<String>, parent: i32, position: Vec3) -> Self {
        Self {
            name: name.into(),
            parent,
            position,
            pose: BoneTransform::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AbsSkeleton {
    pub bones: Vec<AbsBone>,
}

impl AbsSkeleton {
    pub fn to_skeleton(&self) -> Result<Skeleton> {
        Skeleton::from_bones(
            self.bones
                .iter()
                .map(|b| Bone::with_parent(b.name.clone(), b.parent, b.position))
                .collect(),
        )
    }

    /// 写入动画姿态并更新蒙皮矩阵
    pub fn apply_pose(&self, skeleton: &mut Skeleton) {
        for (i, bone) in self.bones.iter().enumerate() {
            skeleton.set_bone_pose(i, &bone.pose);
        }
        skeleton.update_transforms();
    }

    /// 层级与静止位置是否与已构建的骨骼一致
    pub fn same_rest_layout(&self, skeleton: &Skeleton) -> bool {
        self.bones.len() == skeleton.bone_count()
            && self
                .bones
                .iter()
                .zip(skeleton.bones())
                .all(|(a, b)| a.parent == b.parent_index && a.position == b.rest_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heavy_influences_are_reduced() {
        let mesh = AbsMesh {
            vertices: vec![Vec3::ZERO],
            weights: vec![vec![(0, 0.1), (1, 0.4), (2, 0.2), (3, 0.2), (4, 0.1)]],
            ..Default::default()
        };
        let rest = mesh.to_rest_mesh().unwrap();
        let influences = rest.weights()[0].influences();
        assert_eq!(influences.len(), 4);
        assert_eq!(influences[0].0, 1);
        let total: f32 = influences.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_weight_count_mismatch() {
        let mesh = AbsMesh {
            vertices: vec![Vec3::ZERO, Vec3::X],
            weights: vec![vec![(0, 1.0)]],
            ..Default::default()
        };
        assert!(mesh.to_rest_mesh().is_err());
    }

    #[test]
    fn test_skeleton_layout_and_pose() {
        let mut abs = AbsSkeleton {
            bones: vec![
                AbsBone::new("root", -1, Vec3::ZERO),
                AbsBone::new("tip", 0, Vec3::new(0.0, 1.0, 0.0)),
            ],
        };
        let mut skel = abs.to_skeleton().unwrap();
        assert!(abs.same_rest_layout(&skel));
        assert_eq!(skel.find_bone_by_name("tip"), Some(1));

        abs.bones[0].pose.translation = Vec3::new(2.0, 0.0, 0.0);
        assert!(abs.same_rest_layout(&skel));
        abs.apply_pose(&mut skel);
        let head = skel.get_bone(1).unwrap().head_position();
        assert!((head - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-6);

        abs.bones[1].position = Vec3::new(0.0, 2.0, 0.0);
        assert!(!abs.same_rest_layout(&skel));
    }
}
