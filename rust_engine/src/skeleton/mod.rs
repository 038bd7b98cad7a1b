//! 骨骼层级与姿态

mod bone;
mod manager;

pub use bone::Bone;
pub use manager::Skeleton;

use glam::{Mat4, Quat, Vec3};
use std::sync::{Arc, RwLock};

/// 多个消费者共享的骨骼；控制器只读，姿态由外部推进
pub type SharedSkeleton = Arc<RwLock<Skeleton>>;

/// 包装为共享骨骼
pub fn share(skeleton: Skeleton) -> SharedSkeleton {
    Arc::new(RwLock::new(skeleton))
}

/// 骨骼变换数据
#[derive(Clone, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// 单次变形调用期间使用的姿态快照
#[derive(Clone, Debug)]
pub struct PoseSnapshot {
    /// 蒙皮矩阵（全局变换 × 逆绑定矩阵）
    pub skinning_matrices: Vec<Mat4>,
    /// 拍快照时的骨骼拓扑版本
    pub topology_version: u64,
}
