//! 变形器接口与参考蒙皮实现

mod skinning;

pub use skinning::{compute_skinning, SkinningOracle};

use glam::Vec3;

use crate::model::RestMesh;
use crate::potential::PotentialField;
use crate::skeleton::PoseSnapshot;
use crate::Result;

/// 蒙皮方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkinningMethod {
    /// 线性混合蒙皮
    Linear,
    /// 双四元数蒙皮
    DualQuat,
}

/// 变形器：给定姿态与势场，返回与静止网格同序、同长度的顶点位置
///
/// 相同输入必须得到相同输出；调用是同步的，不允许返回部分结果。
pub trait DeformationOracle: Send + Sync {
    fn deform(
        &self,
        mesh: &RestMesh,
        pose: &PoseSnapshot,
        potential: &PotentialField,
    ) -> Result<Vec<Vec3>>;
}
