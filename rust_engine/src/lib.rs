//! Implicit Skinning 运行时引擎
//!
//! 提供隐式蒙皮变形与平滑控制：
//! - 静态网格（Rest Mesh）与骨骼层级
//! - 每顶点势场（potential field）的计算、加载与导出
//! - 变形后处理平滑（conservative / laplacian / tangential / humphrey）
//! - 动画网格控制器（变形 → 平滑 → 发布顶点缓冲）
//! - 插件边界接口

pub mod config;
pub mod control;
pub mod model;
pub mod plugin;
pub mod potential;
pub mod skeleton;
pub mod skinning;
pub mod smoothing;

pub use config::EngineConfig;
pub use control::AnimatedMeshCtrl;
pub use model::{RestMesh, VertexWeight};
pub use plugin::{AbsBone, AbsMesh, AbsSkeleton, PluginInterface};
pub use potential::{BoneWeight, PotentialField};
pub use skeleton::{Bone, SharedSkeleton, Skeleton};
pub use skinning::{DeformationOracle, SkinningMethod, SkinningOracle};
pub use smoothing::{SmoothingParams, SmoothingType};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkinError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Index {index} out of range (len {len})")]
    Index { index: usize, len: usize },

    #[error("Compute error: {0}")]
    Compute(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Plugin interface not initialized")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, SkinError>;

/// 长度校验，不一致时返回 SizeMismatch
pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SkinError::SizeMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SkinError::SizeMismatch { expected: 4, actual: 3 };
        assert_eq!(format!("{err}"), "Size mismatch: expected 4, got 3");

        let err = SkinError::Index { index: 9, len: 4 };
        assert!(format!("{err}").contains('9'));
    }

    #[test]
    fn test_check_len() {
        assert!(check_len(3, 3).is_ok());
        assert!(matches!(
            check_len(3, 2),
            Err(SkinError::SizeMismatch { expected: 3, actual: 2 })
        ));
    }
}
