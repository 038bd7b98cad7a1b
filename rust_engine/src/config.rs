//! 引擎默认配置
//!
//! 所有参数扁平化，新建控制器时读取一次作为初始值。
//! 之后对全局配置的修改只影响新建的控制器。

use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

use crate::skinning::SkinningMethod;
use crate::smoothing::{SmoothingParams, SmoothingType};

/// 引擎配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // ========== 平滑 ==========
    /// 是否启用变形后平滑，默认 true
    pub do_smoothing: bool,
    /// 平滑算法，默认 Laplacian
    pub smoothing_type: SmoothingType,
    /// 平滑迭代次数，默认 7
    pub nb_iter_smoothing: u32,
    /// 只平滑关节附近（true）还是整个网格（false），默认 true
    pub local_smoothing: bool,
    /// Humphrey 平滑 α（向原始形状回拉的强度），默认 0.5
    pub smooth_force_a: f32,
    /// Humphrey 平滑 β（修正强度），默认 0.5
    pub smooth_force_b: f32,
    /// 修正幅度偏移，范围 [-1, 1]，默认 0.0
    pub smooth_smear: f32,
    /// 局部平滑权重的扩散迭代次数，默认 6
    pub smoothing_weights_diffusion_iter: u32,

    // ========== 蒙皮 ==========
    /// 参考变形器使用的蒙皮方式，默认双四元数
    pub skinning_method: SkinningMethod,
    /// 兄弟骨骼合并为一个影响组，默认 false
    pub factor_bones: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            do_smoothing: true,
            smoothing_type: SmoothingType::Laplacian,
            // 迭代次数越多越平滑，但 Laplacian 会逐渐收缩
            nb_iter_smoothing: 7,
            local_smoothing: true,
            smooth_force_a: 0.5,
            smooth_force_b: 0.5,
            smooth_smear: 0.0,
            // 扩散次数越多，关节处的平滑权重衰减越柔和、范围越大
            smoothing_weights_diffusion_iter: 6,

            skinning_method: SkinningMethod::DualQuat,
            factor_bones: false,
        }
    }
}

impl EngineConfig {
    /// 转换为控制器使用的平滑参数
    pub fn smoothing_params(&self) -> SmoothingParams {
        SmoothingParams {
            enabled: self.do_smoothing,
            kind: self.smoothing_type,
            nb_iter: self.nb_iter_smoothing,
            force_a: self.smooth_force_a.clamp(0.0, 1.0),
            force_b: self.smooth_force_b.clamp(0.0, 1.0),
            smear: self.smooth_smear.clamp(-1.0, 1.0),
            local: self.local_smoothing,
            diffusion_iter: self.smoothing_weights_diffusion_iter,
        }
    }
}

/// 全局配置实例
static ENGINE_CONFIG: Lazy<RwLock<EngineConfig>> = Lazy::new(|| {
    RwLock::new(EngineConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> EngineConfig {
    ENGINE_CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// 手动设置配置
pub fn set_config(config: EngineConfig) {
    *ENGINE_CONFIG.write().unwrap_or_else(PoisonError::into_inner) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(EngineConfig::default());
}
