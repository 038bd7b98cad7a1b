//! 变形后平滑处理
//!
//! 四种算法互斥，通过 `SmoothingType` 选择，统一由 `apply_smoothing` 分发。

mod smoother;
mod weights;

pub use smoother::apply_smoothing;
pub use weights::SmoothingWeights;

/// 平滑算法
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmoothingType {
    /// 限制位移的平滑，保持体积
    Conservative,
    /// 邻居平均，迭代多了会收缩
    Laplacian,
    /// 投影到切平面的邻居平均
    Tangential,
    /// Humphrey's classes：Laplacian 后回拉修正
    Humphrey,
}

/// 平滑参数
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothingParams {
    pub enabled: bool,
    pub kind: SmoothingType,
    /// 迭代次数，0 表示直通
    pub nb_iter: u32,
    /// α：向变形前位置回拉的比例 [0, 1]
    pub force_a: f32,
    /// β：修正强度 [0, 1]
    pub force_b: f32,
    /// 修正幅度偏移 [-1, 1]
    pub smear: f32,
    /// 只平滑关节附近
    pub local: bool,
    /// 局部平滑权重的扩散迭代次数
    pub diffusion_iter: u32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        crate::config::EngineConfig::default().smoothing_params()
    }
}

impl SmoothingParams {
    /// 是否会实际修改顶点
    pub fn is_active(&self) -> bool {
        self.enabled && self.nb_iter > 0
    }
}
