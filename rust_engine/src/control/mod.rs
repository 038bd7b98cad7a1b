//! 动画网格控制器
//!
//! 唯一的编排点：势场更新 → 变形 → 平滑 → 发布顶点缓冲。

mod animated_mesh_ctrl;

pub use animated_mesh_ctrl::AnimatedMeshCtrl;
