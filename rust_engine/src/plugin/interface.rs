//! 插件调用入口

use glam::Vec3;
use std::sync::{Arc, PoisonError};

use crate::control::AnimatedMeshCtrl;
use crate::model::VertexWeight;
use crate::skeleton;
use crate::{Result, SkinError};
use super::{is_initialized, AbsMesh, AbsSkeleton};

/// 宿主持有的插件实例，缓存上一次构建的控制器
#[derive(Default)]
pub struct PluginInterface {
    ctrl: Option<AnimatedMeshCtrl>,
}

impl PluginInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 跑一次完整流水线，结果整体覆盖 `out`
    pub fn go(&mut self, mesh: &AbsMesh, skel: &AbsSkeleton, out: &mut Vec<Vec3>) -> Result<()> {
        if !is_initialized() {
            return Err(SkinError::NotInitialized);
        }

        let ctrl = match self.ctrl.take() {
            Some(ctrl) if Self::matches(&ctrl, mesh, skel) => ctrl,
            _ => Self::build(mesh, skel)?,
        };
        let ctrl = self.ctrl.insert(ctrl);

        {
            let mut shared = ctrl
                .skeleton()
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            skel.apply_pose(&mut shared);
        }
        ctrl.deform_mesh()?;
        ctrl.get_anim_vertices_aifo(out);
        Ok(())
    }

    /// 当前缓存的控制器（调整平滑参数等）
    pub fn controller_mut(&mut self) -> Option<&mut AnimatedMeshCtrl> {
        self.ctrl.as_mut()
    }

    fn build(mesh: &AbsMesh, skel: &AbsSkeleton) -> Result<AnimatedMeshCtrl> {
        let rest = Arc::new(mesh.to_rest_mesh()?);
        let shared = skeleton::share(skel.to_skeleton()?);
        log::info!(
            "插件构建控制器: {} 个顶点, {} 个骨骼",
            rest.vertex_count(),
            skel.bones.len()
        );
        Ok(AnimatedMeshCtrl::new(rest, shared))
    }

    fn matches(ctrl: &AnimatedMeshCtrl, mesh: &AbsMesh, skel: &AbsSkeleton) -> bool {
        let rest = ctrl.mesh();
        let same_mesh = rest.positions() == mesh.vertices.as_slice()
            && rest.triangles() == mesh.triangles.as_slice()
            && rest.quads() == mesh.quads.as_slice()
            && rest.vertex_count() == mesh.weights.len()
            && rest
                .weights()
                .iter()
                .zip(&mesh.weights)
                .all(|(weight, influences)| *weight == VertexWeight::from_influences(influences));
        same_mesh
            && skel.same_rest_layout(&ctrl.skeleton().read().unwrap_or_else(PoisonError::into_inner))
    }
}
