//! 动画网格控制器

use glam::Vec3;
use std::path::Path;
use std::sync::{Arc, PoisonError};

use crate::config::get_config;
use crate::model::RestMesh;
use crate::potential::{self, compute_base_potential, PotentialField};
use crate::skeleton::SharedSkeleton;
use crate::skinning::{DeformationOracle, SkinningOracle};
use crate::smoothing::{apply_smoothing, SmoothingParams, SmoothingType, SmoothingWeights};
use crate::{check_len, Result};

/// 动画网格控制器
///
/// 不支持并发修改：所有 setter 与 `deform_mesh` 都需要 `&mut self`。
/// 骨骼可被其他线程在两次调用之间推进姿态，单次调用内使用同一份姿态快照。
pub struct AnimatedMeshCtrl {
    mesh: Arc<RestMesh>,
    skel: SharedSkeleton,
    oracle: Box<dyn DeformationOracle>,

    // 势场
    potential: PotentialField,
    /// 势场对应的骨骼拓扑版本；None 表示需要重算
    potential_version: Option<u64>,
    /// 兄弟骨骼合并为一个影响组
    factor_bones: bool,

    // 平滑
    smoothing: SmoothingParams,
    smooth_weights: SmoothingWeights,
    weights_version: Option<u64>,

    /// 已发布的顶点缓冲（原始顶点顺序）
    anim_vertices: Vec<Vec3>,
}

impl AnimatedMeshCtrl {
    /// 使用全局配置和参考蒙皮变形器创建
    pub fn new(mesh: Arc<RestMesh>, skel: SharedSkeleton) -> Self {
        let method = get_config().skinning_method;
        Self::with_oracle(mesh, skel, Box::new(SkinningOracle::new(method)))
    }

    /// 指定外部变形器创建
    pub fn with_oracle(
        mesh: Arc<RestMesh>,
        skel: SharedSkeleton,
        oracle: Box<dyn DeformationOracle>,
    ) -> Self {
        let config = get_config();
        let vertex_count = mesh.vertex_count();
        let anim_vertices = mesh.positions().to_vec();

        Self {
            mesh,
            skel,
            oracle,
            potential: PotentialField::new(),
            potential_version: None,
            factor_bones: config.factor_bones,
            smoothing: config.smoothing_params(),
            smooth_weights: SmoothingWeights::new(vertex_count),
            weights_version: None,
            anim_vertices,
        }
    }

    pub fn mesh(&self) -> &Arc<RestMesh> {
        &self.mesh
    }

    pub fn skeleton(&self) -> &SharedSkeleton {
        &self.skel
    }

    // ========== 势场 ==========

    /// 根据当前网格与骨骼重算势场
    pub fn update_base_potential(&mut self) -> Result<()> {
        let skel = self.skel.read().unwrap_or_else(PoisonError::into_inner);
        let field = compute_base_potential(&self.mesh, &skel, self.factor_bones)?;
        self.potential = field;
        self.potential_version = Some(skel.topology_version());
        Ok(())
    }

    /// 拷贝当前势场到 `out`（调整为顶点数）
    pub fn get_base_potential(&self, out: &mut Vec<f32>) {
        self.potential.copy_to(out);
    }

    /// 替换势场；长度必须等于顶点数
    pub fn set_base_potential(&mut self, values: &[f32]) -> Result<()> {
        self.potential.set_values(values, self.mesh.vertex_count())?;
        self.potential_version = Some(self.current_topology_version());
        Ok(())
    }

    pub fn potential(&self) -> &PotentialField {
        &self.potential
    }

    /// 切换 factor bones 模式，势场在下次变形时重算
    pub fn set_factor_bones(&mut self, state: bool) {
        if self.factor_bones != state {
            self.factor_bones = state;
            self.potential_version = None;
        }
    }

    pub fn factor_bones(&self) -> bool {
        self.factor_bones
    }

    fn current_topology_version(&self) -> u64 {
        self.skel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .topology_version()
    }

    // ========== 网格变形 ==========

    /// 按当前参数执行一次完整变形
    ///
    /// 失败时已发布的顶点缓冲保持不变。
    pub fn deform_mesh(&mut self) -> Result<()> {
        let vertex_count = self.mesh.vertex_count();

        let pose = {
            let skel = self.skel.read().unwrap_or_else(PoisonError::into_inner);
            let version = skel.topology_version();
            let stale = self.potential_version != Some(version)
                || self.potential.len() != vertex_count;
            if stale {
                log::debug!("势场已过期，重新计算 (topology_version={})", version);
                self.potential = compute_base_potential(&self.mesh, &skel, self.factor_bones)?;
                self.potential_version = Some(version);
            }
            skel.snapshot_pose()
        };

        let raw = self.oracle.deform(&self.mesh, &pose, &self.potential)?;
        check_len(vertex_count, raw.len())?;

        let result = if self.smoothing.is_active() {
            if self.weights_version != Some(pose.topology_version) {
                self.smooth_weights.invalidate();
                self.weights_version = Some(pose.topology_version);
            }
            let factors = self.smooth_weights.ensure(
                &self.mesh,
                self.smoothing.local,
                self.smoothing.diffusion_iter,
            );
            apply_smoothing(&self.mesh, &raw, factors, &self.smoothing)?
        } else {
            raw
        };

        self.anim_vertices = result;
        Ok(())
    }

    pub fn set_do_smoothing(&mut self, state: bool) {
        self.smoothing.enabled = state;
    }

    /// 手动设置某顶点的平滑权重
    pub fn set_smooth_factor(&mut self, index: usize, fact: f32) -> Result<()> {
        self.smooth_weights.set_override(index, fact)
    }

    pub fn set_nb_iter_smoothing(&mut self, nb_iter: u32) {
        self.smoothing.nb_iter = nb_iter;
    }

    pub fn get_nb_iter_smooth(&self) -> u32 {
        self.smoothing.nb_iter
    }

    /// 设置平滑算法（最后一次调用生效）
    pub fn set_smoothing_type(&mut self, kind: SmoothingType) {
        self.smoothing.kind = kind;
    }

    pub fn smooth_conservative(&mut self) {
        self.set_smoothing_type(SmoothingType::Conservative);
    }

    pub fn smooth_laplacian(&mut self) {
        self.set_smoothing_type(SmoothingType::Laplacian);
    }

    pub fn smooth_tangential(&mut self) {
        self.set_smoothing_type(SmoothingType::Tangential);
    }

    pub fn smooth_humphrey(&mut self) {
        self.set_smoothing_type(SmoothingType::Humphrey);
    }

    /// 只平滑关节附近（true）或整个网格（false）
    pub fn set_local_smoothing(&mut self, state: bool) {
        if self.smoothing.local != state {
            self.smoothing.local = state;
            self.smooth_weights.invalidate();
        }
    }

    pub fn set_smooth_force_a(&mut self, alpha: f32) {
        self.smoothing.force_a = alpha.clamp(0.0, 1.0);
    }

    pub fn set_smooth_force_b(&mut self, beta: f32) {
        self.smoothing.force_b = beta.clamp(0.0, 1.0);
    }

    pub fn set_smooth_smear(&mut self, val: f32) {
        self.smoothing.smear = val.clamp(-1.0, 1.0);
    }

    pub fn set_smoothing_weights_diffusion_iter(&mut self, nb_iter: u32) {
        if self.smoothing.diffusion_iter != nb_iter {
            self.smoothing.diffusion_iter = nb_iter;
            self.smooth_weights.invalidate();
        }
    }

    pub fn smoothing_params(&self) -> &SmoothingParams {
        &self.smoothing
    }

    // ========== 顶点缓冲 ==========

    /// 当前（可能已变形的）顶点，原始顺序
    pub fn get_anim_vertices_aifo(&self, out: &mut Vec<Vec3>) {
        out.clear();
        out.extend_from_slice(&self.anim_vertices);
    }

    pub fn anim_vertices(&self) -> &[Vec3] {
        &self.anim_vertices
    }

    /// 直接覆盖已发布的顶点缓冲（不经过变形和平滑）
    pub fn copy_vertices(&mut self, vertices: &[Vec3]) -> Result<()> {
        check_len(self.get_nb_vertices(), vertices.len())?;
        self.anim_vertices.clear();
        self.anim_vertices.extend_from_slice(vertices);
        Ok(())
    }

    /// 顶点数量，copy_vertices 的输入必须与之一致
    pub fn get_nb_vertices(&self) -> usize {
        self.mesh.vertex_count()
    }

    // ========== 文件导入导出 ==========

    /// 从 ISM 文件加载势场；失败时原势场不变
    ///
    /// 骨骼组引用不存在的骨骼时返回 Format；文件的 factor bones 标志覆盖当前设置。
    pub fn load_ism<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let field = potential::load_ism(path, self.mesh.vertex_count())?;
        let (bone_count, version) = {
            let skel = self.skel.read().unwrap_or_else(PoisonError::into_inner);
            (skel.bone_count(), skel.topology_version())
        };
        field.check_bone_groups(bone_count)?;

        let file_factor_bones = field.bone_groups().is_some();
        if file_factor_bones != self.factor_bones {
            log::info!("ISM 文件 factor_bones={}，同步控制器设置", file_factor_bones);
            self.factor_bones = file_factor_bones;
        }
        self.potential = field;
        self.potential_version = Some(version);
        Ok(())
    }

    /// 导出当前势场到 ISM 文件
    pub fn save_ism<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        potential::save_ism(path, &self.potential)
    }
}
