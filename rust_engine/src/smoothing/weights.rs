//! 每顶点平滑权重
//!
//! 全局模式下全部为 1；局部模式下关节区域为 1，经扩散向外柔和衰减。
//! 美术手动覆盖的权重最后生效，并在重算后保留。

use std::collections::BTreeMap;

use crate::model::RestMesh;
use crate::{Result, SkinError};

/// 第二大骨骼影响超过该值时视为关节区域顶点
const JOINT_INFLUENCE_THRESHOLD: f32 = 0.01;

/// 平滑权重缓存
#[derive(Clone, Debug)]
pub struct SmoothingWeights {
    factors: Vec<f32>,
    overrides: BTreeMap<usize, f32>,
    dirty: bool,
}

impl SmoothingWeights {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            factors: vec![1.0; vertex_count],
            overrides: BTreeMap::new(),
            dirty: true,
        }
    }

    /// 手动覆盖某顶点的平滑权重，值限制在 [0, 1]
    pub fn set_override(&mut self, index: usize, factor: f32) -> Result<()> {
        let len = self.factors.len();
        if index >= len {
            return Err(SkinError::Index { index, len });
        }
        self.overrides.insert(index, factor.clamp(0.0, 1.0));
        self.dirty = true;
        Ok(())
    }

    /// 标记需要重算（拓扑、范围或扩散次数变化时）
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn factors(&self) -> &[f32] {
        &self.factors
    }

    /// 需要时重算并返回当前权重
    pub fn ensure(&mut self, mesh: &RestMesh, local: bool, diffusion_iter: u32) -> &[f32] {
        if self.dirty {
            self.factors = if local {
                local_factors(mesh, diffusion_iter)
            } else {
                vec![1.0; mesh.vertex_count()]
            };
            for (&index, &factor) in &self.overrides {
                if let Some(slot) = self.factors.get_mut(index) {
                    *slot = factor;
                }
            }
            self.dirty = false;
            log::debug!(
                "平滑权重重算: local={}, diffusion_iter={}, overrides={}",
                local,
                diffusion_iter,
                self.overrides.len()
            );
        }
        &self.factors
    }
}

/// 关节区域种子 + 扩散；种子顶点始终保持 1
fn local_factors(mesh: &RestMesh, diffusion_iter: u32) -> Vec<f32> {
    let seeds: Vec<f32> = mesh
        .weights()
        .iter()
        .map(|w| {
            let significant = w
                .influences()
                .iter()
                .filter(|(_, weight)| *weight > JOINT_INFLUENCE_THRESHOLD)
                .count();
            if significant > 1 { 1.0 } else { 0.0 }
        })
        .collect();

    let mut factors = seeds.clone();
    for _ in 0..diffusion_iter {
        let previous = factors.clone();
        for (i, factor) in factors.iter_mut().enumerate() {
            let neighbors = mesh.neighbors(i);
            if neighbors.is_empty() {
                continue;
            }
            let avg = neighbors
                .iter()
                .map(|&j| previous[j as usize])
                .sum::<f32>()
                / neighbors.len() as f32;
            *factor = (0.5 * previous[i] + 0.5 * avg).max(seeds[i]);
        }
    }
    factors
}
