//! 平滑算法实现
//!
//! 每次迭代只读取上一轮的结果，各顶点并行计算，结果与线程数无关。

use glam::Vec3;
use rayon::prelude::*;

use crate::model::RestMesh;
use crate::{check_len, Result};
use super::{SmoothingParams, SmoothingType};

/// Conservative 平滑单步位移上限（相对邻边平均长度）
const CONSERVATIVE_MAX_STEP: f32 = 0.5;

/// 对变形后的顶点执行平滑
///
/// `factors` 为每顶点平滑权重 [0, 1]。未启用或 `nb_iter == 0` 时原样返回输入。
/// 顶点数量、顺序和拓扑都不会改变。
pub fn apply_smoothing(
    mesh: &RestMesh,
    input: &[Vec3],
    factors: &[f32],
    params: &SmoothingParams,
) -> Result<Vec<Vec3>> {
    check_len(mesh.vertex_count(), input.len())?;
    check_len(mesh.vertex_count(), factors.len())?;

    if !params.is_active() {
        return Ok(input.to_vec());
    }

    let mut current = input.to_vec();
    for _ in 0..params.nb_iter {
        current = match params.kind {
            SmoothingType::Laplacian => laplacian_step(mesh, &current, factors),
            SmoothingType::Conservative => conservative_step(mesh, &current, factors),
            SmoothingType::Tangential => tangential_step(mesh, &current, factors),
            SmoothingType::Humphrey => humphrey_step(mesh, input, &current, factors, params),
        };
    }
    Ok(current)
}

/// 一环邻居平均；孤立顶点返回 None
fn neighbor_average(mesh: &RestMesh, positions: &[Vec3], index: usize) -> Option<Vec3> {
    let neighbors = mesh.neighbors(index);
    if neighbors.is_empty() {
        return None;
    }
    let sum: Vec3 = neighbors.iter().map(|&j| positions[j as usize]).sum();
    Some(sum / neighbors.len() as f32)
}

fn laplacian_step(mesh: &RestMesh, current: &[Vec3], factors: &[f32]) -> Vec<Vec3> {
    (0..current.len())
        .into_par_iter()
        .map(|i| {
            let p = current[i];
            match neighbor_average(mesh, current, i) {
                Some(avg) if factors[i] > 0.0 => p.lerp(avg, factors[i]),
                _ => p,
            }
        })
        .collect()
}

fn conservative_step(mesh: &RestMesh, current: &[Vec3], factors: &[f32]) -> Vec<Vec3> {
    (0..current.len())
        .into_par_iter()
        .map(|i| {
            let p = current[i];
            let Some(avg) = neighbor_average(mesh, current, i) else {
                return p;
            };
            if factors[i] <= 0.0 {
                return p;
            }

            let neighbors = mesh.neighbors(i);
            let mean_edge = neighbors
                .iter()
                .map(|&j| current[j as usize].distance(p))
                .sum::<f32>()
                / neighbors.len() as f32;
            let cap = mean_edge * CONSERVATIVE_MAX_STEP;

            let step = (avg - p) * factors[i];
            let len = step.length();
            if len > cap && len > 0.0 {
                p + step * (cap / len)
            } else {
                p + step
            }
        })
        .collect()
}

fn tangential_step(mesh: &RestMesh, current: &[Vec3], factors: &[f32]) -> Vec<Vec3> {
    let normals = mesh.vertex_normals(current);
    (0..current.len())
        .into_par_iter()
        .map(|i| {
            let p = current[i];
            match neighbor_average(mesh, current, i) {
                Some(avg) if factors[i] > 0.0 => {
                    let step = (avg - p) * factors[i];
                    let n = normals[i];
                    p + (step - n * n.dot(step))
                }
                _ => p,
            }
        })
        .collect()
}

/// Humphrey's classes：
/// b_i = avg_i − (α·o_i + (1−α)·q_i)，
/// p_i = avg_i − (1+smear)·(β·b_i + (1−β)·mean_j b_j)
fn humphrey_step(
    mesh: &RestMesh,
    original: &[Vec3],
    current: &[Vec3],
    factors: &[f32],
    params: &SmoothingParams,
) -> Vec<Vec3> {
    let alpha = params.force_a;
    let beta = params.force_b;
    let scale = 1.0 + params.smear;

    let averages: Vec<Option<Vec3>> = (0..current.len())
        .into_par_iter()
        .map(|i| neighbor_average(mesh, current, i))
        .collect();
    let differences: Vec<Vec3> = (0..current.len())
        .into_par_iter()
        .map(|i| {
            let avg = averages[i].unwrap_or(current[i]);
            avg - (original[i] * alpha + current[i] * (1.0 - alpha))
        })
        .collect();

    (0..current.len())
        .into_par_iter()
        .map(|i| {
            let q = current[i];
            let Some(avg) = averages[i] else {
                return q;
            };
            if factors[i] <= 0.0 {
                return q;
            }

            let neighbors = mesh.neighbors(i);
            let neighbor_diff: Vec3 = neighbors
                .iter()
                .map(|&j| differences[j as usize])
                .sum::<Vec3>()
                / neighbors.len() as f32;
            let correction = (differences[i] * beta + neighbor_diff * (1.0 - beta)) * scale;
            q.lerp(avg - correction, factors[i])
        })
        .collect()
}
