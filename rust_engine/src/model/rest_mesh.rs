//! 静态网格：拓扑、静止姿态顶点与蒙皮权重

use glam::Vec3;

use crate::{check_len, Result, SkinError};
use super::VertexWeight;

/// 静止姿态网格（构建后不可变）
#[derive(Clone, Debug)]
pub struct RestMesh {
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    quads: Vec<[u32; 4]>,
    weights: Vec<VertexWeight>,
    /// 一环邻接（已排序、去重）
    neighbors: Vec<Vec<u32>>,
}

impl RestMesh {
    /// 创建网格并构建邻接表
    pub fn new(
        positions: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
        quads: Vec<[u32; 4]>,
        weights: Vec<VertexWeight>,
    ) -> Result<Self> {
        let vertex_count = positions.len();
        check_len(vertex_count, weights.len())?;

        let face_indices = triangles
            .iter()
            .flat_map(|t| t.iter())
            .chain(quads.iter().flat_map(|q| q.iter()));
        for &idx in face_indices {
            if idx as usize >= vertex_count {
                return Err(SkinError::Index {
                    index: idx as usize,
                    len: vertex_count,
                });
            }
        }

        let neighbors = build_neighbors(vertex_count, &triangles, &quads);

        Ok(Self {
            positions,
            triangles,
            quads,
            weights,
            neighbors,
        })
    }

    /// 获取顶点数量
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn quads(&self) -> &[[u32; 4]] {
        &self.quads
    }

    pub fn weights(&self) -> &[VertexWeight] {
        &self.weights
    }

    /// 顶点的一环邻居
    pub fn neighbors(&self, index: usize) -> &[u32] {
        self.neighbors.get(index).map(|n| n.as_slice()).unwrap_or(&[])
    }

    /// 按面积加权计算顶点法线
    ///
    /// `positions` 必须与本网格共用顶点索引空间。
    pub fn vertex_normals(&self, positions: &[Vec3]) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; positions.len()];

        for tri in &self.triangles {
            let [a, b, c] = tri.map(|i| i as usize);
            // 叉积长度 = 2 × 面积，天然带面积权重
            let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }

        for quad in &self.quads {
            let [a, b, c, d] = quad.map(|i| i as usize);
            // 对角线叉积，适用于非平面四边形
            let n = (positions[c] - positions[a]).cross(positions[d] - positions[b]);
            for i in [a, b, c, d] {
                normals[i] += n;
            }
        }

        normals.iter().map(|n| n.normalize_or_zero()).collect()
    }
}

fn build_neighbors(
    vertex_count: usize,
    triangles: &[[u32; 3]],
    quads: &[[u32; 4]],
) -> Vec<Vec<u32>> {
    let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];

    let mut link = |a: u32, b: u32| {
        if a != b {
            neighbors[a as usize].push(b);
            neighbors[b as usize].push(a);
        }
    };

    for tri in triangles {
        for k in 0..3 {
            link(tri[k], tri[(k + 1) % 3]);
        }
    }
    for quad in quads {
        for k in 0..4 {
            link(quad[k], quad[(k + 1) % 4]);
        }
    }

    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}
