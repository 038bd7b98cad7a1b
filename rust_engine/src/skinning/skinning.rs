//! 顶点蒙皮计算

use glam::{Mat4, Quat, Vec3};
use rayon::prelude::*;

use crate::model::{RestMesh, VertexWeight};
use crate::potential::PotentialField;
use crate::skeleton::PoseSnapshot;
use crate::{check_len, Result};
use super::{DeformationOracle, SkinningMethod};

/// 参考变形器，只做骨骼蒙皮，不包含 HRBF 修正
#[derive(Clone, Debug)]
pub struct SkinningOracle {
    pub method: SkinningMethod,
}

impl SkinningOracle {
    pub fn new(method: SkinningMethod) -> Self {
        Self { method }
    }
}

impl Default for SkinningOracle {
    fn default() -> Self {
        Self::new(SkinningMethod::DualQuat)
    }
}

impl DeformationOracle for SkinningOracle {
    fn deform(
        &self,
        mesh: &RestMesh,
        pose: &PoseSnapshot,
        potential: &PotentialField,
    ) -> Result<Vec<Vec3>> {
        check_len(mesh.vertex_count(), potential.len())?;
        Ok(compute_skinning(mesh, &pose.skinning_matrices, self.method))
    }
}

/// 计算蒙皮 - 使用 rayon 并行
pub fn compute_skinning(mesh: &RestMesh, matrices: &[Mat4], method: SkinningMethod) -> Vec<Vec3> {
    match method {
        SkinningMethod::Linear => mesh
            .positions()
            .par_iter()
            .zip(mesh.weights().par_iter())
            .map(|(&position, weight)| linear_vertex(position, weight, matrices))
            .collect(),
        SkinningMethod::DualQuat => {
            let dual_quats: Vec<DualQuat> = matrices.iter().map(DualQuat::from_mat4).collect();
            mesh.positions()
                .par_iter()
                .zip(mesh.weights().par_iter())
                .map(|(&position, weight)| dual_quat_vertex(position, weight, &dual_quats))
                .collect()
        }
    }
}

/// 计算单个顶点的线性混合蒙皮
fn linear_vertex(position: Vec3, weight: &VertexWeight, matrices: &[Mat4]) -> Vec3 {
    match weight {
        VertexWeight::Bdef1 { bone } => get_matrix(matrices, *bone).transform_point3(position),
        VertexWeight::Bdef2 { bones, weight } => {
            let m0 = get_matrix(matrices, bones[0]);
            let m1 = get_matrix(matrices, bones[1]);
            let w0 = *weight;
            let w1 = 1.0 - w0;
            m0.transform_point3(position) * w0 + m1.transform_point3(position) * w1
        }
        VertexWeight::Bdef4 { bones, weights } => {
            let mut pos = Vec3::ZERO;
            for i in 0..4 {
                pos += get_matrix(matrices, bones[i]).transform_point3(position) * weights[i];
            }
            pos
        }
    }
}

/// 计算单个顶点的双四元数蒙皮
fn dual_quat_vertex(position: Vec3, weight: &VertexWeight, dual_quats: &[DualQuat]) -> Vec3 {
    let influences = weight.influences();
    let Some(&(first_bone, _)) = influences.first() else {
        return position;
    };

    let pivot = get_dual_quat(dual_quats, first_bone).real;
    let mut blend = DualQuat::zero();
    for (bone, w) in influences {
        let dq = get_dual_quat(dual_quats, bone);
        // 与第一根骨骼同半球，避免绕远路插值
        let sign = if dq.real.dot(pivot) < 0.0 { -1.0 } else { 1.0 };
        blend.real = blend.real + dq.real * (w * sign);
        blend.dual = blend.dual + dq.dual * (w * sign);
    }

    blend.normalized().transform_point3(position)
}

fn get_matrix(matrices: &[Mat4], index: i32) -> Mat4 {
    if index < 0 {
        return Mat4::IDENTITY;
    }
    matrices.get(index as usize).copied().unwrap_or(Mat4::IDENTITY)
}

fn get_dual_quat(dual_quats: &[DualQuat], index: i32) -> DualQuat {
    if index < 0 {
        return DualQuat::identity();
    }
    dual_quats
        .get(index as usize)
        .copied()
        .unwrap_or_else(DualQuat::identity)
}

/// 单位双四元数（刚体变换，忽略缩放）
#[derive(Clone, Copy, Debug)]
struct DualQuat {
    real: Quat,
    dual: Quat,
}

impl DualQuat {
    fn identity() -> Self {
        Self {
            real: Quat::IDENTITY,
            dual: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        }
    }

    fn zero() -> Self {
        Self {
            real: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
            dual: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
        }
    }

    fn from_mat4(m: &Mat4) -> Self {
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        let t = Quat::from_xyzw(translation.x, translation.y, translation.z, 0.0);
        Self {
            real: rotation,
            dual: (t * rotation) * 0.5,
        }
    }

    fn normalized(self) -> Self {
        let len = self.real.length();
        if len <= f32::EPSILON {
            return Self::identity();
        }
        Self {
            real: self.real / len,
            dual: self.dual / len,
        }
    }

    fn transform_point3(&self, p: Vec3) -> Vec3 {
        // t = 2 · dual · conj(real)
        let t = (self.dual * self.real.conjugate()) * 2.0;
        self.real * p + Vec3::new(t.x, t.y, t.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn two_vertex_mesh(weights: Vec<VertexWeight>) -> RestMesh {
        RestMesh::new(
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            Vec::new(),
            Vec::new(),
            weights,
        )
        .unwrap()
    }

    #[test]
    fn test_identity_pose_keeps_rest_positions() {
        let mesh = two_vertex_mesh(vec![VertexWeight::default(); 2]);
        for method in [SkinningMethod::Linear, SkinningMethod::DualQuat] {
            let out = compute_skinning(&mesh, &[Mat4::IDENTITY], method);
            assert_eq!(out.len(), 2);
            for (a, b) in out.iter().zip(mesh.positions()) {
                assert!((*a - *b).length() < 1e-6);
            }
        }
    }

    #[test]
    fn test_rigid_transform_matches_between_methods() {
        let mesh = two_vertex_mesh(vec![VertexWeight::default(); 2]);
        let m = Mat4::from_rotation_translation(
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(0.0, 0.0, 3.0),
        );
        let lbs = compute_skinning(&mesh, &[m], SkinningMethod::Linear);
        let dqs = compute_skinning(&mesh, &[m], SkinningMethod::DualQuat);
        assert!((lbs[0] - Vec3::new(0.0, 1.0, 3.0)).length() < 1e-5);
        for (a, b) in lbs.iter().zip(dqs.iter()) {
            assert!((*a - *b).length() < 1e-5);
        }
    }

    #[test]
    fn test_dual_quat_preserves_distance_at_half_blend() {
        // 两根骨骼各 50%，一根旋转 90°：线性混合会塌陷，双四元数保持半径
        let weight = VertexWeight::Bdef2 { bones: [0, 1], weight: 0.5 };
        let mesh = two_vertex_mesh(vec![weight.clone(), weight]);
        let matrices = [Mat4::IDENTITY, Mat4::from_rotation_z(FRAC_PI_2)];

        let lbs = compute_skinning(&mesh, &matrices, SkinningMethod::Linear);
        let dqs = compute_skinning(&mesh, &matrices, SkinningMethod::DualQuat);
        assert!(lbs[0].length() < 0.8);
        assert!((dqs[0].length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_oracle_rejects_wrong_potential_length() {
        let mesh = two_vertex_mesh(vec![VertexWeight::default(); 2]);
        let pose = PoseSnapshot {
            skinning_matrices: vec![Mat4::IDENTITY],
            topology_version: 0,
        };
        let oracle = SkinningOracle::default();
        let result = oracle.deform(&mesh, &pose, &PotentialField::from_values(vec![0.5]));
        assert!(result.is_err());
        let ok = oracle.deform(&mesh, &pose, &PotentialField::from_values(vec![0.5, 0.5]));
        assert_eq!(ok.unwrap().len(), 2);
    }
}
