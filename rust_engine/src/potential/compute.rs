//! 从静止网格与骨骼计算基础势场

use glam::Vec3;
use rayon::prelude::*;

use crate::model::RestMesh;
use crate::skeleton::Skeleton;
use crate::{Result, SkinError};
use super::{BoneWeight, PotentialField};

/// 半径下限，避免所有顶点都落在骨骼线段上时除零
const MIN_RADIUS: f32 = 1e-6;

/// 计算每顶点基础势场
///
/// 每个影响骨骼组的贡献 = 权重 × falloff(到组内骨骼线段的距离 / 组半径)，
/// 组半径为受该组影响顶点的最大距离的两倍。`factor_bones` 时兄弟骨骼合并为一组。
pub fn compute_base_potential(
    mesh: &RestMesh,
    skeleton: &Skeleton,
    factor_bones: bool,
) -> Result<PotentialField> {
    let vertex_count = mesh.vertex_count();
    let bone_count = skeleton.bone_count();
    if vertex_count > 0 && bone_count == 0 {
        return Err(SkinError::Compute("skeleton has no bones".to_string()));
    }

    let group_of: Vec<usize> = if factor_bones {
        skeleton.sibling_groups()
    } else {
        (0..bone_count).collect()
    };
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); bone_count];
    for (bone, &group) in group_of.iter().enumerate() {
        members[group].push(bone);
    }
    let segments = skeleton.bone_segments();

    // 每顶点：(组, 权重, 距离)
    let per_vertex: Vec<Vec<(usize, f32, f32)>> = mesh
        .positions()
        .par_iter()
        .zip(mesh.weights().par_iter())
        .enumerate()
        .map(|(i, (&position, weight))| -> Result<Vec<(usize, f32, f32)>> {
            let mut groups: Vec<(usize, f32)> = Vec::with_capacity(4);
            for (bone, w) in weight.influences() {
                if bone < 0 || bone as usize >= bone_count {
                    return Err(SkinError::Compute(format!(
                        "vertex {} references bone {} but skeleton has {} bones",
                        i, bone, bone_count
                    )));
                }
                let group = group_of[bone as usize];
                match groups.iter_mut().find(|(g, _)| *g == group) {
                    Some(entry) => entry.1 += w,
                    None => groups.push((group, w)),
                }
            }
            groups.sort_by_key(|(g, _)| *g);

            Ok(groups
                .into_iter()
                .map(|(group, w)| {
                    let dist = members[group]
                        .iter()
                        .map(|&b| distance_to_segment(position, segments[b].0, segments[b].1))
                        .fold(f32::INFINITY, f32::min);
                    (group, w, dist)
                })
                .collect())
        })
        .collect::<Result<_>>()?;

    let mut radius = vec![0.0f32; bone_count];
    for groups in &per_vertex {
        for &(group, _, dist) in groups {
            radius[group] = radius[group].max(dist);
        }
    }
    for r in &mut radius {
        *r = (*r * 2.0).max(MIN_RADIUS);
    }

    let contributions: Vec<Vec<BoneWeight>> = per_vertex
        .into_iter()
        .map(|groups| {
            groups
                .into_iter()
                .map(|(group, w, dist)| BoneWeight {
                    bone: group as u32,
                    weight: w * falloff(dist / radius[group]),
                })
                .collect()
        })
        .collect();
    let values: Vec<f32> = contributions
        .iter()
        .map(|groups| groups.iter().map(|g| g.weight).sum())
        .collect();

    log::info!(
        "势场计算完成: {} 个顶点, {} 个骨骼 (factor_bones={})",
        vertex_count,
        bone_count,
        factor_bones
    );

    if factor_bones {
        PotentialField::with_bone_groups(values, contributions)
    } else {
        Ok(PotentialField::from_values(values))
    }
}

/// 紧支撑衰减 (1 - t²)³，t ≥ 1 时为 0
fn falloff(t: f32) -> f32 {
    if t >= 1.0 {
        return 0.0;
    }
    let s = 1.0 - t * t;
    s * s * s
}

fn distance_to_segment(p: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VertexWeight;
    use crate::skeleton::Bone;

    fn skeleton() -> Skeleton {
        Skeleton::from_bones(vec![
            Bone::with_parent("hips", -1, Vec3::ZERO),
            Bone::with_parent("leg_l", 0, Vec3::new(-1.0, -1.0, 0.0)),
            Bone::with_parent("leg_r", 0, Vec3::new(1.0, -1.0, 0.0)),
        ])
        .unwrap()
    }

    fn mesh(weights: Vec<VertexWeight>) -> RestMesh {
        let positions = (0..weights.len())
            .map(|i| Vec3::new(i as f32 * 0.5, 0.2, 0.0))
            .collect();
        RestMesh::new(positions, Vec::new(), Vec::new(), weights).unwrap()
    }

    #[test]
    fn test_falloff_shape() {
        assert_eq!(falloff(0.0), 1.0);
        assert_eq!(falloff(1.0), 0.0);
        assert_eq!(falloff(2.0), 0.0);
        assert!(falloff(0.25) > falloff(0.5));
    }

    #[test]
    fn test_distance_to_segment() {
        let d = distance_to_segment(Vec3::new(0.5, 1.0, 0.0), Vec3::ZERO, Vec3::X);
        assert!((d - 1.0).abs() < 1e-6);
        let d = distance_to_segment(Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO, Vec3::X);
        assert!((d - 2.0).abs() < 1e-6);
        let d = distance_to_segment(Vec3::Y, Vec3::ZERO, Vec3::ZERO);
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_potential_is_deterministic_and_bounded() {
        let weights = vec![
            VertexWeight::Bdef1 { bone: 0 },
            VertexWeight::Bdef2 { bones: [0, 1], weight: 0.5 },
            VertexWeight::Bdef2 { bones: [1, 2], weight: 0.3 },
        ];
        let mesh = mesh(weights);
        let skel = skeleton();

        let a = compute_base_potential(&mesh, &skel, false).unwrap();
        let b = compute_base_potential(&mesh, &skel, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.bone_groups().is_none());
        for &v in a.values() {
            assert!(v > 0.0 && v <= 1.0);
        }
    }

    #[test]
    fn test_factor_bones_merges_siblings() {
        let weights = vec![VertexWeight::Bdef2 { bones: [1, 2], weight: 0.4 }];
        let mesh = mesh(weights);
        let field = compute_base_potential(&mesh, &skeleton(), true).unwrap();

        let groups = field.bone_groups().unwrap();
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].bone, 1);
        let total: f32 = groups[0].iter().map(|g| g.weight).sum();
        assert!((total - field.values()[0]).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_bone_is_compute_error() {
        let mesh = mesh(vec![VertexWeight::Bdef1 { bone: 7 }]);
        let result = compute_base_potential(&mesh, &skeleton(), false);
        assert!(matches!(result, Err(SkinError::Compute(_))));
    }

    #[test]
    fn test_empty_skeleton_is_compute_error() {
        let mesh = mesh(vec![VertexWeight::default()]);
        let result = compute_base_potential(&mesh, &Skeleton::new(), false);
        assert!(matches!(result, Err(SkinError::Compute(_))));
    }
}
