//! 静态网格（Rest Mesh）

mod rest_mesh;

pub use rest_mesh::RestMesh;

/// 模型顶点骨骼权重
#[derive(Clone, Debug, PartialEq)]
pub enum VertexWeight {
    Bdef1 { bone: i32 },
    Bdef2 { bones: [i32; 2], weight: f32 },
    Bdef4 { bones: [i32; 4], weights: [f32; 4] },
}

impl Default for VertexWeight {
    fn default() -> Self {
        VertexWeight::Bdef1 { bone: 0 }
    }
}

impl VertexWeight {
    /// 有效的 (骨骼索引, 权重) 对，跳过零权重槽位
    ///
    /// 负的骨骼索引保留原值，由调用方决定如何报错。
    pub fn influences(&self) -> Vec<(i32, f32)> {
        match self {
            VertexWeight::Bdef1 { bone } => vec![(*bone, 1.0)],
            VertexWeight::Bdef2 { bones, weight } => [(bones[0], *weight), (bones[1], 1.0 - *weight)]
                .into_iter()
                .filter(|(_, w)| *w > 0.0)
                .collect(),
            VertexWeight::Bdef4 { bones, weights } => bones
                .iter()
                .zip(weights.iter())
                .filter(|(_, w)| **w > 0.0)
                .map(|(b, w)| (*b, *w))
                .collect(),
        }
    }

    /// 从任意数量的影响构建权重，多于 4 个时保留最重的 4 个并重新归一化
    pub fn from_influences(influences: &[(u32, f32)]) -> Self {
        let mut sorted: Vec<(u32, f32)> = influences
            .iter()
            .copied()
            .filter(|(_, w)| *w > 0.0)
            .collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        sorted.truncate(4);

        let total: f32 = sorted.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return VertexWeight::default();
        }

        match sorted.as_slice() {
            [(b, _)] => VertexWeight::Bdef1 { bone: *b as i32 },
            [(b0, w0), (b1, _)] => VertexWeight::Bdef2 {
                bones: [*b0 as i32, *b1 as i32],
                weight: *w0 / total,
            },
            _ => {
                let mut bones = [0i32; 4];
                let mut weights = [0.0f32; 4];
                for (slot, (b, w)) in sorted.iter().enumerate() {
                    bones[slot] = *b as i32;
                    weights[slot] = *w / total;
                }
                VertexWeight::Bdef4 { bones, weights }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_influences_skip_zero_slots() {
        let w = VertexWeight::Bdef4 {
            bones: [0, 1, 2, 3],
            weights: [0.5, 0.5, 0.0, 0.0],
        };
        assert_eq!(w.influences(), vec![(0, 0.5), (1, 0.5)]);

        let w = VertexWeight::Bdef2 { bones: [2, 5], weight: 1.0 };
        assert_eq!(w.influences(), vec![(2, 1.0)]);
    }

    #[test]
    fn test_from_influences_keeps_heaviest_four() {
        let w = VertexWeight::from_influences(&[
            (0, 0.1),
            (1, 0.2),
            (2, 0.3),
            (3, 0.2),
            (4, 0.2),
        ]);
        match w {
            VertexWeight::Bdef4 { bones, weights } => {
                assert_eq!(bones[0], 2);
                assert!(!bones.contains(&0));
                let sum: f32 = weights.iter().sum();
                assert!((sum - 1.0).abs() < 1e-5);
            }
            other => panic!("unexpected weight {:?}", other),
        }
    }

    #[test]
    fn test_from_influences_small_counts() {
        assert_eq!(
            VertexWeight::from_influences(&[(3, 2.0)]),
            VertexWeight::Bdef1 { bone: 3 }
        );
        match VertexWeight::from_influences(&[(1, 1.0), (4, 3.0)]) {
            VertexWeight::Bdef2 { bones, weight } => {
                assert_eq!(bones, [4, 1]);
                assert!((weight - 0.75).abs() < 1e-6);
            }
            other => panic!("unexpected weight {:?}", other),
        }
        assert_eq!(VertexWeight::from_influences(&[]), VertexWeight::default());
    }
}
