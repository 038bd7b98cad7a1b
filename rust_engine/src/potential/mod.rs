//! 每顶点势场（implicit skinning 修正信号）

mod compute;
mod ism_file;

pub use compute::compute_base_potential;
pub use ism_file::{load_ism, read_ism, save_ism, write_ism};

use crate::{check_len, Result, SkinError};

/// 单个骨骼（组）对某顶点势场的贡献
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneWeight {
    pub bone: u32,
    pub weight: f32,
}

/// 势场：长度始终等于顶点数，不会被隐式调整大小
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PotentialField {
    values: Vec<f32>,
    /// factor bones 模式下的每顶点骨骼组贡献
    bone_groups: Option<Vec<Vec<BoneWeight>>>,
}

impl PotentialField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<f32>) -> Self {
        Self {
            values,
            bone_groups: None,
        }
    }

    /// 带骨骼组数据创建，两者长度必须一致
    pub fn with_bone_groups(values: Vec<f32>, bone_groups: Vec<Vec<BoneWeight>>) -> Result<Self> {
        check_len(values.len(), bone_groups.len())?;
        Ok(Self {
            values,
            bone_groups: Some(bone_groups),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn bone_groups(&self) -> Option<&[Vec<BoneWeight>]> {
        self.bone_groups.as_deref()
    }

    /// 拷贝到调用方的缓冲区，`out` 调整为顶点数
    pub fn copy_to(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(&self.values);
    }

    /// 替换标量值；长度不一致时不做任何修改
    ///
    /// 骨骼组数据与新值不再对应，一并清除。
    pub fn set_values(&mut self, values: &[f32], vertex_count: usize) -> Result<()> {
        check_len(vertex_count, values.len())?;
        self.values.clear();
        self.values.extend_from_slice(values);
        self.bone_groups = None;
        Ok(())
    }

    /// 骨骼组中的骨骼索引必须小于 `bone_count`
    pub fn check_bone_groups(&self, bone_count: usize) -> Result<()> {
        let Some(groups) = self.bone_groups.as_deref() else {
            return Ok(());
        };
        for (vertex, vertex_groups) in groups.iter().enumerate() {
            if let Some(g) = vertex_groups.iter().find(|g| g.bone as usize >= bone_count) {
                return Err(SkinError::Format(format!(
                    "vertex {} references bone group {} but skeleton has {} bones",
                    vertex, g.bone, bone_count
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SkinError;

    #[test]
    fn test_set_then_get() {
        let mut field = PotentialField::from_values(vec![0.0; 3]);
        field.set_values(&[0.1, 0.2, 0.3], 3).unwrap();

        let mut out = vec![9.0; 7];
        field.copy_to(&mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_set_wrong_length_leaves_field_unchanged() {
        let mut field = PotentialField::with_bone_groups(
            vec![0.5, 0.5],
            vec![vec![BoneWeight { bone: 0, weight: 0.5 }]; 2],
        )
        .unwrap();
        let before = field.clone();

        let result = field.set_values(&[1.0, 2.0, 3.0], 2);
        assert!(matches!(
            result,
            Err(SkinError::SizeMismatch { expected: 2, actual: 3 })
        ));
        assert_eq!(field, before);
    }

    #[test]
    fn test_set_clears_bone_groups() {
        let mut field =
            PotentialField::with_bone_groups(vec![0.5], vec![vec![BoneWeight { bone: 1, weight: 0.5 }]])
                .unwrap();
        field.set_values(&[0.7], 1).unwrap();
        assert!(field.bone_groups().is_none());
    }

    #[test]
    fn test_check_bone_groups() {
        let field = PotentialField::with_bone_groups(
            vec![0.5, 0.5],
            vec![
                vec![BoneWeight { bone: 0, weight: 0.5 }],
                vec![BoneWeight { bone: 2, weight: 0.5 }],
            ],
        )
        .unwrap();
        assert!(field.check_bone_groups(3).is_ok());
        assert!(matches!(field.check_bone_groups(2), Err(SkinError::Format(_))));
        assert!(PotentialField::from_values(vec![1.0]).check_bone_groups(0).is_ok());
    }

}
