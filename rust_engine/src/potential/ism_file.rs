//! ISM 势场文件读写
//!
//! 小端二进制格式：
//! - 魔数 `ISMF`，u32 版本号，u32 顶点数，u8 标志位（bit0 = factor bones）
//! - 每顶点 f32 势场值；factor bones 时紧跟 u32 组数与 组数 × (u32 骨骼, f32 权重)

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Result, SkinError};
use super::{BoneWeight, PotentialField};

const ISM_MAGIC: &[u8; 4] = b"ISMF";
const ISM_VERSION: u32 = 1;
const FLAG_FACTOR_BONES: u8 = 0x01;
/// 单个顶点的骨骼组数量上限，超过视为损坏
const MAX_GROUPS_PER_VERTEX: u32 = 1024;

/// 从文件加载势场；顶点数必须与 `vertex_count` 一致
pub fn load_ism<P: AsRef<Path>>(path: P, vertex_count: usize) -> Result<PotentialField> {
    let file = File::open(path.as_ref()).map_err(SkinError::Io)?;
    let mut reader = BufReader::new(file);
    let field = read_ism(&mut reader, vertex_count)?;
    log::info!(
        "ISM 加载完成: {} ({} 个顶点, factor_bones={})",
        path.as_ref().display(),
        field.len(),
        field.bone_groups().is_some()
    );
    Ok(field)
}

/// 从 Reader 解析势场，全部读完才返回结果
pub fn read_ism<R: Read>(reader: &mut R, vertex_count: usize) -> Result<PotentialField> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(read_failure("magic"))?;
    if &magic != ISM_MAGIC {
        return Err(SkinError::Format("Invalid ISM magic".to_string()));
    }

    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(read_failure("version"))?;
    if version != ISM_VERSION {
        return Err(SkinError::Format(format!("Unsupported ISM version {}", version)));
    }

    let count = reader
        .read_u32::<LittleEndian>()
        .map_err(read_failure("vertex count"))? as usize;
    if count != vertex_count {
        return Err(SkinError::Format(format!(
            "ISM holds {} vertices but mesh has {}",
            count, vertex_count
        )));
    }

    let flags = reader.read_u8().map_err(read_failure("flags"))?;
    if flags & !FLAG_FACTOR_BONES != 0 {
        return Err(SkinError::Format(format!("Unknown ISM flags {:#04x}", flags)));
    }
    let factor_bones = flags & FLAG_FACTOR_BONES != 0;

    let mut values = Vec::with_capacity(count);
    let mut bone_groups = factor_bones.then(|| Vec::with_capacity(count));

    for i in 0..count {
        let value = reader
            .read_f32::<LittleEndian>()
            .map_err(read_failure("potential value"))?;
        check_finite(value, i)?;
        values.push(value);

        if let Some(groups) = bone_groups.as_mut() {
            groups.push(read_bone_groups(reader, i)?);
        }
    }

    let mut extra = [0u8; 1];
    if reader.read(&mut extra).map_err(SkinError::Io)? != 0 {
        return Err(SkinError::Format("Trailing data after ISM records".to_string()));
    }

    match bone_groups {
        Some(groups) => PotentialField::with_bone_groups(values, groups),
        None => Ok(PotentialField::from_values(values)),
    }
}

fn read_bone_groups<R: Read>(reader: &mut R, vertex: usize) -> Result<Vec<BoneWeight>> {
    let group_count = reader
        .read_u32::<LittleEndian>()
        .map_err(read_failure("group count"))?;
    if group_count > MAX_GROUPS_PER_VERTEX {
        return Err(SkinError::Format(format!(
            "Vertex {} declares {} bone groups",
            vertex, group_count
        )));
    }

    let mut groups = Vec::with_capacity(group_count as usize);
    for _ in 0..group_count {
        let bone = reader
            .read_u32::<LittleEndian>()
            .map_err(read_failure("group bone"))?;
        let weight = reader
            .read_f32::<LittleEndian>()
            .map_err(read_failure("group weight"))?;
        check_finite(weight, vertex)?;
        groups.push(BoneWeight { bone, weight });
    }
    Ok(groups)
}

/// 导出势场到文件
pub fn save_ism<P: AsRef<Path>>(path: P, field: &PotentialField) -> Result<()> {
    let file = File::create(path.as_ref()).map_err(SkinError::Io)?;
    let mut writer = BufWriter::new(file);
    write_ism(&mut writer, field)?;
    writer.flush().map_err(SkinError::Io)?;
    log::info!("ISM 导出完成: {} ({} 个顶点)", path.as_ref().display(), field.len());
    Ok(())
}

/// 写出势场到 Writer
pub fn write_ism<W: Write>(writer: &mut W, field: &PotentialField) -> Result<()> {
    let count = u32::try_from(field.len())
        .map_err(|_| SkinError::Format(format!("Too many vertices: {}", field.len())))?;
    let groups = field.bone_groups();

    writer.write_all(ISM_MAGIC)?;
    writer.write_u32::<LittleEndian>(ISM_VERSION)?;
    writer.write_u32::<LittleEndian>(count)?;
    writer.write_u8(if groups.is_some() { FLAG_FACTOR_BONES } else { 0 })?;

    for (i, &value) in field.values().iter().enumerate() {
        writer.write_f32::<LittleEndian>(value)?;
        if let Some(groups) = groups {
            let vertex_groups = &groups[i];
            writer.write_u32::<LittleEndian>(vertex_groups.len() as u32)?;
            for g in vertex_groups {
                writer.write_u32::<LittleEndian>(g.bone)?;
                writer.write_f32::<LittleEndian>(g.weight)?;
            }
        }
    }
    Ok(())
}

/// 读到文件尾视为格式错误（截断），其他 IO 错误原样返回
fn read_failure(what: &'static str) -> impl Fn(io::Error) -> SkinError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SkinError::Format(format!("Truncated ISM data while reading {}", what))
        } else {
            SkinError::Io(e)
        }
    }
}

fn check_finite(value: f32, vertex: usize) -> Result<()> {
    if !value.is_finite() {
        return Err(SkinError::Format(format!(
            "Non-finite value at vertex {}",
            vertex
        )));
    }
    Ok(())
}
