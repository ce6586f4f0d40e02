//! # XYZ / Extended XYZ 解析器
//!
//! ## 格式说明
//! ```text
//! <原子数>
//! Lattice="ax ay az bx by bz cx cy cz" Properties=species:S:1:pos:R:3:forces:R:3 energy=-1.23 pbc="T T T"
//! <元素> <x> <y> <z> [fx fy fz] ...
//! ...
//! <原子数>            # 下一帧
//! ```
//!
//! 分帧算法: 反复读取原子数行并截取 `count + 2` 行；原子数行非数字、≤0
//! 或剩余行数不足时视为噪声，只前进一行后重试，不会中止。
//! 单结构解析只解析最后一个成功分出的帧；轨迹解析解析全部帧。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `detect/content.rs`, `trajectory/index.rs` 使用
//! - 使用 `parsers/lexer.rs`, `models/`, `trajectory/assemble.rs`

use crate::error::{Result, StructuraError};
use crate::math::Matrix3;
use crate::models::element::normalize_symbol;
use crate::models::{
    Frame, FrameMetadata, Lattice, MetaValue, ParsedStructure, SiteProperties, Trajectory,
};
use crate::parsers::lexer::parse_coordinate;
use crate::trajectory::assemble::TrajectoryBuilder;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

const FORMAT: &str = "xyz";

/// 注释行中的 key=value 对，值可带引号或花括号
static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w\-]*)\s*=\s*("[^"]*"|'[^']*'|\{[^}]*\}|\S+)"#)
        .expect("valid key=value regex")
});

/// 普通 XYZ 注释里的 "energy: -1.23" / "E = -1.23"
static ENERGY_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:energy|e)\s*[:=]\s*([-+]?\d*\.?\d+(?:[eEdD][-+]?\d+)?)")
        .expect("valid energy regex")
});

static STEP_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:step|timestep|ionic_step)\s*[:=]?\s*(\d+)").expect("valid step regex")
});

/// 分帧得到的一个原始块
#[derive(Debug, Clone)]
pub struct XyzBlock<'a> {
    /// 原子数行在整个文本中的字节偏移
    pub byte_offset: usize,
    /// 块的字节长度（含换行）
    pub byte_len: usize,
    pub count: usize,
    pub comment: &'a str,
    pub atom_lines: Vec<&'a str>,
}

/// 带字节偏移的行切分（去掉行尾 `\r\n`）
fn lines_with_offsets(text: &str) -> Vec<(usize, &str, usize)> {
    let mut out = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        out.push((offset, line, raw.len()));
        offset += raw.len();
    }
    out
}

/// 按原子数行切分帧
pub fn split_frames(text: &str) -> Vec<XyzBlock<'_>> {
    let lines = lines_with_offsets(text);
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let count = match lines[i].1.trim().parse::<i64>() {
            Ok(n) if n > 0 => n as usize,
            _ => {
                i += 1;
                continue;
            }
        };
        let end = i + count + 2;
        if end > lines.len() {
            i += 1;
            continue;
        }

        let byte_offset = lines[i].0;
        let byte_len: usize = lines[i..end].iter().map(|l| l.2).sum();
        blocks.push(XyzBlock {
            byte_offset,
            byte_len,
            count,
            comment: lines[i + 1].1,
            atom_lines: lines[i + 2..end].iter().map(|l| l.1).collect(),
        });
        i = end;
    }

    blocks
}

/// Properties 列定义，如 `pos:R:3`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyColumn {
    pub name: String,
    pub kind: char,
    pub width: usize,
}

/// 注释行解析结果
#[derive(Debug, Clone, Default)]
pub struct CommentInfo {
    pub lattice: Option<Matrix3>,
    pub pbc: Option<[bool; 3]>,
    pub properties: Option<Vec<PropertyColumn>>,
    pub step: Option<f64>,
    pub metadata: FrameMetadata,
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('{') && raw.ends_with('}')))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn parse_floats(raw: &str) -> Option<Vec<f64>> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| parse_coordinate(s).ok())
        .collect()
}

fn parse_bool_token(token: &str) -> Option<bool> {
    match token {
        "T" | "t" | "True" | "true" | "1" => Some(true),
        "F" | "f" | "False" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_properties(raw: &str) -> Option<Vec<PropertyColumn>> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() % 3 != 0 {
        return None;
    }
    parts
        .chunks(3)
        .map(|c| {
            Some(PropertyColumn {
                name: c[0].to_string(),
                kind: c[1].chars().next()?.to_ascii_uppercase(),
                width: c[2].parse().ok().filter(|&w: &usize| w > 0)?,
            })
        })
        .collect()
}

/// 解析 (扩展) XYZ 注释行
pub fn parse_comment(comment: &str) -> CommentInfo {
    let mut info = CommentInfo::default();

    for caps in KEY_VALUE.captures_iter(comment) {
        let key = &caps[1];
        let value = unquote(&caps[2]);

        match key.to_lowercase().as_str() {
            "lattice" => {
                if let Some(v) = parse_floats(value).filter(|v| v.len() == 9) {
                    info.lattice = Some([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]]);
                }
            }
            "properties" => info.properties = parse_properties(value),
            "pbc" => {
                let flags: Vec<bool> = value.split_whitespace().filter_map(parse_bool_token).collect();
                if flags.len() == 3 {
                    info.pbc = Some([flags[0], flags[1], flags[2]]);
                }
            }
            "energy" | "e" | "total_energy" => {
                info.metadata.energy = parse_coordinate(value).ok();
            }
            "free_energy" => {
                info.metadata
                    .extra
                    .insert("free_energy".into(), MetaValue::infer(value));
            }
            "step" | "timestep" | "ionic_step" => {
                info.step = parse_coordinate(value).ok();
            }
            "stress" | "virial" => {
                if let Some(v) = parse_floats(value) {
                    info.metadata.set_stress_flat(&v);
                }
            }
            "temperature" | "temp" | "t" => {
                info.metadata.temperature = parse_coordinate(value).ok();
            }
            "pressure" => info.metadata.pressure = parse_coordinate(value).ok(),
            "volume" => info.metadata.volume = parse_coordinate(value).ok(),
            "bandgap" | "band_gap" => info.metadata.bandgap = parse_coordinate(value).ok(),
            _ => {
                info.metadata.extra.insert(key.to_string(), MetaValue::infer(value));
            }
        }
    }

    if info.metadata.energy.is_none() {
        if let Some(caps) = ENERGY_FALLBACK.captures(comment) {
            info.metadata.energy = parse_coordinate(&caps[1]).ok();
        }
    }
    if info.step.is_none() {
        if let Some(caps) = STEP_FALLBACK.captures(comment) {
            info.step = caps[1].parse().ok();
        }
    }

    info
}

/// 默认列布局: species:S:1:pos:R:3
fn default_columns() -> Vec<PropertyColumn> {
    vec![
        PropertyColumn {
            name: "species".into(),
            kind: 'S',
            width: 1,
        },
        PropertyColumn {
            name: "pos".into(),
            kind: 'R',
            width: 3,
        },
    ]
}

fn column_value(column: &PropertyColumn, tokens: &[&str]) -> MetaValue {
    if column.width == 1 {
        return match column.kind {
            'L' => parse_bool_token(tokens[0])
                .map(MetaValue::Bool)
                .unwrap_or_else(|| MetaValue::Text(tokens[0].to_string())),
            'S' => MetaValue::Text(tokens[0].to_string()),
            _ => MetaValue::infer(tokens[0]),
        };
    }
    match column.kind {
        'R' | 'I' => {
            let floats: Vec<f64> = tokens.iter().filter_map(|t| parse_coordinate(t).ok()).collect();
            if floats.len() == tokens.len() {
                MetaValue::FloatList(floats)
            } else {
                MetaValue::TextList(tokens.iter().map(|s| s.to_string()).collect())
            }
        }
        _ => MetaValue::TextList(tokens.iter().map(|s| s.to_string()).collect()),
    }
}

/// 解析一个分好的块
pub fn parse_block(block: &XyzBlock<'_>, frame_index: usize) -> Result<Frame> {
    let info = parse_comment(block.comment);
    let fallback = default_columns();
    let columns = info.properties.clone().unwrap_or_else(default_columns);
    let total_width: usize = columns.iter().map(|c| c.width).sum();

    let lattice = info
        .lattice
        .map(|m| Lattice::from_matrix(m).with_pbc(info.pbc.unwrap_or([true; 3])));
    let frame = lattice.as_ref().map(Lattice::frame);

    let mut sites = Vec::with_capacity(block.count);
    let mut forces: Vec<[f64; 3]> = Vec::new();

    for (n, line) in block.atom_lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(StructuraError::malformed(
                FORMAT,
                format!(
                    "atom line {} of frame {} needs 'element x y z', got '{}'",
                    n + 1,
                    frame_index,
                    line.trim()
                ),
            ));
        }
        // 列定义与实际列数不符时退回默认布局
        let active: &[PropertyColumn] = if tokens.len() >= total_width {
            &columns
        } else {
            &fallback
        };

        let mut raw_symbol = tokens[0];
        let mut xyz: Option<[f64; 3]> = None;
        let mut properties = SiteProperties::default();
        let mut col = 0;

        for column in active {
            let cells = &tokens[col..col + column.width];
            match column.name.as_str() {
                "species" => raw_symbol = cells[0],
                "pos" if column.width == 3 => {
                    xyz = Some([
                        parse_coordinate(cells[0])?,
                        parse_coordinate(cells[1])?,
                        parse_coordinate(cells[2])?,
                    ]);
                }
                "forces" | "force" | "forces_dft" if column.width == 3 => {
                    forces.push([
                        parse_coordinate(cells[0])?,
                        parse_coordinate(cells[1])?,
                        parse_coordinate(cells[2])?,
                    ]);
                }
                _ => {
                    properties
                        .extra
                        .insert(column.name.clone(), column_value(column, cells));
                }
            }
            col += column.width;
        }

        let xyz = xyz.ok_or_else(|| {
            StructuraError::malformed(FORMAT, "Properties has no 'pos:R:3' column")
        })?;

        let symbol = match normalize_symbol(raw_symbol) {
            Some(s) => s.to_string(),
            None => {
                log::warn!(
                    "Frame {}: unrecognized element '{}', using 'X'",
                    frame_index,
                    raw_symbol
                );
                "X".to_string()
            }
        };
        let site = ParsedStructure::site_from_cartesian(frame.as_ref(), symbol, xyz)
            .with_label(raw_symbol)
            .with_properties(properties);
        sites.push(site);
    }

    let structure = ParsedStructure::new(sites, lattice);
    let mut metadata = info.metadata;
    if forces.len() == structure.sites.len() && !forces.is_empty() {
        metadata.set_forces(forces);
    }

    let step = info.step.unwrap_or(frame_index as f64);
    Ok(Frame::new(structure, step).with_metadata(metadata))
}

/// 解析单个结构（取最后一帧）
pub fn parse_xyz(content: &str) -> Result<ParsedStructure> {
    let blocks = split_frames(content);
    let (index, last) = blocks
        .iter()
        .enumerate()
        .last()
        .ok_or_else(|| StructuraError::malformed(FORMAT, "no valid atom-count framed block found"))?;
    Ok(parse_block(last, index)?.structure)
}

/// 解析全部帧，畸形帧记录警告后跳过
pub fn parse_xyz_trajectory(content: &str, max_frames: Option<usize>) -> Result<Trajectory> {
    let blocks = split_frames(content);
    let limit = max_frames.unwrap_or(usize::MAX);

    let results: Vec<Result<Frame>> = blocks
        .par_iter()
        .take(limit)
        .enumerate()
        .map(|(i, block)| parse_block(block, i))
        .collect();

    let mut builder = TrajectoryBuilder::new(FORMAT);
    for (i, result) in results.into_iter().enumerate() {
        builder.push_result(i, result);
    }
    builder.finish()
}
