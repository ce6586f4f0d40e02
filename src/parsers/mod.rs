//! # 解析器模块
//!
//! 每种文本格式一个解析器，全部产出 `ParsedStructure` 或帧序列。
//! 这里按 `FormatKind` 分派。
//!
//! ## 依赖关系
//! - 被 `lib.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: lexer, xyz, poscar, cif, phonopy, optimade, json, lammps

pub mod cif;
pub mod json;
pub mod lammps;
pub mod lexer;
pub mod optimade;
pub mod phonopy;
pub mod poscar;
pub mod xyz;

use crate::detect::FormatKind;
use crate::error::{Result, StructuraError};
use crate::models::{ParsedStructure, Trajectory};
use crate::options::ParseOptions;

/// 按格式解析单个结构
///
/// 轨迹格式（XDATCAR、LAMMPS）取最后一帧，与 XYZ 单结构解析一致。
pub fn parse_text_structure(
    kind: FormatKind,
    content: &str,
    options: &ParseOptions,
) -> Result<ParsedStructure> {
    match kind {
        FormatKind::Xyz => xyz::parse_xyz(content),
        FormatKind::Poscar => poscar::parse_poscar(content),
        FormatKind::Cif => cif::parse_cif(content, &options.cif()),
        FormatKind::PhonopyYaml => phonopy::parse_phonopy(content, options.phonopy_cell),
        FormatKind::Optimade => optimade::parse_optimade(content),
        FormatKind::Json => json::parse_json(content),
        FormatKind::Xdatcar | FormatKind::LammpsDump => {
            let trajectory = parse_text_trajectory(kind, content, options)?;
            trajectory
                .frames
                .into_iter()
                .last()
                .map(|frame| frame.structure)
                .ok_or_else(|| StructuraError::malformed(kind.name(), "no frames"))
        }
        FormatKind::AseTrajectory | FormatKind::Hdf5 => Err(StructuraError::UnsupportedFormat(
            format!("{} is a binary trajectory container; parse it as a trajectory", kind),
        )),
    }
}

/// 按格式解析文本轨迹
///
/// 单结构格式包装成单帧轨迹（步数 0）。
pub fn parse_text_trajectory(
    kind: FormatKind,
    content: &str,
    options: &ParseOptions,
) -> Result<Trajectory> {
    match kind {
        FormatKind::Xyz => xyz::parse_xyz_trajectory(content, options.max_frames),
        FormatKind::Xdatcar => poscar::parse_xdatcar(content, options.max_frames),
        FormatKind::LammpsDump => lammps::parse_lammps(content, options.max_frames),
        FormatKind::AseTrajectory | FormatKind::Hdf5 => Err(StructuraError::UnsupportedFormat(
            format!("{} content must be passed as raw bytes", kind),
        )),
        single => {
            let structure = parse_text_structure(single, content, options)?;
            crate::trajectory::assemble_trajectory(
                single.name(),
                [crate::models::Frame::new(structure, 0.0)],
            )
        }
    }
}
