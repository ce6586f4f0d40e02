//! # Structura - 原子结构与轨迹读取核心
//!
//! 把计算化学/材料模拟常见的结构与轨迹文件统一读成一个数据模型。
//! 库本身不做 I/O：调用方提供已解压的文本或字节以及原始文件名。
//!
//! ## 入口
//! - [`detect_format`] - 魔数 → 文件名 → 内容启发式
//! - [`parse_structure`] / [`parse_structure_with`] - 单个结构
//! - [`parse_trajectory`] / [`parse_trajectory_with`] - 轨迹（文本或二进制）
//! - [`parse_trajectory_indexed`] - 流式索引模式
//! - [`validate_trajectory`] / [`trajectory_stats`]
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── detect/      (格式识别)
//!   ├── parsers/     (文本格式解析器)
//!   ├── binary/      (ASE ULM / HDF5 解码)
//!   ├── trajectory/  (组装、索引、校验、统计)
//!   ├── models/      (数据模型)
//!   ├── math/        (晶格与坐标换算)
//!   ├── options.rs   (解析选项)
//!   └── error.rs     (错误处理)
//! ```

pub mod binary;
pub mod detect;
pub mod error;
pub mod math;
pub mod models;
pub mod options;
pub mod parsers;
pub mod trajectory;

pub use detect::{detect_format, is_multi_frame_xyz, is_trajectory_filename, FormatKind};
pub use error::{Result, StructuraError};
pub use models::{
    Frame, FrameIndex, FrameMetadata, Lattice, MetaValue, ParsedStructure, PlotMetadata, Site,
    SiteProperties, Species, Trajectory, TrajectoryMetadata, TrajectoryStats,
};
pub use options::ParseOptions;
pub use trajectory::{trajectory_stats, validate_trajectory};

/// 识别格式；已知但不支持的格式给出点名的错误
fn resolve_format(filename: Option<&str>, bytes: &[u8]) -> Result<FormatKind> {
    let name = filename.unwrap_or("");
    detect::check_supported(name, bytes)?;
    detect_format(name, Some(bytes)).ok_or_else(|| {
        StructuraError::UnsupportedFormat(match filename {
            Some(f) if !f.is_empty() => format!("could not identify the format of '{}'", f),
            _ => "could not identify the format from content".to_string(),
        })
    })
}

fn as_text<'a>(kind: FormatKind, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| {
        StructuraError::malformed(kind.name(), format!("input is not valid UTF-8: {}", e))
    })
}

/// 解析单个结构（默认选项）
pub fn parse_structure(content: &str, filename: Option<&str>) -> Result<ParsedStructure> {
    parse_structure_with(content, filename, &ParseOptions::default())
}

/// 解析单个结构
///
/// 轨迹格式返回最后一帧。
pub fn parse_structure_with(
    content: &str,
    filename: Option<&str>,
    options: &ParseOptions,
) -> Result<ParsedStructure> {
    let kind = resolve_format(filename, content.as_bytes())?;
    parsers::parse_text_structure(kind, content, options)
}

/// 解析轨迹（默认选项）
pub fn parse_trajectory(content: impl AsRef<[u8]>, filename: &str) -> Result<Trajectory> {
    parse_trajectory_with(content, filename, &ParseOptions::default())
}

/// 解析轨迹
///
/// 二进制容器直接按字节解码；其余格式按 UTF-8 文本解析，
/// 单结构格式得到单帧轨迹。
pub fn parse_trajectory_with(
    content: impl AsRef<[u8]>,
    filename: &str,
    options: &ParseOptions,
) -> Result<Trajectory> {
    let bytes = content.as_ref();
    let kind = resolve_format(Some(filename), bytes)?;

    let mut trajectory = if kind.is_binary() {
        binary::parse_binary_trajectory(kind, bytes, Some(filename), options)?
    } else {
        parsers::parse_text_trajectory(kind, as_text(kind, bytes)?, options)?
    };
    trajectory.metadata.filename = Some(filename.to_string());
    Ok(trajectory)
}

/// 流式索引模式解析轨迹
///
/// XYZ 建立帧索引并只解析前 `options.index_load_frames` 帧；
/// 其它格式没有可用的字节偏移，退回完整解析。
pub fn parse_trajectory_indexed(
    content: impl AsRef<[u8]>,
    filename: &str,
    options: &ParseOptions,
) -> Result<Trajectory> {
    let bytes = content.as_ref();
    let kind = resolve_format(Some(filename), bytes)?;
    if kind != FormatKind::Xyz {
        log::debug!("{}: {} has no frame index, parsing fully", filename, kind);
        return parse_trajectory_with(bytes, filename, options);
    }

    let mut trajectory =
        trajectory::index_xyz_trajectory(as_text(kind, bytes)?, options.index_load_frames)?;
    trajectory.metadata.filename = Some(filename.to_string());
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structure_by_content() {
        let structure = parse_structure("2\nwater-ish\nO 0 0 0\nH 0 0 0.96\n", None).unwrap();
        assert_eq!(structure.sites.len(), 2);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            parse_structure("hello world", Some("notes.txt")),
            Err(StructuraError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_compressed_payload_rejected() {
        let gz = [0x1f, 0x8b, 0x08, 0x00];
        assert!(matches!(
            parse_trajectory(gz, "traj.xyz.gz"),
            Err(StructuraError::UnsupportedBinaryFormat { .. })
        ));
    }

    #[test]
    fn test_trajectory_records_filename() {
        let trajectory = parse_trajectory("1\n\nAr 0 0 0\n1\n\nAr 0 0 1\n", "md.xyz").unwrap();
        assert_eq!(trajectory.frames.len(), 2);
        assert_eq!(trajectory.metadata.filename.as_deref(), Some("md.xyz"));
    }

    #[test]
    fn test_indexed_falls_back_for_other_formats() {
        let poscar = "Si\n1.0\n5 0 0\n0 5 0\n0 0 5\nSi\n1\nDirect\n0 0 0\n";
        let trajectory = parse_trajectory_indexed(poscar, "POSCAR", &ParseOptions::default()).unwrap();
        assert!(!trajectory.is_indexed);
        assert_eq!(trajectory.frames.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_text() {
        assert!(matches!(
            parse_trajectory([0xff, 0xfe, 0x00], "bad.xyz"),
            Err(StructuraError::MalformedInput { .. })
        ));
    }
}
