//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。库不做 I/O，文件读取集中在这里。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `utils/` 以及 `structura` 库
//! - 子模块: detect, parse, trajectory, batch

pub mod batch;
pub mod detect;
pub mod parse;
pub mod trajectory;

use crate::cli::Commands;
use std::path::Path;
use structura::{FormatKind, ParseOptions, ParsedStructure, Result, StructuraError};

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Detect(args) => detect::execute(args),
        Commands::Parse(args) => parse::execute(args),
        Commands::Trajectory(args) => trajectory::execute(args),
        Commands::Batch(args) => batch::execute(args),
    }
}

/// 读取整个文件
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| StructuraError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 传给库的文件名（不含目录）
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// 读取单个结构
///
/// 二进制轨迹容器取最后一帧；文本格式走单结构解析。
pub fn load_structure(
    bytes: &[u8],
    filename: &str,
    options: &ParseOptions,
) -> Result<(Option<FormatKind>, ParsedStructure)> {
    let kind = structura::detect_format(filename, Some(bytes));

    if kind.is_some_and(|k| k.is_binary()) {
        let trajectory = structura::parse_trajectory_with(bytes, filename, options)?;
        let frame = trajectory.frames.into_iter().last().ok_or_else(|| {
            StructuraError::Other(format!("'{}' contains no readable frames", filename))
        })?;
        return Ok((kind, frame.structure));
    }

    let text = std::str::from_utf8(bytes).map_err(|e| {
        StructuraError::malformed(
            kind.map_or("text", |k| k.name()),
            format!("input is not valid UTF-8: {}", e),
        )
    })?;
    let structure = structura::parse_structure_with(text, Some(filename), options)?;
    Ok((kind, structure))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_text_structure() {
        let (kind, structure) = load_structure(
            b"2\n\nO 0 0 0\nH 0 0 1\n",
            "water.xyz",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(kind, Some(FormatKind::Xyz));
        assert_eq!(structure.formula(), "HO");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_input(Path::new("/nonexistent/structura/POSCAR")).unwrap_err();
        assert!(matches!(err, StructuraError::FileReadError { .. }));
    }

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name(Path::new("runs/npt/traj.xyz")), "traj.xyz");
    }
}
