//! # 批量汇总
//!
//! 每个成功解析的文件一行，用于终端表格与 CSV 导出。
//!
//! ## 依赖关系
//! - 被 `commands/batch.rs` 使用
//! - 使用 `tabled` 渲染表格，`csv` + `serde` 导出

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use structura::{ParsedStructure, Result, StructuraError, Trajectory};
use tabled::Tabled;

/// 单个文件的汇总行
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct FileSummary {
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Format")]
    pub format: String,
    #[tabled(rename = "Frames")]
    pub frames: usize,
    #[tabled(rename = "Atoms")]
    pub atoms: usize,
    #[tabled(rename = "Formula")]
    pub formula: String,
    #[tabled(rename = "Volume (Å³)")]
    pub volume: String,
    #[tabled(rename = "Energy (eV)")]
    pub energy: String,
    #[tabled(rename = "Warnings")]
    pub warnings: usize,
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

impl FileSummary {
    /// 由单个结构生成
    pub fn from_structure(file: &str, format: &str, structure: &ParsedStructure) -> Self {
        FileSummary {
            file: file.to_string(),
            format: format.to_string(),
            frames: 1,
            atoms: structure.sites.len(),
            formula: structure.formula(),
            volume: fmt_opt(structure.volume()),
            energy: String::new(),
            warnings: 0,
        }
    }

    /// 由轨迹生成；原子数、化学式与能量取最后一帧
    pub fn from_trajectory(file: &str, trajectory: &Trajectory) -> Self {
        let last = trajectory.frames.last();
        FileSummary {
            file: file.to_string(),
            format: trajectory
                .metadata
                .source_format
                .clone()
                .unwrap_or_default(),
            frames: trajectory.frames.len(),
            atoms: last.map_or(0, |f| f.structure.sites.len()),
            formula: last.map(|f| f.structure.formula()).unwrap_or_default(),
            volume: fmt_opt(last.and_then(|f| f.structure.volume())),
            energy: fmt_opt(last.and_then(|f| f.metadata.energy)),
            warnings: trajectory.metadata.warnings.len(),
        }
    }
}

/// 写出 CSV（带表头）
pub fn write_csv<W: Write>(rows: &[FileSummary], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| StructuraError::Other(format!("failed to flush CSV: {}", e)))?;
    Ok(())
}

/// 写出 CSV 到文件
pub fn save_csv(rows: &[FileSummary], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| StructuraError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    write_csv(rows, file)
}
