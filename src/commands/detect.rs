//! # detect 命令实现
//!
//! 逐个识别文件格式并以表格输出。
//!
//! ## 依赖关系
//! - 使用 `cli/detect.rs` 定义的参数
//! - 使用 `structura::detect_format` 及文件名启发式

use super::{file_name, read_input};
use crate::cli::detect::DetectArgs;
use crate::utils::output;

use std::path::Path;
use structura::{detect, Result};
use tabled::{Table, Tabled};

/// 检测结果行
#[derive(Debug, Clone, Tabled)]
struct DetectRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "Trajectory name")]
    trajectory_name: String,
    #[tabled(rename = "Multi-frame XYZ")]
    multi_frame: String,
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

fn detect_one(path: &Path, name_only: bool) -> Result<DetectRow> {
    let name = file_name(path);
    let bytes = if name_only { None } else { Some(read_input(path)?) };

    let format = match bytes.as_deref() {
        Some(b) => match detect::check_supported(&name, b) {
            Ok(()) => detect::detect_format(&name, Some(b)),
            Err(e) => {
                log::warn!("{}: {}", name, e);
                None
            }
        },
        None => detect::detect_format(&name, None),
    };

    let multi_frame = match (format, bytes.as_deref()) {
        (Some(structura::FormatKind::Xyz), Some(b)) => {
            yes_no(detect::is_multi_frame_xyz(&String::from_utf8_lossy(b)))
        }
        _ => "-".to_string(),
    };

    Ok(DetectRow {
        file: path.display().to_string(),
        format: format.map_or_else(|| "unknown".to_string(), |k| k.name().to_string()),
        trajectory_name: yes_no(detect::is_trajectory_filename(&name)),
        multi_frame,
    })
}

/// 执行 detect 命令
pub fn execute(args: DetectArgs) -> Result<()> {
    let mut rows = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match detect_one(path, args.name_only) {
            Ok(row) => rows.push(row),
            Err(e) => output::print_error(&e.to_string()),
        }
    }

    if !rows.is_empty() {
        println!("{}", Table::new(&rows));
    }

    let unknown = rows.iter().filter(|r| r.format == "unknown").count();
    if unknown > 0 {
        output::print_warning(&format!("{} file(s) could not be identified", unknown));
    }
    Ok(())
}
