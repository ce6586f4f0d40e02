//! # trajectory 命令实现
//!
//! 解析轨迹（可选流式索引模式），打印统计、校验结果与逐帧表格，
//! 或输出包含统计和校验结果的 JSON。
//!
//! ## 依赖关系
//! - 使用 `cli/trajectory.rs` 定义的参数
//! - 使用 `structura::{parse_trajectory_with, parse_trajectory_indexed}`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use super::{file_name, read_input};
use crate::cli::trajectory::TrajectoryArgs;
use crate::utils::{output, progress};

use serde_json::json;
use structura::{Frame, Result, Trajectory, TrajectoryStats};
use tabled::{Table, Tabled};

/// 逐帧表格行
#[derive(Debug, Clone, Tabled)]
struct FrameRow {
    #[tabled(rename = "Frame")]
    index: usize,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Atoms")]
    atoms: usize,
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "Max force (eV/Å)")]
    force_max: String,
    #[tabled(rename = "Volume (Å³)")]
    volume: String,
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn frame_row(index: usize, frame: &Frame) -> FrameRow {
    FrameRow {
        index,
        step: format!("{}", frame.step),
        atoms: frame.structure.sites.len(),
        formula: frame.structure.formula(),
        energy: opt(frame.metadata.energy, 6),
        force_max: opt(frame.metadata.force_max, 4),
        volume: opt(frame.metadata.volume.or(frame.structure.volume()), 3),
    }
}

fn print_stats(trajectory: &Trajectory, stats: &TrajectoryStats) {
    if let Some(format) = &trajectory.metadata.source_format {
        output::print_field("Format", format);
    }
    output::print_field("Frames parsed", &stats.frame_count.to_string());
    if let Some(total) = trajectory.total_frames {
        output::print_field("Frames indexed", &total.to_string());
    }
    if let Some((first, last)) = stats.step_range {
        output::print_field("Step range", &format!("{} .. {}", first, last));
    }
    match (stats.total_atoms, stats.atom_count_range) {
        (Some(n), _) => output::print_field("Atoms", &n.to_string()),
        (None, Some((lo, hi))) => output::print_field("Atoms", &format!("{} .. {} (varies)", lo, hi)),
        _ => {}
    }
    if !trajectory.metadata.discovered_datasets.is_empty() {
        output::print_field(
            "Datasets",
            &trajectory.metadata.discovered_datasets.join(", "),
        );
    }
}

/// 执行 trajectory 命令
pub fn execute(args: TrajectoryArgs) -> Result<()> {
    let options = args.parser.to_options();
    let bytes = read_input(&args.file)?;
    let name = file_name(&args.file);

    let spinner = progress::maybe_spinner(!args.json, &format!("Parsing {}", name));
    let parsed = if args.indexed {
        structura::parse_trajectory_indexed(&bytes, &name, &options)
    } else {
        structura::parse_trajectory_with(&bytes, &name, &options)
    };
    spinner.finish_and_clear();
    let trajectory = parsed?;

    let stats = structura::trajectory_stats(&trajectory);
    let problems = structura::validate_trajectory(&trajectory);

    if args.json {
        let doc = json!({
            "trajectory": trajectory,
            "stats": stats,
            "validation_errors": problems,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    output::print_header(&format!("Trajectory: {}", args.file.display()));
    print_stats(&trajectory, &stats);

    if let Some(last) = trajectory.frames.last() {
        output::print_rule();
        output::print_info("Last frame");
        output::print_structure(&last.structure);
    }

    if !trajectory.frames.is_empty() {
        let rows: Vec<FrameRow> = trajectory
            .frames
            .iter()
            .take(args.frames)
            .enumerate()
            .map(|(i, f)| frame_row(i, f))
            .collect();
        println!();
        println!("{}", Table::new(rows));
        if trajectory.frames.len() > args.frames {
            output::print_info(&format!(
                "{} more frame(s) not shown (use --frames)",
                trajectory.frames.len() - args.frames
            ));
        }
    }

    // 警告在解析时已经经由 log 输出
    if !trajectory.metadata.warnings.is_empty() {
        output::print_info(&format!(
            "{} warning(s) recorded while parsing",
            trajectory.metadata.warnings.len()
        ));
    }

    output::print_validation(&problems);
    Ok(())
}
