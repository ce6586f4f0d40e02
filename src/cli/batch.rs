//! # batch 子命令 CLI 定义
//!
//! 批量解析结构/轨迹文件并输出汇总表
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/batch.rs`

use super::ParserArgs;
use clap::Args;
use std::path::PathBuf;

/// batch 子命令参数
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input file or directory
    pub input: PathBuf,

    /// Glob pattern(s) for input files, comma separated
    #[arg(short, long, default_value = "*")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = number of CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Write the per-file summary to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Parse every file as a trajectory instead of a single structure
    #[arg(long, default_value_t = false)]
    pub trajectory: bool,

    #[command(flatten)]
    pub parser: ParserArgs,
}
