//! # trajectory 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/trajectory.rs`

use super::ParserArgs;
use clap::Args;
use std::path::PathBuf;

/// trajectory 子命令参数
#[derive(Args, Debug)]
pub struct TrajectoryArgs {
    /// Trajectory file to parse
    pub file: PathBuf,

    /// Print the trajectory as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Build a frame index and parse only the first frames (XYZ only)
    #[arg(long, default_value_t = false)]
    pub indexed: bool,

    /// Maximum number of frames listed in the frame table
    #[arg(long, default_value_t = 10)]
    pub frames: usize,

    #[command(flatten)]
    pub parser: ParserArgs,
}
