//! # detect 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/detect.rs`

use clap::Args;
use std::path::PathBuf;

/// detect 子命令参数
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Files to identify
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Use only the filename, do not read the file
    #[arg(long, default_value_t = false)]
    pub name_only: bool,
}
