//! # parse 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/parse.rs`

use super::ParserArgs;
use clap::Args;
use std::path::PathBuf;

/// parse 子命令参数
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Structure file to parse
    pub file: PathBuf,

    /// Print the parsed structure as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Maximum number of sites listed in the site table
    #[arg(long, default_value_t = 20)]
    pub max_sites: usize,

    #[command(flatten)]
    pub parser: ParserArgs,
}
