//! # Structura - 原子结构与轨迹读取工具
//!
//! `structura` 库的命令行前端：读取文件、调用库解析、美化输出。
//!
//! ## 子命令
//! - `detect`     - 识别文件格式
//! - `parse`      - 解析单个结构
//! - `trajectory` - 解析轨迹、统计与校验
//! - `batch`      - 批量并行解析并汇总
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     └── structura (库: 识别、解析、轨迹)
//!   ├── batch/      (批量收集与并行执行)
//!   └── utils/      (输出、进度条、日志)
//! ```

mod batch;
mod cli;
mod commands;
mod utils;

use clap::Parser;
use cli::Cli;
use std::error::Error;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logger::init(cli.verbose, cli.quiet);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        let mut source = e.source();
        while let Some(cause) = source {
            utils::output::print_error(&format!("  caused by: {}", cause));
            source = cause.source();
        }
        std::process::exit(1);
    }
}
