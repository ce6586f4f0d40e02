//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式。
//! 模板是编译期常量，解析失败时退回默认样式。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/runner.rs` 使用
//! - 使用 `indicatif` crate

use indicatif::{ProgressBar, ProgressStyle};

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// 创建标准进度条
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            ProgressStyle::default_bar,
        )
        .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// 创建 spinner（用于不确定进度的任务）
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style(
            "{spinner:.green} {elapsed_precise} {msg}",
            ProgressStyle::default_spinner,
        )
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// 按需创建 spinner；`--json` 或静默模式下不显示
pub fn maybe_spinner(enabled: bool, message: &str) -> ProgressBar {
    if enabled {
        create_spinner(message)
    } else {
        ProgressBar::hidden()
    }
}
