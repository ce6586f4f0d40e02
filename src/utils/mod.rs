//! # 工具函数模块
//!
//! 美化输出、进度条与日志后端。
//!
//! ## 依赖关系
//! - 被 `main.rs`, `commands/`, `batch/` 使用
//! - 子模块: output, progress, logger

pub mod logger;
pub mod output;
pub mod progress;
