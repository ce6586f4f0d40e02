//! # 日志后端
//!
//! 库内通过 `log` 门面记录解析警告与调试信息；这里把它们接到
//! `utils/output.rs` 的彩色输出上。级别由 `-v` / `-q` 决定：
//!
//! | 参数 | 级别 |
//! |------|------|
//! | `-q` | error |
//! | 默认 | warn |
//! | `-v` | info |
//! | `-vv` 及以上 | debug |
//!
//! ## 依赖关系
//! - 被 `main.rs` 初始化
//! - 使用 `utils/output.rs`

use crate::utils::output::{self, Tag};
use log::{Level, LevelFilter, Log, Metadata, Record};

struct TerminalLogger;

static LOGGER: TerminalLogger = TerminalLogger;

impl Log for TerminalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();
        match record.level() {
            Level::Error => output::emit(Tag::Err, &msg),
            Level::Warn => output::emit(Tag::Warn, &msg),
            Level::Info => output::emit(Tag::Info, &msg),
            Level::Debug | Level::Trace => {
                output::emit(Tag::Debug, &format!("{}: {}", record.target(), msg))
            }
        }
    }

    fn flush(&self) {}
}

/// 由 `-v` 次数与 `-q` 计算级别
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// 安装全局 logger；重复安装时保留已有实例
pub fn init(verbose: u8, quiet: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_for(verbose, quiet));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0, false), LevelFilter::Warn);
        assert_eq!(level_for(1, false), LevelFilter::Info);
        assert_eq!(level_for(2, false), LevelFilter::Debug);
        assert_eq!(level_for(5, false), LevelFilter::Trace);
        assert_eq!(level_for(3, true), LevelFilter::Error);
    }
}
