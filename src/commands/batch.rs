//! # batch 命令实现
//!
//! 收集文件、并行解析、输出汇总表与可选 CSV。
//! 无法识别格式的文件记为跳过，其余错误记为失败。
//!
//! ## 依赖关系
//! - 使用 `cli/batch.rs` 定义的参数
//! - 使用 `batch/` 的收集器、执行器与汇总
//! - 使用 `utils/output.rs`

use super::{file_name, load_structure, read_input};
use crate::batch::{report, BatchRunner, FileCollector, FileSummary, ProcessResult};
use crate::cli::batch::BatchArgs;
use crate::utils::output;

use std::path::Path;
use structura::{ParseOptions, Result, StructuraError};
use tabled::Table;

/// 解析单个文件
fn process_file(path: &Path, options: &ParseOptions, as_trajectory: bool) -> Result<FileSummary> {
    let bytes = read_input(path)?;
    let name = file_name(path);
    let display = path.display().to_string();

    if as_trajectory {
        let trajectory = structura::parse_trajectory_with(&bytes, &name, options)?;
        return Ok(FileSummary::from_trajectory(&display, &trajectory));
    }

    let (kind, structure) = load_structure(&bytes, &name, options)?;
    Ok(FileSummary::from_structure(
        &display,
        kind.map_or("unknown", |k| k.name()),
        &structure,
    ))
}

fn classify(path: &Path, result: Result<FileSummary>) -> ProcessResult<FileSummary> {
    let display = path.display().to_string();
    match result {
        Ok(summary) => ProcessResult::Success(summary),
        Err(e @ StructuraError::UnsupportedFormat(_)) => ProcessResult::Skipped(display, e.to_string()),
        Err(e) => ProcessResult::Failed(display, e.to_string()),
    }
}

/// 执行 batch 命令
pub fn execute(args: BatchArgs) -> Result<()> {
    output::print_header("Batch Parsing");

    if !args.input.exists() {
        return Err(StructuraError::DirectoryNotFound {
            path: args.input.display().to_string(),
        });
    }

    let collector = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive);
    let files = collector.collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No files matching '{}' found in '{}'",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let runner = BatchRunner::new(args.jobs);
    if collector.is_single_file() {
        output::print_info(&format!("Parsing '{}'", args.input.display()));
    } else {
        output::print_info(&format!(
            "Parsing {} file(s) with {} job(s)",
            files.len(),
            runner.jobs()
        ));
    }

    let options = args.parser.to_options();
    let result = runner.run(files, |path| {
        classify(path, process_file(path, &options, args.trajectory))
    })?;

    if !result.successes.is_empty() {
        println!("{}", Table::new(&result.successes));
    }
    for (path, reason) in &result.skipped {
        output::print_skip(&format!("{}: {}", path, reason));
    }
    for (path, err) in &result.failures {
        output::print_error(&format!("{}: {}", path, err));
    }

    if let Some(csv_path) = &args.csv {
        report::save_csv(&result.successes, csv_path)?;
        output::print_success(&format!("Summary saved to '{}'", csv_path.display()));
    }

    output::print_done(&format!(
        "{} parsed, {} skipped, {} failed (of {})",
        result.successes.len(),
        result.skipped.len(),
        result.failures.len(),
        result.total()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_skipped() {
        let path = Path::new("notes.txt");
        let outcome = classify(
            path,
            Err(StructuraError::UnsupportedFormat("could not identify".into())),
        );
        assert!(matches!(outcome, ProcessResult::Skipped(_, _)));
    }

    #[test]
    fn test_parse_error_is_failure() {
        let path = Path::new("bad.xyz");
        let outcome = classify(path, Err(StructuraError::malformed("xyz", "bad atom count")));
        assert!(matches!(outcome, ProcessResult::Failed(_, _)));
    }
}
