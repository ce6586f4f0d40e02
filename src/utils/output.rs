//! # 终端输出
//!
//! 所有面向用户的文字都从这里出去：带标签的状态行、键值摘要、
//! 结构与校验结果。状态行按 [`Tag`] 决定颜色和去向；
//! 诊断类（警告、错误、调试）走 stderr，保证 `--json` 时 stdout 只有 JSON。
//!
//! ## 依赖关系
//! - 被 `commands/`, `utils/logger.rs`, `main.rs` 使用
//! - 使用 `colored` crate

use colored::{ColoredString, Colorize};
use structura::{Lattice, ParsedStructure};

/// 状态行标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Ok,
    Err,
    Warn,
    Info,
    Debug,
    Skip,
    Done,
}

impl Tag {
    fn label(self) -> ColoredString {
        match self {
            Tag::Ok => "[OK]".green().bold(),
            Tag::Err => "[ERR]".red().bold(),
            Tag::Warn => "[WARN]".yellow().bold(),
            Tag::Info => "[*]".blue().bold(),
            Tag::Debug => "[DBG]".dimmed(),
            Tag::Skip => "[SKIP]".dimmed(),
            Tag::Done => "[DONE]".green().bold(),
        }
    }

    /// 诊断类标签写到 stderr
    pub fn is_diagnostic(self) -> bool {
        matches!(self, Tag::Err | Tag::Warn | Tag::Debug)
    }
}

/// 输出一行带标签的消息
pub fn emit(tag: Tag, msg: &str) {
    let body = if tag == Tag::Debug {
        msg.dimmed().to_string()
    } else {
        msg.to_string()
    };
    if tag.is_diagnostic() {
        eprintln!("{} {}", tag.label(), body);
    } else {
        println!("{} {}", tag.label(), body);
    }
}

pub fn print_success(msg: &str) {
    emit(Tag::Ok, msg);
}

pub fn print_error(msg: &str) {
    emit(Tag::Err, msg);
}

pub fn print_warning(msg: &str) {
    emit(Tag::Warn, msg);
}

pub fn print_info(msg: &str) {
    emit(Tag::Info, msg);
}

pub fn print_skip(msg: &str) {
    emit(Tag::Skip, msg);
}

pub fn print_done(msg: &str) {
    emit(Tag::Done, msg);
}

/// 打印键值对
pub fn print_field(key: &str, value: &str) {
    println!("  {:<22} {}", format!("{}:", key).dimmed(), value);
}

/// 标题栏
pub fn print_header(title: &str) {
    let rule = "─".repeat(60).dimmed();
    println!("\n{}\n  {}\n{}\n", rule, title.bold(), rule);
}

pub fn print_rule() {
    println!("{}", "─".repeat(60).dimmed());
}

fn pbc_flags(pbc: &[bool; 3]) -> String {
    pbc.iter()
        .map(|&p| if p { "T" } else { "F" })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 晶格参数摘要
pub fn lattice_fields(lattice: &Lattice) -> Vec<(&'static str, String)> {
    let (a, b, c, alpha, beta, gamma) = lattice.parameters();
    vec![
        ("a, b, c (Å)", format!("{:.4}, {:.4}, {:.4}", a, b, c)),
        ("α, β, γ (°)", format!("{:.3}, {:.3}, {:.3}", alpha, beta, gamma)),
        ("Volume (Å³)", format!("{:.4}", lattice.volume.abs())),
        ("PBC", pbc_flags(&lattice.pbc)),
    ]
}

/// 打印结构摘要：化学式、位点数与晶格
pub fn print_structure(structure: &ParsedStructure) {
    print_field("Formula", &structure.formula());
    print_field("Sites", &structure.sites.len().to_string());
    match &structure.lattice {
        Some(lattice) => {
            for (key, value) in lattice_fields(lattice) {
                print_field(key, &value);
            }
        }
        None => print_field("Lattice", "none (molecule)"),
    }
}

/// 打印校验结果；全部问题一次列出
pub fn print_validation(problems: &[String]) {
    if problems.is_empty() {
        print_success("Trajectory passed validation");
        return;
    }
    for problem in problems {
        print_error(problem);
    }
    print_warning(&format!("{} validation error(s)", problems.len()));
}
