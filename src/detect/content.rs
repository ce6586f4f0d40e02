//! # 内容启发式识别
//!
//! 扩展名缺失或无法识别时按固定优先级检查内容：
//! JSON → XYZ → LAMMPS → XDATCAR/POSCAR → CIF → phonopy。
//!
//! ## 依赖关系
//! - 被 `detect/mod.rs` 使用
//! - 使用 `parsers/xyz.rs`（分帧算法）, `parsers/optimade.rs`, `parsers/json.rs`

use super::FormatKind;
use crate::parsers::{json, optimade, xyz};

/// 按内容识别格式
pub fn detect_from_content(text: &str) -> Option<FormatKind> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if optimade::is_optimade(&value) {
                return Some(FormatKind::Optimade);
            }
            if json::find_structure(&value).is_some() {
                return Some(FormatKind::Json);
            }
            return None;
        }
    }

    let lines: Vec<&str> = text.lines().collect();

    if looks_like_xyz(&lines) {
        return Some(FormatKind::Xyz);
    }
    if trimmed.starts_with("ITEM: TIMESTEP") {
        return Some(FormatKind::LammpsDump);
    }
    if looks_like_poscar(&lines) {
        let is_xdatcar = lines
            .iter()
            .any(|l| l.trim_start().to_lowercase().starts_with("direct configuration="));
        return Some(if is_xdatcar {
            FormatKind::Xdatcar
        } else {
            FormatKind::Poscar
        });
    }
    if looks_like_cif(&lines) {
        return Some(FormatKind::Cif);
    }
    if looks_like_phonopy(&lines) {
        return Some(FormatKind::PhonopyYaml);
    }
    None
}

/// 内容是否为多帧 XYZ
///
/// 复用解析器的分帧算法，畸形帧被跳过而不是中止识别。
pub fn is_multi_frame_xyz(text: &str) -> bool {
    xyz::split_frames(text).len() >= 2
}

/// 首行为原子数，第三行是 "元素 x y z"
fn looks_like_xyz(lines: &[&str]) -> bool {
    let count_ok = lines
        .first()
        .and_then(|l| l.trim().parse::<usize>().ok())
        .map_or(false, |n| n > 0);
    if !count_ok || lines.len() < 3 {
        return false;
    }

    let tokens: Vec<&str> = lines[2].split_whitespace().collect();
    tokens.len() >= 4
        && tokens[0].parse::<f64>().is_err()
        && tokens[1..4].iter().all(|t| t.parse::<f64>().is_ok())
}

fn float_count(line: &str) -> Option<usize> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.iter().all(|t| t.parse::<f64>().is_ok()) {
        Some(tokens.len())
    } else {
        None
    }
}

/// 第二行是缩放因子（1 或 3 个数），随后三行各三个数
fn looks_like_poscar(lines: &[&str]) -> bool {
    if lines.len() < 8 {
        return false;
    }
    let scale_ok = matches!(float_count(lines[1]), Some(1) | Some(3));
    scale_ok && lines[2..5].iter().all(|l| float_count(l) == Some(3))
}

fn looks_like_cif(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let l = l.trim();
        l.starts_with("data_")
            || l.starts_with("_cell_length_")
            || l.starts_with("_atom_site_")
            || l == "loop_"
    })
}

fn looks_like_phonopy(lines: &[&str]) -> bool {
    const KEYS: [&str; 4] = ["phonopy:", "phono3py:", "primitive_cell:", "supercell:"];
    lines
        .iter()
        .any(|l| KEYS.iter().any(|k| l.trim_end().starts_with(k)))
}
