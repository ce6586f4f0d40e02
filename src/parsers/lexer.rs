//! # 坐标词法器
//!
//! 把一行文本切成浮点数，容忍真实文件里常见的写法：
//! - Fortran 指数 `1.0D-3` / `1.0d-3`
//! - Mathematica 指数 `1.0*^-3`
//! - 负数之间缺少空格 `0.5-0.25-0.125`（某些 POSCAR 导出）
//!
//! ## 依赖关系
//! - 被 `parsers/` 下所有文本解析器使用
//! - 使用 `error.rs`

use crate::error::{Result, StructuraError};

/// 解析单个数值记号
pub fn parse_coordinate(token: &str) -> Result<f64> {
    let normalized = token.trim().replace("*^", "e").replace(['D', 'd'], "e");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(StructuraError::InvalidCoordinate(token.to_string())),
    }
}

/// 解析一行中的前三个坐标
///
/// 按空白切分不足 3 个记号时，再在"非记号开头、非指数后"的 `-` 处切分。
pub fn parse_coordinate_line(line: &str) -> Result<[f64; 3]> {
    let mut tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    if tokens.len() < 3 {
        tokens = tokens.iter().flat_map(|t| split_on_minus(t)).collect();
    }

    if tokens.len() < 3 {
        return Err(StructuraError::InsufficientCoordinates {
            line: line.trim().to_string(),
            found: tokens.len(),
        });
    }

    Ok([
        parse_coordinate(&tokens[0])?,
        parse_coordinate(&tokens[1])?,
        parse_coordinate(&tokens[2])?,
    ])
}

/// 解析记号切片中所有数值，任一失败即报错
pub fn parse_numbers(tokens: &[&str]) -> Result<Vec<f64>> {
    tokens.iter().map(|t| parse_coordinate(t)).collect()
}

/// 在粘连的负号处切开，负号归属后一段
fn split_on_minus(token: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in token.chars() {
        let is_exponent_sign = matches!(prev, Some('e' | 'E' | 'd' | 'D' | '^'));
        if c == '-' && !current.is_empty() && !is_exponent_sign {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev = Some(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
