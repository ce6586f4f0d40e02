//! # 元素周期表
//!
//! 原子序数 ↔ 元素符号查询，以及文件里常见的"脏"元素标签归一化
//! （`Fe2+`、`C12`、`NA`、`O1-` 等）。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `binary/` 使用
//! - 无外部模块依赖

/// Z = 1..=118 的元素符号，下标为 Z - 1
pub const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// 未知元素的占位符号
pub const DUMMY_SYMBOL: &str = "X";

/// 原子序数 → 元素符号
pub fn symbol_for_number(z: u32) -> Option<&'static str> {
    if z == 0 {
        return None;
    }
    ELEMENT_SYMBOLS.get(z as usize - 1).copied()
}

/// 元素符号 → 原子序数（精确匹配，区分大小写）
pub fn number_for_symbol(symbol: &str) -> Option<u32> {
    ELEMENT_SYMBOLS
        .iter()
        .position(|&s| s == symbol)
        .map(|i| i as u32 + 1)
}

/// 归一化元素标签
///
/// - 纯数字按原子序数解析（`"6"` → `C`）
/// - 取开头的字母部分并按首字母大写处理（`"NA"` → `Na`, `"fe2+"` → `Fe`）
/// - 两字母不是合法元素时退回一个字母（`"CA1"` → `Ca`，`"Cx"` → `C`）
///
/// 无法识别时返回 `None`，由调用方决定记录警告并替换为占位符。
pub fn normalize_symbol(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(z) = raw.parse::<u32>() {
        return symbol_for_number(z);
    }

    let letters: String = raw.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }

    let mut chars = letters.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let second = chars.next().map(|c| c.to_ascii_lowercase());

    if let Some(second) = second {
        let two = format!("{}{}", first, second);
        if let Some(z) = number_for_symbol(&two) {
            return symbol_for_number(z);
        }
    }
    number_for_symbol(&first.to_string()).and_then(symbol_for_number)
}

/// 归一化元素标签，失败时记录警告并返回占位符 `X`
pub fn symbol_or_dummy(raw: &str) -> String {
    match normalize_symbol(raw) {
        Some(symbol) => symbol.to_string(),
        None => {
            log::warn!("Unrecognized element symbol '{}', using '{}'", raw, DUMMY_SYMBOL);
            DUMMY_SYMBOL.to_string()
        }
    }
}

/// 从类型符号中解析氧化态（`Fe3+` → 3, `O2-` → -2, `Cl-` → -1）
pub fn oxidation_state(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let sign = match raw.chars().last()? {
        '+' => 1.0,
        '-' => -1.0,
        _ => return None,
    };
    let body = &raw[..raw.len() - 1];
    let digits: String = body
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        return Some(sign);
    }
    digits.parse::<f64>().ok().map(|v| sign * v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(symbol_for_number(1), Some("H"));
        assert_eq!(symbol_for_number(26), Some("Fe"));
        assert_eq!(symbol_for_number(118), Some("Og"));
        assert_eq!(symbol_for_number(0), None);
        assert_eq!(symbol_for_number(119), None);
        assert_eq!(number_for_symbol("Na"), Some(11));
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("Fe2+"), Some("Fe"));
        assert_eq!(normalize_symbol("NA"), Some("Na"));
        assert_eq!(normalize_symbol("C12"), Some("C"));
        assert_eq!(normalize_symbol("O1-"), Some("O"));
        assert_eq!(normalize_symbol("6"), Some("C"));
        assert_eq!(normalize_symbol("Cx"), Some("C"));
        assert_eq!(normalize_symbol("Qq"), None);
        assert_eq!(normalize_symbol(""), None);
    }

    #[test]
    fn test_symbol_or_dummy() {
        assert_eq!(symbol_or_dummy("Si"), "Si");
        assert_eq!(symbol_or_dummy("??"), "X");
    }

    #[test]
    fn test_oxidation_state() {
        assert_eq!(oxidation_state("Fe3+"), Some(3.0));
        assert_eq!(oxidation_state("O2-"), Some(-2.0));
        assert_eq!(oxidation_state("Cl-"), Some(-1.0));
        assert_eq!(oxidation_state("Na"), None);
    }
}
