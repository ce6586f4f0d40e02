//! # 解析选项
//!
//! 所有可调行为集中在一个普通结构体里，库不读取环境变量；
//! 命令行参数（含 `STRUCTURA_*` 环境变量）由 `cli/` 映射到这里。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `parsers/mod.rs`, `cli/` 使用
//! - 使用 `parsers/cif.rs`, `parsers/phonopy.rs`

use crate::parsers::cif::CifOptions;
use crate::parsers::phonopy::PhonopyCell;
use serde::{Deserialize, Serialize};

/// 索引模式下默认立即解析的帧数
pub const DEFAULT_INDEX_LOAD_FRAMES: usize = 10;

/// 解析选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// 严格模式下无法解析的 CIF 晶胞参数直接报错
    pub cif_strict: bool,
    pub cif_wrap_fractional: bool,
    pub cif_apply_symmetry: bool,

    /// phonopy 晶胞选择，`None` 为自动
    pub phonopy_cell: Option<PhonopyCell>,

    /// 轨迹解析最多物化的帧数
    pub max_frames: Option<usize>,

    pub index_load_frames: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            cif_strict: false,
            cif_wrap_fractional: true,
            cif_apply_symmetry: true,
            phonopy_cell: None,
            max_frames: None,
            index_load_frames: DEFAULT_INDEX_LOAD_FRAMES,
        }
    }
}

impl ParseOptions {
    pub fn cif(&self) -> CifOptions {
        CifOptions {
            strict: self.cif_strict,
            wrap_fractional: self.cif_wrap_fractional,
            apply_symmetry: self.cif_apply_symmetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ParseOptions::default();
        assert!(!options.cif_strict);
        assert_eq!(options.index_load_frames, 10);
        assert_eq!(options.cif(), CifOptions::default());
    }

    #[test]
    fn test_partial_deserialize() {
        let options: ParseOptions = serde_json::from_str(r#"{"cif_strict": true}"#).unwrap();
        assert!(options.cif_strict);
        assert!(options.cif_wrap_fractional);
    }
}
