//! # phonopy / phono3py YAML 解析器
//!
//! ## 格式说明
//! ```yaml
//! phonopy:
//!   version: 2.20.0
//! unit_cell:
//!   lattice:
//!   - [ 5.43, 0.00, 0.00 ] # a
//!   - [ 0.00, 5.43, 0.00 ] # b
//!   - [ 0.00, 0.00, 5.43 ] # c
//!   points:
//!   - symbol: Si # 1
//!     coordinates: [ 0.875, 0.875, 0.875 ]
//!     mass: 28.085500
//!     reduced_to: 1
//! supercell: ...
//! phonon_displacements: ...   # 大数组，解析前按行前缀剔除
//! ```
//!
//! ## 依赖关系
//! - 被 `lib.rs` 使用
//! - 使用 `models/`, `serde_yaml`

use crate::error::{Result, StructuraError};
use crate::models::element::symbol_or_dummy;
use crate::models::{Lattice, ParsedStructure, SiteProperties};
use serde::{Deserialize, Serialize};

const FORMAT: &str = "phonopy";

/// 可选择的晶胞
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonopyCell {
    PrimitiveCell,
    UnitCell,
    Supercell,
    PhononPrimitiveCell,
    PhononSupercell,
}

impl PhonopyCell {
    /// 自动选择时的优先顺序
    pub const PREFERENCE: [PhonopyCell; 5] = [
        PhonopyCell::Supercell,
        PhonopyCell::PhononSupercell,
        PhonopyCell::UnitCell,
        PhonopyCell::PhononPrimitiveCell,
        PhonopyCell::PrimitiveCell,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PhonopyCell::PrimitiveCell => "primitive_cell",
            PhonopyCell::UnitCell => "unit_cell",
            PhonopyCell::Supercell => "supercell",
            PhonopyCell::PhononPrimitiveCell => "phonon_primitive_cell",
            PhonopyCell::PhononSupercell => "phonon_supercell",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PhonopyPoint {
    symbol: String,
    coordinates: [f64; 3],
    #[serde(default)]
    mass: Option<f64>,
    #[serde(default)]
    reduced_to: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PhonopyCellYaml {
    lattice: Vec<[f64; 3]>,
    #[serde(default)]
    points: Vec<PhonopyPoint>,
}

#[derive(Debug, Default, Deserialize)]
struct PhonopyDocument {
    #[serde(default)]
    primitive_cell: Option<PhonopyCellYaml>,
    #[serde(default)]
    unit_cell: Option<PhonopyCellYaml>,
    #[serde(default)]
    supercell: Option<PhonopyCellYaml>,
    #[serde(default)]
    phonon_primitive_cell: Option<PhonopyCellYaml>,
    #[serde(default)]
    phonon_supercell: Option<PhonopyCellYaml>,
}

impl PhonopyDocument {
    fn cell(&self, which: PhonopyCell) -> Option<&PhonopyCellYaml> {
        match which {
            PhonopyCell::PrimitiveCell => self.primitive_cell.as_ref(),
            PhonopyCell::UnitCell => self.unit_cell.as_ref(),
            PhonopyCell::Supercell => self.supercell.as_ref(),
            PhonopyCell::PhononPrimitiveCell => self.phonon_primitive_cell.as_ref(),
            PhonopyCell::PhononSupercell => self.phonon_supercell.as_ref(),
        }
    }
}

/// 剔除顶层 `phonon_displacements:` 块
///
/// 块一直延续到下一个顶层键（行首既非空白也非 `-`）。
pub fn strip_displacements(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut skipping = false;

    for line in content.lines() {
        let top_level = line
            .chars()
            .next()
            .map_or(false, |c| !c.is_whitespace() && c != '-' && c != '#');
        if top_level {
            skipping = line.starts_with("phonon_displacements:");
        }
        if !skipping {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// 解析 phonopy YAML；`cell` 为 `None` 时按 [`PhonopyCell::PREFERENCE`] 自动选择
pub fn parse_phonopy(content: &str, cell: Option<PhonopyCell>) -> Result<ParsedStructure> {
    let filtered = strip_displacements(content);
    let document: PhonopyDocument = serde_yaml::from_str(&filtered)?;

    let (which, selected) = match cell {
        Some(which) => {
            let selected = document.cell(which).ok_or_else(|| {
                StructuraError::malformed(FORMAT, format!("requested cell '{}' not present", which.key()))
            })?;
            (which, selected)
        }
        None => PhonopyCell::PREFERENCE
            .iter()
            .find_map(|&w| document.cell(w).map(|c| (w, c)))
            .ok_or_else(|| {
                StructuraError::malformed(
                    FORMAT,
                    "no primitive_cell, unit_cell, supercell or phonon cell found",
                )
            })?,
    };

    if selected.lattice.len() != 3 {
        return Err(StructuraError::malformed(
            FORMAT,
            format!("{} lattice has {} rows, expected 3", which.key(), selected.lattice.len()),
        ));
    }
    let lattice = Lattice::from_matrix([selected.lattice[0], selected.lattice[1], selected.lattice[2]]);
    let frame = lattice.frame();

    let sites = selected
        .points
        .iter()
        .map(|point| {
            let properties = SiteProperties {
                mass: point.mass,
                reduced_to: point.reduced_to,
                ..Default::default()
            };
            ParsedStructure::site_from_fractional(&frame, symbol_or_dummy(&point.symbol), point.coordinates)
                .with_label(point.symbol.clone())
                .with_properties(properties)
        })
        .collect();

    log::debug!("Selected phonopy {}", which.key());
    Ok(ParsedStructure::new(sites, Some(lattice)))
}
