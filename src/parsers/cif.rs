//! # CIF 解析器
//!
//! ## 格式说明
//! ```text
//! data_NaCl
//! _cell_length_a    5.6402(3)
//! _cell_angle_alpha 90
//! loop_
//! _symmetry_equiv_pos_as_xyz
//!   'x, y, z'
//!   '-x+1/2, y, -z'
//! loop_
//! _atom_site_label
//! _atom_site_type_symbol
//! _atom_site_fract_x
//! _atom_site_fract_y
//! _atom_site_fract_z
//! _atom_site_occupancy
//! Na1 Na+ 0.0 0.0 0.0 1.0
//! ```
//!
//! 文本先切成记号流（引号值、`;` 开头的多行文本字段各算一个记号），
//! 再按 `loop_` 的列数把数据记号分组成行，所以跨行的数据行也能正确重组。
//!
//! - 数值去掉末尾的 `(不确定度)` 后解析
//! - `_atom_site_disorder_group` 为 `2` 的行被丢弃（备选构象）
//! - 分数坐标默认折回 [0, 1)；默认展开对称操作并合并重合位点
//! - 非严格模式下无法解析的晶胞参数被丢弃（角度缺省 90°）
//!
//! ## 依赖关系
//! - 被 `lib.rs` 使用
//! - 使用 `parsers/lexer.rs`, `models/`, `math/`

use crate::error::{Result, StructuraError};
use crate::math::{wrap_fractional, CoordinateFrame, Vec3};
use crate::models::element::{normalize_symbol, oxidation_state, DUMMY_SYMBOL};
use crate::models::{Lattice, ParsedStructure, Site, Species};
use crate::parsers::lexer::parse_coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const FORMAT: &str = "cif";

/// 对称展开时判定重合位点的分数坐标容差
pub const SYMMETRY_TOLERANCE: f64 = 1e-4;

/// CIF 解析选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CifOptions {
    pub strict: bool,
    pub wrap_fractional: bool,
    pub apply_symmetry: bool,
}

impl Default for CifOptions {
    fn default() -> Self {
        CifOptions {
            strict: false,
            wrap_fractional: true,
            apply_symmetry: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 记号化
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    fn is_tag(&self) -> bool {
        !self.quoted && self.text.starts_with('_')
    }

    fn is_loop(&self) -> bool {
        !self.quoted && self.text.eq_ignore_ascii_case("loop_")
    }

    fn is_data(&self) -> bool {
        !self.quoted
            && self
                .text
                .get(..5)
                .is_some_and(|p| p.eq_ignore_ascii_case("data_"))
    }

    fn is_value(&self) -> bool {
        !(self.is_tag() || self.is_loop() || self.is_data())
    }
}

fn tokenize_line(line: &str, tokens: &mut Vec<Token>) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '\'' || c == '"' {
            // 结束引号必须后接空白或行尾
            let mut j = i + 1;
            while j < chars.len()
                && !(chars[j] == c && chars.get(j + 1).map_or(true, |n| n.is_whitespace()))
            {
                j += 1;
            }
            tokens.push(Token {
                text: chars[i + 1..j.min(chars.len())].iter().collect(),
                quoted: true,
            });
            i = j + 1;
            continue;
        }
        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(Token {
            text: chars[start..i].iter().collect(),
            quoted: false,
        });
    }
}

fn tokenize(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text_field: Option<Vec<&str>> = None;

    for line in content.lines() {
        if let Some(field) = text_field.as_mut() {
            if line.starts_with(';') {
                tokens.push(Token {
                    text: field.join("\n").trim().to_string(),
                    quoted: true,
                });
                text_field = None;
                tokenize_line(&line[1..], &mut tokens);
            } else {
                field.push(line);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix(';') {
            text_field = Some(vec![rest]);
            continue;
        }
        tokenize_line(line, &mut tokens);
    }

    if let Some(field) = text_field {
        log::warn!("Unterminated CIF text field; closing at end of file");
        tokens.push(Token {
            text: field.join("\n").trim().to_string(),
            quoted: true,
        });
    }
    tokens
}

// ─────────────────────────────────────────────────────────────
// 数据块
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct CifLoop {
    headers: Vec<String>,
    values: Vec<String>,
}

impl CifLoop {
    fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == name))
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.headers.iter().any(|h| h.starts_with(prefix))
    }
}

#[derive(Debug, Clone, Default)]
struct DataBlock {
    name: String,
    items: HashMap<String, String>,
    loops: Vec<CifLoop>,
}

fn read_blocks(tokens: &[Token]) -> Vec<DataBlock> {
    let mut blocks: Vec<DataBlock> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_data() {
            blocks.push(DataBlock {
                name: token.text[5..].to_string(),
                ..Default::default()
            });
            i += 1;
            continue;
        }
        if blocks.is_empty() {
            // data_ 之前的内容归入匿名块
            blocks.push(DataBlock::default());
        }
        let Some(block) = blocks.last_mut() else {
            break;
        };

        if token.is_loop() {
            let mut cif_loop = CifLoop::default();
            i += 1;
            while i < tokens.len() && tokens[i].is_tag() {
                cif_loop.headers.push(tokens[i].text.to_lowercase());
                i += 1;
            }
            while i < tokens.len() && tokens[i].is_value() {
                cif_loop.values.push(tokens[i].text.clone());
                i += 1;
            }
            block.loops.push(cif_loop);
            continue;
        }
        if token.is_tag() {
            let key = token.text.to_lowercase();
            match tokens.get(i + 1).filter(|t| t.is_value()) {
                Some(value) => {
                    block.items.insert(key, value.text.clone());
                    i += 2;
                }
                None => i += 1,
            }
            continue;
        }
        // 游离值
        i += 1;
    }
    blocks
}

// ─────────────────────────────────────────────────────────────
// 数值
// ─────────────────────────────────────────────────────────────

/// 去掉不确定度 `5.64(2)` 后解析；`?` 和 `.` 视为缺失
pub fn parse_cif_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "?" || raw == "." {
        return None;
    }
    let core = raw.split('(').next().unwrap_or(raw);
    parse_coordinate(core).ok()
}

fn cell_value(
    block: &DataBlock,
    key: &str,
    default: Option<f64>,
    options: &CifOptions,
) -> Result<Option<f64>> {
    match block.items.get(key) {
        Some(raw) => match parse_cif_number(raw) {
            Some(v) => Ok(Some(v)),
            None if options.strict => Err(StructuraError::malformed(
                FORMAT,
                format!("unparsable cell parameter {} = '{}'", key, raw),
            )),
            None => {
                log::warn!("Dropping unparsable CIF cell parameter {} = '{}'", key, raw);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

fn parse_cell(block: &DataBlock, options: &CifOptions) -> Result<Lattice> {
    let mut lengths = [0.0; 3];
    for (slot, axis) in lengths.iter_mut().zip(["a", "b", "c"]) {
        let key = format!("_cell_length_{}", axis);
        *slot = cell_value(block, &key, None, options)?
            .filter(|v| *v > 0.0)
            .ok_or_else(|| {
                StructuraError::malformed(FORMAT, format!("missing or invalid {}", key))
            })?;
    }

    let mut angles = [90.0; 3];
    for (slot, name) in angles.iter_mut().zip(["alpha", "beta", "gamma"]) {
        let key = format!("_cell_angle_{}", name);
        if let Some(v) = cell_value(block, &key, Some(90.0), options)? {
            *slot = v;
        }
    }

    Ok(Lattice::from_parameters(
        lengths[0], lengths[1], lengths[2], angles[0], angles[1], angles[2],
    ))
}

// ─────────────────────────────────────────────────────────────
// 对称操作
// ─────────────────────────────────────────────────────────────

/// 仿射对称操作: abc' = rotation · abc + translation
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOp {
    pub rotation: [[f64; 3]; 3],
    pub translation: Vec3,
}

impl SymmetryOp {
    pub fn identity() -> Self {
        SymmetryOp {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    pub fn apply(&self, abc: &Vec3) -> Vec3 {
        let mut out = self.translation;
        for (i, row) in self.rotation.iter().enumerate() {
            out[i] += row[0] * abc[0] + row[1] * abc[1] + row[2] * abc[2];
        }
        out
    }
}

fn parse_number_term(term: &str) -> Option<f64> {
    match term.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num.parse::<f64>().ok()? / den)
        }
        None => term.parse().ok(),
    }
}

fn flush_term(term: &mut String, sign: f64, row: &mut [f64; 3], translation: &mut f64) -> Option<()> {
    if term.is_empty() {
        return Some(());
    }
    let lower = term.to_lowercase();
    match ["x", "y", "z"].iter().position(|v| lower.ends_with(v)) {
        Some(k) => {
            let coeff = match lower[..lower.len() - 1].trim_end_matches('*') {
                "" => 1.0,
                c => parse_number_term(c)?,
            };
            row[k] += sign * coeff;
        }
        None => *translation += sign * parse_number_term(&lower)?,
    }
    term.clear();
    Some(())
}

/// 解析单个分量表达式，如 `-x+1/2`、`x-y`、`0.5+z`
fn parse_component(expr: &str) -> Option<([f64; 3], f64)> {
    let expr: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut row = [0.0; 3];
    let mut translation = 0.0;
    let mut sign = 1.0;
    let mut term = String::new();

    for c in expr.chars() {
        match c {
            '+' | '-' => {
                flush_term(&mut term, sign, &mut row, &mut translation)?;
                sign = if c == '-' { -1.0 } else { 1.0 };
            }
            _ => term.push(c),
        }
    }
    flush_term(&mut term, sign, &mut row, &mut translation)?;
    Some((row, translation))
}

/// 解析 `x, y+1/2, -z` 形式的对称操作
pub fn parse_symmetry_op(raw: &str) -> Option<SymmetryOp> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return None;
    }
    let mut op = SymmetryOp::identity();
    for (i, part) in parts.iter().enumerate() {
        let (row, t) = parse_component(part)?;
        op.rotation[i] = row;
        op.translation[i] = t;
    }
    Some(op)
}

fn symmetry_ops(block: &DataBlock) -> Vec<SymmetryOp> {
    const TAGS: [&str; 2] = [
        "_symmetry_equiv_pos_as_xyz",
        "_space_group_symop_operation_xyz",
    ];
    let Some(cif_loop) = block.loops.iter().find(|l| l.column(&TAGS).is_some()) else {
        return vec![SymmetryOp::identity()];
    };
    let Some(col) = cif_loop.column(&TAGS) else {
        return vec![SymmetryOp::identity()];
    };
    let width = cif_loop.headers.len();

    let mut ops = Vec::new();
    for row in cif_loop.values.chunks(width).filter(|r| r.len() == width) {
        match parse_symmetry_op(&row[col]) {
            Some(op) => ops.push(op),
            None => log::warn!("Ignoring unparsable symmetry operation '{}'", row[col]),
        }
    }
    if ops.is_empty() {
        ops.push(SymmetryOp::identity());
    }
    ops
}

// ─────────────────────────────────────────────────────────────
// 原子位点
// ─────────────────────────────────────────────────────────────

/// 原子位点表中的一行
#[derive(Debug, Clone)]
struct AtomRow {
    label: String,
    element: String,
    oxidation_state: Option<f64>,
    abc: Vec3,
    occupancy: f64,
}

fn element_from(type_symbol: Option<&str>, label: &str) -> String {
    let raw = type_symbol.unwrap_or(label);
    match normalize_symbol(raw) {
        Some(s) => s.to_string(),
        None => {
            log::warn!("Unrecognized CIF element '{}', using '{}'", raw, DUMMY_SYMBOL);
            DUMMY_SYMBOL.to_string()
        }
    }
}

fn atom_rows(block: &DataBlock, options: &CifOptions) -> Result<Vec<AtomRow>> {
    let atom_loop = block
        .loops
        .iter()
        .find(|l| {
            l.has_prefix("_atom_site_")
                && !l.headers.iter().all(|h| h.starts_with("_atom_site_aniso"))
        })
        .ok_or_else(|| StructuraError::malformed(FORMAT, "no _atom_site_ loop found"))?;

    let fract = [
        atom_loop.column(&["_atom_site_fract_x"]),
        atom_loop.column(&["_atom_site_fract_y"]),
        atom_loop.column(&["_atom_site_fract_z"]),
    ];
    let [Some(ix), Some(iy), Some(iz)] = fract else {
        let missing: Vec<&str> = ["_atom_site_fract_x", "_atom_site_fract_y", "_atom_site_fract_z"]
            .iter()
            .zip(fract.iter())
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| *name)
            .collect();
        let hint = if atom_loop.has_prefix("_atom_site_cartn_") {
            " (Cartesian-only atom sites are not supported)"
        } else {
            ""
        };
        return Err(StructuraError::malformed(
            FORMAT,
            format!("missing column(s) {}{}", missing.join(", "), hint),
        ));
    };

    let label_col = atom_loop.column(&["_atom_site_label"]);
    let type_col = atom_loop.column(&["_atom_site_type_symbol"]);
    let occu_col = atom_loop.column(&["_atom_site_occupancy"]);
    let disorder_col = atom_loop.column(&["_atom_site_disorder_group"]);

    let width = atom_loop.headers.len();
    let remainder = atom_loop.values.len() % width;
    if remainder != 0 {
        let msg = format!(
            "atom site loop has {} trailing value(s) that do not fill a row of {}",
            remainder, width
        );
        if options.strict {
            return Err(StructuraError::malformed(FORMAT, msg));
        }
        log::warn!("{}", msg);
    }

    let mut rows = Vec::new();
    for (n, row) in atom_loop.values.chunks_exact(width).enumerate() {
        if disorder_col.map_or(false, |c| row[c].trim() == "2") {
            log::debug!("Dropping disorder group 2 atom row {}", n + 1);
            continue;
        }

        let coords: Option<Vec<f64>> = [ix, iy, iz]
            .iter()
            .map(|&c| parse_cif_number(&row[c]))
            .collect();
        let Some(coords) = coords else {
            let msg = format!("atom row {} has unparsable coordinates", n + 1);
            if options.strict {
                return Err(StructuraError::malformed(FORMAT, msg));
            }
            log::warn!("{}; skipping", msg);
            continue;
        };

        let label = label_col
            .map(|c| row[c].clone())
            .unwrap_or_else(|| format!("atom{}", n + 1));
        let type_symbol = type_col.map(|c| row[c].as_str());
        rows.push(AtomRow {
            element: element_from(type_symbol, &label),
            oxidation_state: type_symbol.and_then(oxidation_state),
            label,
            abc: [coords[0], coords[1], coords[2]],
            occupancy: occu_col
                .and_then(|c| parse_cif_number(&row[c]))
                .unwrap_or(1.0),
        });
    }
    Ok(rows)
}

/// 周期性最小像差
fn periodic_close(a: &Vec3, b: &Vec3) -> bool {
    (0..3).all(|i| {
        let d = a[i] - b[i];
        (d - d.round()).abs() < SYMMETRY_TOLERANCE
    })
}

/// 展开对称操作并合并重合位点
fn expand_sites(
    rows: &[AtomRow],
    ops: &[SymmetryOp],
    frame: &CoordinateFrame,
    options: &CifOptions,
) -> Result<Vec<Site>> {
    let mut sites: Vec<Site> = Vec::new();

    for row in rows {
        let mut species = Species::new(row.element.clone(), row.occupancy);
        species.oxidation_state = row.oxidation_state;

        let mut images: Vec<Vec3> = Vec::new();
        for op in ops {
            let mut abc = op.apply(&row.abc);
            if options.wrap_fractional {
                abc = wrap_fractional(&abc);
            }
            if !images.iter().any(|p| periodic_close(p, &abc)) {
                images.push(abc);
            }
        }

        for abc in images {
            // 同一位置上的不同元素合并为无序位点
            if let Some(existing) = sites.iter_mut().find(|s| periodic_close(&s.abc, &abc)) {
                if !existing.species.iter().any(|s| s.element == species.element) {
                    existing.species.push(species.clone());
                }
                continue;
            }
            let xyz = frame.to_cartesian(&abc);
            sites.push(Site::with_species(vec![species.clone()], xyz, abc)?.with_label(&row.label));
        }
    }
    Ok(sites)
}

/// 解析 CIF
pub fn parse_cif(content: &str, options: &CifOptions) -> Result<ParsedStructure> {
    let tokens = tokenize(content);
    let blocks = read_blocks(&tokens);

    let block = blocks
        .iter()
        .find(|b| b.loops.iter().any(|l| l.has_prefix("_atom_site_")))
        .ok_or_else(|| StructuraError::malformed(FORMAT, "no data block with an _atom_site_ loop"))?;
    if blocks.len() > 1 {
        log::debug!(
            "CIF has {} data blocks; using data_{}",
            blocks.len(),
            block.name
        );
    }

    let lattice = parse_cell(block, options)?;
    let frame = lattice.frame();
    let rows = atom_rows(block, options)?;
    let ops = if options.apply_symmetry {
        symmetry_ops(block)
    } else {
        vec![SymmetryOp::identity()]
    };

    let sites = expand_sites(&rows, &ops, &frame, options)?;
    if sites.is_empty() {
        return Err(StructuraError::malformed(FORMAT, "no atom sites parsed"));
    }
    log::debug!(
        "Parsed CIF data_{}: {} rows, {} symmetry op(s), {} sites",
        block.name,
        rows.len(),
        ops.len(),
        sites.len()
    );
    Ok(ParsedStructure::new(sites, Some(lattice)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NACL: &str = "data_NaCl
_cell_length_a 5.64(2)
_cell_length_b 5.64
_cell_length_c 5.64
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_occupancy
Na1 Na+ 0.0 0.0 0.0 1.0
Cl1 Cl- 0.5 0.5 0.5 1.0
";

    fn no_symmetry() -> CifOptions {
        CifOptions {
            apply_symmetry: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_basic() {
        let structure = parse_cif(NACL, &CifOptions::default()).unwrap();
        assert_eq!(structure.sites.len(), 2);
        assert_eq!(structure.sites[0].element(), "Na");
        assert_eq!(structure.sites[1].species[0].oxidation_state, Some(-1.0));
        assert!((structure.sites[1].xyz[0] - 2.82).abs() < 1e-9);
        assert!((structure.lattice.unwrap().a - 5.64).abs() < 1e-9);
    }

    #[test]
    fn test_non_ascii_unquoted_value() {
        let content = "data_x
_journal_name_full Andrä
_publ_author_name Æsa
_cell_length_a 5
_cell_length_b 5
_cell_length_c 5
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Na1 Na 0 0 0
";
        let structure = parse_cif(content, &no_symmetry()).unwrap();
        assert_eq!(structure.sites.len(), 1);
        assert_eq!(structure.sites[0].element(), "Na");
    }

    #[test]
    fn test_disorder_group_two_dropped() {
        let content = "data_x
_cell_length_a 10
_cell_length_b 10
_cell_length_c 10
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_disorder_group
C1 0.1 0.1 0.1 .
C2 0.2 0.2 0.2 1
C3 0.3 0.3 0.3 2
";
        let structure = parse_cif(content, &no_symmetry()).unwrap();
        let labels: Vec<&str> = structure.sites.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["C1", "C2"]);
        assert_eq!(structure.sites[0].element(), "C");
    }

    #[test]
    fn test_wrapping_configurable() {
        let content = "data_x
_cell_length_a 4
_cell_length_b 4
_cell_length_c 4
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
O1 1.25 -0.25 0.5
";
        let wrapped = parse_cif(content, &no_symmetry()).unwrap();
        assert!((wrapped.sites[0].abc[0] - 0.25).abs() < 1e-12);
        assert!((wrapped.sites[0].abc[1] - 0.75).abs() < 1e-12);

        let raw = parse_cif(
            content,
            &CifOptions {
                wrap_fractional: false,
                apply_symmetry: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert!((raw.sites[0].abc[0] - 1.25).abs() < 1e-12);
        assert!((raw.sites[0].xyz[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry_expansion_dedups() {
        let content = "data_x
_cell_length_a 4
_cell_length_b 4
_cell_length_c 4
loop_
_symmetry_equiv_pos_as_xyz
'x, y, z'
'-x, -y, -z'
'x+1/2, y+1/2, z'
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Fe1 0 0 0
O1 0.25 0.25 0.25
";
        let structure = parse_cif(content, &CifOptions::default()).unwrap();
        // Fe: (0,0,0) (½,½,0); O: (¼,¼,¼) (¾,¾,¾) (¾,¾,¼)
        assert_eq!(structure.formula(), "Fe2O3");
    }

    #[test]
    fn test_non_strict_drops_bad_angle() {
        let content = "data_x
_cell_length_a 4
_cell_length_b 4
_cell_length_c 4
_cell_angle_beta abc
loop_
_atom_site_label
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
H1 0 0 0
";
        let structure = parse_cif(content, &CifOptions::default()).unwrap();
        assert!((structure.lattice.unwrap().beta - 90.0).abs() < 1e-9);

        let strict = CifOptions {
            strict: true,
            ..Default::default()
        };
        assert!(matches!(
            parse_cif(content, &strict),
            Err(StructuraError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_semicolon_text_and_multiline_rows() {
        let content = "data_x
_publ_section_title
;
A long title
spanning lines
;
_cell_length_a 3
_cell_length_b 3
_cell_length_c 3
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
'Si A' Si
0 0 0
Si2 Si 0.5
0.5 0.5
";
        let structure = parse_cif(content, &no_symmetry()).unwrap();
        assert_eq!(structure.sites.len(), 2);
        assert_eq!(structure.sites[0].label, "Si A");
    }

    #[test]
    fn test_cartesian_only_rejected() {
        let content = "data_x
_cell_length_a 3
_cell_length_b 3
_cell_length_c 3
loop_
_atom_site_label
_atom_site_cartn_x
_atom_site_cartn_y
_atom_site_cartn_z
H1 0 0 0
";
        let err = parse_cif(content, &CifOptions::default()).unwrap_err();
        assert!(err.to_string().contains("_atom_site_fract_x"));
    }

    #[test]
    fn test_mixed_occupancy_merged() {
        let content = "data_x
_cell_length_a 3
_cell_length_b 3
_cell_length_c 3
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_occupancy
Fe1 Fe 0 0 0 0.5
Ni1 Ni 0 0 0 0.5
";
        let structure = parse_cif(content, &CifOptions::default()).unwrap();
        assert_eq!(structure.sites.len(), 1);
        assert_eq!(structure.sites[0].species.len(), 2);
    }

    #[test]
    fn test_parse_symmetry_op() {
        let op = parse_symmetry_op("-x+1/2, y-x, 0.25+z").unwrap();
        let p = op.apply(&[0.1, 0.3, 0.5]);
        assert!((p[0] - 0.4).abs() < 1e-12);
        assert!((p[1] - 0.2).abs() < 1e-12);
        assert!((p[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_uncertainty_stripped() {
        assert_eq!(parse_cif_number("5.4307(12)"), Some(5.4307));
        assert_eq!(parse_cif_number("?"), None);
    }
}
