//! # VASP POSCAR / XDATCAR 解析器
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # 缩放因子：1 个数，或 3 个分量；负数表示目标体积
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # 元素符号 (VASP 5+，可跨多行)
//! n1 n2 ...              # 每种元素的原子数（可跨多行）
//! Selective dynamics     # 可选
//! Direct/Cartesian       # 坐标类型（首字母匹配，K = Cartesian）
//! x1 y1 z1 [T T F]       # 原子坐标
//! ...
//! ```
//!
//! VASP 4 没有元素行：晶格之后的第一个记号就是整数。此时若注释行恰好列出了
//! 同样数量的元素则采用之，否则按周期表顺序合成元素符号。
//!
//! XDATCAR 在同样的头部之后重复 `Direct configuration= N` 块；
//! 变胞 (NpT) 轨迹在每个块之前重复整个头部。
//!
//! ## 依赖关系
//! - 被 `lib.rs` 使用
//! - 使用 `parsers/lexer.rs`, `models/`, `math/`, `trajectory/assemble.rs`

use crate::error::{Result, StructuraError};
use crate::math::{det3x3, Matrix3};
use crate::models::element::{normalize_symbol, symbol_or_dummy, ELEMENT_SYMBOLS};
use crate::models::{Frame, Lattice, ParsedStructure, Site, SiteProperties, Trajectory};
use crate::parsers::lexer::{parse_coordinate, parse_coordinate_line};
use crate::trajectory::assemble::TrajectoryBuilder;

use rayon::prelude::*;

const FORMAT: &str = "poscar";
const XDATCAR_FORMAT: &str = "xdatcar";

/// 元素/原子数行最多向前查找的行数
const HEADER_LOOKAHEAD: usize = 10;

/// 头部：注释、已缩放的晶格、元素及数目
#[derive(Debug, Clone)]
pub struct PoscarHeader {
    pub comment: String,
    pub lattice: Lattice,
    pub species: Vec<(String, usize)>,
    /// 笛卡尔坐标的逐分量缩放
    pub scale: [f64; 3],
}

impl PoscarHeader {
    pub fn atom_count(&self) -> usize {
        self.species.iter().map(|(_, n)| n).sum()
    }

    fn elements(&self) -> impl Iterator<Item = &str> {
        self.species
            .iter()
            .flat_map(|(el, n)| std::iter::repeat(el.as_str()).take(*n))
    }
}

fn line_at<'a>(lines: &[&'a str], i: usize, what: &str) -> Result<&'a str> {
    lines.get(i).copied().ok_or_else(|| {
        StructuraError::malformed(FORMAT, format!("file ends before {} (line {})", what, i + 1))
    })
}

fn is_integer(token: &str) -> bool {
    token.parse::<usize>().is_ok()
}

fn is_numeric(token: &str) -> bool {
    parse_coordinate(token).is_ok()
}

/// 缩放因子行 → 逐分量缩放
fn resolve_scale(line: &str, raw: &Matrix3) -> Result<[f64; 3]> {
    let values: Vec<f64> = line
        .split_whitespace()
        .take_while(|t| is_numeric(t))
        .map(parse_coordinate)
        .collect::<Result<_>>()?;

    match values.as_slice() {
        [s] if *s < 0.0 => {
            let det = det3x3(raw).abs();
            if det < f64::EPSILON {
                return Err(StructuraError::malformed(
                    FORMAT,
                    "negative scale (target volume) with a zero-volume lattice",
                ));
            }
            let s = (-s / det).cbrt();
            Ok([s, s, s])
        }
        [s] => Ok([*s, *s, *s]),
        [sx, sy, sz, ..] => Ok([*sx, *sy, *sz]),
        _ => Err(StructuraError::malformed(
            FORMAT,
            format!("invalid scale factor line '{}'", line.trim()),
        )),
    }
}

/// POTCAR 标签 `Si_pv`, `Fe/abc123` → 元素符号
fn clean_symbol(token: &str) -> String {
    let base = token.split(['_', '/', '.']).next().unwrap_or(token);
    symbol_or_dummy(base)
}

/// 解析头部，返回头部以及原子数行之后的行号
pub fn parse_header(lines: &[&str], start: usize) -> Result<(PoscarHeader, usize)> {
    let comment = line_at(lines, start, "comment line")?.trim().to_string();

    let mut raw = [[0.0; 3]; 3];
    for (i, row) in raw.iter_mut().enumerate() {
        let line = line_at(lines, start + 2 + i, "lattice vectors")?;
        *row = parse_coordinate_line(line)?;
    }
    let scale = resolve_scale(line_at(lines, start + 1, "scale factor")?, &raw)?;
    let mut matrix = raw;
    for row in matrix.iter_mut() {
        for (j, v) in row.iter_mut().enumerate() {
            *v *= scale[j];
        }
    }

    let mut cursor = start + 5;
    let first = line_at(lines, cursor, "species counts")?;
    let first_token = first.split_whitespace().next().unwrap_or("");

    let (elements, counts) = if is_integer(first_token) {
        // VASP 4
        let counts: Vec<usize> = first
            .split_whitespace()
            .map_while(|t| t.parse().ok())
            .collect();
        cursor += 1;
        (vasp4_elements(&comment, counts.len()), counts)
    } else {
        let mut elements = Vec::new();
        while cursor < lines.len() && cursor < start + 5 + HEADER_LOOKAHEAD {
            let tokens: Vec<&str> = lines[cursor].split_whitespace().collect();
            if tokens.is_empty() || tokens.iter().any(|t| is_numeric(t)) {
                break;
            }
            elements.extend(tokens.iter().map(|t| clean_symbol(t)));
            cursor += 1;
        }

        let mut counts: Vec<usize> = Vec::new();
        let limit = cursor + HEADER_LOOKAHEAD;
        while cursor < lines.len() && cursor < limit && counts.len() < elements.len() {
            let tokens: Vec<&str> = lines[cursor].split_whitespace().collect();
            if tokens.is_empty() || !is_integer(tokens[0]) {
                break;
            }
            counts.extend(tokens.iter().map_while(|t| t.parse::<usize>().ok()));
            cursor += 1;
        }
        (elements, counts)
    };

    if counts.is_empty() {
        return Err(StructuraError::malformed(FORMAT, "missing atom count line"));
    }
    if elements.len() != counts.len() {
        return Err(StructuraError::malformed(
            FORMAT,
            format!(
                "{} element symbol(s) but {} atom count(s)",
                elements.len(),
                counts.len()
            ),
        ));
    }

    let header = PoscarHeader {
        comment,
        lattice: Lattice::from_matrix(matrix),
        species: elements.into_iter().zip(counts).collect(),
        scale,
    };
    Ok((header, cursor))
}

/// VASP 4 的元素符号：注释行能给出完整列表则采用，否则按周期表顺序
fn vasp4_elements(comment: &str, n_species: usize) -> Vec<String> {
    let from_comment: Vec<&str> = comment
        .split_whitespace()
        .filter_map(normalize_symbol)
        .collect();
    let comment_tokens = comment.split_whitespace().count();
    if from_comment.len() == n_species && comment_tokens == n_species {
        return from_comment.into_iter().map(String::from).collect();
    }
    log::warn!(
        "VASP 4 file without element symbols; assigning {} species in periodic-table order",
        n_species
    );
    ELEMENT_SYMBOLS
        .iter()
        .cycle()
        .take(n_species)
        .map(|s| s.to_string())
        .collect()
}

fn is_selective_line(line: &str) -> bool {
    line.trim_start().starts_with(['s', 'S'])
}

fn is_cartesian_line(line: &str) -> bool {
    line.trim_start().starts_with(['c', 'C', 'k', 'K'])
}

fn selective_flags(line: &str) -> Option<[bool; 3]> {
    let flags: Vec<bool> = line
        .split_whitespace()
        .filter_map(|t| match t {
            "T" | "t" => Some(true),
            "F" | "f" => Some(false),
            _ => None,
        })
        .collect();
    if flags.len() >= 3 {
        Some([flags[0], flags[1], flags[2]])
    } else {
        None
    }
}

/// 解析原子坐标块
fn parse_sites(
    header: &PoscarHeader,
    atom_lines: &[&str],
    cartesian: bool,
    selective: bool,
) -> Result<Vec<Site>> {
    let n = header.atom_count();
    if atom_lines.len() < n {
        return Err(StructuraError::malformed(
            FORMAT,
            format!("expected {} atom lines, found {}", n, atom_lines.len()),
        ));
    }

    let frame = header.lattice.frame();
    header
        .elements()
        .zip(atom_lines)
        .map(|(element, line)| {
            let coords = parse_coordinate_line(line)?;
            let mut site = if cartesian {
                let s = header.scale;
                let xyz = [coords[0] * s[0], coords[1] * s[1], coords[2] * s[2]];
                ParsedStructure::site_from_cartesian(Some(&frame), element, xyz)
            } else {
                ParsedStructure::site_from_fractional(&frame, element, coords)
            };
            if selective {
                site = site.with_properties(SiteProperties {
                    selective_dynamics: selective_flags(line),
                    ..Default::default()
                });
            }
            Ok(site)
        })
        .collect()
}

/// 解析 POSCAR/CONTCAR
pub fn parse_poscar(content: &str) -> Result<ParsedStructure> {
    let lines: Vec<&str> = content.lines().collect();
    let (header, mut cursor) = parse_header(&lines, 0)?;

    let mut selective = false;
    if is_selective_line(line_at(&lines, cursor, "coordinate mode")?) {
        selective = true;
        cursor += 1;
    }
    let cartesian = is_cartesian_line(line_at(&lines, cursor, "coordinate mode")?);
    cursor += 1;

    let sites = parse_sites(&header, &lines[cursor..], cartesian, selective)?;
    log::debug!(
        "Parsed POSCAR '{}': {} sites ({})",
        header.comment,
        sites.len(),
        if cartesian { "Cartesian" } else { "Direct" }
    );
    Ok(ParsedStructure::new(sites, Some(header.lattice)))
}

// ─────────────────────────────────────────────────────────────
// XDATCAR
// ─────────────────────────────────────────────────────────────

/// 分好的一个构型块
struct ConfigurationBlock<'a> {
    header: usize,
    step: Option<f64>,
    cartesian: bool,
    atom_lines: &'a [&'a str],
}

fn is_configuration_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    lower.contains("configuration")
        || lower == "direct"
        || lower == "cartesian"
}

fn configuration_step(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once('=')?;
    rest.split_whitespace().next()?.parse().ok()
}

/// 把 XDATCAR 切成头部列表和构型块
fn split_configurations<'a>(
    lines: &'a [&'a str],
    trajectory: &mut TrajectoryBuilder,
) -> Result<(Vec<PoscarHeader>, Vec<ConfigurationBlock<'a>>)> {
    let mut headers: Vec<PoscarHeader> = Vec::new();
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        if lines[cursor].trim().is_empty() {
            cursor += 1;
            continue;
        }

        if !is_configuration_line(lines[cursor]) || headers.is_empty() {
            match parse_header(lines, cursor) {
                Ok((header, next)) => {
                    headers.push(header);
                    cursor = next;
                    continue;
                }
                Err(e) if headers.is_empty() => return Err(e),
                Err(e) => {
                    trajectory
                        .metadata_mut()
                        .warn(format!("Stopping at unreadable XDATCAR header on line {}: {}", cursor + 1, e));
                    break;
                }
            }
        }

        let header_index = headers.len() - 1;
        let n = headers[header_index].atom_count();
        let start = cursor + 1;
        let end = start + n;
        if end > lines.len() {
            trajectory.metadata_mut().warn(format!(
                "Truncated XDATCAR configuration at line {} ({} of {} atom lines)",
                cursor + 1,
                lines.len() - start.min(lines.len()),
                n
            ));
            break;
        }

        blocks.push(ConfigurationBlock {
            header: header_index,
            step: configuration_step(lines[cursor]),
            cartesian: is_cartesian_line(lines[cursor]),
            atom_lines: &lines[start..end],
        });
        cursor = end;
    }

    Ok((headers, blocks))
}

/// 解析 XDATCAR 轨迹
pub fn parse_xdatcar(content: &str, max_frames: Option<usize>) -> Result<Trajectory> {
    let lines: Vec<&str> = content.lines().collect();
    let mut builder = TrajectoryBuilder::new(XDATCAR_FORMAT);
    let (headers, blocks) = split_configurations(&lines, &mut builder)?;

    let limit = max_frames.unwrap_or(usize::MAX);
    let results: Vec<Result<Frame>> = blocks
        .par_iter()
        .take(limit)
        .enumerate()
        .map(|(i, block)| {
            let header = &headers[block.header];
            let sites = parse_sites(header, block.atom_lines, block.cartesian, false)?;
            let structure = ParsedStructure::new(sites, Some(header.lattice.clone()));
            Ok(Frame::new(structure, block.step.unwrap_or((i + 1) as f64)))
        })
        .collect();

    for (i, result) in results.into_iter().enumerate() {
        builder.push_result(i, result);
    }
    if headers.len() > 1 {
        builder.metadata_mut().extra.insert(
            "variable_cell".into(),
            crate::models::MetaValue::Bool(true),
        );
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NACL: &str = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;

    #[test]
    fn test_parse_poscar_vasp5() {
        let structure = parse_poscar(NACL).unwrap();
        assert_eq!(structure.sites.len(), 8);

        let na_count = structure.sites.iter().filter(|s| s.element() == "Na").count();
        let cl_count = structure.sites.iter().filter(|s| s.element() == "Cl").count();
        assert_eq!(na_count, 4);
        assert_eq!(cl_count, 4);
        assert!((structure.sites[1].xyz[0] - 2.82).abs() < 1e-9);
    }

    #[test]
    fn test_parse_poscar_with_scale() {
        let content = "Si\n2.0\n2.0 0.0 0.0\n0.0 2.0 0.0\n0.0 0.0 2.0\nSi\n2\nDirect\n0.0 0.0 0.0\n0.5 0.5 0.5\n";
        let structure = parse_poscar(content).unwrap();
        let (a, _, _, _, _, _) = structure.lattice.unwrap().parameters();

        // 2.0 * 2.0 = 4.0
        assert!((a - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_scale_is_target_volume() {
        let content = "vol\n-10.0\n2 0 0\n0 2 0\n0 0 2\nH\n1\nDirect\n0 0 0\n";
        let lattice = parse_poscar(content).unwrap().lattice.unwrap();
        let s = (10.0f64 / 8.0).cbrt();

        assert!((lattice.matrix[0][0] - 2.0 * s).abs() < 1e-9);
        assert!((lattice.matrix[1][1] - 2.0 * s).abs() < 1e-9);
        assert!((lattice.matrix[2][2] - 2.0 * s).abs() < 1e-9);
        assert!((lattice.volume - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_selective_dynamics() {
        let content = "Fe\n1.0\n2.87 0 0\n0 2.87 0\n0 0 2.87\nFe\n2\nSelective dynamics\nDirect\n0.0 0.0 0.0 T T T\n0.5 0.5 0.5 F F T\n";
        let structure = parse_poscar(content).unwrap();
        assert_eq!(structure.sites.len(), 2);
        assert_eq!(
            structure.sites[1].properties.selective_dynamics,
            Some([false, false, true])
        );
    }

    #[test]
    fn test_cartesian_mode_scaled() {
        let content = "x\n2.0\n2 0 0\n0 2 0\n0 0 2\nO\n1\nKartesian\n1.0 0.5 0.0\n";
        let structure = parse_poscar(content).unwrap();
        let site = &structure.sites[0];
        assert!((site.xyz[0] - 2.0).abs() < 1e-12);
        assert!((site.abc[0] - 0.5).abs() < 1e-12);
        assert!((site.abc[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_vasp4_element_fallback() {
        let content = "generated by some tool\n1.0\n3 0 0\n0 3 0\n0 0 3\n1 2\nDirect\n0 0 0\n0.5 0 0\n0 0.5 0\n";
        let structure = parse_poscar(content).unwrap();
        assert_eq!(structure.sites[0].element(), "H");
        assert_eq!(structure.sites[2].element(), "He");
    }

    #[test]
    fn test_vasp4_elements_from_comment() {
        let content = "Ga As\n1.0\n3 0 0\n0 3 0\n0 0 3\n1 1\nDirect\n0 0 0\n0.25 0.25 0.25\n";
        let structure = parse_poscar(content).unwrap();
        assert_eq!(structure.sites[1].element(), "As");
    }

    #[test]
    fn test_multiline_species() {
        let content = "long\n1.0\n3 0 0\n0 3 0\n0 0 3\nH He\nLi\n1 1\n1\nDirect\n0 0 0\n0.1 0 0\n0.2 0 0\n";
        let structure = parse_poscar(content).unwrap();
        assert_eq!(structure.formula(), "HHeLi");
    }

    #[test]
    fn test_potcar_labels_and_glued_negatives() {
        let content = "x\n1.0\n3 0 0\n0 3 0\n0 0 3\nSi_pv\n1\nDirect\n0.5-0.25-0.125\n";
        let structure = parse_poscar(content).unwrap();
        assert_eq!(structure.sites[0].element(), "Si");
        assert!((structure.sites[0].abc[1] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_atom_lines() {
        let content = "x\n1.0\n3 0 0\n0 3 0\n0 0 3\nSi\n2\nDirect\n0 0 0\n";
        assert!(matches!(
            parse_poscar(content),
            Err(StructuraError::MalformedInput { .. })
        ));
    }

    const XDATCAR: &str = "Si2\n1.0\n5.0 0 0\n0 5.0 0\n0 0 5.0\nSi\n2\n\
Direct configuration=     1\n0 0 0\n0.5 0.5 0.5\n\
Direct configuration=     2\n0.01 0 0\n0.5 0.51 0.5\n\
Direct configuration=     5\n0.02 0 0\n0.5 0.52 0.5\n";

    #[test]
    fn test_xdatcar_fixed_cell() {
        let traj = parse_xdatcar(XDATCAR, None).unwrap();
        assert_eq!(traj.frames.len(), 3);
        let steps: Vec<f64> = traj.frames.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![1.0, 2.0, 5.0]);
        assert!((traj.frames[2].structure.sites[0].xyz[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_xdatcar_variable_cell() {
        let content = "a\n1.0\n4 0 0\n0 4 0\n0 0 4\nH\n1\nDirect configuration=     1\n0 0 0\n\
a\n1.0\n5 0 0\n0 5 0\n0 0 5\nH\n1\nDirect configuration=     2\n0.5 0 0\n";
        let traj = parse_xdatcar(content, None).unwrap();
        assert_eq!(traj.frames.len(), 2);
        assert!((traj.frames[1].structure.lattice.as_ref().unwrap().a - 5.0).abs() < 1e-12);
        assert!((traj.frames[1].structure.sites[0].xyz[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_xdatcar_truncated_and_bad_frames() {
        let content = "Si\n1.0\n5 0 0\n0 5 0\n0 0 5\nSi\n1\n\
Direct configuration=     1\n0 0 0\n\
Direct configuration=     2\nabc def ghi\n\
Direct configuration=     3\n0.1 0.1 0.1\n\
Direct configuration=     4\n";
        let traj = parse_xdatcar(content, None).unwrap();
        assert_eq!(traj.frames.len(), 2);
        assert_eq!(traj.metadata.warnings.len(), 2);
    }

    #[test]
    fn test_xdatcar_max_frames() {
        let traj = parse_xdatcar(XDATCAR, Some(2)).unwrap();
        assert_eq!(traj.frames.len(), 2);
    }
}
