//! # LAMMPS 文本 dump 解析器
//!
//! ## 格式说明
//! ```text
//! ITEM: TIMESTEP
//! 1000
//! ITEM: NUMBER OF ATOMS
//! 2
//! ITEM: BOX BOUNDS xy xz yz pp pp pp
//! xlo_bound xhi_bound xy
//! ylo_bound yhi_bound xz
//! zlo_bound zhi_bound yz
//! ITEM: ATOMS id type x y z fx fy fz c_pe
//! 1 1 0.0 0.0 0.0 0.1 0.0 0.0 -3.2
//! ...
//! ```
//!
//! 三斜盒子的边界行给出的是包围盒，需先扣除倾斜量：
//! `xlo = xlo_b - min(0, xy, xz, xy+xz)`, `xhi = xhi_b - max(0, xy, xz, xy+xz)`,
//! `ylo = ylo_b - min(0, yz)`, `yhi = yhi_b - max(0, yz)`；
//! 晶格矩阵为 `[[lx,0,0],[xy,ly,0],[xz,yz,lz]]`。
//!
//! 原子类型按原子序数映射为元素（无 `type` 列时全部为 1 → H），
//! 有 `element` 列时以其为准；映射表写入轨迹元数据供图例使用。
//!
//! ## 依赖关系
//! - 被 `lib.rs` 使用
//! - 使用 `parsers/lexer.rs`, `models/`, `trajectory/assemble.rs`

use crate::error::{Result, StructuraError};
use crate::math::{Matrix3, Vec3};
use crate::models::element::{normalize_symbol, symbol_for_number, DUMMY_SYMBOL};
use crate::models::{Frame, FrameMetadata, Lattice, MetaValue, ParsedStructure, SiteProperties, Trajectory};
use crate::parsers::lexer::parse_coordinate;
use crate::trajectory::assemble::TrajectoryBuilder;

use rayon::prelude::*;
use std::collections::BTreeMap;

const FORMAT: &str = "lammps";

/// 模拟盒子
#[derive(Debug, Clone, PartialEq)]
pub struct LammpsBox {
    pub origin: Vec3,
    pub matrix: Matrix3,
    pub pbc: [bool; 3],
}

impl LammpsBox {
    /// 由包围盒边界与倾斜因子构造（正交盒子的倾斜为 0）
    pub fn from_bounds(bounds: [[f64; 2]; 3], tilt: [f64; 3], pbc: [bool; 3]) -> Self {
        let [xy, xz, yz] = tilt;
        let x_shift_min = 0.0f64.min(xy).min(xz).min(xy + xz);
        let x_shift_max = 0.0f64.max(xy).max(xz).max(xy + xz);

        let xlo = bounds[0][0] - x_shift_min;
        let xhi = bounds[0][1] - x_shift_max;
        let ylo = bounds[1][0] - 0.0f64.min(yz);
        let yhi = bounds[1][1] - 0.0f64.max(yz);
        let zlo = bounds[2][0];
        let zhi = bounds[2][1];

        LammpsBox {
            origin: [xlo, ylo, zlo],
            matrix: [[xhi - xlo, 0.0, 0.0], [xy, yhi - ylo, 0.0], [xz, yz, zhi - zlo]],
            pbc,
        }
    }

    /// 缩放坐标 → 笛卡尔坐标
    fn unscale(&self, s: &Vec3) -> Vec3 {
        let m = &self.matrix;
        [
            self.origin[0] + s[0] * m[0][0] + s[1] * m[1][0] + s[2] * m[2][0],
            self.origin[1] + s[1] * m[1][1] + s[2] * m[2][1],
            self.origin[2] + s[2] * m[2][2],
        ]
    }
}

/// 解析 `BOX BOUNDS` 标题行，返回 (是否三斜, pbc)
fn parse_box_header(header: &str) -> (bool, [bool; 3]) {
    let tokens: Vec<&str> = header.split_whitespace().collect();
    let triclinic = tokens.contains(&"xy");
    let flags: Vec<bool> = tokens
        .iter()
        .filter(|t| t.len() == 2 && t.chars().all(|c| matches!(c, 'p' | 'f' | 's' | 'm')))
        .map(|t| *t == "pp")
        .collect();
    let pbc = if flags.len() == 3 {
        [flags[0], flags[1], flags[2]]
    } else {
        [true; 3]
    };
    (triclinic, pbc)
}

/// 一帧的原始行
#[derive(Debug, Clone)]
struct DumpBlock<'a> {
    lines: Vec<&'a str>,
}

/// 以 `ITEM: TIMESTEP` 切分
fn split_blocks(content: &str) -> Vec<DumpBlock<'_>> {
    let mut blocks: Vec<DumpBlock> = Vec::new();
    for line in content.lines() {
        if line.trim_start().starts_with("ITEM: TIMESTEP") {
            blocks.push(DumpBlock { lines: vec![line] });
        } else if let Some(block) = blocks.last_mut() {
            block.lines.push(line);
        }
    }
    blocks
}

fn section_value<'a>(lines: &[&'a str], i: usize, what: &str) -> Result<&'a str> {
    lines
        .get(i)
        .map(|l| l.trim())
        .ok_or_else(|| StructuraError::malformed(FORMAT, format!("missing value for {}", what)))
}

/// ATOMS 列布局
struct Columns {
    names: Vec<String>,
    id: Option<usize>,
    type_col: Option<usize>,
    element: Option<usize>,
    position: Option<([usize; 3], bool)>,
    force: Option<[usize; 3]>,
    energy: Option<usize>,
}

impl Columns {
    fn parse(header: &str) -> Self {
        let names: Vec<String> = header
            .trim_start()
            .trim_start_matches("ITEM:")
            .split_whitespace()
            .skip(1)
            .map(str::to_string)
            .collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let triple = |x: &str, y: &str, z: &str| Some([find(x)?, find(y)?, find(z)?]);

        // 优先未缩放坐标
        let position = triple("x", "y", "z")
            .map(|c| (c, false))
            .or_else(|| triple("xu", "yu", "zu").map(|c| (c, false)))
            .or_else(|| triple("xs", "ys", "zs").map(|c| (c, true)))
            .or_else(|| triple("xsu", "ysu", "zsu").map(|c| (c, true)));

        Columns {
            id: find("id"),
            type_col: find("type"),
            element: find("element"),
            position,
            force: triple("fx", "fy", "fz"),
            energy: find("c_pe").or_else(|| find("v_pe")).or_else(|| find("pe")),
            names,
        }
    }

    fn is_known(&self, index: usize) -> bool {
        let mut known = vec![self.id, self.type_col, self.element, self.energy];
        if let Some((p, _)) = self.position {
            known.extend(p.iter().map(|&i| Some(i)));
        }
        if let Some(f) = self.force {
            known.extend(f.iter().map(|&i| Some(i)));
        }
        known.contains(&Some(index))
    }
}

struct AtomRecord {
    id: i64,
    atom_type: u32,
    element: String,
    xyz: Vec3,
    force: Option<Vec3>,
    energy: Option<f64>,
    extra: BTreeMap<String, MetaValue>,
}

fn element_for_type(atom_type: u32) -> &'static str {
    symbol_for_number(atom_type).unwrap_or(DUMMY_SYMBOL)
}

fn parse_atoms(
    lines: &[&str],
    columns: &Columns,
    cell: &LammpsBox,
) -> Result<Vec<AtomRecord>> {
    let (pos, scaled) = columns
        .position
        .ok_or_else(|| StructuraError::malformed(FORMAT, "ATOMS section has no x/y/z columns"))?;

    lines
        .iter()
        .enumerate()
        .map(|(n, line)| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < columns.names.len() {
                return Err(StructuraError::malformed(
                    FORMAT,
                    format!(
                        "atom line {} has {} columns, header declares {}",
                        n + 1,
                        tokens.len(),
                        columns.names.len()
                    ),
                ));
            }
            let number = |i: usize| parse_coordinate(tokens[i]);

            let raw = [number(pos[0])?, number(pos[1])?, number(pos[2])?];
            let xyz = if scaled { cell.unscale(&raw) } else { raw };

            let atom_type = match columns.type_col {
                Some(c) => tokens[c].parse::<u32>().map_err(|_| {
                    StructuraError::malformed(FORMAT, format!("invalid atom type '{}'", tokens[c]))
                })?,
                None => 1,
            };
            let element = match columns.element {
                Some(c) => normalize_symbol(tokens[c]).unwrap_or(DUMMY_SYMBOL),
                None => element_for_type(atom_type),
            };

            let force = match columns.force {
                Some(f) => Some([number(f[0])?, number(f[1])?, number(f[2])?]),
                None => None,
            };
            let energy = columns.energy.map(number).transpose()?;

            let mut extra = BTreeMap::new();
            for (i, name) in columns.names.iter().enumerate() {
                if !columns.is_known(i) {
                    extra.insert(name.clone(), MetaValue::infer(tokens[i]));
                }
            }

            Ok(AtomRecord {
                id: columns
                    .id
                    .and_then(|c| tokens[c].parse().ok())
                    .unwrap_or(n as i64 + 1),
                atom_type,
                element: element.to_string(),
                xyz,
                force,
                energy,
                extra,
            })
        })
        .collect()
}

/// 解析一帧，同时返回本帧用到的类型 → 元素映射
fn parse_block(block: &DumpBlock<'_>) -> Result<(Frame, BTreeMap<u32, String>)> {
    let lines = &block.lines;
    let mut step: Option<f64> = None;
    let mut n_atoms: Option<usize> = None;
    let mut cell: Option<LammpsBox> = None;
    let mut atoms: Option<Vec<AtomRecord>> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        let Some(item) = line.strip_prefix("ITEM:") else {
            i += 1;
            continue;
        };
        let item = item.trim();

        if item.starts_with("TIMESTEP") {
            step = Some(parse_coordinate(section_value(lines, i + 1, "TIMESTEP")?)?);
            i += 2;
        } else if item.starts_with("NUMBER OF ATOMS") {
            let raw = section_value(lines, i + 1, "NUMBER OF ATOMS")?;
            n_atoms = Some(raw.parse().map_err(|_| {
                StructuraError::malformed(FORMAT, format!("invalid atom count '{}'", raw))
            })?);
            i += 2;
        } else if item.starts_with("BOX BOUNDS") {
            let (triclinic, pbc) = parse_box_header(item);
            let mut bounds = [[0.0; 2]; 3];
            let mut tilt = [0.0; 3];
            for axis in 0..3 {
                let values: Vec<f64> = section_value(lines, i + 1 + axis, "BOX BOUNDS")?
                    .split_whitespace()
                    .map(parse_coordinate)
                    .collect::<Result<_>>()?;
                if values.len() < 2 || (triclinic && values.len() < 3) {
                    return Err(StructuraError::malformed(
                        FORMAT,
                        format!("box bound line {} has {} values", axis + 1, values.len()),
                    ));
                }
                bounds[axis] = [values[0], values[1]];
                if triclinic {
                    tilt[axis] = values[2];
                }
            }
            cell = Some(LammpsBox::from_bounds(bounds, tilt, pbc));
            i += 4;
        } else if item.starts_with("ATOMS") {
            let n = n_atoms.ok_or_else(|| {
                StructuraError::malformed(FORMAT, "ATOMS section before NUMBER OF ATOMS")
            })?;
            let cell_ref = cell.as_ref().ok_or_else(|| {
                StructuraError::malformed(FORMAT, "ATOMS section before BOX BOUNDS")
            })?;
            let start = i + 1;
            let end = start + n;
            if end > lines.len() {
                return Err(StructuraError::malformed(
                    FORMAT,
                    format!("expected {} atom lines, found {}", n, lines.len() - start),
                ));
            }
            atoms = Some(parse_atoms(&lines[start..end], &Columns::parse(line), cell_ref)?);
            i = end;
        } else {
            // ITEM: TIME / UNITS 等，跳过其数值行
            i += 1;
        }
    }

    let step = step.ok_or_else(|| StructuraError::malformed(FORMAT, "missing TIMESTEP"))?;
    let cell = cell.ok_or_else(|| StructuraError::malformed(FORMAT, "missing BOX BOUNDS"))?;
    let mut atoms = atoms.ok_or_else(|| StructuraError::malformed(FORMAT, "missing ATOMS section"))?;
    atoms.sort_by_key(|a| a.id);

    let lattice = Lattice::from_matrix(cell.matrix).with_pbc(cell.pbc);
    let frame = lattice.frame();

    let mut mapping = BTreeMap::new();
    let mut forces = Vec::new();
    let mut energy_sum: Option<f64> = None;
    let mut sites = Vec::with_capacity(atoms.len());

    for atom in atoms {
        mapping.insert(atom.atom_type, atom.element.clone());
        if let Some(f) = atom.force {
            forces.push(f);
        }
        if let Some(e) = atom.energy {
            *energy_sum.get_or_insert(0.0) += e;
        }
        let relative = [
            atom.xyz[0] - cell.origin[0],
            atom.xyz[1] - cell.origin[1],
            atom.xyz[2] - cell.origin[2],
        ];
        let mut site = ParsedStructure::site_from_cartesian(Some(&frame), atom.element, atom.xyz);
        site.abc = frame.to_fractional(&relative);
        let mut properties = SiteProperties {
            extra: atom.extra,
            ..Default::default()
        };
        properties.extra.insert("type".into(), MetaValue::Int(atom.atom_type as i64));
        sites.push(site.with_properties(properties));
    }

    let mut metadata = FrameMetadata {
        energy: energy_sum,
        ..Default::default()
    };
    if !forces.is_empty() && forces.len() == sites.len() {
        metadata.set_forces(forces);
    }

    let structure = ParsedStructure::new(sites, Some(lattice));
    Ok((Frame::new(structure, step).with_metadata(metadata), mapping))
}

/// 解析 LAMMPS dump 轨迹
pub fn parse_lammps(content: &str, max_frames: Option<usize>) -> Result<Trajectory> {
    let blocks = split_blocks(content);
    if blocks.is_empty() {
        return Err(StructuraError::malformed(FORMAT, "no 'ITEM: TIMESTEP' found"));
    }

    let results: Vec<Result<(Frame, BTreeMap<u32, String>)>> = blocks
        .par_iter()
        .take(max_frames.unwrap_or(usize::MAX))
        .map(parse_block)
        .collect();

    let mut builder = TrajectoryBuilder::new(FORMAT);
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok((frame, mapping)) => {
                builder.metadata_mut().element_mapping.extend(mapping);
                builder.push(frame);
            }
            Err(e) => builder.push_result(i, Err(e)),
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORTHO: &str = "ITEM: TIMESTEP
0
ITEM: NUMBER OF ATOMS
2
ITEM: BOX BOUNDS pp pp ff
0.0 10.0
0.0 10.0
0.0 20.0
ITEM: ATOMS id type x y z fx fy fz c_pe
2 2 5.0 5.0 5.0 0.0 0.0 1.0 -1.5
1 1 0.0 0.0 0.0 3.0 4.0 0.0 -2.5
ITEM: TIMESTEP
100
ITEM: NUMBER OF ATOMS
2
ITEM: BOX BOUNDS pp pp ff
0.0 10.0
0.0 10.0
0.0 20.0
ITEM: ATOMS id type x y z fx fy fz c_pe
1 1 0.5 0.0 0.0 0.0 0.0 0.0 -2.0
2 2 5.5 5.0 5.0 0.0 0.0 0.0 -2.0
";

    #[test]
    fn test_orthogonal_frames() {
        let traj = parse_lammps(ORTHO, None).unwrap();
        assert_eq!(traj.frames.len(), 2);
        assert_eq!(traj.frames[1].step, 100.0);

        let first = &traj.frames[0];
        let lattice = first.structure.lattice.as_ref().unwrap();
        assert_eq!(lattice.pbc, [true, true, false]);
        assert!((lattice.volume - 2000.0).abs() < 1e-9);

        // 按 id 排序
        assert_eq!(first.structure.sites[0].element(), "H");
        assert_eq!(first.structure.sites[1].element(), "He");
        assert_eq!(first.metadata.force_max, Some(5.0));
        assert_eq!(first.metadata.energy, Some(-4.0));
        assert_eq!(traj.metadata.element_mapping.get(&2), Some(&"He".to_string()));
    }

    #[test]
    fn test_triclinic_box() {
        let content = "ITEM: TIMESTEP
5
ITEM: NUMBER OF ATOMS
1
ITEM: BOX BOUNDS xy xz yz pp pp pp
0 10 2.0
0 10 1.0
0 10 0.5
ITEM: ATOMS id type x y z
1 1 1.0 1.0 1.0
";
        let traj = parse_lammps(content, None).unwrap();
        let m = traj.frames[0].structure.lattice.as_ref().unwrap().matrix;
        assert_eq!(m[1][0], 2.0);
        assert_eq!(m[2][0], 1.0);
        assert_eq!(m[2][1], 0.5);
        assert!((m[0][0] - 7.0).abs() < 1e-12);
        assert!((m[1][1] - 9.5).abs() < 1e-12);
        let volume = traj.frames[0].structure.lattice.as_ref().unwrap().volume;
        assert!((volume - 665.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_and_missing_type() {
        let content = "ITEM: TIMESTEP
0
ITEM: NUMBER OF ATOMS
1
ITEM: BOX BOUNDS pp pp pp
0 4
0 4
0 4
ITEM: ATOMS id xs ys zs
1 0.5 0.25 0.0
";
        let traj = parse_lammps(content, None).unwrap();
        let site = &traj.frames[0].structure.sites[0];
        assert_eq!(site.element(), "H");
        assert!((site.xyz[0] - 2.0).abs() < 1e-12);
        assert!((site.abc[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_element_column_and_extra() {
        let content = "ITEM: TIMESTEP
0
ITEM: NUMBER OF ATOMS
1
ITEM: BOX BOUNDS pp pp pp
0 4
0 4
0 4
ITEM: ATOMS id type element x y z q
1 1 Cu 0 0 0 0.25
";
        let traj = parse_lammps(content, None).unwrap();
        let site = &traj.frames[0].structure.sites[0];
        assert_eq!(site.element(), "Cu");
        assert_eq!(site.properties.extra.get("q"), Some(&MetaValue::Float(0.25)));
        assert_eq!(traj.metadata.element_mapping.get(&1), Some(&"Cu".to_string()));
    }

    #[test]
    fn test_truncated_frame_skipped() {
        let content = format!("{}ITEM: TIMESTEP\n200\nITEM: NUMBER OF ATOMS\n5\nITEM: BOX BOUNDS pp pp pp\n0 1\n0 1\n0 1\nITEM: ATOMS id type x y z\n1 1 0 0 0\n", ORTHO);
        let traj = parse_lammps(&content, None).unwrap();
        assert_eq!(traj.frames.len(), 2);
        assert_eq!(traj.metadata.warnings.len(), 1);
    }
}
