//! # HDF5 轨迹解码
//!
//! 不实现完整的 HDF5 规范，只读出组/数据集树（`format.rs`），
//! 再按别名表广度优先找出坐标、原子序数等数据集（`discovery.rs`），
//! 最后按形状切成帧。
//!
//! 签名缺失但扩展名是 `.h5`/`.hdf5` 的文件仍按 HDF5 尝试，并记录警告。
//!
//! ## 依赖关系
//! - 被 `binary/mod.rs` 使用
//! - 子模块: format, discovery
//! - 使用 `trajectory/assemble.rs`, `models/`, `rayon`

pub mod discovery;
pub mod format;

use crate::detect::magic::HDF5_SIGNATURE;
use crate::detect::strip_compression;
use crate::error::{Result, StructuraError};
use crate::math::{cell_to_matrix, Matrix3};
use crate::models::element::{symbol_for_number, DUMMY_SYMBOL};
use crate::models::{Frame, FrameMetadata, Lattice, ParsedStructure, Trajectory, TrajectoryMetadata};
use crate::trajectory::TrajectoryBuilder;
use discovery::{DatasetEntry, Discovered};
use rayon::prelude::*;

const FORMAT: &str = "hdf5";

/// 数据集内容
#[derive(Debug, Clone, PartialEq)]
pub enum H5Data {
    /// 数值数据，统一转换为 f64，行优先
    Numeric(Vec<f64>),
    /// 无法读取（分块存储、字符串类型等），附原因
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct H5Dataset {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: H5Data,
}

impl H5Dataset {
    pub fn numeric(name: impl Into<String>, shape: Vec<usize>, values: Vec<f64>) -> Self {
        H5Dataset {
            name: name.into(),
            shape,
            data: H5Data::Numeric(values),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct H5Group {
    pub name: String,
    pub groups: Vec<H5Group>,
    pub datasets: Vec<H5Dataset>,
}

impl H5Group {
    pub fn new(name: impl Into<String>) -> Self {
        H5Group {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_group(mut self, group: H5Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_dataset(mut self, dataset: H5Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }
}

fn has_hdf5_extension(filename: &str) -> bool {
    let name = strip_compression(filename);
    [".h5", ".hdf5", ".hdf", ".h5md"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

/// 晶胞数据：固定或逐帧
#[derive(Debug, Clone, Copy)]
enum CellData<'a> {
    Fixed(Matrix3),
    PerFrame { values: &'a [f64], diagonal: bool },
}

fn diagonal(a: f64, b: f64, c: f64) -> Matrix3 {
    [[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]]
}

fn matrix(v: &[f64]) -> Matrix3 {
    [[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]]
}

/// 校验过形状、可以逐帧切片的数据
struct FrameLayout<'a> {
    frames: usize,
    atoms: usize,
    positions: &'a [f64],
    numbers: &'a [f64],
    numbers_per_frame: bool,
    cell: Option<CellData<'a>>,
    pbc: [bool; 3],
    energy: Option<&'a [f64]>,
    forces: Option<&'a [f64]>,
    steps: Option<&'a [f64]>,
}

fn optional<'a>(
    entry: &Option<DatasetEntry<'a>>,
    metadata: &mut TrajectoryMetadata,
) -> Option<(&'a [f64], &'a [usize], String)> {
    let entry = entry.as_ref()?;
    match entry.values() {
        Ok(values) => Some((values, entry.dataset.shape.as_slice(), entry.path.clone())),
        Err(e) => {
            metadata.warn(format!("Ignoring optional dataset: {}", e));
            None
        }
    }
}

/// 逐帧一个值（或一组值）的可选数据集，长度不符时忽略
fn per_frame<'a>(
    entry: &Option<DatasetEntry<'a>>,
    expected: usize,
    metadata: &mut TrajectoryMetadata,
) -> Option<&'a [f64]> {
    let (values, _, path) = optional(entry, metadata)?;
    if values.len() == expected {
        return Some(values);
    }
    metadata.warn(format!(
        "Ignoring dataset '{}': {} value(s), expected {}",
        path,
        values.len(),
        expected
    ));
    None
}

impl<'a> FrameLayout<'a> {
    fn new(found: &Discovered<'a>, metadata: &mut TrajectoryMetadata) -> Result<Self> {
        let positions = found.positions.values()?;
        let (frames, atoms) = match found.positions.dataset.shape[..] {
            [f, n, 3] => (f, n),
            [n, 3] => (1, n),
            ref other => {
                return Err(StructuraError::malformed(
                    FORMAT,
                    format!(
                        "dataset '{}' has shape {:?}; expected (frames, atoms, 3) or (atoms, 3)",
                        found.positions.path, other
                    ),
                ))
            }
        };

        let numbers = found.atomic_numbers.values()?;
        let numbers_per_frame = if numbers.len() == atoms {
            false
        } else if numbers.len() == frames * atoms {
            true
        } else {
            return Err(StructuraError::malformed(
                FORMAT,
                format!(
                    "dataset '{}' has {} values for {} atom(s) in {} frame(s)",
                    found.atomic_numbers.path,
                    numbers.len(),
                    atoms,
                    frames
                ),
            ));
        };

        let cell = optional(&found.cell, metadata).and_then(|(values, shape, path)| {
            let cell = match shape {
                [3, 3] => Some(CellData::Fixed(matrix(values))),
                [3] => Some(CellData::Fixed(diagonal(values[0], values[1], values[2]))),
                [6] => Some(CellData::Fixed(cell_to_matrix(
                    values[0], values[1], values[2], values[3], values[4], values[5],
                ))),
                [f, 3, 3] if *f == frames => Some(CellData::PerFrame {
                    values,
                    diagonal: false,
                }),
                [f, 3] if *f == frames => Some(CellData::PerFrame {
                    values,
                    diagonal: true,
                }),
                _ => None,
            };
            if cell.is_none() {
                metadata.warn(format!("Ignoring cell dataset '{}' with shape {:?}", path, shape));
            }
            cell
        });

        let pbc = match optional(&found.pbc, metadata) {
            Some((values, _, _)) if values.len() == 3 => {
                [values[0] != 0.0, values[1] != 0.0, values[2] != 0.0]
            }
            _ => [true; 3],
        };

        let energy = per_frame(&found.energy, frames, metadata);
        let forces = per_frame(&found.forces, frames * atoms * 3, metadata);
        let steps = per_frame(&found.steps, frames, metadata);

        Ok(FrameLayout {
            frames,
            atoms,
            positions,
            numbers,
            numbers_per_frame,
            cell,
            pbc,
            energy,
            forces,
            steps,
        })
    }

    fn cell(&self, i: usize) -> Option<Matrix3> {
        match self.cell? {
            CellData::Fixed(m) => Some(m),
            CellData::PerFrame { values, diagonal: true } => {
                let v = &values[i * 3..i * 3 + 3];
                Some(diagonal(v[0], v[1], v[2]))
            }
            CellData::PerFrame { values, diagonal: false } => Some(matrix(&values[i * 9..i * 9 + 9])),
        }
    }

    fn frame(&self, i: usize) -> Frame {
        let n = self.atoms;
        let positions = &self.positions[i * n * 3..(i + 1) * n * 3];
        let numbers = if self.numbers_per_frame {
            &self.numbers[i * n..(i + 1) * n]
        } else {
            self.numbers
        };

        let lattice = self
            .cell(i)
            .filter(|m| m.iter().flatten().any(|v| v.abs() > 1e-12))
            .map(|m| Lattice::from_matrix(m).with_pbc(self.pbc));
        let coords = lattice.as_ref().map(Lattice::frame);

        let sites = positions
            .chunks_exact(3)
            .zip(numbers)
            .map(|(xyz, z)| {
                let symbol = symbol_for_number(z.round().max(0.0) as u32).unwrap_or(DUMMY_SYMBOL);
                ParsedStructure::site_from_cartesian(coords.as_ref(), symbol, [xyz[0], xyz[1], xyz[2]])
            })
            .collect();

        let mut metadata = FrameMetadata::default();
        metadata.energy = self.energy.map(|e| e[i]);
        if let Some(forces) = self.forces {
            let forces = forces[i * n * 3..(i + 1) * n * 3]
                .chunks_exact(3)
                .map(|f| [f[0], f[1], f[2]])
                .collect();
            metadata.set_forces(forces);
        }

        let step = self.steps.map_or(i as f64, |s| s[i]);
        Frame::new(ParsedStructure::new(sites, lattice), step).with_metadata(metadata)
    }
}

/// 由已读出的组树构建轨迹
pub fn trajectory_from_tree(
    root: &H5Group,
    warnings: Vec<String>,
    max_frames: Option<usize>,
) -> Result<Trajectory> {
    let found = discovery::discover(root)?;

    let mut builder = TrajectoryBuilder::new(FORMAT);
    let metadata = builder.metadata_mut();
    for warning in warnings {
        metadata.warn(warning);
    }
    metadata.discovered_datasets = found.paths();
    let layout = FrameLayout::new(&found, metadata)?;

    let count = layout.frames.min(max_frames.unwrap_or(usize::MAX));
    let frames: Vec<Frame> = (0..count).into_par_iter().map(|i| layout.frame(i)).collect();
    for frame in frames {
        builder.push(frame);
    }
    builder.finish()
}

/// 解码 HDF5 轨迹
pub fn parse_hdf5(
    bytes: &[u8],
    filename: Option<&str>,
    max_frames: Option<usize>,
) -> Result<Trajectory> {
    let mut warnings = Vec::new();
    let at = match format::find_signature(bytes) {
        Some(at) => at,
        None if filename.map_or(false, has_hdf5_extension) => {
            warnings.push(format!(
                "{} lacks the HDF5 signature; attempting to decode it anyway",
                filename.unwrap_or("input")
            ));
            0
        }
        None => {
            let found = &bytes[..bytes.len().min(HDF5_SIGNATURE.len())];
            return Err(StructuraError::InvalidSignature {
                format: "HDF5".to_string(),
                expected: format!("{:?}", String::from_utf8_lossy(&HDF5_SIGNATURE)),
                found: format!("{:?}", String::from_utf8_lossy(found)),
            });
        }
    };

    let (root, read_warnings) = format::read_file(bytes, at)?;
    warnings.extend(read_warnings);
    trajectory_from_tree(&root, warnings, max_frames)
}
