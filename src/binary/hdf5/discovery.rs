//! # 数据集发现
//!
//! 对组树做广度优先遍历，再按优先级别名表匹配数据集名（不区分大小写；
//! 单字母别名如 `R`、`Z` 区分大小写）。别名的优先级高于遍历深度。
//!
//! H5MD 约定的 `<name>/value` 数据集以所在组名参与匹配，
//! 因此 `/particles/all/position/value` 会被当作 `position`。
//!
//! ## 依赖关系
//! - 被 `binary/hdf5/mod.rs` 使用
//! - 使用 `binary/hdf5/mod.rs` 中的树类型

use super::{H5Data, H5Dataset, H5Group, FORMAT};
use crate::binary::element_count;
use crate::error::{Result, StructuraError};
use std::collections::VecDeque;

pub const POSITION_ALIASES: &[&str] = &[
    "positions",
    "position",
    "coordinates",
    "coords",
    "pos",
    "xyz",
    "R",
];

pub const ATOMIC_NUMBER_ALIASES: &[&str] = &[
    "atomic_numbers",
    "numbers",
    "atomic_number",
    "Z",
    "species",
    "atom_types",
    "types",
];

pub const CELL_ALIASES: &[&str] = &["cell", "cells", "lattice", "lattice_vectors", "box", "edges"];

pub const ENERGY_ALIASES: &[&str] = &[
    "energy",
    "energies",
    "total_energy",
    "potential_energy",
    "E",
];

pub const FORCE_ALIASES: &[&str] = &["forces", "force", "F"];

pub const PBC_ALIASES: &[&str] = &["pbc", "periodic"];

pub const STEP_ALIASES: &[&str] = &["step", "steps", "timestep", "timesteps"];

/// 遍历得到的数据集
#[derive(Debug, Clone)]
pub struct DatasetEntry<'a> {
    /// 绝对路径，如 `/particles/all/position/value`
    pub path: String,
    /// 参与别名匹配的名字
    pub key: &'a str,
    pub dataset: &'a H5Dataset,
}

impl<'a> DatasetEntry<'a> {
    /// 数值内容；不可读或长度与形状不符时报错并点名数据集
    pub fn values(&self) -> Result<&'a [f64]> {
        match &self.dataset.data {
            H5Data::Numeric(values) => {
                let expected = element_count(&self.dataset.shape);
                if expected == Some(values.len()) {
                    Ok(values)
                } else {
                    Err(StructuraError::malformed(
                        FORMAT,
                        format!(
                            "dataset '{}' holds {} value(s) but does not match its shape {:?}",
                            self.path,
                            values.len(),
                            self.dataset.shape
                        ),
                    ))
                }
            }
            H5Data::Unsupported(reason) => Err(StructuraError::malformed(
                FORMAT,
                format!("dataset '{}' cannot be read: {}", self.path, reason),
            )),
        }
    }
}

/// 广度优先列出所有数据集
pub fn walk(root: &H5Group) -> Vec<DatasetEntry<'_>> {
    let mut entries = Vec::new();
    let mut queue: VecDeque<(String, &H5Group)> = VecDeque::from([(String::new(), root)]);

    while let Some((prefix, group)) = queue.pop_front() {
        for dataset in &group.datasets {
            let key = if dataset.name == "value" && !group.name.is_empty() {
                group.name.as_str()
            } else {
                dataset.name.as_str()
            };
            entries.push(DatasetEntry {
                path: format!("{}/{}", prefix, dataset.name),
                key,
                dataset,
            });
        }
        for child in &group.groups {
            queue.push_back((format!("{}/{}", prefix, child.name), child));
        }
    }
    entries
}

fn matches(key: &str, alias: &str) -> bool {
    if alias.len() == 1 {
        key == alias
    } else {
        key.eq_ignore_ascii_case(alias)
    }
}

/// 按别名优先级查找
pub fn find<'e, 'a>(entries: &'e [DatasetEntry<'a>], aliases: &[&str]) -> Option<&'e DatasetEntry<'a>> {
    aliases
        .iter()
        .find_map(|alias| entries.iter().find(|e| matches(e.key, alias)))
}

/// 发现结果
#[derive(Debug, Clone)]
pub struct Discovered<'a> {
    pub positions: DatasetEntry<'a>,
    pub atomic_numbers: DatasetEntry<'a>,
    pub cell: Option<DatasetEntry<'a>>,
    pub energy: Option<DatasetEntry<'a>>,
    pub forces: Option<DatasetEntry<'a>>,
    pub pbc: Option<DatasetEntry<'a>>,
    pub steps: Option<DatasetEntry<'a>>,
}

impl<'a> Discovered<'a> {
    /// 实际使用的数据集路径
    pub fn paths(&self) -> Vec<String> {
        [Some(&self.positions), Some(&self.atomic_numbers)]
            .into_iter()
            .chain([
                self.cell.as_ref(),
                self.energy.as_ref(),
                self.forces.as_ref(),
                self.pbc.as_ref(),
                self.steps.as_ref(),
            ])
            .flatten()
            .map(|e| e.path.clone())
            .collect()
    }
}

/// 在组树中找出轨迹所需的数据集；坐标与原子序数缺一不可
pub fn discover(root: &H5Group) -> Result<Discovered<'_>> {
    let entries = walk(root);
    log::debug!("HDF5 tree holds {} dataset(s)", entries.len());

    let required = |dataset: &str, aliases: &[&str]| {
        find(&entries, aliases).cloned().ok_or_else(|| {
            let searched = if entries.is_empty() {
                vec!["/".to_string()]
            } else {
                entries.iter().map(|e| e.path.clone()).collect()
            };
            StructuraError::MissingRequiredDataset {
                dataset: dataset.to_string(),
                searched,
            }
        })
    };
    let positions = required("positions", POSITION_ALIASES)?;
    let atomic_numbers = required("atomic_numbers", ATOMIC_NUMBER_ALIASES)?;

    let optional = |aliases: &[&str]| find(&entries, aliases).cloned();
    Ok(Discovered {
        positions,
        atomic_numbers,
        cell: optional(CELL_ALIASES),
        energy: optional(ENERGY_ALIASES),
        forces: optional(FORCE_ALIASES),
        pbc: optional(PBC_ALIASES),
        steps: optional(STEP_ALIASES),
    })
}
