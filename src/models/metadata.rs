//! # 元数据模型
//!
//! 帧、位点与轨迹的附加信息。已知字段是强类型的可选字段，
//! 其余格式特有的内容放进一个显式类型化的扩展表 `extra`。
//!
//! ## 依赖关系
//! - 被 `models/structure.rs`, `models/trajectory.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 扩展表中的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    FloatList(Vec<f64>),
    TextList(Vec<String>),
}

impl MetaValue {
    /// 从文本推断类型: 整数 → 浮点 → T/F 布尔 → 空格分隔的浮点列表 → 文本
    pub fn infer(raw: &str) -> MetaValue {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<i64>() {
            return MetaValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return MetaValue::Float(f);
        }
        match raw {
            "T" | "True" | "true" => return MetaValue::Bool(true),
            "F" | "False" | "false" => return MetaValue::Bool(false),
            _ => {}
        }
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.len() > 1 {
            let floats: Vec<f64> = parts.iter().filter_map(|s| s.parse().ok()).collect();
            if floats.len() == parts.len() {
                return MetaValue::FloatList(floats);
            }
        }
        MetaValue::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Int(i) => Some(*i as f64),
            MetaValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// 单帧元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// 总能量 (eV)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_per_atom: Option<f64>,

    /// 每个位点的力 (eV/Å)，与 sites 一一对应
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forces: Option<Vec<[f64; 3]>>,

    /// 最大单原子力模长
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_max: Option<f64>,

    /// 力的均方根
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_norm: Option<f64>,

    /// 应力张量 3×3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress: Option<[[f64; 3]; 3]>,

    /// 晶胞体积 (Å³)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandgap: Option<f64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetaValue>,
}

impl FrameMetadata {
    /// 设置力并派生 `force_max` / `force_norm`
    pub fn set_forces(&mut self, forces: Vec<[f64; 3]>) {
        if !forces.is_empty() {
            let norms: Vec<f64> = forces
                .iter()
                .map(|f| (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt())
                .collect();
            self.force_max = Some(norms.iter().cloned().fold(0.0, f64::max));
            let mean_sq = norms.iter().map(|n| n * n).sum::<f64>() / norms.len() as f64;
            self.force_norm = Some(mean_sq.sqrt());
        }
        self.forces = Some(forces);
    }

    /// Voigt 6 分量 (xx, yy, zz, yz, xz, xy) → 3×3
    pub fn set_stress_voigt(&mut self, v: &[f64]) {
        if v.len() >= 6 {
            self.stress = Some([
                [v[0], v[5], v[4]],
                [v[5], v[1], v[3]],
                [v[4], v[3], v[2]],
            ]);
        }
    }

    /// 9 分量行优先 → 3×3
    pub fn set_stress_flat(&mut self, v: &[f64]) {
        if v.len() >= 9 {
            self.stress = Some([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]]);
        } else {
            self.set_stress_voigt(v);
        }
    }

    /// 填充由能量/晶格派生的量
    pub fn derive(&mut self, n_sites: usize, volume: Option<f64>) {
        if let (Some(e), true) = (self.energy, n_sites > 0) {
            self.energy_per_atom = Some(e / n_sites as f64);
        }
        if self.volume.is_none() {
            self.volume = volume.map(f64::abs);
        }
    }
}

/// 位点附加属性
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteProperties {
    /// POSCAR 选择性动力学标志
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selective_dynamics: Option<[bool; 3]>,

    /// 原子质量 (phonopy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,

    /// 超胞位点在原胞中的对应下标 (phonopy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduced_to: Option<usize>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetaValue>,
}

impl SiteProperties {
    pub fn is_empty(&self) -> bool {
        self.selective_dynamics.is_none()
            && self.mass.is_none()
            && self.reduced_to.is_none()
            && self.extra.is_empty()
    }
}

/// 轨迹级元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    /// 来源格式名称 ("xyz", "lammps", "ase" ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// LAMMPS 原子类型 → 元素符号，供图例显示
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub element_mapping: BTreeMap<u32, String>,

    /// HDF5 中实际使用的数据集路径
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovered_datasets: Vec<String>,

    /// 非致命问题（跳过的帧、缺失签名等）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetaValue>,
}

impl TrajectoryMetadata {
    pub fn for_format(format: &str) -> Self {
        TrajectoryMetadata {
            source_format: Some(format.to_string()),
            ..Default::default()
        }
    }

    /// 记录警告并同时写入日志
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_value_infer() {
        assert_eq!(MetaValue::infer("42"), MetaValue::Int(42));
        assert_eq!(MetaValue::infer("-1.5e2"), MetaValue::Float(-150.0));
        assert_eq!(MetaValue::infer("T"), MetaValue::Bool(true));
        assert_eq!(
            MetaValue::infer("1 2.5 3"),
            MetaValue::FloatList(vec![1.0, 2.5, 3.0])
        );
        assert_eq!(MetaValue::infer("NVT run"), MetaValue::Text("NVT run".into()));
    }

    #[test]
    fn test_set_forces_derives_max_and_norm() {
        let mut meta = FrameMetadata::default();
        meta.set_forces(vec![[3.0, 4.0, 0.0], [0.0, 0.0, 0.0]]);

        assert_eq!(meta.force_max, Some(5.0));
        // sqrt((25 + 0) / 2)
        assert!((meta.force_norm.unwrap() - 12.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stress_voigt() {
        let mut meta = FrameMetadata::default();
        meta.set_stress_voigt(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let s = meta.stress.unwrap();
        assert_eq!(s[0], [1.0, 6.0, 5.0]);
        assert_eq!(s[1][2], 4.0);
        assert_eq!(s[2][2], 3.0);
    }

    #[test]
    fn test_derive_energy_per_atom() {
        let mut meta = FrameMetadata {
            energy: Some(-10.0),
            ..Default::default()
        };
        meta.derive(4, Some(-64.0));
        assert_eq!(meta.energy_per_atom, Some(-2.5));
        assert_eq!(meta.volume, Some(64.0));
    }
}
