//! # 原子结构数据模型
//!
//! 所有格式解析器汇聚到的统一表示：`ParsedStructure { sites, lattice? }`。
//!
//! - `Species`: 元素 + 占有率 + 可选氧化态（支持部分占位/无序位点）
//! - `Site`: 一个原子位点，同时持有笛卡尔 (`xyz`) 与分数 (`abc`) 坐标
//! - `Lattice`: 行向量矩阵及其派生参数；无周期边界的结构没有晶格
//!
//! ## 依赖关系
//! - 被 `parsers/`, `binary/`, `trajectory/` 使用
//! - 使用 `math/`, `models/metadata.rs`

use crate::error::{Result, StructuraError};
use crate::math::{lattice_params, CoordinateFrame, Matrix3, Vec3};
use crate::models::metadata::SiteProperties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 晶格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: Matrix3,

    /// 各轴周期性
    pub pbc: [bool; 3],

    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,

    /// det(matrix)
    pub volume: f64,
}

impl Lattice {
    /// 从晶格向量矩阵创建，派生参数随之计算
    pub fn from_matrix(matrix: Matrix3) -> Self {
        let p = lattice_params(&matrix);
        Lattice {
            matrix,
            pbc: [true; 3],
            a: p.a,
            b: p.b,
            c: p.c,
            alpha: p.alpha,
            beta: p.beta,
            gamma: p.gamma,
            volume: p.volume,
        }
    }

    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        Lattice::from_matrix(crate::math::cell_to_matrix(a, b, c, alpha, beta, gamma))
    }

    pub fn with_pbc(mut self, pbc: [bool; 3]) -> Self {
        self.pbc = pbc;
        self
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        (self.a, self.b, self.c, self.alpha, self.beta, self.gamma)
    }

    pub fn frame(&self) -> CoordinateFrame {
        CoordinateFrame::new(&self.matrix)
    }
}

/// 位点上的一种元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub element: String,

    /// 占有率，无序位点上各元素之和可以不为 1
    pub occu: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxidation_state: Option<f64>,
}

impl Species {
    pub fn new(element: impl Into<String>, occu: f64) -> Self {
        Species {
            element: element.into(),
            occu,
            oxidation_state: None,
        }
    }
}

/// 原子位点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 至少包含一种元素
    pub species: Vec<Species>,

    /// 笛卡尔坐标 (Å)
    pub xyz: Vec3,

    /// 分数坐标，仅在存在晶格时有意义
    pub abc: Vec3,

    /// 显示标签，不要求唯一
    pub label: String,

    #[serde(default, skip_serializing_if = "SiteProperties::is_empty")]
    pub properties: SiteProperties,
}

impl Site {
    /// 单一元素、占有率 1 的位点
    pub fn new(element: impl Into<String>, xyz: Vec3, abc: Vec3) -> Self {
        let element = element.into();
        Site {
            label: element.clone(),
            species: vec![Species::new(element, 1.0)],
            xyz,
            abc,
            properties: SiteProperties::default(),
        }
    }

    /// 多元素（无序）位点；`species` 为空时报错
    pub fn with_species(species: Vec<Species>, xyz: Vec3, abc: Vec3) -> Result<Self> {
        let first = species.first().ok_or_else(|| {
            StructuraError::malformed("structure", "site must have at least one species")
        })?;
        Ok(Site {
            label: first.element.clone(),
            species,
            xyz,
            abc,
            properties: SiteProperties::default(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_properties(mut self, properties: SiteProperties) -> Self {
        self.properties = properties;
        self
    }

    /// 主元素（占有率最高者）
    pub fn element(&self) -> &str {
        self.species
            .iter()
            .max_by(|a, b| a.occu.partial_cmp(&b.occu).unwrap_or(std::cmp::Ordering::Equal))
            .map(|s| s.element.as_str())
            .unwrap_or(crate::models::element::DUMMY_SYMBOL)
    }
}

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedStructure {
    pub sites: Vec<Site>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lattice: Option<Lattice>,
}

impl ParsedStructure {
    pub fn new(sites: Vec<Site>, lattice: Option<Lattice>) -> Self {
        ParsedStructure { sites, lattice }
    }

    /// 由分数坐标构造位点（需要晶格）
    pub fn site_from_fractional(
        frame: &CoordinateFrame,
        element: impl Into<String>,
        abc: Vec3,
    ) -> Site {
        let xyz = frame.to_cartesian(&abc);
        Site::new(element, xyz, abc)
    }

    /// 由笛卡尔坐标构造位点；没有晶格时 abc 与 xyz 相同
    pub fn site_from_cartesian(
        frame: Option<&CoordinateFrame>,
        element: impl Into<String>,
        xyz: Vec3,
    ) -> Site {
        let abc = frame.map(|f| f.to_fractional(&xyz)).unwrap_or(xyz);
        Site::new(element, xyz, abc)
    }

    /// 计算化学式（按元素字母序）
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&str, f64> = BTreeMap::new();

        for site in &self.sites {
            for sp in &site.species {
                *counts.entry(sp.element.as_str()).or_insert(0.0) += sp.occu;
            }
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if (count - 1.0).abs() < 1e-8 {
                    el.to_string()
                } else if (count - count.round()).abs() < 1e-8 {
                    format!("{}{}", el, count.round() as i64)
                } else {
                    format!("{}{:.3}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn volume(&self) -> Option<f64> {
        self.lattice.as_ref().map(|l| l.volume.abs())
    }
}
