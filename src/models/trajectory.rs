//! # 轨迹数据模型
//!
//! `Frame` = 结构 + 步数 + 元数据；`Trajectory` = 帧序列 + 轨迹元数据，
//! 外加可选的流式索引字段（大文件按需加载时使用）。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `binary/`, `trajectory/` 使用
//! - 使用 `models/structure.rs`, `models/metadata.rs`

use crate::models::metadata::{FrameMetadata, MetaValue, TrajectoryMetadata};
use crate::models::structure::ParsedStructure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub structure: ParsedStructure,

    /// 模拟步数，不要求连续或从 0 开始
    pub step: f64,

    #[serde(default)]
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(structure: ParsedStructure, step: f64) -> Self {
        Frame {
            structure,
            step,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: FrameMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 流式索引条目：帧在原始字节流中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameIndex {
    pub frame_number: i64,
    pub byte_offset: i64,
    pub estimated_size: i64,
}

/// 无需解析原子即可获得的绘图用数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotMetadata {
    pub frame_number: usize,
    pub step: f64,
    #[serde(default)]
    pub properties: BTreeMap<String, MetaValue>,
}

/// 轨迹
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub frames: Vec<Frame>,

    #[serde(default)]
    pub metadata: TrajectoryMetadata,

    // ─────────────────────────────────────────────────────────────
    // 流式字段
    // ─────────────────────────────────────────────────────────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexed_frames: Vec<FrameIndex>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plot_metadata: Vec<PlotMetadata>,

    #[serde(default)]
    pub is_indexed: bool,
}

impl Trajectory {
    pub fn new(frames: Vec<Frame>, metadata: TrajectoryMetadata) -> Self {
        Trajectory {
            frames,
            metadata,
            ..Default::default()
        }
    }
}

/// 轨迹统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub frame_count: usize,

    /// 升序排列的步数
    pub steps: Vec<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_range: Option<(f64, f64)>,

    pub constant_atom_count: bool,

    /// 原子数恒定时给出
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_atoms: Option<usize>,

    /// 原子数变化时给出 [min, max]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atom_count_range: Option<(usize, usize)>,
}
