//! # 数据模型模块
//!
//! 定义统一的结构、轨迹及元数据模型。所有值均由一次解析调用创建，
//! 之后作为不可变值由调用方独占。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `binary/`, `trajectory/` 使用
//! - 子模块: element, metadata, structure, trajectory

pub mod element;
pub mod metadata;
pub mod structure;
pub mod trajectory;

pub use metadata::{FrameMetadata, MetaValue, SiteProperties, TrajectoryMetadata};
pub use structure::{Lattice, ParsedStructure, Site, Species};
pub use trajectory::{Frame, FrameIndex, PlotMetadata, Trajectory, TrajectoryStats};
