//! # 轨迹模块
//!
//! 帧序列的组装、流式索引、校验与统计。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `parsers/`, `binary/` 使用
//! - 子模块: assemble, index, validate, stats

pub mod assemble;
pub mod index;
pub mod stats;
pub mod validate;

pub use assemble::{assemble_trajectory, TrajectoryBuilder};
pub use index::{build_xyz_index, extract_plot_metadata, index_xyz_trajectory, parse_indexed_frame};
pub use stats::trajectory_stats;
pub use validate::validate_trajectory;
