//! # 流式帧索引
//!
//! 大型 XYZ 轨迹不必一次解析全部帧：先建立 `FrameIndex`（帧号、字节偏移、
//! 估计大小），只立即解析前若干帧，其余帧由调用方按偏移按需读取。
//! 每次按索引访问都是独立、可重入的，不持有跨调用的游标状态。
//!
//! 绘图元数据（能量、步数等）只读注释行即可得到，不解析原子行。
//!
//! ## 依赖关系
//! - 被 `lib.rs` 的 `parse_trajectory_indexed` 使用
//! - 使用 `parsers/xyz.rs`, `trajectory/assemble.rs`

use crate::error::{Result, StructuraError};
use crate::models::{Frame, FrameIndex, MetaValue, PlotMetadata, Trajectory};
use crate::parsers::xyz::{parse_block, parse_comment, split_frames};
use crate::trajectory::assemble::TrajectoryBuilder;
use std::collections::BTreeMap;

/// 为 XYZ 文本建立帧索引
pub fn build_xyz_index(content: &str) -> Vec<FrameIndex> {
    split_frames(content)
        .iter()
        .enumerate()
        .map(|(i, block)| FrameIndex {
            frame_number: i as i64,
            byte_offset: block.byte_offset as i64,
            estimated_size: block.byte_len as i64,
        })
        .collect()
}

/// 按索引条目解析单帧
pub fn parse_indexed_frame(content: &str, entry: &FrameIndex) -> Result<Frame> {
    let start = usize::try_from(entry.byte_offset).map_err(|_| {
        StructuraError::InvalidArgument(format!("negative byte offset {}", entry.byte_offset))
    })?;
    let size = usize::try_from(entry.estimated_size).map_err(|_| {
        StructuraError::InvalidArgument(format!("negative frame size {}", entry.estimated_size))
    })?;
    let end = start.saturating_add(size).min(content.len());

    let slice = content.get(start..end).ok_or_else(|| {
        StructuraError::InvalidArgument(format!(
            "frame {} range {}..{} is outside the content",
            entry.frame_number, start, end
        ))
    })?;

    let blocks = split_frames(slice);
    let block = blocks.first().ok_or_else(|| {
        StructuraError::malformed(
            "xyz",
            format!("no frame found at byte offset {}", entry.byte_offset),
        )
    })?;
    let frame_number = usize::try_from(entry.frame_number).unwrap_or(0);
    parse_block(block, frame_number)
}

/// 从注释行提取绘图元数据
pub fn extract_plot_metadata(content: &str) -> Vec<PlotMetadata> {
    split_frames(content)
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let info = parse_comment(block.comment);
            let meta = &info.metadata;
            let mut properties = BTreeMap::new();

            let known = [
                ("energy", meta.energy),
                ("temperature", meta.temperature),
                ("pressure", meta.pressure),
                ("volume", meta.volume),
                ("bandgap", meta.bandgap),
            ];
            for (key, value) in known {
                if let Some(v) = value {
                    properties.insert(key.to_string(), MetaValue::Float(v));
                }
            }
            if let Some(e) = meta.energy {
                properties.insert(
                    "energy_per_atom".to_string(),
                    MetaValue::Float(e / block.count as f64),
                );
            }
            for (key, value) in &meta.extra {
                if value.as_f64().is_some() {
                    properties.insert(key.clone(), value.clone());
                }
            }

            PlotMetadata {
                frame_number: i,
                step: info.step.unwrap_or(i as f64),
                properties,
            }
        })
        .collect()
}

/// 建立索引并只解析前 `load_frames` 帧
pub fn index_xyz_trajectory(content: &str, load_frames: usize) -> Result<Trajectory> {
    let index = build_xyz_index(content);
    if index.is_empty() {
        return Err(StructuraError::malformed(
            "xyz",
            "no valid atom-count framed block found",
        ));
    }

    let mut builder = TrajectoryBuilder::new("xyz");
    for entry in index.iter().take(load_frames.max(1)) {
        let number = usize::try_from(entry.frame_number).unwrap_or(0);
        builder.push_result(number, parse_indexed_frame(content, entry));
    }

    let mut trajectory = builder.finish()?;
    trajectory.total_frames = Some(index.len() as i64);
    trajectory.plot_metadata = extract_plot_metadata(content);
    trajectory.indexed_frames = index;
    trajectory.is_indexed = true;

    log::debug!(
        "Indexed {} xyz frame(s), loaded {}",
        trajectory.indexed_frames.len(),
        trajectory.frames.len()
    );
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::validate::validate_trajectory;

    const CONTENT: &str = "2\nenergy=-1.0 step=0\nH 0 0 0\nH 0 0 0.7\n\
2\nenergy=-1.5 step=10\nH 0 0 0\nH 0 0 0.75\n\
2\nenergy=-2.0 step=20\nH 0 0 0\nH 0 0 0.8\n";

    #[test]
    fn test_index_offsets() {
        let index = build_xyz_index(CONTENT);
        assert_eq!(index.len(), 3);
        assert_eq!(index[0].byte_offset, 0);
        assert_eq!(
            index[1].byte_offset,
            index[0].byte_offset + index[0].estimated_size
        );
        assert!(CONTENT[index[2].byte_offset as usize..].starts_with("2\nenergy=-2.0"));
    }

    #[test]
    fn test_parse_indexed_frame_is_independent() {
        let index = build_xyz_index(CONTENT);
        let last = parse_indexed_frame(CONTENT, &index[2]).unwrap();
        let again = parse_indexed_frame(CONTENT, &index[2]).unwrap();

        assert_eq!(last, again);
        assert_eq!(last.step, 20.0);
        assert!((last.structure.sites[1].xyz[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_entry() {
        let entry = FrameIndex {
            frame_number: 0,
            byte_offset: 10_000,
            estimated_size: 10,
        };
        assert!(parse_indexed_frame(CONTENT, &entry).is_err());
    }

    #[test]
    fn test_indexed_trajectory() {
        let traj = index_xyz_trajectory(CONTENT, 1).unwrap();

        assert!(traj.is_indexed);
        assert_eq!(traj.frames.len(), 1);
        assert_eq!(traj.total_frames, Some(3));
        assert_eq!(traj.plot_metadata.len(), 3);
        assert_eq!(traj.plot_metadata[1].step, 10.0);
        assert_eq!(
            traj.plot_metadata[2].properties.get("energy"),
            Some(&MetaValue::Float(-2.0))
        );
        assert!(validate_trajectory(&traj).is_empty());
    }
}
