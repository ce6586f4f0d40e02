//! # 轨迹校验
//!
//! 事后检查结构不变量，返回按发现顺序排列的错误描述列表（空列表表示有效）。
//! 不返回 `Err`、不提前退出：一次调用报告全部问题。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `commands/trajectory.rs` 使用
//! - 使用 `models/trajectory.rs`

use crate::models::Trajectory;

/// 校验轨迹
pub fn validate_trajectory(trajectory: &Trajectory) -> Vec<String> {
    let mut errors = Vec::new();

    if trajectory.frames.is_empty() {
        errors.push("Trajectory must contain at least one frame".to_string());
    }

    for (i, frame) in trajectory.frames.iter().enumerate() {
        if frame.structure.sites.is_empty() {
            errors.push(format!("Frame {} has no sites", i));
        }
        if !frame.step.is_finite() {
            errors.push(format!("Frame {} has non-finite step {}", i, frame.step));
        }
    }

    validate_streaming(trajectory, &mut errors);
    errors
}

/// 流式字段之间的一致性
fn validate_streaming(trajectory: &Trajectory, errors: &mut Vec<String>) {
    if let Some(total) = trajectory.total_frames {
        if total < 0 {
            errors.push(format!("total_frames must be non-negative, got {}", total));
        }
    }

    if trajectory.is_indexed && trajectory.indexed_frames.is_empty() {
        errors.push("Indexed trajectory has no indexed_frames".to_string());
    }

    // 未标记 is_indexed 但带有索引条目时同样检查
    if !trajectory.is_indexed && trajectory.indexed_frames.is_empty() {
        return;
    }

    for (i, entry) in trajectory.indexed_frames.iter().enumerate() {
        if entry.frame_number != i as i64 {
            errors.push(format!(
                "indexed_frames[{}].frame_number is {}, expected {}",
                i, entry.frame_number, i
            ));
        }
        if entry.byte_offset < 0 {
            errors.push(format!(
                "indexed_frames[{}].byte_offset is negative ({})",
                i, entry.byte_offset
            ));
        }
        if entry.estimated_size < 0 {
            errors.push(format!(
                "indexed_frames[{}].estimated_size is negative ({})",
                i, entry.estimated_size
            ));
        }
    }

    if let Some(total) = trajectory.total_frames {
        let indexed = trajectory.indexed_frames.len() as i64;
        if total >= 0 && total != indexed {
            errors.push(format!(
                "total_frames ({}) does not match indexed_frames length ({})",
                total, indexed
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frame, FrameIndex, ParsedStructure, Site};

    fn frame(n_sites: usize, step: f64) -> Frame {
        let sites = (0..n_sites)
            .map(|_| Site::new("H", [0.0; 3], [0.0; 3]))
            .collect();
        Frame::new(ParsedStructure::new(sites, None), step)
    }

    fn trajectory(frames: Vec<Frame>) -> Trajectory {
        Trajectory {
            frames,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_trajectory() {
        let traj = trajectory(vec![frame(2, 0.0), frame(2, 7.0)]);
        assert!(validate_trajectory(&traj).is_empty());
    }

    #[test]
    fn test_empty_trajectory() {
        let errors = validate_trajectory(&trajectory(vec![]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at least one frame"));
    }

    #[test]
    fn test_all_defects_reported_in_order() {
        let traj = trajectory(vec![frame(0, 0.0), frame(1, f64::NAN)]);
        let errors = validate_trajectory(&traj);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Frame 0 has no sites"));
        assert!(errors[1].contains("Frame 1 has non-finite step"));
    }

    #[test]
    fn test_streaming_defects() {
        let mut traj = trajectory(vec![frame(1, 0.0)]);
        traj.is_indexed = true;
        traj.total_frames = Some(-1);
        traj.indexed_frames = vec![FrameIndex {
            frame_number: 3,
            byte_offset: 0,
            estimated_size: 10,
        }];

        let errors = validate_trajectory(&traj);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("total_frames must be non-negative"));
        assert!(errors[1].contains("indexed_frames[0].frame_number is 3"));
    }

    #[test]
    fn test_stale_total_frames_without_indexed_flag() {
        let mut traj = trajectory(vec![frame(1, 0.0)]);
        traj.total_frames = Some(5);
        traj.indexed_frames = vec![FrameIndex {
            frame_number: 0,
            byte_offset: 0,
            estimated_size: 10,
        }];

        let errors = validate_trajectory(&traj);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("total_frames (5) does not match indexed_frames length (1)"));
    }

    #[test]
    fn test_total_frames_alone_is_not_checked_against_index() {
        let mut traj = trajectory(vec![frame(1, 0.0)]);
        traj.total_frames = Some(5);
        assert!(validate_trajectory(&traj).is_empty());
    }

    #[test]
    fn test_indexed_without_entries() {
        let mut traj = trajectory(vec![frame(1, 0.0)]);
        traj.is_indexed = true;
        traj.total_frames = Some(4);
        let errors = validate_trajectory(&traj);
        assert!(errors.iter().any(|e| e.contains("no indexed_frames")));
        assert!(errors.iter().any(|e| e.contains("does not match")));
    }
}
