//! # 轨迹统计
//!
//! 帧数、排序后的步数及范围、原子数是否恒定。一次遍历，O(帧数)。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `commands/trajectory.rs`, `batch/` 使用
//! - 使用 `models/trajectory.rs`

use crate::models::{Trajectory, TrajectoryStats};

/// 计算轨迹统计
pub fn trajectory_stats(trajectory: &Trajectory) -> TrajectoryStats {
    let frames = &trajectory.frames;

    let mut steps: Vec<f64> = frames.iter().map(|f| f.step).collect();
    steps.sort_by(f64::total_cmp);
    let step_range = match (steps.first(), steps.last()) {
        (Some(&lo), Some(&hi)) => Some((lo, hi)),
        _ => None,
    };

    let first = frames.first().map(|f| f.structure.sites.len());
    let mut min = first.unwrap_or(0);
    let mut max = min;
    let mut constant = true;
    for frame in frames {
        let n = frame.structure.sites.len();
        if Some(n) != first {
            constant = false;
        }
        min = min.min(n);
        max = max.max(n);
    }

    let (total_atoms, atom_count_range) = if constant {
        (first, None)
    } else {
        (None, Some((min, max)))
    };

    TrajectoryStats {
        frame_count: frames.len(),
        steps,
        step_range,
        constant_atom_count: constant,
        total_atoms,
        atom_count_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frame, ParsedStructure, Site};
    use proptest::prelude::*;

    fn frame(n_sites: usize, step: f64) -> Frame {
        let sites = (0..n_sites)
            .map(|_| Site::new("He", [0.0; 3], [0.0; 3]))
            .collect();
        Frame::new(ParsedStructure::new(sites, None), step)
    }

    #[test]
    fn test_constant_atom_count() {
        let traj = Trajectory {
            frames: vec![frame(3, 20.0), frame(3, 0.0), frame(3, 10.0)],
            ..Default::default()
        };
        let stats = trajectory_stats(&traj);

        assert_eq!(stats.frame_count, 3);
        assert_eq!(stats.steps, vec![0.0, 10.0, 20.0]);
        assert_eq!(stats.step_range, Some((0.0, 20.0)));
        assert!(stats.constant_atom_count);
        assert_eq!(stats.total_atoms, Some(3));
        assert_eq!(stats.atom_count_range, None);
    }

    #[test]
    fn test_variable_atom_count() {
        let traj = Trajectory {
            frames: vec![frame(4, 0.0), frame(2, 1.0), frame(6, 2.0)],
            ..Default::default()
        };
        let stats = trajectory_stats(&traj);

        assert!(!stats.constant_atom_count);
        assert_eq!(stats.total_atoms, None);
        assert_eq!(stats.atom_count_range, Some((2, 6)));
    }

    #[test]
    fn test_empty() {
        let stats = trajectory_stats(&Trajectory::default());
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.step_range, None);
    }

    proptest! {
        #[test]
        fn prop_frame_count_and_constancy(counts in prop::collection::vec(1usize..6, 1..12)) {
            let frames: Vec<Frame> = counts
                .iter()
                .enumerate()
                .map(|(i, &n)| frame(n, i as f64))
                .collect();
            let traj = Trajectory { frames, ..Default::default() };
            let stats = trajectory_stats(&traj);

            prop_assert_eq!(stats.frame_count, counts.len());
            let all_same = counts.iter().all(|&n| n == counts[0]);
            prop_assert_eq!(stats.constant_atom_count, all_same);
            if all_same {
                prop_assert_eq!(stats.total_atoms, Some(counts[0]));
            } else {
                let lo = *counts.iter().min().unwrap();
                let hi = *counts.iter().max().unwrap();
                prop_assert_eq!(stats.atom_count_range, Some((lo, hi)));
            }
        }
    }
}
