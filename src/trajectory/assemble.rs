//! # 轨迹组装
//!
//! 把各解析器产出的帧拼成 `Trajectory`：
//! - 步数原样透传（允许不连续）
//! - 补全派生元数据（每原子能量、体积）
//! - 单帧失败时记录警告并跳过；一帧都没有时报错
//!
//! ## 依赖关系
//! - 被 `parsers/`, `binary/` 的轨迹解析使用
//! - 使用 `models/`

use crate::error::{Result, StructuraError};
use crate::models::{Frame, FrameMetadata, ParsedStructure, Trajectory, TrajectoryMetadata};

/// 轨迹构建器
#[derive(Debug)]
pub struct TrajectoryBuilder {
    format: &'static str,
    frames: Vec<Frame>,
    metadata: TrajectoryMetadata,
    skipped: usize,
}

impl TrajectoryBuilder {
    pub fn new(format: &'static str) -> Self {
        TrajectoryBuilder {
            format,
            frames: Vec::new(),
            metadata: TrajectoryMetadata::for_format(format),
            skipped: 0,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut TrajectoryMetadata {
        &mut self.metadata
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 追加一帧并补全派生元数据
    pub fn push(&mut self, mut frame: Frame) {
        let n_sites = frame.structure.sites.len();
        let volume = frame.structure.volume();
        frame.metadata.derive(n_sites, volume);
        self.frames.push(frame);
    }

    /// 追加结构 + 步数 + 元数据
    pub fn push_parts(&mut self, structure: ParsedStructure, step: f64, metadata: FrameMetadata) {
        self.push(Frame::new(structure, step).with_metadata(metadata));
    }

    /// 追加单帧解析结果，失败时记录警告并跳过
    pub fn push_result(&mut self, index: usize, result: Result<Frame>) {
        match result {
            Ok(frame) => self.push(frame),
            Err(e) => {
                self.skipped += 1;
                self.metadata
                    .warn(format!("Skipping malformed {} frame {}: {}", self.format, index, e));
            }
        }
    }

    /// 完成组装；没有任何有效帧时报错
    pub fn finish(self) -> Result<Trajectory> {
        if self.frames.is_empty() {
            return Err(StructuraError::malformed(
                self.format,
                format!("no valid frames found ({} malformed frame(s) skipped)", self.skipped),
            ));
        }
        log::debug!(
            "Assembled {} trajectory: {} frame(s), {} skipped",
            self.format,
            self.frames.len(),
            self.skipped
        );
        Ok(Trajectory::new(self.frames, self.metadata))
    }
}

/// 直接由帧列表组装
pub fn assemble_trajectory(
    format: &'static str,
    frames: impl IntoIterator<Item = Frame>,
) -> Result<Trajectory> {
    let mut builder = TrajectoryBuilder::new(format);
    for frame in frames {
        builder.push(frame);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lattice, Site};

    fn structure(n: usize) -> ParsedStructure {
        let sites = (0..n)
            .map(|i| Site::new("H", [i as f64, 0.0, 0.0], [i as f64, 0.0, 0.0]))
            .collect();
        ParsedStructure::new(sites, Some(Lattice::from_parameters(2.0, 2.0, 2.0, 90.0, 90.0, 90.0)))
    }

    #[test]
    fn test_steps_threaded_through() {
        let frames = vec![
            Frame::new(structure(2), 10.0),
            Frame::new(structure(2), 5.0),
            Frame::new(structure(2), 100.0),
        ];
        let traj = assemble_trajectory("test", frames).unwrap();
        let steps: Vec<f64> = traj.frames.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![10.0, 5.0, 100.0]);
        assert_eq!(traj.frames[0].metadata.volume, Some(8.0));
    }

    #[test]
    fn test_energy_per_atom_derived() {
        let mut builder = TrajectoryBuilder::new("test");
        let meta = FrameMetadata {
            energy: Some(-8.0),
            ..Default::default()
        };
        builder.push_parts(structure(4), 0.0, meta);
        let traj = builder.finish().unwrap();
        assert_eq!(traj.frames[0].metadata.energy_per_atom, Some(-2.0));
    }

    #[test]
    fn test_all_frames_malformed_is_fatal() {
        let mut builder = TrajectoryBuilder::new("test");
        builder.push_result(0, Err(StructuraError::malformed("test", "bad")));
        assert!(builder.finish().is_err());
    }
}
