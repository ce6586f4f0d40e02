//! # 二进制容器解码
//!
//! ASE ULM 轨迹与 HDF5 轨迹。二者只接受原始字节，
//! 签名不符时直接报错，不会退回文本解析。
//!
//! ## 依赖关系
//! - 被 `lib.rs` 使用
//! - 子模块: cursor, ase, hdf5

pub mod ase;
pub mod cursor;
pub mod hdf5;

use crate::detect::FormatKind;
use crate::error::{Result, StructuraError};
use crate::models::Trajectory;
use crate::options::ParseOptions;

/// 形状对应的元素个数；乘积溢出时为 `None`
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// 按格式解码二进制轨迹
pub fn parse_binary_trajectory(
    kind: FormatKind,
    bytes: &[u8],
    filename: Option<&str>,
    options: &ParseOptions,
) -> Result<Trajectory> {
    match kind {
        FormatKind::AseTrajectory => ase::parse_ase(bytes, options.max_frames),
        FormatKind::Hdf5 => hdf5::parse_hdf5(bytes, filename, options.max_frames),
        other => Err(StructuraError::UnsupportedFormat(format!(
            "{} is not a binary container format",
            other
        ))),
    }
}
