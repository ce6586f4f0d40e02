//! # 魔数识别
//!
//! 识别二进制容器签名，以及"认得但不支持"的格式（LAMMPS 二进制 dump、
//! NetCDF、DCD、ASE pickle 轨迹、仍处于压缩状态的数据），
//! 后者返回点名具体格式的错误信息。
//!
//! ## 依赖关系
//! - 被 `detect/mod.rs`, `lib.rs` 使用
//! - 使用 `error.rs`

use super::{strip_compression, FormatKind};
use crate::error::{Result, StructuraError};

/// HDF5 超级块签名
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// ASE ULM 容器签名
pub const ULM_SIGNATURE: &[u8; 8] = b"- of Ulm";

/// 魔数识别结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Magic {
    Format(FormatKind),
    Unsupported {
        format: &'static str,
        message: &'static str,
    },
}

/// 根据开头字节识别
pub fn sniff_magic(bytes: &[u8]) -> Option<Magic> {
    if bytes.starts_with(&HDF5_SIGNATURE) {
        return Some(Magic::Format(FormatKind::Hdf5));
    }
    if bytes.starts_with(ULM_SIGNATURE) {
        return Some(Magic::Format(FormatKind::AseTrajectory));
    }
    if bytes.starts_with(b"PickleTrajectory") {
        return Some(Magic::Unsupported {
            format: "ASE pickle trajectory",
            message: "old pickle-based ASE trajectories are not supported; convert with `ase convert` to the ULM .traj format",
        });
    }
    if bytes.starts_with(&[0x1f, 0x8b]) {
        return Some(Magic::Unsupported {
            format: "gzip",
            message: "payload is still gzip-compressed; decompress before parsing",
        });
    }
    if bytes.starts_with(b"BZh") {
        return Some(Magic::Unsupported {
            format: "bzip2",
            message: "BZ2-compressed payloads must be decompressed before parsing",
        });
    }
    if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        return Some(Magic::Unsupported {
            format: "xz",
            message: "XZ-compressed payloads must be decompressed before parsing",
        });
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return Some(Magic::Unsupported {
            format: "zip",
            message: "ZIP archives must be extracted before parsing",
        });
    }
    if bytes.starts_with(b"CDF\x01") || bytes.starts_with(b"CDF\x02") {
        return Some(Magic::Unsupported {
            format: "NetCDF",
            message: "NetCDF (AMBER/ASE .nc) trajectories are not supported; export to extended XYZ",
        });
    }
    // DCD: Fortran 记录头 84，随后 "CORD"
    if bytes.len() >= 8 && &bytes[4..8] == b"CORD" {
        return Some(Magic::Unsupported {
            format: "DCD",
            message: "DCD trajectories are not supported; export to extended XYZ or LAMMPS text dump",
        });
    }
    None
}

/// 仅凭文件名识别的不支持格式
fn unsupported_by_name(filename: &str) -> Option<(&'static str, &'static str)> {
    let name = strip_compression(filename);
    let ext = name.rsplit_once('.').map(|(_, e)| e)?;
    match ext {
        "bin" if name.contains("dump") || name.contains("lammps") => Some((
            "LAMMPS binary dump",
            "binary LAMMPS dumps are not supported; write a text dump (dump atom/custom) instead",
        )),
        "nc" | "netcdf" => Some((
            "NetCDF",
            "NetCDF trajectories are not supported; export to extended XYZ",
        )),
        "dcd" => Some((
            "DCD",
            "DCD trajectories are not supported; export to extended XYZ or LAMMPS text dump",
        )),
        _ => None,
    }
}

/// 在调用解析器前检查是否为已知但不支持的格式
pub fn check_supported(filename: &str, bytes: &[u8]) -> Result<()> {
    if let Some(Magic::Unsupported { format, message }) = sniff_magic(bytes) {
        return Err(StructuraError::unsupported_binary(format, message));
    }
    if let Some((format, message)) = unsupported_by_name(filename) {
        return Err(StructuraError::unsupported_binary(format, message));
    }
    Ok(())
}
