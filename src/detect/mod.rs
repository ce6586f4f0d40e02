//! # 格式识别
//!
//! 两阶段识别，顺序固定，集中在 [`detect_format`] 一个函数里：
//! 1. 魔数（提供了内容样本时）: HDF5 / ULM 等二进制容器
//! 2. 扩展名表: 反复剥离 `.gz .zip .xz .bz2` 后匹配扩展名/文件名
//! 3. 内容启发式: JSON → XYZ → LAMMPS → XDATCAR/POSCAR → CIF → phonopy
//!
//! 另外提供 UI 用的文件名启发式（是否像轨迹文件）。
//!
//! ## 依赖关系
//! - 被 `lib.rs` 的解析入口使用
//! - 子模块: content, magic

pub mod content;
pub mod magic;

use serde::{Deserialize, Serialize};

pub use content::{detect_from_content, is_multi_frame_xyz};
pub use magic::{check_supported, sniff_magic, Magic};

/// 可识别的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    /// XYZ / extended XYZ（单帧或多帧）
    Xyz,
    /// VASP POSCAR/CONTCAR
    Poscar,
    /// VASP XDATCAR 轨迹
    Xdatcar,
    Cif,
    /// phonopy / phono3py YAML
    PhonopyYaml,
    /// OPTIMADE JSON 响应
    Optimade,
    /// 任意嵌套 JSON（pymatgen 风格结构字典）
    Json,
    /// LAMMPS 文本 dump
    LammpsDump,
    /// ASE ULM 二进制轨迹
    AseTrajectory,
    /// HDF5 轨迹
    Hdf5,
}

impl FormatKind {
    /// 是否为二进制容器
    pub fn is_binary(&self) -> bool {
        matches!(self, FormatKind::AseTrajectory | FormatKind::Hdf5)
    }

    /// 短名称，也用作轨迹元数据中的来源格式
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::Xyz => "xyz",
            FormatKind::Poscar => "poscar",
            FormatKind::Xdatcar => "xdatcar",
            FormatKind::Cif => "cif",
            FormatKind::PhonopyYaml => "phonopy",
            FormatKind::Optimade => "optimade",
            FormatKind::Json => "json",
            FormatKind::LammpsDump => "lammps",
            FormatKind::AseTrajectory => "ase",
            FormatKind::Hdf5 => "hdf5",
        }
    }

    /// 该格式是否天然是多帧轨迹
    pub fn is_trajectory_format(&self) -> bool {
        matches!(
            self,
            FormatKind::Xdatcar
                | FormatKind::LammpsDump
                | FormatKind::AseTrajectory
                | FormatKind::Hdf5
        )
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 压缩后缀（可叠加，如 `.xyz.gz.bz2`）
const COMPRESSION_SUFFIXES: [&str; 5] = [".gz", ".gzip", ".zip", ".xz", ".bz2"];

/// 轨迹关键词（用于 .xyz/.extxyz 文件名）
const TRAJECTORY_KEYWORDS: [&str; 10] = [
    "trajectory",
    "traj",
    "relax",
    "npt",
    "nvt",
    "nve",
    "qha",
    "md",
    "dynamics",
    "simulation",
];

/// 反复剥离压缩后缀，返回小写文件名（不含目录）
pub fn strip_compression(filename: &str) -> String {
    let mut name = basename(filename).to_lowercase();
    loop {
        match COMPRESSION_SUFFIXES.iter().find(|s| name.ends_with(*s)) {
            Some(suffix) => {
                let len = name.len() - suffix.len();
                name.truncate(len);
            }
            None => return name,
        }
    }
}

fn basename(filename: &str) -> &str {
    filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// 扩展名/文件名表
///
/// `.json` 无法仅凭文件名区分 OPTIMADE 与普通 JSON，返回 `Json`，
/// 由调用方结合内容细化。
pub fn detect_from_filename(filename: &str) -> Option<FormatKind> {
    let name = strip_compression(filename);

    if name.contains("xdatcar") {
        return Some(FormatKind::Xdatcar);
    }

    let by_ext = match extension(&name) {
        Some("xyz" | "extxyz") => Some(FormatKind::Xyz),
        Some("cif" | "mcif") => Some(FormatKind::Cif),
        Some("json") => Some(FormatKind::Json),
        Some("yaml" | "yml") => Some(FormatKind::PhonopyYaml),
        Some("poscar" | "contcar" | "vasp") => Some(FormatKind::Poscar),
        Some("h5" | "hdf5") => Some(FormatKind::Hdf5),
        Some("traj") => Some(FormatKind::AseTrajectory),
        Some("lammpstrj" | "dump") => Some(FormatKind::LammpsDump),
        _ => None,
    };
    if by_ext.is_some() {
        return by_ext;
    }

    // 无扩展名的 VASP 文件: POSCAR, CONTCAR, POSCAR_001, Si.poscar ...
    if name.starts_with("poscar") || name.starts_with("contcar") || name.contains("poscar") {
        return Some(FormatKind::Poscar);
    }

    None
}

/// 格式识别主入口
///
/// 顺序: 魔数 → 文件名 → 内容启发式。`.json` 文件名在有内容时细化为
/// `Optimade` 或 `Json`。全部失败返回 `None`。
pub fn detect_format(filename: &str, content_sample: Option<&[u8]>) -> Option<FormatKind> {
    if let Some(Magic::Format(kind)) = content_sample.and_then(sniff_magic) {
        log::debug!("{}: detected {} by magic bytes", filename, kind);
        return Some(kind);
    }

    let sample_text = content_sample.map(String::from_utf8_lossy);

    match detect_from_filename(filename) {
        Some(FormatKind::Json) => {
            let refined = sample_text
                .as_deref()
                .and_then(detect_from_content)
                .filter(|k| matches!(k, FormatKind::Optimade | FormatKind::Json));
            Some(refined.unwrap_or(FormatKind::Json))
        }
        Some(kind) => {
            log::debug!("{}: detected {} by filename", filename, kind);
            Some(kind)
        }
        None => {
            let kind = sample_text.as_deref().and_then(detect_from_content);
            if let Some(kind) = kind {
                log::debug!("{}: detected {} by content", filename, kind);
            }
            kind
        }
    }
}

/// 文件名是否像轨迹文件（UI 用来决定走哪个解析器）
///
/// - 轨迹扩展名 `.traj .lammpstrj .dump .h5 .hdf5` 以及 XDATCAR 始终是轨迹
/// - `.xyz/.extxyz` 只有文件名含关键词（relax, npt, md ...）时才算轨迹
pub fn is_trajectory_filename(filename: &str) -> bool {
    let name = strip_compression(filename);

    if name.contains("xdatcar") {
        return true;
    }

    match extension(&name) {
        Some("traj" | "lammpstrj" | "dump" | "h5" | "hdf5") => true,
        Some("xyz" | "extxyz") => {
            let stem = &name[..name.len() - extension(&name).map_or(0, |e| e.len() + 1)];
            stem.split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| TRAJECTORY_KEYWORDS.contains(&word))
                || TRAJECTORY_KEYWORDS
                    .iter()
                    .filter(|k| k.len() > 3)
                    .any(|k| stem.contains(k))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("structure.xyz", Some(FormatKind::Xyz))]
    #[case("md.extxyz.gz", Some(FormatKind::Xyz))]
    #[case("data/Si.cif.gz.bz2", Some(FormatKind::Cif))]
    #[case("phonopy_disp.yaml", Some(FormatKind::PhonopyYaml))]
    #[case("POSCAR", Some(FormatKind::Poscar))]
    #[case("CONTCAR_relaxed", Some(FormatKind::Poscar))]
    #[case("Si.vasp", Some(FormatKind::Poscar))]
    #[case("XDATCAR", Some(FormatKind::Xdatcar))]
    #[case("run1_XDATCAR.gz", Some(FormatKind::Xdatcar))]
    #[case("md.traj", Some(FormatKind::AseTrajectory))]
    #[case("run.h5", Some(FormatKind::Hdf5))]
    #[case("dump.lammpstrj", Some(FormatKind::LammpsDump))]
    #[case("mp-1.json", Some(FormatKind::Json))]
    #[case("README", None)]
    fn test_detect_from_filename(#[case] name: &str, #[case] expected: Option<FormatKind>) {
        assert_eq!(detect_from_filename(name), expected);
    }

    #[rstest]
    #[case("mp-1184225.extxyz", false)]
    #[case("relax-simulation.xyz", true)]
    #[case("water_npt.xyz.gz", true)]
    #[case("md.xyz", true)]
    #[case("caffeine.xyz", false)]
    #[case("XDATCAR", true)]
    #[case("run.lammpstrj", true)]
    #[case("POSCAR", false)]
    fn test_is_trajectory_filename(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_trajectory_filename(name), expected);
    }

    #[test]
    fn test_strip_compression_repeated() {
        assert_eq!(strip_compression("A/B/Foo.XYZ.gz.xz"), "foo.xyz");
    }

    #[test]
    fn test_detect_json_refined_by_content() {
        let optimade = br#"{"data": {"type": "structures", "id": "x", "attributes": {}}}"#;
        assert_eq!(
            detect_format("mp.json", Some(optimade)),
            Some(FormatKind::Optimade)
        );
        assert_eq!(detect_format("mp.json", None), Some(FormatKind::Json));
    }

    #[test]
    fn test_detect_magic_overrides_filename() {
        let mut bytes = b"- of Ulm".to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(
            detect_format("weird.bin", Some(&bytes)),
            Some(FormatKind::AseTrajectory)
        );
    }
}
