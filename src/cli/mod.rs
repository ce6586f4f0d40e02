//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `detect`: 识别文件格式
//! - `parse`: 解析单个结构并打印摘要
//! - `trajectory`: 解析轨迹并打印统计与校验结果
//! - `batch`: 并行解析目录下的文件并汇总
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: detect, parse, trajectory, batch
//! - 解析相关参数统一映射到 `structura::ParseOptions`

pub mod batch;
pub mod detect;
pub mod parse;
pub mod trajectory;

use clap::{Args, Parser, Subcommand, ValueEnum};
use structura::options::DEFAULT_INDEX_LOAD_FRAMES;
use structura::parsers::phonopy::PhonopyCell;
use structura::ParseOptions;

/// Structura - 原子结构与轨迹读取工具
#[derive(Parser)]
#[command(name = "structura")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Read atomic structures and trajectories from common simulation file formats", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Identify the format of a structure or trajectory file
    Detect(detect::DetectArgs),

    /// Parse a single structure and print a summary
    Parse(parse::ParseArgs),

    /// Parse a trajectory and print statistics and validation results
    Trajectory(trajectory::TrajectoryArgs),

    /// Parse every matching file under a directory in parallel
    Batch(batch::BatchArgs),
}

/// phonopy 晶胞选择（命令行取值）
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CellChoice {
    /// primitive_cell
    PrimitiveCell,
    /// unit_cell
    UnitCell,
    /// supercell
    Supercell,
    /// phonon_primitive_cell
    PhononPrimitiveCell,
    /// phonon_supercell
    PhononSupercell,
}

impl From<CellChoice> for PhonopyCell {
    fn from(choice: CellChoice) -> Self {
        match choice {
            CellChoice::PrimitiveCell => PhonopyCell::PrimitiveCell,
            CellChoice::UnitCell => PhonopyCell::UnitCell,
            CellChoice::Supercell => PhonopyCell::Supercell,
            CellChoice::PhononPrimitiveCell => PhonopyCell::PhononPrimitiveCell,
            CellChoice::PhononSupercell => PhonopyCell::PhononSupercell,
        }
    }
}

/// 各解析子命令共享的解析选项
#[derive(Args, Debug, Clone)]
pub struct ParserArgs {
    /// Fail on unparseable CIF cell parameters instead of defaulting them
    #[arg(long, env = "STRUCTURA_CIF_STRICT")]
    pub cif_strict: bool,

    /// Keep CIF fractional coordinates outside [0, 1) as written
    #[arg(long)]
    pub no_cif_wrap: bool,

    /// Do not expand CIF symmetry operations
    #[arg(long)]
    pub no_symmetry: bool,

    /// Which phonopy cell to read (default: first available)
    #[arg(long, value_enum, env = "STRUCTURA_PHONOPY_CELL")]
    pub phonopy_cell: Option<CellChoice>,

    /// Stop after materializing this many trajectory frames
    #[arg(long, env = "STRUCTURA_MAX_FRAMES")]
    pub max_frames: Option<usize>,

    /// Frames parsed up front in indexed mode
    #[arg(long, env = "STRUCTURA_INDEX_LOAD_FRAMES", default_value_t = DEFAULT_INDEX_LOAD_FRAMES)]
    pub index_load_frames: usize,
}

impl ParserArgs {
    /// 映射为库的解析选项
    pub fn to_options(&self) -> ParseOptions {
        ParseOptions {
            cif_strict: self.cif_strict,
            cif_wrap_fractional: !self.no_cif_wrap,
            cif_apply_symmetry: !self.no_symmetry,
            phonopy_cell: self.phonopy_cell.map(PhonopyCell::from),
            max_frames: self.max_frames,
            index_load_frames: self.index_load_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parser_args_mapping() {
        let cli = Cli::try_parse_from([
            "structura",
            "parse",
            "POSCAR",
            "--no-symmetry",
            "--phonopy-cell",
            "unit-cell",
            "--max-frames",
            "5",
        ])
        .unwrap();
        let Commands::Parse(args) = cli.command else {
            panic!("expected parse subcommand");
        };
        let options = args.parser.to_options();
        assert!(!options.cif_apply_symmetry);
        assert!(options.cif_wrap_fractional);
        assert_eq!(options.phonopy_cell, Some(PhonopyCell::UnitCell));
        assert_eq!(options.max_frames, Some(5));
        assert_eq!(options.index_load_frames, DEFAULT_INDEX_LOAD_FRAMES);
    }

    #[test]
    fn test_every_cell_choice_maps_to_its_key() {
        for choice in CellChoice::value_variants() {
            let name = choice.to_possible_value().unwrap().get_name().replace('-', "_");
            assert_eq!(PhonopyCell::from(*choice).key(), name);
        }
    }

    #[test]
    fn test_verbosity_count() {
        let cli = Cli::try_parse_from(["structura", "-vv", "detect", "a.xyz"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
