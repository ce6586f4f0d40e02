//! # parse 命令实现
//!
//! 解析单个结构，打印摘要与位点表，或输出 JSON。
//!
//! ## 依赖关系
//! - 使用 `cli/parse.rs` 定义的参数
//! - 使用 `commands/mod.rs` 的读取函数
//! - 使用 `utils/output.rs`

use super::{file_name, load_structure, read_input};
use crate::cli::parse::ParseArgs;
use crate::utils::output;

use structura::{ParsedStructure, Result, Site};
use tabled::{Table, Tabled};

/// 位点表行
#[derive(Debug, Clone, Tabled)]
struct SiteRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Species")]
    species: String,
    #[tabled(rename = "Cartesian (Å)")]
    xyz: String,
    #[tabled(rename = "Fractional")]
    abc: String,
}

fn species_text(site: &Site) -> String {
    site.species
        .iter()
        .map(|sp| {
            if (sp.occu - 1.0).abs() < 1e-8 {
                sp.element.clone()
            } else {
                format!("{}:{:.3}", sp.element, sp.occu)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn triple(v: &[f64; 3]) -> String {
    format!("{:>9.4} {:>9.4} {:>9.4}", v[0], v[1], v[2])
}

fn site_rows(structure: &ParsedStructure, limit: usize) -> Vec<SiteRow> {
    structure
        .sites
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, site)| SiteRow {
            index: i + 1,
            label: site.label.clone(),
            species: species_text(site),
            xyz: triple(&site.xyz),
            abc: triple(&site.abc),
        })
        .collect()
}

/// 执行 parse 命令
pub fn execute(args: ParseArgs) -> Result<()> {
    let options = args.parser.to_options();
    let bytes = read_input(&args.file)?;
    let name = file_name(&args.file);
    let (kind, structure) = load_structure(&bytes, &name, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
        return Ok(());
    }

    output::print_header(&format!("Structure: {}", args.file.display()));
    if let Some(kind) = kind {
        output::print_field("Format", kind.name());
    }
    output::print_structure(&structure);

    if structure.sites.is_empty() {
        output::print_warning("Structure contains no sites");
        return Ok(());
    }

    println!();
    println!("{}", Table::new(site_rows(&structure, args.max_sites)));
    if structure.sites.len() > args.max_sites {
        output::print_info(&format!(
            "{} more site(s) not shown (use --max-sites)",
            structure.sites.len() - args.max_sites
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use structura::Species;

    #[test]
    fn test_species_text_partial_occupancy() {
        let site = Site::with_species(
            vec![Species::new("Fe", 0.5), Species::new("Co", 0.5)],
            [0.0; 3],
            [0.0; 3],
        )
        .unwrap();
        assert_eq!(species_text(&site), "Fe:0.500, Co:0.500");
    }

    #[test]
    fn test_site_rows_respect_limit() {
        let structure = ParsedStructure::new(
            vec![
                Site::new("Ar", [0.0; 3], [0.0; 3]),
                Site::new("Ar", [1.0; 3], [1.0; 3]),
            ],
            None,
        );
        let rows = site_rows(&structure, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].species, "Ar");
    }
}
