//! # OPTIMADE JSON 解析器
//!
//! 识别条件: `data.type == "structures"` 且 `data.id`、`data.attributes` 非空；
//! `data` 也可以是只含一个元素的数组。
//!
//! 必需属性 `cartesian_site_positions` 与 `species_at_sites` 等长；
//! `lattice_vectors`（行向量）可选，`dimension_types` 给出周期性。
//! `species` 列表把位点上的物种名映射到 `chemical_symbols` + `concentration`。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `detect/content.rs`, `parsers/json.rs` 使用
//! - 使用 `models/`, `serde_json`

use crate::error::{Result, StructuraError};
use crate::models::element::{normalize_symbol, DUMMY_SYMBOL};
use crate::models::{Lattice, ParsedStructure, Site, Species};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const FORMAT: &str = "optimade";

#[derive(Debug, Deserialize)]
struct OptimadeSpecies {
    name: String,
    chemical_symbols: Vec<String>,
    #[serde(default)]
    concentration: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OptimadeAttributes {
    #[serde(default)]
    lattice_vectors: Option<Vec<Vec<Option<f64>>>>,
    cartesian_site_positions: Vec<[f64; 3]>,
    species_at_sites: Vec<String>,
    #[serde(default)]
    species: Vec<OptimadeSpecies>,
    #[serde(default)]
    dimension_types: Option<Vec<u8>>,
}

/// 取出结构条目（`data` 对象或只含一个元素的 `data` 数组）
fn entry(value: &Value) -> Option<&Value> {
    match value.get("data")? {
        Value::Array(items) if items.len() == 1 => items.first(),
        data @ Value::Object(_) => Some(data),
        _ => None,
    }
}

/// 是否为 OPTIMADE 结构响应
pub fn is_optimade(value: &Value) -> bool {
    entry(value).map_or(false, |data| {
        data.get("type").and_then(Value::as_str) == Some("structures")
            && data.get("id").map_or(false, |v| !v.is_null())
            && data.get("attributes").map_or(false, |v| !v.is_null())
    })
}

fn lattice_from(attributes: &OptimadeAttributes) -> Option<Lattice> {
    let rows = attributes.lattice_vectors.as_ref()?;
    if rows.len() != 3 {
        log::warn!("OPTIMADE lattice_vectors has {} rows; ignoring lattice", rows.len());
        return None;
    }
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in rows.iter().enumerate() {
        if row.len() != 3 || row.iter().any(Option::is_none) {
            log::debug!("OPTIMADE lattice vector {} has null entries; structure is non-periodic", i);
            return None;
        }
        for (j, v) in row.iter().enumerate() {
            matrix[i][j] = v.unwrap_or(0.0);
        }
    }

    let mut lattice = Lattice::from_matrix(matrix);
    if let Some(dims) = attributes.dimension_types.as_ref().filter(|d| d.len() == 3) {
        lattice = lattice.with_pbc([dims[0] == 1, dims[1] == 1, dims[2] == 1]);
    }
    Some(lattice)
}

fn species_for(name: &str, table: &HashMap<&str, &OptimadeSpecies>) -> Vec<Species> {
    if let Some(entry) = table.get(name) {
        let species: Vec<Species> = entry
            .chemical_symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.as_str() != "vacancy")
            .map(|(k, symbol)| {
                let occu = entry.concentration.get(k).copied().unwrap_or(1.0);
                let element = normalize_symbol(symbol).unwrap_or(DUMMY_SYMBOL);
                Species::new(element, occu)
            })
            .collect();
        if !species.is_empty() {
            return species;
        }
    }
    let element = normalize_symbol(name).unwrap_or_else(|| {
        log::warn!("Unrecognized OPTIMADE species '{}', using '{}'", name, DUMMY_SYMBOL);
        DUMMY_SYMBOL
    });
    vec![Species::new(element, 1.0)]
}

/// 从已解析的 JSON 值构造结构
pub fn parse_optimade_value(value: &Value) -> Result<ParsedStructure> {
    let data = entry(value)
        .filter(|_| is_optimade(value))
        .ok_or_else(|| StructuraError::malformed(FORMAT, "not an OPTIMADE structures response"))?;
    let attributes_value = data
        .get("attributes")
        .cloned()
        .ok_or_else(|| StructuraError::malformed(FORMAT, "missing attributes"))?;
    let attributes: OptimadeAttributes = serde_json::from_value(attributes_value).map_err(|e| {
        StructuraError::malformed(FORMAT, format!("invalid structure attributes: {}", e))
    })?;

    if attributes.cartesian_site_positions.len() != attributes.species_at_sites.len() {
        return Err(StructuraError::malformed(
            FORMAT,
            format!(
                "{} cartesian_site_positions but {} species_at_sites",
                attributes.cartesian_site_positions.len(),
                attributes.species_at_sites.len()
            ),
        ));
    }

    let lattice = lattice_from(&attributes);
    let frame = lattice.as_ref().map(Lattice::frame);
    let table: HashMap<&str, &OptimadeSpecies> = attributes
        .species
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();

    let sites = attributes
        .cartesian_site_positions
        .iter()
        .zip(&attributes.species_at_sites)
        .map(|(xyz, name)| {
            let abc = frame.as_ref().map(|f| f.to_fractional(xyz)).unwrap_or(*xyz);
            Ok(Site::with_species(species_for(name, &table), *xyz, abc)?.with_label(name.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedStructure::new(sites, lattice))
}

/// 解析 OPTIMADE JSON 文本
pub fn parse_optimade(content: &str) -> Result<ParsedStructure> {
    let value: Value = serde_json::from_str(content)?;
    parse_optimade_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> Value {
        json!({
            "data": {
                "type": "structures",
                "id": "mp-22862",
                "attributes": {
                    "lattice_vectors": [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]],
                    "cartesian_site_positions": [[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]],
                    "species_at_sites": ["Na", "Cl"],
                    "species": [
                        {"name": "Na", "chemical_symbols": ["Na"], "concentration": [1.0]},
                        {"name": "Cl", "chemical_symbols": ["Cl"], "concentration": [1.0]}
                    ],
                    "dimension_types": [1, 1, 0]
                }
            }
        })
    }

    #[test]
    fn test_is_optimade() {
        assert!(is_optimade(&response()));
        assert!(is_optimade(&json!({"data": [response()["data"].clone()]})));
        assert!(!is_optimade(&json!({"data": {"type": "references", "id": "x", "attributes": {}}})));
        assert!(!is_optimade(&json!({"data": {"type": "structures", "id": null, "attributes": {}}})));
    }

    #[test]
    fn test_parse_response() {
        let structure = parse_optimade_value(&response()).unwrap();
        let lattice = structure.lattice.as_ref().unwrap();

        assert_eq!(structure.sites.len(), 2);
        assert_eq!(lattice.pbc, [true, true, false]);
        assert!((structure.sites[1].abc[0] - 0.5).abs() < 1e-12);
        assert_eq!(structure.formula(), "ClNa");
    }

    #[test]
    fn test_partial_occupancy_species() {
        let mut value = response();
        value["data"]["attributes"]["species_at_sites"] = json!(["NaK", "Cl"]);
        value["data"]["attributes"]["species"][0] = json!({
            "name": "NaK", "chemical_symbols": ["Na", "K"], "concentration": [0.5, 0.5]
        });
        let structure = parse_optimade_value(&value).unwrap();
        assert_eq!(structure.sites[0].species.len(), 2);
        assert_eq!(structure.sites[0].species[1].element, "K");
    }

    #[test]
    fn test_length_mismatch() {
        let mut value = response();
        value["data"]["attributes"]["species_at_sites"] = json!(["Na"]);
        assert!(matches!(
            parse_optimade_value(&value),
            Err(StructuraError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_molecule_without_lattice() {
        let mut value = response();
        value["data"]["attributes"]["lattice_vectors"] =
            json!([[null, null, null], [null, null, null], [null, null, null]]);
        let structure = parse_optimade_value(&value).unwrap();
        assert!(structure.lattice.is_none());
        assert_eq!(structure.sites[1].abc, [2.0, 2.0, 2.0]);
    }
}
