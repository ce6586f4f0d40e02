//! # 通用嵌套 JSON 解析器
//!
//! 在任意 JSON 中深度优先查找形如 pymatgen 结构字典的对象：
//! `{ "sites": [ { "species": [...], "abc" | "xyz": [...] }, ... ], "lattice"?: {...} }`，
//! 返回第一个匹配。遍历用显式栈，已访问集合按节点地址（而非值）判重。
//!
//! ## 依赖关系
//! - 被 `lib.rs`, `detect/content.rs` 使用
//! - 使用 `parsers/optimade.rs`, `models/`, `serde_json`

use crate::error::{Result, StructuraError};
use crate::models::element::{normalize_symbol, DUMMY_SYMBOL};
use crate::models::{Lattice, MetaValue, ParsedStructure, Site, SiteProperties, Species};
use crate::parsers::optimade;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

const FORMAT: &str = "json";

/// 结构查找结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StructureSearch<'a> {
    Found(&'a Map<String, Value>),
    NotFound,
}

impl<'a> StructureSearch<'a> {
    pub fn is_some(&self) -> bool {
        matches!(self, StructureSearch::Found(_))
    }
}

fn is_site(value: &Value) -> bool {
    let Some(site) = value.as_object() else {
        return false;
    };
    let has_species = site
        .get("species")
        .and_then(Value::as_array)
        .map_or(false, |s| !s.is_empty());
    has_species && (site.contains_key("abc") || site.contains_key("xyz"))
}

fn is_structure(map: &Map<String, Value>) -> bool {
    map.get("sites")
        .and_then(Value::as_array)
        .map_or(false, |sites| !sites.is_empty() && sites.iter().all(is_site))
}

/// 深度优先查找第一个结构字典
pub fn find_structure(root: &Value) -> StructureSearch<'_> {
    let mut visited: HashSet<*const Value> = HashSet::new();
    let mut stack: Vec<&Value> = vec![root];

    while let Some(node) = stack.pop() {
        if !visited.insert(node as *const Value) {
            continue;
        }
        match node {
            Value::Object(map) => {
                if is_structure(map) {
                    return StructureSearch::Found(map);
                }
                // 逆序入栈，保证按文档顺序访问
                stack.extend(map.values().rev());
            }
            Value::Array(items) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }
    StructureSearch::NotFound
}

#[derive(Debug, Deserialize)]
struct JsonSpecies {
    element: String,
    #[serde(default)]
    occu: Option<f64>,
    #[serde(default)]
    oxidation_state: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct JsonSite {
    species: Vec<JsonSpecies>,
    #[serde(default)]
    abc: Option<[f64; 3]>,
    #[serde(default)]
    xyz: Option<[f64; 3]>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct JsonLattice {
    matrix: [[f64; 3]; 3],
    #[serde(default)]
    pbc: Option<[bool; 3]>,
}

#[derive(Debug, Deserialize)]
struct JsonStructure {
    #[serde(default)]
    lattice: Option<JsonLattice>,
    sites: Vec<JsonSite>,
}

fn site_properties(raw: Map<String, Value>) -> SiteProperties {
    let mut properties = SiteProperties::default();
    for (key, value) in raw {
        match key.as_str() {
            "selective_dynamics" => {
                properties.selective_dynamics = serde_json::from_value(value).ok();
            }
            "mass" => properties.mass = value.as_f64(),
            "reduced_to" => properties.reduced_to = value.as_u64().map(|v| v as usize),
            _ => {
                if let Ok(v) = serde_json::from_value::<MetaValue>(value) {
                    properties.extra.insert(key, v);
                }
            }
        }
    }
    properties
}

/// 把找到的结构字典转换为 `ParsedStructure`
pub fn structure_from_map(map: &Map<String, Value>) -> Result<ParsedStructure> {
    let raw: JsonStructure = serde_json::from_value(Value::Object(map.clone()))
        .map_err(|e| StructuraError::malformed(FORMAT, format!("invalid structure dict: {}", e)))?;

    let lattice = raw
        .lattice
        .map(|l| Lattice::from_matrix(l.matrix).with_pbc(l.pbc.unwrap_or([true; 3])));
    let frame = lattice.as_ref().map(Lattice::frame);

    let mut sites = Vec::with_capacity(raw.sites.len());
    for (i, site) in raw.sites.into_iter().enumerate() {
        let species: Vec<Species> = site
            .species
            .iter()
            .map(|s| {
                let element = normalize_symbol(&s.element).unwrap_or_else(|| {
                    log::warn!("Unrecognized element '{}', using '{}'", s.element, DUMMY_SYMBOL);
                    DUMMY_SYMBOL
                });
                let mut sp = Species::new(element, s.occu.unwrap_or(1.0));
                sp.oxidation_state = s.oxidation_state;
                sp
            })
            .collect();

        let (xyz, abc) = match (site.xyz, site.abc, frame.as_ref()) {
            (Some(xyz), Some(abc), _) => (xyz, abc),
            (Some(xyz), None, Some(f)) => (xyz, f.to_fractional(&xyz)),
            (None, Some(abc), Some(f)) => (f.to_cartesian(&abc), abc),
            (Some(xyz), None, None) => (xyz, xyz),
            (None, Some(abc), None) => (abc, abc),
            (None, None, _) => {
                return Err(StructuraError::malformed(
                    FORMAT,
                    format!("site {} has neither abc nor xyz", i),
                ))
            }
        };

        let mut parsed = Site::with_species(species, xyz, abc)?;
        if let Some(label) = site.label {
            parsed = parsed.with_label(label);
        }
        sites.push(parsed.with_properties(site_properties(site.properties)));
    }

    Ok(ParsedStructure::new(sites, lattice))
}

/// 解析任意 JSON：先试 OPTIMADE，再做嵌套查找
pub fn parse_json(content: &str) -> Result<ParsedStructure> {
    let value: Value = serde_json::from_str(content)?;
    if optimade::is_optimade(&value) {
        return optimade::parse_optimade_value(&value);
    }
    match find_structure(&value) {
        StructureSearch::Found(map) => structure_from_map(map),
        StructureSearch::NotFound => Err(StructuraError::malformed(
            FORMAT,
            "no object with a non-empty 'sites' array found",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pymatgen_dict() -> Value {
        json!({
            "@module": "pymatgen.core.structure",
            "lattice": {"matrix": [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]], "pbc": [true, true, true]},
            "sites": [
                {"species": [{"element": "Cs", "occu": 1}], "abc": [0.0, 0.0, 0.0], "label": "Cs"},
                {"species": [{"element": "Cl", "occu": 1, "oxidation_state": -1}], "xyz": [1.5, 1.5, 1.5],
                 "properties": {"magmom": 0.5, "selective_dynamics": [true, false, true]}}
            ]
        })
    }

    #[test]
    fn test_find_nested_structure() {
        let wrapped = json!({"response": {"results": [{"meta": 1}, {"structure": pymatgen_dict()}]}});
        assert!(find_structure(&wrapped).is_some());
        assert_eq!(find_structure(&json!({"sites": []})), StructureSearch::NotFound);
    }

    #[test]
    fn test_first_match_depth_first() {
        let mut second = pymatgen_dict();
        second["sites"][0]["label"] = json!("second");
        let doc = json!([{"a": pymatgen_dict()}, second]);
        let StructureSearch::Found(map) = find_structure(&doc) else {
            panic!("structure not found");
        };
        assert_eq!(map["sites"][0]["label"], json!("Cs"));
    }

    #[test]
    fn test_parse_pymatgen_dict() {
        let structure = parse_json(&pymatgen_dict().to_string()).unwrap();
        assert_eq!(structure.sites.len(), 2);
        assert!((structure.sites[1].abc[0] - 0.5).abs() < 1e-12);
        assert_eq!(structure.sites[1].species[0].oxidation_state, Some(-1.0));
        assert_eq!(
            structure.sites[1].properties.selective_dynamics,
            Some([true, false, true])
        );
        assert_eq!(
            structure.sites[1].properties.extra.get("magmom"),
            Some(&MetaValue::Float(0.5))
        );
    }

    #[test]
    fn test_no_structure() {
        assert!(matches!(
            parse_json(r#"{"hello": [1, 2, 3]}"#),
            Err(StructuraError::MalformedInput { .. })
        ));
        assert!(matches!(parse_json("{oops"), Err(StructuraError::Json(_))));
    }
}
