//! Terrain registry and per-province terrain overrides (§3.4), parsed from
//! `map/terrain.txt`:
//! ```text
//! categories = {
//!     plains = { ... terrain_override = { 123 456 789 } }
//!     mountains = { ... terrain_override = { 100 200 } }
//! }
//! ```
//! Each category name becomes a dense `TerrainId`; `terrain_override` lists
//! are sparse `DefinitionId`s, resolved to dense indices via the province
//! roster so the simulation core can pack the result straight into the hot
//! `terrain:u8` field.

use crate::definition::{DefinitionId, ProvinceRoster};
use crate::error::DataError;
use crate::registry::{Registry, RegistryBuilder, TerrainId};
use archon_txt::{AstItem, DefaultParadoxText, ParadoxText};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct TerrainRecord {
    pub name: String,
}

pub struct TerrainData {
    pub registry: Registry<TerrainId, TerrainRecord>,
    /// Dense province index -> terrain id, for provinces with an explicit override.
    pub overrides: HashMap<u32, TerrainId>,
}

pub fn load_terrain(path: &Path, roster: &ProvinceRoster) -> Result<TerrainData, DataError> {
    if !path.exists() {
        return Ok(TerrainData {
            registry: RegistryBuilder::new().build(),
            overrides: HashMap::new(),
        });
    }

    let tokens = DefaultParadoxText::tokenize(path.to_str().ok_or_else(|| DataError::Parse("non-utf8 path".into()))?)?;
    let root = DefaultParadoxText::parse(tokens)?;

    let mut builder: RegistryBuilder<TerrainId, TerrainRecord> = RegistryBuilder::new();
    let mut overrides = HashMap::new();

    let Some(categories) = root
        .assignments_with_key("categories")
        .into_iter()
        .next()
        .and_then(|node| node.children.get(1))
    else {
        return Ok(TerrainData {
            registry: builder.build(),
            overrides,
        });
    };

    for category_node in &categories.children {
        let AstItem::Assignment = &category_node.entry else { continue };
        let (Some(lhs), Some(rhs)) = (category_node.children.first(), category_node.children.get(1)) else {
            continue;
        };
        let AstItem::Identifier(name) = &lhs.entry else { continue };

        let terrain_id = builder.insert(name.clone(), TerrainRecord { name: name.clone() });

        for field in &rhs.children {
            let AstItem::Assignment = &field.entry else { continue };
            let (Some(field_lhs), Some(field_rhs)) = (field.children.first(), field.children.get(1)) else {
                continue;
            };
            let AstItem::Identifier(field_name) = &field_lhs.entry else { continue };
            if field_name != "terrain_override" {
                continue;
            }
            for id_node in &field_rhs.children {
                if let AstItem::IntValue(definition_id) = &id_node.entry {
                    if let Some(dense) = roster.dense_index_of(DefinitionId(*definition_id as u32)) {
                        overrides.insert(dense as u32, terrain_id);
                    }
                }
            }
        }
    }

    Ok(TerrainData {
        registry: builder.build(),
        overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn roster() -> ProvinceRoster {
        ProvinceRoster::parse("1;1;1;1;A\n2;2;2;2;B\n100;3;3;3;C\n200;4;4;4;D\n").unwrap()
    }

    #[test]
    fn test_load_terrain_categories_and_overrides() {
        let data = r#"
            categories = {
                plains = {
                    color = { 100 100 100 }
                    terrain_override = { 1 2 }
                }
                mountains = {
                    color = { 50 50 50 }
                    terrain_override = { 100 200 }
                }
            }
        "#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{data}").unwrap();

        let terrain = load_terrain(file.path(), &roster()).unwrap();
        assert_eq!(terrain.registry.len(), 2);
        assert!(terrain.registry.by_key("plains").is_some());
        assert!(terrain.registry.by_key("mountains").is_some());

        let plains_id = terrain.registry.key_to_id("plains").unwrap();
        assert_eq!(terrain.overrides.get(&0), Some(&plains_id));
        assert_eq!(terrain.overrides.get(&1), Some(&plains_id));

        let mountains_id = terrain.registry.key_to_id("mountains").unwrap();
        assert_eq!(terrain.overrides.get(&2), Some(&mountains_id));
    }

    #[test]
    fn test_missing_terrain_file_yields_empty() {
        let terrain = load_terrain(Path::new("/nonexistent/terrain.txt"), &roster()).unwrap();
        assert!(terrain.registry.is_empty());
        assert!(terrain.overrides.is_empty());
    }
}
