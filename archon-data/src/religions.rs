//! Religion registry (§3.4), loaded from `common/religions/*.txt`. The file
//! structure groups religions under a parent heading: `christian = { catholic
//! = { ... } protestant = { ... } }`; the group heading itself carries a
//! handful of group-wide metadata keys that are not religions and must be
//! skipped when building the registry.

use crate::error::DataError;
use crate::registry::{Registry, RegistryBuilder, ReligionId};
use archon_txt::{AstItem, DefaultParadoxText, ParadoxText};
use rayon::prelude::*;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const GROUP_METADATA_FIELDS: &[&str] = &[
    "defender_of_faith",
    "can_form_personal_unions",
    "center_of_religion",
    "flags_with_emblem_percentage",
    "flag_emblem_index_range",
    "crusade_name",
    "harmonized_modifier",
    "ai_will_propagate_through_trade",
    "religious_schools",
    "papacy",
    "hre_heretic_religion",
    "hre_religion",
    "misguided_heretic",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ReligionRecord {
    pub color: Vec<u8>,
    #[serde(default)]
    pub icon: u32,
    pub heretic: Option<Vec<String>>,
    pub allowed_conversion: Option<Vec<String>>,
    pub allowed_center_conversion: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: HashMap<String, IgnoredAny>,
}

pub fn load_religions(base_path: &Path) -> Result<Registry<ReligionId, ReligionRecord>, DataError> {
    let religions_dir = base_path.join("common/religions");
    if !religions_dir.exists() {
        return Ok(RegistryBuilder::new().build());
    }

    let results: Mutex<Vec<(String, ReligionRecord)>> = Mutex::new(Vec::new());
    let entries: Vec<_> = std::fs::read_dir(&religions_dir)?.filter_map(|e| e.ok()).collect();

    entries.par_iter().for_each(|entry| {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            if let Ok(found) = parse_religion_file(&path) {
                results.lock().unwrap().extend(found);
            }
        }
    });

    let mut builder: RegistryBuilder<ReligionId, ReligionRecord> = RegistryBuilder::new();
    let mut found = results.into_inner().unwrap();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, record) in found {
        builder.insert(name, record);
    }
    Ok(builder.build())
}

fn parse_religion_file(path: &Path) -> Result<Vec<(String, ReligionRecord)>, DataError> {
    let path_str = path.to_str().ok_or_else(|| DataError::Parse("non-utf8 path".into()))?;
    let tokens = DefaultParadoxText::tokenize(path_str)?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let root = DefaultParadoxText::parse(tokens)?;

    let mut found = Vec::new();
    for group_node in &root.children {
        let AstItem::Assignment = &group_node.entry else { continue };
        let Some(group_rhs) = group_node.children.get(1) else { continue };

        for religion_node in &group_rhs.children {
            let AstItem::Assignment = &religion_node.entry else { continue };
            let (Some(name_node), Some(body_node)) =
                (religion_node.children.first(), religion_node.children.get(1))
            else {
                continue;
            };
            let AstItem::Identifier(name) = &name_node.entry else { continue };
            if GROUP_METADATA_FIELDS.contains(&name.as_str()) {
                continue;
            }
            if let Ok(record) = archon_txt::from_node::<ReligionRecord>(body_node) {
                found.push((name.clone(), record));
            }
        }
    }
    Ok(found)
}
