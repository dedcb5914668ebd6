//! Culture registry (§3.4), loaded from `common/cultures/*.txt`. File
//! structure groups cultures under a parent heading, same shape as religions:
//! `germanic = { swedish = { ... } danish = { ... } }`. Cultures don't carry
//! their own color in the data files; one is derived deterministically from
//! the culture's key so the renderer has something stable to draw with.

use crate::error::DataError;
use crate::registry::{CultureId, Registry, RegistryBuilder};
use archon_txt::{AstItem, DefaultParadoxText, ParadoxText};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CultureRecord {
    #[serde(skip)]
    pub color: [u8; 3],
    pub primary: Option<String>,
    pub graphical_culture: Option<String>,
    pub second_graphical_culture: Option<String>,
    pub male_names: Option<Vec<String>>,
    pub female_names: Option<Vec<String>>,
    pub dynasty_names: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: HashMap<String, serde::de::IgnoredAny>,
}

/// Derives a stable display color from a culture's key, since the data
/// files don't carry one.
pub fn hash_color(s: &str) -> [u8; 3] {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    let hash = hasher.finish();

    let r = (hash & 0xFF) as u8;
    let g = ((hash >> 8) & 0xFF) as u8;
    let b = ((hash >> 16) & 0xFF) as u8;
    [r.saturating_add(50), g.saturating_add(50), b.saturating_add(50)]
}

pub fn load_cultures(base_path: &Path) -> Result<Registry<CultureId, CultureRecord>, DataError> {
    let cultures_dir = base_path.join("common/cultures");
    if !cultures_dir.exists() {
        return Ok(RegistryBuilder::new().build());
    }

    let results: Mutex<Vec<(String, CultureRecord)>> = Mutex::new(Vec::new());
    let entries: Vec<_> = std::fs::read_dir(&cultures_dir)?.filter_map(|e| e.ok()).collect();

    entries.par_iter().for_each(|entry| {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            if let Ok(found) = parse_culture_file(&path) {
                results.lock().unwrap().extend(found);
            }
        }
    });

    let mut builder: RegistryBuilder<CultureId, CultureRecord> = RegistryBuilder::new();
    let mut found = results.into_inner().unwrap();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, record) in found {
        builder.insert(name, record);
    }
    Ok(builder.build())
}

fn parse_culture_file(path: &Path) -> Result<Vec<(String, CultureRecord)>, DataError> {
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

        for culture_node in &group_rhs.children {
            let AstItem::Assignment = &culture_node.entry else { continue };
            let (Some(name_node), Some(body_node)) =
                (culture_node.children.first(), culture_node.children.get(1))
            else {
                continue;
            };
            let AstItem::Identifier(name) = &name_node.entry else { continue };
            if name == "graphical_culture" {
                continue;
            }

            let mut record = match archon_txt::from_node::<CultureRecord>(body_node) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!(target: "core_data_loading", "failed to parse culture '{name}' in {}: {e}", path.display());
                    CultureRecord::default()
                }
            };
            record.color = hash_color(name);
            found.push((name.clone(), record));
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_cultures() {
        let dir = tempdir().unwrap();
        let c_dir = dir.path().join("common/cultures");
        std::fs::create_dir_all(&c_dir).unwrap();

        let mut f = std::fs::File::create(c_dir.join("00_cultures.txt")).unwrap();
        write!(
            f,
            r#"
        germanic = {{
            swedish = {{
                primary = SWE
            }}
            danish = {{
                primary = DAN
            }}
        }}
        "#
        )
        .unwrap();

        let cultures = load_cultures(dir.path()).unwrap();
        assert_eq!(cultures.len(), 2);
        assert!(cultures.by_key("swedish").is_some());
        assert!(cultures.by_key("danish").is_some());

        let swedish = cultures.by_key("swedish").unwrap();
        assert_eq!(swedish.color, hash_color("swedish"));
        assert_eq!(swedish.primary.as_deref(), Some("SWE"));
    }

    #[test]
    fn test_missing_directory_yields_empty() {
        let dir = tempdir().unwrap();
        let cultures = load_cultures(dir.path()).unwrap();
        assert!(cultures.is_empty());
    }
}
