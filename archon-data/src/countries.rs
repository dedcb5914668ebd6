//! Country definition loading from `common/country_tags/*.txt` (tag → file
//! path registry) and the per-tag country files themselves. The tag↔id
//! bijection (§3.3) is assembled by the simulation core from this roster;
//! this module only resolves tags to their static-data color.

use crate::error::DataError;
use archon_txt::{AstItem, DefaultParadoxText, ParadoxText};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Deserialize)]
pub struct CountryRecord {
    #[serde(default)]
    pub color: Vec<u8>,
}

pub type TagMap = HashMap<String, PathBuf>;

/// Loads the tag → relative-path registry from `common/country_tags`.
pub fn load_tags(base_path: &Path) -> Result<TagMap, DataError> {
    let tags_dir = base_path.join("common/country_tags");
    let mut tags = HashMap::new();

    if !tags_dir.is_dir() {
        return Ok(tags);
    }

    for entry in std::fs::read_dir(tags_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "txt") {
            continue;
        }
        let path_str = path.to_str().ok_or_else(|| DataError::Parse("non-utf8 path".into()))?;
        let tokens = DefaultParadoxText::tokenize(path_str)?;
        if tokens.is_empty() {
            continue;
        }
        let root = DefaultParadoxText::parse(tokens)?;

        let AstItem::AssignmentList = root.entry else { continue };
        for child in &root.children {
            let AstItem::Assignment = &child.entry else { continue };
            let (Some(lhs), Some(rhs)) = (child.children.first(), child.children.get(1)) else {
                continue;
            };
            let key = match &lhs.entry {
                AstItem::Identifier(s) | AstItem::StringValue(s) => Some(s.clone()),
                _ => None,
            };
            let val = match &rhs.entry {
                AstItem::StringValue(s) => Some(s.clone()),
                _ => None,
            };
            if let (Some(k), Some(v)) = (key, val) {
                tags.insert(k, PathBuf::from(v));
            }
        }
    }
    Ok(tags)
}

/// Loads every country's static record from its file listed in `tags`.
/// Countries whose file is missing or fails to parse are skipped.
pub fn load_country_map(base_path: &Path, tags: &TagMap) -> HashMap<String, CountryRecord> {
    let results: Mutex<HashMap<String, CountryRecord>> = Mutex::new(HashMap::new());

    tags.par_iter().for_each(|(tag, rel_path)| {
        let full_path = base_path.join("common").join(rel_path);
        if !full_path.exists() {
            return;
        }

        let maybe_country = (|| -> Option<CountryRecord> {
            let path_str = full_path.to_str()?;
            let tokens = DefaultParadoxText::tokenize(path_str).ok()?;
            if tokens.is_empty() {
                return None;
            }
            let root = DefaultParadoxText::parse(tokens).ok()?;
            archon_txt::from_node::<CountryRecord>(&root).ok()
        })();

        if let Some(country) = maybe_country {
            results.lock().unwrap().insert(tag.clone(), country);
        }
    });

    results.into_inner().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_country_record() {
        let data = r#"
            color = { 10 20 200 }
            graphical_culture = westerngfx
        "#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{data}").unwrap();

        let path_str = file.path().to_str().unwrap();
        let tokens = DefaultParadoxText::tokenize(path_str).unwrap();
        let root = DefaultParadoxText::parse(tokens).unwrap();
        let country: CountryRecord = archon_txt::from_node(&root).unwrap();

        assert_eq!(country.color, vec![10, 20, 200]);
    }

    #[test]
    fn test_load_tags_and_country_map() {
        use std::fs;
        let dir = tempfile::tempdir().unwrap();
        let tags_dir = dir.path().join("common/country_tags");
        fs::create_dir_all(&tags_dir).unwrap();
        fs::write(tags_dir.join("00_countries.txt"), r#"SWE = "countries/Sweden.txt""#).unwrap();

        let countries_dir = dir.path().join("common/countries");
        fs::create_dir_all(&countries_dir).unwrap();
        fs::write(countries_dir.join("Sweden.txt"), "color = { 0 0 255 }").unwrap();

        let tags = load_tags(dir.path()).unwrap();
        assert_eq!(tags.get("SWE"), Some(&PathBuf::from("countries/Sweden.txt")));

        let countries = load_country_map(dir.path(), &tags);
        let sweden = countries.get("SWE").unwrap();
        assert_eq!(sweden.color, vec![0, 0, 255]);
    }
}
