//! Province history loading (`history/provinces/<id> - <name>.txt`), with
//! real date-layering: root-level fields establish the province's state at
//! world start, and date-keyed blocks (`1523.4.12 = { owner = ... }`) are
//! collected and can be replayed in chronological order up to any game date
//! rather than being dropped on the floor.

use crate::error::DataError;
use archon_txt::{DefaultParadoxText, ParadoxText, RawDate};
use rayon::prelude::*;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// The fields a history file (or a single dated block within one) can set.
/// Every field is optional: a dated block typically sets one or two of
/// these, leaving the rest unchanged from whatever came before it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvinceHistoryFields {
    pub trade_goods: Option<String>,
    pub owner: Option<String>,
    pub controller: Option<String>,
    pub base_tax: Option<f32>,
    pub base_production: Option<f32>,
    pub base_manpower: Option<f32>,
    pub religion: Option<String>,
    pub culture: Option<String>,
    pub is_city: Option<bool>,
    pub hre: Option<bool>,
    pub capital: Option<String>,
    pub native_size: Option<u32>,
    pub native_ferocity: Option<u32>,
    pub native_hostileness: Option<u32>,
    pub center_of_trade: Option<u8>,
    pub add_core: Option<Vec<String>>,

    #[serde(flatten)]
    pub other: HashMap<String, IgnoredAny>,
}

impl ProvinceHistoryFields {
    /// Overlays `other`'s set fields on top of `self`, returning the merged
    /// result. Used to fold a dated block's overrides into a running state.
    fn merged_with(mut self, other: &ProvinceHistoryFields) -> Self {
        macro_rules! overlay {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        overlay!(trade_goods);
        overlay!(owner);
        overlay!(controller);
        overlay!(base_tax);
        overlay!(base_production);
        overlay!(base_manpower);
        overlay!(religion);
        overlay!(culture);
        overlay!(is_city);
        overlay!(hre);
        overlay!(capital);
        overlay!(native_size);
        overlay!(native_ferocity);
        overlay!(native_hostileness);
        overlay!(center_of_trade);
        overlay!(add_core);
        self
    }
}

/// A province's full recorded history: the 1444 baseline plus every
/// date-keyed override, kept sorted so callers can fold up to any date.
#[derive(Debug, Clone, Default)]
pub struct ProvinceHistory {
    pub baseline: ProvinceHistoryFields,
    /// Sorted ascending by date.
    pub dated: Vec<(RawDate, ProvinceHistoryFields)>,
}

impl ProvinceHistory {
    /// Folds the baseline and every dated entry at or before `as_of` into a
    /// single effective state, in chronological order.
    pub fn effective_at(&self, as_of: RawDate) -> ProvinceHistoryFields {
        let mut state = self.baseline.clone();
        for (date, fields) in &self.dated {
            if *date > as_of {
                break;
            }
            state = state.merged_with(fields);
        }
        state
    }
}

pub type HistoryLoadResult = (HashMap<u32, ProvinceHistory>, (usize, usize));

pub fn load_province_history(base_path: &Path) -> Result<HistoryLoadResult, DataError> {
    let history_path = base_path.join("history/provinces");

    if !history_path.is_dir() {
        return Ok((HashMap::new(), (0, 0)));
    }

    let entries: Vec<_> = std::fs::read_dir(history_path)?.filter_map(|e| e.ok()).collect();
    let results: Mutex<(HashMap<u32, ProvinceHistory>, (usize, usize))> = Mutex::new((HashMap::new(), (0, 0)));

    entries.par_iter().for_each(|entry| {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "txt") {
            return;
        }

        match parse_history_file(&path) {
            Ok((id, hist)) => {
                let mut lock = results.lock().unwrap();
                lock.0.insert(id, hist);
                lock.1.0 += 1;
            }
            Err(e) => {
                log::warn!(target: "core_data_loading", "failed to load {:?}: {e}", path.file_name().unwrap_or_default());
                let mut lock = results.lock().unwrap();
                lock.1.1 += 1;
            }
        }
    });

    Ok(results.into_inner().unwrap())
}

fn parse_history_file(path: &Path) -> Result<(u32, ProvinceHistory), DataError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| DataError::Parse("no file stem".into()))?;

    // Filenames take the form "123 - Name.txt", "123-Name.txt", or "123 Name.txt".
    let id_str = stem.split('-').next().unwrap_or(stem).trim();
    let id_part = id_str.split_whitespace().next().unwrap_or(id_str);
    let id = id_part
        .parse::<u32>()
        .map_err(|e| DataError::Parse(format!("bad province id '{id_part}': {e}")))?;

    let path_str = path.to_str().ok_or_else(|| DataError::Parse("non-utf8 path".into()))?;
    let tokens = DefaultParadoxText::tokenize(path_str)?;
    if tokens.is_empty() {
        return Ok((id, ProvinceHistory::default()));
    }

    let root = DefaultParadoxText::parse(tokens)?;
    let baseline: ProvinceHistoryFields = archon_txt::from_node(&root).map_err(DataError::Parse)?;

    let mut dated: Vec<(RawDate, ProvinceHistoryFields)> = root
        .dated_blocks()
        .into_iter()
        .filter_map(|(date, node)| archon_txt::from_node::<ProvinceHistoryFields>(node).ok().map(|f| (date, f)))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    Ok((id, ProvinceHistory { baseline, dated }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_province_history() {
        let dir = tempdir().unwrap();
        let history_path = dir.path().join("history/provinces");
        fs::create_dir_all(&history_path).unwrap();

        let file_path = history_path.join("1 - Stockholm.txt");
        let mut file = fs::File::create(file_path).unwrap();
        writeln!(
            file,
            r#"
            trade_goods = grain
            owner = SWE
            base_tax = 10.0
            base_production = 5.0
            religion = catholic
            culture = swedish
            "#
        )
        .unwrap();

        let file_path = history_path.join("2-Svealand.txt");
        let mut file = fs::File::create(file_path).unwrap();
        writeln!(file, "owner = SWE").unwrap();

        let file_path = history_path.join("invalid_name.txt");
        fs::File::create(file_path).unwrap();

        let (map, (success, fail)) = load_province_history(dir.path()).unwrap();

        assert_eq!(success, 2);
        assert_eq!(fail, 1);

        let p1 = map.get(&1).unwrap();
        assert_eq!(p1.baseline.owner.as_deref(), Some("SWE"));
        assert_eq!(p1.baseline.base_tax, Some(10.0));
        assert_eq!(p1.baseline.trade_goods.as_deref(), Some("grain"));

        let p2 = map.get(&2).unwrap();
        assert_eq!(p2.baseline.owner.as_deref(), Some("SWE"));
        assert_eq!(p2.baseline.base_tax, None);
    }

    #[test]
    fn test_date_layering_folds_chronologically() {
        let data = r#"
            owner = SWE
            base_tax = 10.0

            1500.1.1 = {
                owner = DAN
            }

            1520.6.15 = {
                owner = SWE
                base_tax = 12.0
            }
        "#;
        let root = DefaultParadoxText::parse(DefaultParadoxText::tokenize_str(data)).unwrap();
        let baseline: ProvinceHistoryFields = archon_txt::from_node(&root).unwrap();
        let mut dated: Vec<_> = root
            .dated_blocks()
            .into_iter()
            .map(|(date, node)| (date, archon_txt::from_node::<ProvinceHistoryFields>(node).unwrap()))
            .collect();
        dated.sort_by_key(|(d, _)| *d);
        let history = ProvinceHistory { baseline, dated };

        let at_1444 = history.effective_at(RawDate { year: 1444, month: 11, day: 11 });
        assert_eq!(at_1444.owner.as_deref(), Some("SWE"));
        assert_eq!(at_1444.base_tax, Some(10.0));

        let at_1510 = history.effective_at(RawDate { year: 1510, month: 1, day: 1 });
        assert_eq!(at_1510.owner.as_deref(), Some("DAN"));
        assert_eq!(at_1510.base_tax, Some(10.0));

        let at_1600 = history.effective_at(RawDate { year: 1600, month: 1, day: 1 });
        assert_eq!(at_1600.owner.as_deref(), Some("SWE"));
        assert_eq!(at_1600.base_tax, Some(12.0));
    }
}
