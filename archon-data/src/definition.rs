//! The province roster (§4.7 step 2): `map/definition.csv` is the
//! authoritative list of every province that exists in the world, including
//! provinces no history file ever mentions. Dense runtime ids are assigned
//! by row order here; everything downstream (adjacency, history, the
//! simulation core) addresses provinces by that dense index rather than by
//! the sparse [`DefinitionId`] the csv carries.

use crate::error::DataError;
use std::collections::HashMap;
use std::path::Path;

/// The sparse id a province carries in `definition.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefinitionId(pub u32);

#[derive(Debug, Clone)]
pub struct ProvinceDefinition {
    pub definition_id: DefinitionId,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub name: String,
    pub is_water: bool,
}

/// The province roster: dense index `i` in `definitions` is the runtime
/// `ProvinceId` the simulation core will assign province `i`.
#[derive(Debug, Clone, Default)]
pub struct ProvinceRoster {
    definitions: Vec<ProvinceDefinition>,
    by_definition_id: HashMap<DefinitionId, usize>,
    by_color: HashMap<(u8, u8, u8), usize>,
}

impl ProvinceRoster {
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Dense index for province `i`, 0-based. The simulation core's
    /// `ProvinceId` reserves 0 for "none", so callers typically offset this
    /// by one when assigning runtime ids.
    pub fn by_dense_index(&self, index: usize) -> Option<&ProvinceDefinition> {
        self.definitions.get(index)
    }

    pub fn dense_index_of(&self, id: DefinitionId) -> Option<usize> {
        self.by_definition_id.get(&id).copied()
    }

    pub fn dense_index_of_color(&self, color: (u8, u8, u8)) -> Option<usize> {
        self.by_color.get(&color).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ProvinceDefinition)> {
        self.definitions.iter().enumerate()
    }

    pub fn load(path: &Path) -> Result<Self, DataError> {
        let raw = std::fs::read(path).map_err(|e| DataError::FileIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&raw);
        Self::parse(&decoded)
    }

    pub fn parse(contents: &str) -> Result<Self, DataError> {
        let mut definitions = Vec::new();
        let mut by_definition_id = HashMap::new();
        let mut by_color = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            if fields.len() < 5 {
                continue;
            }
            // The header row's first column is non-numeric ("province");
            // every data row's first column parses as an integer.
            let Ok(id) = fields[0].trim().parse::<u32>() else {
                continue;
            };
            let (Ok(r), Ok(g), Ok(b)) = (
                fields[1].trim().parse::<u8>(),
                fields[2].trim().parse::<u8>(),
                fields[3].trim().parse::<u8>(),
            ) else {
                continue;
            };
            let name = fields[4].trim().to_string();
            let is_water = fields.get(5).map(|f| f.trim().eq_ignore_ascii_case("x")).unwrap_or(false);

            let definition_id = DefinitionId(id);
            let index = definitions.len();
            definitions.push(ProvinceDefinition {
                definition_id,
                r,
                g,
                b,
                name,
                is_water,
            });
            by_definition_id.insert(definition_id, index);
            by_color.insert((r, g, b), index);
        }

        Ok(ProvinceRoster {
            definitions,
            by_definition_id,
            by_color,
        })
    }
}
