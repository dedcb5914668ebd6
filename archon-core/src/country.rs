//! Country system (§3.3): mirrors `province.rs`'s hot/cold split. The hot
//! struct is 8 bytes, good enough to scan every country every tick without
//! touching the cold tag strings or preferred-religion lookups.

use crate::error::{CoreError, CoreResult};
use crate::ids::CountryId;
use std::collections::HashMap;

/// Exactly 8 bytes: `tagHash` lets renderer code key off a country without
/// dereferencing into cold data for the common "is this my tag" check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct CountryHot {
    pub tag_hash: u16,
    pub color_rgb: u32,
    pub graphical_culture_id: u8,
    pub flags: u8,
}

const _: () = assert!(std::mem::size_of::<CountryHot>() == 8);

const EXISTS_FLAG: u8 = 1 << 0;

impl CountryHot {
    #[inline]
    pub fn exists(&self) -> bool {
        self.flags & EXISTS_FLAG != 0
    }

    #[inline]
    pub fn set_exists(&mut self, exists: bool) {
        if exists {
            self.flags |= EXISTS_FLAG;
        } else {
            self.flags &= !EXISTS_FLAG;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountryCold {
    pub tag: String,
    pub display_name: String,
    pub preferred_religion: Option<String>,
    pub revolutionary_color: Option<[u8; 3]>,
    pub full_color: [u8; 3],
}

/// Deterministic FNV-1a style fold of a 3-letter tag into a `u16`, used only
/// as a fast-path hash, never as the authoritative identity (the tag string
/// in `CountryCold` is authoritative; collisions are broken by the bijection
/// map below).
pub fn hash_tag(tag: &str) -> u16 {
    let mut hash: u32 = 2166136261;
    for b in tag.bytes() {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    (hash ^ (hash >> 16)) as u16
}

pub struct CountrySystem {
    hot: Vec<CountryHot>,
    cold: HashMap<CountryId, CountryCold>,
    tag_to_id: HashMap<String, CountryId>,
}

impl CountrySystem {
    /// Builds an empty country system with `country_count` slots (including
    /// index 0, the "none" sentinel).
    pub fn new(country_count: usize) -> Self {
        Self {
            hot: vec![CountryHot::default(); country_count],
            cold: HashMap::new(),
            tag_to_id: HashMap::new(),
        }
    }

    pub fn country_count(&self) -> usize {
        self.hot.len()
    }

    pub fn exists(&self, id: CountryId) -> bool {
        self.hot.get(id.index()).is_some_and(|h| h.exists())
    }

    fn get_hot(&self, id: CountryId) -> CoreResult<&CountryHot> {
        self.hot.get(id.index()).filter(|h| h.exists()).ok_or(CoreError::InvalidCountryId(id.0))
    }

    /// Registers a new country at the next free id. Fails if `tag` is
    /// already registered or no slots remain.
    pub fn register(&mut self, tag: &str, cold: CountryCold) -> CoreResult<CountryId> {
        if self.tag_to_id.contains_key(tag) {
            return Err(CoreError::InvariantViolation(format!("duplicate country tag '{tag}'")));
        }

        let slot = self
            .hot
            .iter()
            .position(|h| !h.exists())
            .filter(|&i| i != 0)
            .ok_or_else(|| CoreError::InvariantViolation("no free country slots".into()))?;

        let mut hot = CountryHot {
            tag_hash: hash_tag(tag),
            color_rgb: ((cold.full_color[0] as u32) << 16) | ((cold.full_color[1] as u32) << 8) | cold.full_color[2] as u32,
            graphical_culture_id: 0,
            flags: 0,
        };
        hot.set_exists(true);

        self.hot[slot] = hot;
        let id = CountryId(slot as u16);
        self.tag_to_id.insert(tag.to_string(), id);
        self.cold.insert(id, cold);
        Ok(id)
    }

    pub fn tag_to_id(&self, tag: &str) -> Option<CountryId> {
        self.tag_to_id.get(tag).copied()
    }

    pub fn get_color(&self, id: CountryId) -> CoreResult<u32> {
        Ok(self.get_hot(id)?.color_rgb)
    }

    pub fn get_flags(&self, id: CountryId) -> CoreResult<u8> {
        Ok(self.get_hot(id)?.flags)
    }

    pub fn cold_data(&self, id: CountryId) -> Option<&CountryCold> {
        self.cold.get(&id)
    }

    pub fn cold_data_mut(&mut self, id: CountryId) -> Option<&mut CountryCold> {
        self.cold.get_mut(&id)
    }

    /// All registered (existing) country ids, excluding the none sentinel.
    pub fn get_all_country_ids(&self) -> impl Iterator<Item = CountryId> + '_ {
        self.hot
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, h)| h.exists())
            .map(|(i, _)| CountryId(i as u16))
    }
}
