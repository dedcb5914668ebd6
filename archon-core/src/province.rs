//! Province system (§3.2, §4.2): the hot array is exactly 8 bytes per
//! province, double-buffered so writers touch `back` during a tick while
//! readers see a consistent `front` snapshot until the tick boundary swap.
//! Cold data (names, building lists, history) is lazy and hash-mapped,
//! never touched by the per-tick hot path.

use crate::buildings::BuildingSet;
use crate::error::{CoreError, CoreResult};
use crate::fixed::FixedPoint64;
use crate::ids::{CountryId, ProvinceId};
use std::collections::HashMap;

const OCEAN_FLAG: u8 = 1 << 0;

/// Exactly 8 bytes, no padding. The compile-time assertion below is the
/// fatal-build-error enforcement the hot state contract requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ProvinceHot {
    pub owner_id: u16,
    pub controller_id: u16,
    pub development: u8,
    pub terrain: u8,
    pub fort_level: u8,
    pub flags: u8,
}

const _: () = assert!(std::mem::size_of::<ProvinceHot>() == 8);

impl ProvinceHot {
    #[inline]
    pub fn is_ocean(&self) -> bool {
        self.flags & OCEAN_FLAG != 0
    }

    #[inline]
    pub fn set_ocean(&mut self, ocean: bool) {
        if ocean {
            self.flags |= OCEAN_FLAG;
        } else {
            self.flags &= !OCEAN_FLAG;
        }
    }
}

/// Detailed resource inventory (§3.2): per-province economic base values
/// that don't belong in the 8-byte hot struct because nothing reads them on
/// every tick — only the economy/trade layers that subscribe to specific
/// commands do. `trade_good_id` is a dense id into the goods registry; `0`
/// means "none assigned yet".
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceInventory {
    pub base_tax: FixedPoint64,
    pub base_production: FixedPoint64,
    pub base_manpower: FixedPoint64,
    pub trade_good_id: u16,
}

/// Cold per-province data: loaded lazily, never iterated in the hot path.
#[derive(Debug, Clone, Default)]
pub struct ProvinceCold {
    pub display_name: String,
    pub localized_name_key: Option<String>,
    pub buildings: BuildingSet,
    /// Ring of recent ownership/controller changes, most recent last.
    pub history_ring: Vec<ProvinceHistoryEvent>,
    pub resources: ResourceInventory,
}

#[derive(Debug, Clone, Copy)]
pub struct ProvinceHistoryEvent {
    pub tick: u64,
    pub old_owner: CountryId,
    pub new_owner: CountryId,
}

/// An event fired when a province's owner changes via `SetOwner`.
#[derive(Debug, Clone, Copy)]
pub struct ProvinceOwnershipChanged {
    pub province_id: ProvinceId,
    pub old_owner: CountryId,
    pub new_owner: CountryId,
}

/// Owns the double-buffered province hot arrays plus cold data and the SoA
/// owner mirror. Never hands out mutable references to outsiders: mutation
/// happens only through `SetOwner`/`SyncBuffersAfterLoad`.
pub struct ProvinceSystem {
    front: Vec<ProvinceHot>,
    back: Vec<ProvinceHot>,
    /// Structure-of-arrays mirror of `owner_id`, kept in lockstep with
    /// `front` for cache-friendly neighbor/renderer scans.
    owner_mirror: Vec<u16>,
    cold: HashMap<ProvinceId, ProvinceCold>,
    /// Per-country owned-province counts, maintained incrementally on every
    /// `SetOwner` so iteration over a country's provinces stays O(owned).
    country_province_counts: Vec<u32>,
    pending_events: Vec<ProvinceOwnershipChanged>,
}

impl ProvinceSystem {
    /// Builds a province system with `province_count` provinces (including
    /// index 0, the "none" sentinel — callers size this to
    /// `definitions.len() + 1`) and `country_count` countries.
    pub fn new(province_count: usize, country_count: usize) -> Self {
        Self {
            front: vec![ProvinceHot::default(); province_count],
            back: vec![ProvinceHot::default(); province_count],
            owner_mirror: vec![0u16; province_count],
            cold: HashMap::new(),
            country_province_counts: vec![0u32; country_count],
            pending_events: Vec::new(),
        }
    }

    pub fn province_count(&self) -> usize {
        self.front.len()
    }

    pub fn exists(&self, id: ProvinceId) -> bool {
        !id.is_none() && id.index() < self.front.len()
    }

    fn get_hot(&self, id: ProvinceId) -> CoreResult<&ProvinceHot> {
        self.front.get(id.index()).ok_or(CoreError::InvalidProvinceId(id.0))
    }

    pub fn get_owner(&self, id: ProvinceId) -> CoreResult<CountryId> {
        Ok(CountryId(self.get_hot(id)?.owner_id))
    }

    pub fn get_development(&self, id: ProvinceId) -> CoreResult<u8> {
        Ok(self.get_hot(id)?.development)
    }

    pub fn get_flags(&self, id: ProvinceId) -> CoreResult<u8> {
        Ok(self.get_hot(id)?.flags)
    }

    pub fn get_country_province_count(&self, country: CountryId) -> usize {
        self.country_province_counts
            .get(country.index())
            .copied()
            .unwrap_or(0) as usize
    }

    /// Read-only iteration over every province owned by `country`. O(P) but
    /// skips non-owned entries; callers that need O(owned) should cache the
    /// result per-tick rather than calling repeatedly.
    pub fn get_country_provinces(&self, country: CountryId) -> impl Iterator<Item = ProvinceId> + '_ {
        self.front
            .iter()
            .enumerate()
            .filter(move |(_, hot)| hot.owner_id == country.0)
            .map(|(i, _)| ProvinceId(i as u16))
    }

    /// Writes a province's full hot state directly into the back buffer,
    /// bypassing `SetOwner`'s runtime invariants (including the
    /// ocean-can't-be-owned check). Only the initialization orchestrator's
    /// bootstrap phase and save load use this; follow with
    /// `sync_buffers_after_load` once every province has been seeded so the
    /// mirror, counts, and invariants are rebuilt in one pass.
    pub fn seed_hot(&mut self, id: ProvinceId, hot: ProvinceHot) -> CoreResult<()> {
        let slot = self.back.get_mut(id.index()).ok_or(CoreError::InvalidProvinceId(id.0))?;
        *slot = hot;
        Ok(())
    }

    /// Writes to the back buffer and records a pending ownership-changed
    /// event; only the command bus should call this.
    pub fn set_owner(&mut self, id: ProvinceId, new_owner: CountryId, tick: u64) -> CoreResult<()> {
        let hot = self.back.get_mut(id.index()).ok_or(CoreError::InvalidProvinceId(id.0))?;
        if hot.is_ocean() {
            return Err(CoreError::InvariantViolation(format!(
                "cannot set owner on ocean province {}",
                id.0
            )));
        }

        let old_owner = CountryId(hot.owner_id);
        if old_owner == new_owner {
            return Ok(());
        }

        hot.owner_id = new_owner.0;

        if let Some(count) = self.country_province_counts.get_mut(old_owner.index()) {
            *count = count.saturating_sub(1);
        }
        if let Some(count) = self.country_province_counts.get_mut(new_owner.index()) {
            *count += 1;
        }

        self.cold.entry(id).or_default().history_ring.push(ProvinceHistoryEvent {
            tick,
            old_owner,
            new_owner,
        });

        self.pending_events.push(ProvinceOwnershipChanged {
            province_id: id,
            old_owner,
            new_owner,
        });

        Ok(())
    }

    /// Atomically swaps `front` and `back` at the tick boundary and
    /// refreshes the owner mirror. Readers always observe a fully
    /// consistent snapshot before and after this call, never mid-swap.
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
        self.back.copy_from_slice(&self.front);
        for (mirror, hot) in self.owner_mirror.iter_mut().zip(self.front.iter()) {
            *mirror = hot.owner_id;
        }
    }

    /// After bulk deserialization (save load), copies `back` into `front`
    /// and re-asserts invariants (owner ids in range, ocean provinces
    /// unowned).
    pub fn sync_buffers_after_load(&mut self) -> CoreResult<()> {
        self.front.copy_from_slice(&self.back);
        for (mirror, hot) in self.owner_mirror.iter_mut().zip(self.front.iter()) {
            *mirror = hot.owner_id;
        }

        self.country_province_counts.iter_mut().for_each(|c| *c = 0);
        for hot in &self.front {
            if hot.is_ocean() && hot.owner_id != 0 {
                return Err(CoreError::InvariantViolation(format!(
                    "ocean province has non-zero owner {}",
                    hot.owner_id
                )));
            }
            if let Some(count) = self.country_province_counts.get_mut(hot.owner_id as usize) {
                *count += 1;
            }
        }
        Ok(())
    }

    /// Drains and returns ownership-change events recorded since the last
    /// drain; the event bus calls this once per tick.
    pub fn drain_ownership_events(&mut self) -> Vec<ProvinceOwnershipChanged> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn cold_data(&self, id: ProvinceId) -> Option<&ProvinceCold> {
        self.cold.get(&id)
    }

    pub fn cold_data_mut(&mut self, id: ProvinceId) -> &mut ProvinceCold {
        self.cold.entry(id).or_default()
    }

    /// Owner mirror slice, for renderer/neighbor-scan consumers that only
    /// need the owner field and want to avoid touching the rest of the hot
    /// struct.
    pub fn owner_mirror(&self) -> &[u16] {
        &self.owner_mirror
    }

    /// The full front-buffer hot array, for save serialization and the
    /// determinism checksum (§4.12). Read-only: mutation still only happens
    /// through `seed_hot`/`set_owner`/`swap_buffers`.
    pub fn hot_snapshot(&self) -> &[ProvinceHot] {
        &self.front
    }
}

/// Read-only handle given to presentation and AI layers. Never exposes
/// mutable access.
pub struct ProvinceQuery<'a> {
    system: &'a ProvinceSystem,
}

impl<'a> ProvinceQuery<'a> {
    pub fn new(system: &'a ProvinceSystem) -> Self {
        Self { system }
    }

    pub fn exists(&self, id: ProvinceId) -> bool {
        self.system.exists(id)
    }

    pub fn get_owner(&self, id: ProvinceId) -> CoreResult<CountryId> {
        self.system.get_owner(id)
    }

    pub fn get_development(&self, id: ProvinceId) -> CoreResult<u8> {
        self.system.get_development(id)
    }

    pub fn get_country_provinces(&self, country: CountryId) -> impl Iterator<Item = ProvinceId> + '_ {
        self.system.get_country_provinces(country)
    }

    /// Resource inventory is cold data; absent until a province has been
    /// touched (by the loader or by `cold_data_mut`), in which case the
    /// default (all-zero) inventory is returned.
    pub fn get_resources(&self, id: ProvinceId) -> ResourceInventory {
        self.system.cold_data(id).map(|c| c.resources).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_struct_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<ProvinceHot>(), 8);
    }

    #[test]
    fn test_set_owner_updates_counts_and_events() {
        let mut system = ProvinceSystem::new(3, 3);
        system.set_owner(ProvinceId(1), CountryId(2), 100).unwrap();
        system.swap_buffers();

        assert_eq!(system.get_owner(ProvinceId(1)).unwrap(), CountryId(2));
        assert_eq!(system.get_country_province_count(CountryId(2)), 1);

        let events = system.drain_ownership_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].new_owner, CountryId(2));
    }

    #[test]
    fn test_set_owner_on_ocean_fails() {
        let mut system = ProvinceSystem::new(2, 2);
        system.set_owner(ProvinceId(1), CountryId(1), 0).unwrap();
        system.swap_buffers();

        // Mark province 1 as ocean directly on back for the test, then
        // attempt another ownership change.
        {
            let back = &mut system.back[1];
            back.set_ocean(true);
            back.owner_id = 0;
        }
        system.swap_buffers();

        let result = system.set_owner(ProvinceId(1), CountryId(1), 1);
        assert!(matches!(result, Err(CoreError::InvariantViolation(_))));
    }

    #[test]
    fn test_invalid_id_fails() {
        let system = ProvinceSystem::new(2, 2);
        let result = system.get_owner(ProvinceId(99));
        assert!(matches!(result, Err(CoreError::InvalidProvinceId(99))));
    }

    #[test]
    fn test_query_facade_is_read_only() {
        let mut system = ProvinceSystem::new(3, 3);
        system.set_owner(ProvinceId(1), CountryId(2), 0).unwrap();
        system.swap_buffers();

        let query = ProvinceQuery::new(&system);
        assert_eq!(query.get_owner(ProvinceId(1)).unwrap(), CountryId(2));
        assert_eq!(query.get_country_provinces(CountryId(2)).count(), 1);
    }

    #[test]
    fn test_resource_inventory_defaults_then_round_trips_through_cold_data() {
        let mut system = ProvinceSystem::new(3, 3);
        assert_eq!(ProvinceQuery::new(&system).get_resources(ProvinceId(1)).base_tax, FixedPoint64::ZERO);

        system.cold_data_mut(ProvinceId(1)).resources = ResourceInventory {
            base_tax: FixedPoint64::from_int(3),
            base_production: FixedPoint64::from_int(2),
            base_manpower: FixedPoint64::ZERO,
            trade_good_id: 7,
        };

        let resources = ProvinceQuery::new(&system).get_resources(ProvinceId(1));
        assert_eq!(resources.base_tax, FixedPoint64::from_int(3));
        assert_eq!(resources.trade_good_id, 7);
    }

    #[test]
    fn test_seed_hot_bypasses_ocean_invariant_then_sync_validates() {
        let mut system = ProvinceSystem::new(3, 2);
        let mut ocean = ProvinceHot::default();
        ocean.set_ocean(true);
        system.seed_hot(ProvinceId(1), ocean).unwrap();
        system.seed_hot(ProvinceId(2), ProvinceHot { owner_id: 1, development: 3, ..Default::default() }).unwrap();

        system.sync_buffers_after_load().unwrap();

        assert!(system.get_hot(ProvinceId(1)).unwrap().is_ocean());
        assert_eq!(system.get_owner(ProvinceId(2)).unwrap(), CountryId(1));
        assert_eq!(system.get_country_province_count(CountryId(1)), 1);
    }

    #[test]
    fn test_sync_buffers_after_load_rebuilds_counts() {
        let mut system = ProvinceSystem::new(3, 3);
        system.back[1].owner_id = 2;
        system.back[2].owner_id = 2;
        system.sync_buffers_after_load().unwrap();

        assert_eq!(system.get_owner(ProvinceId(1)).unwrap(), CountryId(2));
        assert_eq!(system.get_country_province_count(CountryId(2)), 2);
    }
}
