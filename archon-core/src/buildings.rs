//! Per-province building list, stored as a bitmask over dense building
//! registry ids (`archon_data::registry::BuildingId`).
//!
//! Zero-allocation, O(1) operations; a u128 covers up to 128 distinct
//! building types, comfortable headroom over any realistic registry.

use archon_data::registry::BuildingId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildingSet(pub u128);

impl BuildingSet {
    #[inline]
    pub fn contains(&self, id: BuildingId) -> bool {
        self.0 & (1u128 << id.0) != 0
    }

    #[inline]
    pub fn insert(&mut self, id: BuildingId) {
        self.0 |= 1u128 << id.0;
    }

    #[inline]
    pub fn remove(&mut self, id: BuildingId) {
        self.0 &= !(1u128 << id.0);
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = BuildingId> + '_ {
        (0..128u16)
            .filter(move |&i| self.0 & (1u128 << i) != 0)
            .map(BuildingId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_building_set_empty() {
        let set = BuildingSet::default();
        assert!(set.is_empty());
        assert_eq!(set.count(), 0);
        assert!(!set.contains(BuildingId(0)));
    }

    #[test]
    fn test_building_set_insert_remove() {
        let mut set = BuildingSet::default();
        let temple = BuildingId(0);
        let workshop = BuildingId(1);

        set.insert(temple);
        assert!(set.contains(temple));
        assert!(!set.contains(workshop));
        assert_eq!(set.count(), 1);

        set.insert(workshop);
        assert_eq!(set.count(), 2);

        set.remove(temple);
        assert!(!set.contains(temple));
        assert!(set.contains(workshop));
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn test_building_set_iter() {
        let mut set = BuildingSet::default();
        set.insert(BuildingId(0));
        set.insert(BuildingId(5));
        set.insert(BuildingId(10));

        let ids: Vec<_> = set.iter().collect();
        assert_eq!(ids, vec![BuildingId(0), BuildingId(5), BuildingId(10)]);
    }

    #[test]
    fn test_building_set_high_ids() {
        let mut set = BuildingSet::default();
        set.insert(BuildingId(127));
        assert!(set.contains(BuildingId(127)));
        assert_eq!(set.count(), 1);
    }
}
