//! Diplomacy system (§3.6): relations are keyed by an unordered pair of
//! countries, packed into a single `u64` so the relation table is a flat
//! hash map with no nested indirection.

use crate::fixed::FixedPoint64;
use crate::ids::CountryId;
use std::collections::HashMap;

pub const TREATY_ALLIANCE: u32 = 1 << 0;
pub const TREATY_ROYAL_MARRIAGE: u32 = 1 << 1;
pub const TREATY_MILITARY_ACCESS: u32 = 1 << 2;
pub const TREATY_NON_AGGRESSION: u32 = 1 << 3;

/// Packs an unordered country pair into a stable `u64` key, lower id first
/// so `(a, b)` and `(b, a)` always collide to the same relation.
#[inline]
pub fn pack_relation_key(a: CountryId, b: CountryId) -> u64 {
    let (lo, hi) = if a.0 <= b.0 { (a.0, b.0) } else { (b.0, a.0) };
    ((lo as u64) << 16) | hi as u64
}

#[inline]
pub fn unpack_relation_key(key: u64) -> (CountryId, CountryId) {
    (CountryId((key >> 16) as u16), CountryId((key & 0xFFFF) as u16))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelationHot {
    pub base_opinion: FixedPoint64,
    pub at_war: bool,
    pub treaty_mask: u32,
}

/// A single opinion modifier contribution, decaying linearly from `value`
/// to zero over `decayRate` ticks after `appliedTick`. `decayRate == 0`
/// means the modifier is permanent and never decays.
#[derive(Debug, Clone, Copy)]
pub struct OpinionModifier {
    pub type_id: u16,
    pub value: FixedPoint64,
    pub applied_tick: i32,
    pub decay_rate: i32,
}

impl OpinionModifier {
    /// Current contribution: `value * max(0, 1 - elapsed/decayRate)`.
    pub fn current_value(&self, current_tick: i32) -> FixedPoint64 {
        if self.decay_rate == 0 {
            return self.value;
        }
        let elapsed = (current_tick - self.applied_tick).max(0);
        if elapsed >= self.decay_rate {
            return FixedPoint64::ZERO;
        }
        let ratio = FixedPoint64::from_int(elapsed) / FixedPoint64::from_int(self.decay_rate);
        let remaining = (FixedPoint64::ONE - ratio).max(FixedPoint64::ZERO);
        self.value * remaining
    }

    pub fn is_expired(&self, current_tick: i32) -> bool {
        self.decay_rate != 0 && current_tick - self.applied_tick >= self.decay_rate
    }
}

#[derive(Debug, Default)]
pub struct DiplomacySystem {
    relations: HashMap<u64, RelationHot>,
    modifiers: Vec<(u64, OpinionModifier)>,
}

impl DiplomacySystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn relation_entry(&mut self, a: CountryId, b: CountryId) -> &mut RelationHot {
        self.relations.entry(pack_relation_key(a, b)).or_default()
    }

    pub fn get_relation(&self, a: CountryId, b: CountryId) -> RelationHot {
        self.relations.get(&pack_relation_key(a, b)).copied().unwrap_or_default()
    }

    pub fn set_base_opinion(&mut self, a: CountryId, b: CountryId, opinion: FixedPoint64) {
        self.relation_entry(a, b).base_opinion = opinion;
    }

    pub fn set_at_war(&mut self, a: CountryId, b: CountryId, at_war: bool) {
        self.relation_entry(a, b).at_war = at_war;
    }

    pub fn is_at_war(&self, a: CountryId, b: CountryId) -> bool {
        self.get_relation(a, b).at_war
    }

    pub fn add_treaty(&mut self, a: CountryId, b: CountryId, treaty: u32) {
        self.relation_entry(a, b).treaty_mask |= treaty;
    }

    pub fn remove_treaty(&mut self, a: CountryId, b: CountryId, treaty: u32) {
        self.relation_entry(a, b).treaty_mask &= !treaty;
    }

    pub fn has_treaty(&self, a: CountryId, b: CountryId, treaty: u32) -> bool {
        self.get_relation(a, b).treaty_mask & treaty != 0
    }

    pub fn add_modifier(&mut self, a: CountryId, b: CountryId, modifier: OpinionModifier) {
        self.modifiers.push((pack_relation_key(a, b), modifier));
    }

    /// Sums the base opinion plus every live modifier's current
    /// (decay-adjusted) contribution for the pair.
    pub fn current_opinion(&self, a: CountryId, b: CountryId, current_tick: i32) -> FixedPoint64 {
        let key = pack_relation_key(a, b);
        let base = self.relations.get(&key).map(|r| r.base_opinion).unwrap_or_default();
        self.modifiers
            .iter()
            .filter(|(k, _)| *k == key)
            .fold(base, |acc, (_, m)| acc + m.current_value(current_tick))
    }

    /// Drops every fully-decayed modifier. Called periodically (daily tick)
    /// rather than every modifier access, to keep the hot path allocation-free.
    pub fn prune_expired(&mut self, current_tick: i32) {
        self.modifiers.retain(|(_, m)| !m.is_expired(current_tick));
    }

    /// Read-only view of the relation table, for save serialization.
    pub fn relations_snapshot(&self) -> &HashMap<u64, RelationHot> {
        &self.relations
    }

    /// Read-only view of the live modifier list, for save serialization.
    pub fn modifiers_snapshot(&self) -> &[(u64, OpinionModifier)] {
        &self.modifiers
    }

    /// Replaces the relation table and modifier list wholesale. Used only
    /// when restoring from a save section.
    pub fn restore(&mut self, relations: HashMap<u64, RelationHot>, modifiers: Vec<(u64, OpinionModifier)>) {
        self.relations = relations;
        self.modifiers = modifiers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_is_order_independent() {
        let a = CountryId(5);
        let b = CountryId(12);
        assert_eq!(pack_relation_key(a, b), pack_relation_key(b, a));
        assert_eq!(unpack_relation_key(pack_relation_key(a, b)), (CountryId(5), CountryId(12)));
    }

    #[test]
    fn test_set_and_get_relation() {
        let mut diplo = DiplomacySystem::new();
        let a = CountryId(1);
        let b = CountryId(2);
        diplo.set_base_opinion(a, b, FixedPoint64::from_int(50));
        diplo.set_at_war(b, a, true);
        diplo.add_treaty(a, b, TREATY_ALLIANCE);

        let rel = diplo.get_relation(b, a);
        assert_eq!(rel.base_opinion, FixedPoint64::from_int(50));
        assert!(rel.at_war);
        assert!(diplo.has_treaty(a, b, TREATY_ALLIANCE));
        assert!(!diplo.has_treaty(a, b, TREATY_ROYAL_MARRIAGE));
    }

    #[test]
    fn test_modifier_decay() {
        let m = OpinionModifier {
            type_id: 1,
            value: FixedPoint64::from_int(100),
            applied_tick: 0,
            decay_rate: 100,
        };
        assert_eq!(m.current_value(0), FixedPoint64::from_int(100));
        assert_eq!(m.current_value(50), FixedPoint64::from_int(50));
        assert_eq!(m.current_value(100), FixedPoint64::ZERO);
        assert_eq!(m.current_value(200), FixedPoint64::ZERO);
    }

    #[test]
    fn test_permanent_modifier_never_decays() {
        let m = OpinionModifier {
            type_id: 1,
            value: FixedPoint64::from_int(10),
            applied_tick: 0,
            decay_rate: 0,
        };
        assert_eq!(m.current_value(1_000_000), FixedPoint64::from_int(10));
        assert!(!m.is_expired(1_000_000));
    }

    #[test]
    fn test_current_opinion_sums_base_and_modifiers() {
        let mut diplo = DiplomacySystem::new();
        let a = CountryId(1);
        let b = CountryId(2);
        diplo.set_base_opinion(a, b, FixedPoint64::from_int(10));
        diplo.add_modifier(
            a,
            b,
            OpinionModifier { type_id: 1, value: FixedPoint64::from_int(20), applied_tick: 0, decay_rate: 0 },
        );
        assert_eq!(diplo.current_opinion(a, b, 0), FixedPoint64::from_int(30));
    }

    #[test]
    fn test_prune_expired_removes_decayed_modifiers() {
        let mut diplo = DiplomacySystem::new();
        let a = CountryId(1);
        let b = CountryId(2);
        diplo.add_modifier(
            a,
            b,
            OpinionModifier { type_id: 1, value: FixedPoint64::from_int(20), applied_tick: 0, decay_rate: 10 },
        );
        diplo.prune_expired(20);
        assert_eq!(diplo.current_opinion(a, b, 20), FixedPoint64::ZERO);
    }
}
