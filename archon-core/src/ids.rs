//! Dense runtime identifiers for provinces and countries.
//!
//! Both ids are 16-bit and dense: `0` is reserved as "none" (an unowned
//! province, or "no country"). Definition-file identifiers (`DefinitionId`,
//! owned by `archon-data`) are sparse 32-bit and are mapped to a `ProvinceId`
//! once at load time by the province registry.

use serde::{Deserialize, Serialize};

/// Dense runtime province identifier. `0` is reserved ("none").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProvinceId(pub u16);

impl ProvinceId {
    pub const NONE: ProvinceId = ProvinceId(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense runtime country identifier. `0` is reserved ("none" / unowned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CountryId(pub u16);

impl CountryId {
    pub const NONE: CountryId = CountryId(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_zero() {
        assert!(ProvinceId::NONE.is_none());
        assert!(CountryId::NONE.is_none());
        assert!(!ProvinceId(1).is_none());
    }
}
