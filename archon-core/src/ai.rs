//! AI distance-tier scheduler (§4.14): a single multi-source BFS from every
//! human-owned province assigns each AI country a "thinking frequency"
//! tier, so distant AI nations are simulated coarsely instead of every
//! monthly tick.

use crate::config::SimConfig;
use crate::country::CountrySystem;
use crate::ids::{CountryId, ProvinceId};
use crate::province::ProvinceSystem;
use archon_data::adjacency::{AdjacencyGraph, DenseProvinceId};
use archon_pathfinding::{bfs_distances, Neighbors};
use std::collections::HashMap;

/// Bridges `archon_core::ids::ProvinceId` (dense `u16`, 0 reserved "none")
/// to `archon_data`'s 0-based `DenseProvinceId`, so the adjacency graph
/// built at load time can be walked directly by id without re-indexing.
struct ProvinceGraphAdapter<'a> {
    inner: &'a AdjacencyGraph,
}

impl Neighbors<ProvinceId> for ProvinceGraphAdapter<'_> {
    fn neighbors_of(&self, node: ProvinceId) -> Vec<ProvinceId> {
        if node.is_none() {
            return Vec::new();
        }
        let dense: DenseProvinceId = (node.0 - 1) as u32;
        self.inner.neighbors(dense).into_iter().map(|d| ProvinceId((d + 1) as u16)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AiTier {
    Near,
    Medium,
    Far,
    VeryFar,
}

impl AiTier {
    fn from_hops(hops: u32, config: &SimConfig) -> AiTier {
        if hops <= config.ai_tier_near_max_hops {
            AiTier::Near
        } else if hops <= config.ai_tier_medium_max_hops {
            AiTier::Medium
        } else if hops <= config.ai_tier_far_max_hops {
            AiTier::Far
        } else {
            AiTier::VeryFar
        }
    }

    /// How often (in calendar-month units) a country at this tier re-runs
    /// its AI: Near every month, VeryFar only once a year.
    pub fn think_every_months(self) -> u32 {
        match self {
            AiTier::Near => 1,
            AiTier::Medium => 3,
            AiTier::Far => 6,
            AiTier::VeryFar => 12,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AiTierAssignments {
    tiers: HashMap<CountryId, AiTier>,
}

impl AiTierAssignments {
    pub fn tier_of(&self, country: CountryId) -> AiTier {
        self.tiers.get(&country).copied().unwrap_or(AiTier::VeryFar)
    }

    pub fn should_think(&self, country: CountryId, months_since_epoch: i32) -> bool {
        let every = self.tier_of(country).think_every_months() as i32;
        months_since_epoch % every == 0
    }
}

/// Runs the BFS and assigns a tier to every AI country, given the set of
/// provinces owned by `human_player`. Re-run at world load and whenever a
/// human-owned border province changes owner.
pub fn compute_ai_tiers(
    provinces: &ProvinceSystem,
    countries: &CountrySystem,
    graph: &AdjacencyGraph,
    human_player: CountryId,
    config: &SimConfig,
) -> AiTierAssignments {
    let adapter = ProvinceGraphAdapter { inner: graph };
    let sources: Vec<ProvinceId> = provinces.get_country_provinces(human_player).collect();

    let distances = bfs_distances(&adapter, sources);

    let mut tiers = HashMap::new();
    for country in countries.get_all_country_ids() {
        if country == human_player {
            continue;
        }
        let min_hops = provinces
            .get_country_provinces(country)
            .filter_map(|p| distances.get(&p).copied())
            .min();

        let tier = match min_hops {
            Some(hops) => AiTier::from_hops(hops, config),
            None => AiTier::VeryFar, // unreachable (e.g. isolated by ocean with no strait data)
        };
        tiers.insert(country, tier);
    }

    AiTierAssignments { tiers }
}
