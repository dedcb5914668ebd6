//! Engine-wide tunables that must not be hardcoded into the subsystems that
//! use them (§9 design note: replace implicit global state with explicit
//! configuration threaded through construction).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Replay-and-verify the command log every N ticks (0 = disabled, only
    /// on explicit save/load boundaries).
    pub checksum_frequency: u32,

    /// Whether the adjacency scan considers 8-neighborhood (diagonal)
    /// connectivity in addition to the default 4-neighborhood. Off by default
    /// per §3.5.
    pub adjacency_diagonals: bool,

    /// Minimum pixel-chain length before Chaikin smoothing is applied in the
    /// border pipeline (§4.10 step 1); shorter chains are used raw to avoid
    /// sub-pixel degeneracy.
    pub border_chaikin_min_chain_len: usize,

    /// Spatial grid cell size in pixels for the border pipeline (§3.7, §4.10 step 3).
    pub border_grid_cell_size: u32,

    /// AI distance tier thresholds (inclusive upper bounds), per §4.14.
    pub ai_tier_near_max_hops: u32,
    pub ai_tier_medium_max_hops: u32,
    pub ai_tier_far_max_hops: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            checksum_frequency: 30,
            adjacency_diagonals: false,
            border_chaikin_min_chain_len: 20,
            border_grid_cell_size: 64,
            ai_tier_near_max_hops: 1,
            ai_tier_medium_max_hops: 4,
            ai_tier_far_max_hops: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.checksum_frequency, 30);
        assert!(!config.adjacency_diagonals);
        assert_eq!(config.border_chaikin_min_chain_len, 20);
        assert_eq!(config.border_grid_cell_size, 64);
    }
}
