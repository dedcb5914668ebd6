//! # Archon Engine — Simulation Core
//!
//! Deterministic grand-strategy simulation: hot/cold province and country
//! state, a layered tick scheduler, a fixed-size-frame command bus, a
//! frame-coherent event bus, and the binary save format that ties them
//! together. Designed for lockstep replay: the same save plus the same
//! command log must always reproduce the same checksum.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌─────────────┐    ┌──────────────┐
//! │ CommandBus   │───▶│ back buffer │───▶│ swap_buffers │
//! │ (validated)  │    │  mutation   │    │ (tick edge)  │
//! └──────────────┘    └─────────────┘    └──────┬───────┘
//!                                                │
//!                      ┌─────────────┐    ┌──────▼───────┐
//!                      │  EventBus   │◀───│ front buffer │
//!                      │ (drained)   │    │ (read-only)  │
//!                      └─────────────┘    └──────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ProvinceSystem`] | Hot/cold province state, double-buffered |
//! | [`CountrySystem`] | Hot/cold country state, tag↔id bijection |
//! | [`DiplomacySystem`] | Pairwise relations, opinion modifiers |
//! | [`TimeSystem`] | Layered tick scheduler (hour/day/month/year) |
//! | [`CommandBus`] | Fixed-size-frame command validation + execution |
//! | [`EventBus`] | Frame-coherent pub/sub for simulation events |
//! | [`RngStreams`] | Named deterministic RNG streams |
//! | [`SaveFile`] | Binary save format (§3.9) |

pub mod ai;
pub mod buildings;
pub mod command;
pub mod config;
pub mod country;
pub mod date;
pub mod diplomacy;
pub mod error;
pub mod event;
pub mod fixed;
pub mod ids;
pub mod province;
pub mod rng;
pub mod save;
pub mod time;

pub use ai::{compute_ai_tiers, AiTier, AiTierAssignments};
pub use buildings::BuildingSet;
pub use command::{ChangeOwner, CommandBus, CommandContext, CommandOutcome, DeclareWar, GameCommand};
pub use config::SimConfig;
pub use country::{CountryCold, CountryHot, CountrySystem};
pub use date::Date;
pub use diplomacy::{DiplomacySystem, OpinionModifier, RelationHot};
pub use error::{CoreError, CoreResult};
pub use event::{EventBus, SubscriptionId};
pub use fixed::FixedPoint64;
pub use ids::{CountryId, ProvinceId};
pub use province::{ProvinceCold, ProvinceHot, ProvinceOwnershipChanged, ProvinceQuery, ProvinceSystem, ResourceInventory};
pub use rng::{DeterministicRandom, RngStreams};
pub use save::{
    diplomacy_apply_section, diplomacy_to_section, provinces_apply_section, provinces_checksum,
    provinces_to_section, rng_state_from_save, rng_state_to_section, time_state_from_save,
    time_state_to_section, write_atomic, SaveFile, SaveMetadata, Section,
};
pub use time::{GameSpeed, RunState, TimeState, TimeSystem};
