//! Data loaders for the Archon engine: bitmap/CSV/key-value parsing,
//! registries, the province adjacency graph, and the data-driven static
//! records (countries, cultures, religions, terrain, history, localisation)
//! that the simulation core is seeded from at world load.

pub mod adjacency;
pub mod bitmap;
pub mod countries;
pub mod cultures;
pub mod definition;
pub mod error;
pub mod history;
pub mod localisation;
pub mod registry;
pub mod religions;
pub mod terrain;

pub use error::{DataError, DataResult};
