//! The engine crate: wires `archon-data` loaders, the `archon-core`
//! simulation, `archon-pathfinding`, and `archon-render` into a single
//! [`GameState`] handle plus the [`init::bootstrap`] orchestrator that
//! builds one from a scenario directory.

pub mod context;
pub mod error;
pub mod init;
pub mod save_manager;
pub mod state;

pub use context::ServiceContext;
pub use error::{EngineError, EngineResult};
pub use init::{bootstrap, SCENARIO_START};
pub use save_manager::SaveManager;
pub use state::{GameState, PathfindingHandle, UniformCost};
