//! Top-level error taxonomy for the engine crate: wraps the per-domain
//! errors from `archon-data`, `archon-core`, and `archon-render` plus the
//! initialization orchestrator's own aggregate-failure shape (§7, §9).

use archon_core::CoreError;
use archon_data::DataError;
use archon_render::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data loading failed: {0}")]
    Data(#[from] DataError),

    #[error("simulation error: {0}")]
    Core(#[from] CoreError),

    #[error("render setup failed: {0}")]
    Render(#[from] RenderError),

    /// A required initialization phase failed; optional-phase failures are
    /// logged and skipped instead of surfaced here (§7 propagation policy).
    #[error("initialization phase '{phase}' failed: {reason}")]
    InitPhaseFailed { phase: &'static str, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
