//! Error taxonomy for the texture/border rendering pipeline, per the
//! engine's error handling design (§7): render-side failures either bubble
//! up as a structured error (bad map dimensions, missing material slot) or
//! get logged and skipped (a single malformed border chain at load time).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("map dimensions {width}x{height} exceed the texture memory budget ({budget_mb} MB)")]
    TextureBudgetExceeded { width: u32, height: u32, budget_mb: u32 },

    #[error("unknown map mode slot: {0}")]
    UnknownMapMode(String),

    #[error("map mode slot {0} is already registered")]
    DuplicateMapMode(usize),

    #[error("material is missing the well-known texture property {0:?}")]
    MissingMaterialSlot(&'static str),

    #[error("border chain too short to fit a curve: {0} points")]
    DegenerateChain(usize),

    #[error("spatial grid cell ({cell_x},{cell_y}) exceeds the segment density budget: {count} segments")]
    GridCellOverflow { cell_x: u32, cell_y: u32, count: usize },

    #[error("device does not support the requested texture format")]
    UnsupportedFormat,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
