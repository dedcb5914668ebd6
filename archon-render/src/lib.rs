//! # Archon Engine — Map Rendering
//!
//! GPU texture pipeline for a province/country map: a fixed set of textures
//! ([`texture::MapTextureManager`]) populated entirely by compute
//! dispatchers ([`compute`]), a CPU-side vector border pipeline
//! ([`border`]) that turns jagged bitmap boundaries into smooth Bezier
//! curves, and a map-mode framework ([`mapmode`]) that decides what those
//! textures actually show. The engine never owns a visual style: callers
//! bind these textures into their own material via
//! `MapTextureManager::bind_textures_to_material`.

pub mod border;
pub mod compute;
pub mod error;
pub mod mapmode;
pub mod texture;

pub use border::{BezierSegment, BorderPipeline, BorderType, RenderingMode, SpatialGrid};
pub use compute::{BorderDetectionDispatcher, OwnerTextureDispatcher, PostEffectDispatcher};
pub use error::{RenderError, RenderResult};
pub use mapmode::{MapMode, MapModeContext, MapModeManager, MapModeTextureWriter, PoliticalMapMode, TerrainMapMode};
pub use texture::{GpuTexture, MapTextureKind, MapTextureManager, MaterialSlots};
