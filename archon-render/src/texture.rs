//! Map Texture Manager (§4.8): owns the fixed set of GPU textures sized to
//! the province bitmap, and exposes the single binding contract the game
//! layer uses to wire them into its own material. The engine never creates
//! a visual-style material of its own — callers that skip
//! [`MapTextureManager::bind_textures_to_material`] get whatever fallback
//! (typically magenta) their shader defines for an unbound texture slot.
//!
//! All population after the initial upload goes through compute dispatchers
//! (see [`crate::compute`]); nothing in this module does per-pixel CPU work
//! in steady state.

use crate::error::{RenderError, RenderResult};
use std::collections::HashMap;

/// Every logical texture the map renderer owns, keyed by purpose rather
/// than format so callers never have to remember which channel layout goes
/// with which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapTextureKind {
    ProvinceId,
    ProvinceOwner,
    ProvinceColorPalette,
    CountryColorPalette,
    BorderMask,
    Heightmap,
    Normal,
    Highlight,
    FogOfWar,
    MapModeArray,
}

impl MapTextureKind {
    /// The well-known material property name this slot binds to. Kept as
    /// plain string constants rather than an enum-to-string mapping so a
    /// caller's shader source can grep for the exact literal.
    pub fn material_slot_name(self) -> &'static str {
        match self {
            MapTextureKind::ProvinceId => "_ProvinceIdTex",
            MapTextureKind::ProvinceOwner => "_ProvinceOwnerTex",
            MapTextureKind::ProvinceColorPalette => "_ProvincePaletteTex",
            MapTextureKind::CountryColorPalette => "_CountryPaletteTex",
            MapTextureKind::BorderMask => "_BorderMaskTex",
            MapTextureKind::Heightmap => "_HeightmapTex",
            MapTextureKind::Normal => "_NormalTex",
            MapTextureKind::Highlight => "_HighlightTex",
            MapTextureKind::FogOfWar => "_FogOfWarTex",
            MapTextureKind::MapModeArray => "_MapModeArrayTex",
        }
    }

    fn format(self) -> wgpu::TextureFormat {
        match self {
            MapTextureKind::ProvinceId => wgpu::TextureFormat::Rg8Uint,
            MapTextureKind::ProvinceOwner => wgpu::TextureFormat::R16Uint,
            MapTextureKind::ProvinceColorPalette => wgpu::TextureFormat::Rgba8Unorm,
            MapTextureKind::CountryColorPalette => wgpu::TextureFormat::Rgba8Unorm,
            MapTextureKind::BorderMask => wgpu::TextureFormat::Rg8Unorm,
            MapTextureKind::Heightmap => wgpu::TextureFormat::R8Unorm,
            MapTextureKind::Normal => wgpu::TextureFormat::Rgba8Unorm,
            MapTextureKind::Highlight => wgpu::TextureFormat::Rgba8Unorm,
            MapTextureKind::FogOfWar => wgpu::TextureFormat::R8Unorm,
            MapTextureKind::MapModeArray => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    /// Point filtering everywhere except the decorative overlay textures,
    /// which are permitted linear filtering per §4.8.
    fn filterable(self) -> bool {
        matches!(self, MapTextureKind::Highlight | MapTextureKind::FogOfWar)
    }

    /// Fixed-size logical textures independent of map dimensions.
    fn fixed_extent(self) -> Option<(u32, u32)> {
        match self {
            MapTextureKind::ProvinceColorPalette => Some((256, 1)),
            MapTextureKind::CountryColorPalette => Some((1024, 1)),
            _ => None,
        }
    }

    fn bytes_per_pixel(self) -> u32 {
        match self {
            MapTextureKind::ProvinceId => 2,
            MapTextureKind::ProvinceOwner => 2,
            MapTextureKind::ProvinceColorPalette => 4,
            MapTextureKind::CountryColorPalette => 4,
            MapTextureKind::BorderMask => 2,
            MapTextureKind::Heightmap => 1,
            MapTextureKind::Normal => 4,
            MapTextureKind::Highlight => 4,
            MapTextureKind::FogOfWar => 1,
            MapTextureKind::MapModeArray => 4,
        }
    }

    fn usage(self) -> wgpu::TextureUsages {
        let base = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        match self {
            // compute-dispatcher output targets need STORAGE_BINDING
            MapTextureKind::ProvinceOwner | MapTextureKind::BorderMask => {
                base | wgpu::TextureUsages::STORAGE_BINDING
            }
            _ => base,
        }
    }
}

/// A GPU texture plus its view and sampler, mirroring the teacher's texture
/// wrapper pattern so every map texture carries exactly the handles a bind
/// group needs.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    fn new_empty(
        device: &wgpu::Device,
        kind: MapTextureKind,
        width: u32,
        height: u32,
        array_layers: u32,
    ) -> Self {
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: array_layers };
        let dimension = if array_layers > 1 { wgpu::TextureDimension::D2 } else { wgpu::TextureDimension::D2 };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(kind.material_slot_name()),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format: kind.format(),
            usage: kind.usage(),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let filter = if kind.filterable() { wgpu::FilterMode::Linear } else { wgpu::FilterMode::Nearest };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            anisotropy_clamp: 1,
            ..Default::default()
        });
        Self { texture, view, sampler, width, height }
    }

    fn upload(&self, queue: &wgpu::Queue, kind: MapTextureKind, bytes: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(kind.bytes_per_pixel() * self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
        );
    }
}

/// Anything a caller's material abstraction can bind a texture+sampler pair
/// into, by well-known name. The engine supplies no implementation; the
/// game layer's own material/shader-binding system implements this.
pub trait MaterialSlots {
    fn bind_texture(&mut self, slot_name: &'static str, view: &wgpu::TextureView, sampler: &wgpu::Sampler);
}

pub struct MapTextureManager {
    textures: HashMap<MapTextureKind, GpuTexture>,
    width: u32,
    height: u32,
    map_mode_slots: u32,
    /// CPU-side mirror of the ProvinceID texture, kept only so
    /// `get_province_id_at` doesn't need a GPU readback round-trip.
    province_id_mirror: Vec<u16>,
}

const MEMORY_BUDGET_BYTES: u64 = 100 * 1024 * 1024;

impl MapTextureManager {
    /// Allocates the full fixed texture set for a `width`x`height` province
    /// bitmap with `map_mode_slots` custom map-mode array layers. Logs (but
    /// does not fail) if the estimated footprint exceeds the §4.8 budget —
    /// the budget is a target for the reference map size, not a hard cap.
    pub fn new(device: &wgpu::Device, width: u32, height: u32, map_mode_slots: u32) -> RenderResult<Self> {
        let estimated = Self::estimate_bytes(width, height, map_mode_slots);
        if estimated > MEMORY_BUDGET_BYTES {
            log::warn!(
                target: "map_initialization",
                "texture set for {width}x{height} ({map_mode_slots} map modes) estimated at {} MB, exceeds the {} MB budget",
                estimated / (1024 * 1024),
                MEMORY_BUDGET_BYTES / (1024 * 1024),
            );
        }

        let mut textures = HashMap::new();
        for kind in [
            MapTextureKind::ProvinceId,
            MapTextureKind::ProvinceOwner,
            MapTextureKind::ProvinceColorPalette,
            MapTextureKind::CountryColorPalette,
            MapTextureKind::BorderMask,
            MapTextureKind::Heightmap,
            MapTextureKind::Normal,
            MapTextureKind::Highlight,
            MapTextureKind::FogOfWar,
            MapTextureKind::MapModeArray,
        ] {
            let (w, h) = kind.fixed_extent().unwrap_or((width, height));
            let layers = if kind == MapTextureKind::MapModeArray { map_mode_slots.max(1) } else { 1 };
            textures.insert(kind, GpuTexture::new_empty(device, kind, w, h, layers));
        }

        Ok(Self { textures, width, height, map_mode_slots, province_id_mirror: vec![0; (width * height) as usize] })
    }

    fn estimate_bytes(width: u32, height: u32, map_mode_slots: u32) -> u64 {
        let per_pixel_kinds = [
            MapTextureKind::ProvinceId,
            MapTextureKind::ProvinceOwner,
            MapTextureKind::BorderMask,
            MapTextureKind::Heightmap,
            MapTextureKind::Normal,
            MapTextureKind::Highlight,
            MapTextureKind::FogOfWar,
        ];
        let base: u64 = per_pixel_kinds
            .iter()
            .map(|k| (width as u64) * (height as u64) * k.bytes_per_pixel() as u64)
            .sum();
        let palettes: u64 = 256 * 4 + 1024 * 4;
        let map_modes: u64 = (width as u64) * (height as u64) * 4 * map_mode_slots.max(1) as u64;
        base + palettes + map_modes
    }

    /// Uploads the initial ProvinceID texture from a dense per-pixel
    /// province id array (row-major, `width * height` entries) produced by
    /// the bitmap loader, and keeps a CPU mirror for id lookups.
    pub fn upload_province_id(&mut self, queue: &wgpu::Queue, pixels: &[u16]) {
        assert_eq!(pixels.len(), self.province_id_mirror.len());
        self.province_id_mirror.copy_from_slice(pixels);
        let mut bytes = Vec::with_capacity(pixels.len() * 2);
        for &id in pixels {
            bytes.extend_from_slice(&id.to_le_bytes());
        }
        self.textures[&MapTextureKind::ProvinceId].upload(queue, MapTextureKind::ProvinceId, &bytes);
    }

    pub fn upload_palette(&self, queue: &wgpu::Queue, kind: MapTextureKind, rgba: &[u8]) {
        debug_assert!(matches!(kind, MapTextureKind::ProvinceColorPalette | MapTextureKind::CountryColorPalette));
        self.textures[&kind].upload(queue, kind, rgba);
    }

    pub fn upload_static_bitmap(&self, queue: &wgpu::Queue, kind: MapTextureKind, bytes: &[u8]) {
        self.textures[&kind].upload(queue, kind, bytes);
    }

    /// Loads `heightmap.bmp` / `normal.bmp` (§6 External Interfaces) from
    /// disk and uploads them into the matching single-channel or RGB slot.
    /// These are the only textures populated by decoding an image file
    /// rather than a compute dispatcher, since they're static for the
    /// lifetime of a loaded world.
    pub fn load_and_upload_static_bitmap(
        &self,
        queue: &wgpu::Queue,
        kind: MapTextureKind,
        path: &std::path::Path,
    ) -> RenderResult<()> {
        let img = image::open(path)?;
        let bytes: Vec<u8> = match kind {
            MapTextureKind::Heightmap | MapTextureKind::FogOfWar => img.to_luma8().into_raw(),
            MapTextureKind::Normal | MapTextureKind::Highlight => img.to_rgba8().into_raw(),
            _ => return Err(RenderError::UnsupportedFormat),
        };
        self.upload_static_bitmap(queue, kind, &bytes);
        Ok(())
    }

    pub fn texture(&self, kind: MapTextureKind) -> &GpuTexture {
        &self.textures[&kind]
    }

    pub fn map_mode_slots(&self) -> u32 {
        self.map_mode_slots
    }

    /// Wires every owned texture's view and sampler into `material` under
    /// its well-known property name. This is the only binding contract the
    /// engine exposes; a caller that never calls this gets the fallback
    /// magenta material from its own shading system.
    pub fn bind_textures_to_material(&self, material: &mut dyn MaterialSlots) {
        for (kind, tex) in &self.textures {
            material.bind_texture(kind.material_slot_name(), &tex.view, &tex.sampler);
        }
    }

    /// CPU-side lookup, backed by the mirror kept on upload — avoids a GPU
    /// readback for UI hit-testing (province picking under the cursor).
    pub fn get_province_id_at(&self, x: u32, y: u32) -> RenderResult<u16> {
        if x >= self.width || y >= self.height {
            return Err(RenderError::UnsupportedFormat);
        }
        Ok(self.province_id_mirror[(y * self.width + x) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_bytes_scales_with_map_modes() {
        let no_modes = MapTextureManager::estimate_bytes(5632, 2048, 0);
        let with_modes = MapTextureManager::estimate_bytes(5632, 2048, 4);
        assert!(with_modes > no_modes);
    }

    #[test]
    fn test_reference_map_under_budget() {
        // §4.8: <=100MB for 5632x2048 at a handful of map modes.
        let bytes = MapTextureManager::estimate_bytes(5632, 2048, 1);
        assert!(bytes <= MEMORY_BUDGET_BYTES, "{bytes} bytes exceeds budget");
    }

    #[test]
    fn test_material_slot_names_are_unique() {
        let kinds = [
            MapTextureKind::ProvinceId,
            MapTextureKind::ProvinceOwner,
            MapTextureKind::ProvinceColorPalette,
            MapTextureKind::CountryColorPalette,
            MapTextureKind::BorderMask,
            MapTextureKind::Heightmap,
            MapTextureKind::Normal,
            MapTextureKind::Highlight,
            MapTextureKind::FogOfWar,
            MapTextureKind::MapModeArray,
        ];
        let mut names: Vec<&str> = kinds.iter().map(|k| k.material_slot_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
    }
}
