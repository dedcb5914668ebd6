//! Map-mode framework (§4.11): a map mode is a named texture-population
//! strategy. The framework owns dirty-tracking; in steady state only
//! provinces flagged dirty by the event bus are ever re-touched. Full
//! texture regeneration after the initial load is a bug, not an
//! optimization opportunity.

use crate::error::{RenderError, RenderResult};
use archon_core::{CountrySystem, ProvinceId, ProvinceSystem};
use std::collections::HashSet;

/// What a map mode needs to decide how to (re)populate its palette/texture
/// entries. Borrowed rather than owned: map modes never outlive a single
/// tick's read of simulation state.
pub struct MapModeContext<'a> {
    pub provinces: &'a ProvinceSystem,
    pub countries: &'a CountrySystem,
}

pub trait MapMode {
    fn name(&self) -> &str;

    /// Called when this mode becomes the active one. Typically a full
    /// (one-time) texture population.
    fn on_enter(&mut self, ctx: &MapModeContext, out: &mut dyn MapModeTextureWriter);

    fn on_exit(&mut self, ctx: &MapModeContext);

    /// Called with exactly the set of provinces the dirty tracker recorded
    /// since the last call. Must not re-derive anything for provinces not
    /// in `dirty`.
    fn on_texture_update_requested(&mut self, ctx: &MapModeContext, dirty: &[ProvinceId], out: &mut dyn MapModeTextureWriter);
}

/// What a map mode writes into. The engine supplies the real GPU-backed
/// implementation (palette upload into `MapTextureManager`); tests use a
/// plain in-memory recorder.
pub trait MapModeTextureWriter {
    fn write_province_palette_entry(&mut self, province: ProvinceId, rgba: [u8; 4]);
}

/// Default mode: owner -> owner's palette color, written per-province.
/// Incrementally updated on `ProvinceOwnershipChanged`.
pub struct PoliticalMapMode;

impl MapMode for PoliticalMapMode {
    fn name(&self) -> &str {
        "political"
    }

    fn on_enter(&mut self, ctx: &MapModeContext, out: &mut dyn MapModeTextureWriter) {
        for country in ctx.countries.get_all_country_ids() {
            let color = ctx.countries.get_color(country).unwrap_or(0);
            let rgba = color_u32_to_rgba(color);
            for province in ctx.provinces.get_country_provinces(country) {
                out.write_province_palette_entry(province, rgba);
            }
        }
    }

    fn on_exit(&mut self, _ctx: &MapModeContext) {}

    fn on_texture_update_requested(&mut self, ctx: &MapModeContext, dirty: &[ProvinceId], out: &mut dyn MapModeTextureWriter) {
        for &province in dirty {
            let Ok(owner) = ctx.provinces.get_owner(province) else { continue };
            let rgba = if owner.is_none() {
                [0, 0, 0, 0]
            } else {
                color_u32_to_rgba(ctx.countries.get_color(owner).unwrap_or(0))
            };
            out.write_province_palette_entry(province, rgba);
        }
    }
}

fn color_u32_to_rgba(packed: u32) -> [u8; 4] {
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8, 255]
}

/// Default mode: the loaded terrain bitmap, verbatim. Never dirties — the
/// terrain bitmap is immutable for the lifetime of a loaded world.
pub struct TerrainMapMode;

impl MapMode for TerrainMapMode {
    fn name(&self) -> &str {
        "terrain"
    }

    fn on_enter(&mut self, _ctx: &MapModeContext, _out: &mut dyn MapModeTextureWriter) {
        // Terrain texture is uploaded once at load time by the data loader;
        // nothing to do here beyond becoming active.
    }

    fn on_exit(&mut self, _ctx: &MapModeContext) {}

    fn on_texture_update_requested(&mut self, _ctx: &MapModeContext, _dirty: &[ProvinceId], _out: &mut dyn MapModeTextureWriter) {}
}

/// Owns every registered map mode and the currently-dirty province set.
/// Additional modes beyond the two defaults are game policy, registered
/// into a numbered `MapModeTextureArray` slot.
pub struct MapModeManager {
    slots: Vec<Option<Box<dyn MapMode>>>,
    active: Option<usize>,
    dirty: HashSet<ProvinceId>,
}

impl Default for MapModeManager {
    fn default() -> Self {
        let mut manager = Self { slots: Vec::new(), active: None, dirty: HashSet::new() };
        manager.slots.push(Some(Box::new(PoliticalMapMode)));
        manager.slots.push(Some(Box::new(TerrainMapMode)));
        manager
    }
}

impl MapModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` into `index`. A slot that's already occupied is
    /// overwritten (with a warning) rather than rejected: map modes are
    /// game policy and a game reloading its own mod data expects last-write
    /// wins, the same way the rest of this engine treats config reloads.
    pub fn register_handler(&mut self, index: usize, handler: Box<dyn MapMode>) -> RenderResult<()> {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        if self.slots[index].is_some() {
            log::warn!(target: "map_initialization", "map mode slot {index} overwritten by a new handler");
        }
        self.slots[index] = Some(handler);
        Ok(())
    }

    pub fn set_mode(&mut self, index: usize, ctx: &MapModeContext, out: &mut dyn MapModeTextureWriter) -> RenderResult<()> {
        if index >= self.slots.len() || self.slots[index].is_none() {
            return Err(RenderError::UnknownMapMode(index.to_string()));
        }
        if let Some(prev) = self.active {
            if let Some(handler) = &mut self.slots[prev] {
                handler.on_exit(ctx);
            }
        }
        self.dirty.clear();
        let handler = self.slots[index].as_mut().unwrap();
        handler.on_enter(ctx, out);
        self.active = Some(index);
        Ok(())
    }

    pub fn mark_dirty(&mut self, province: ProvinceId) {
        self.dirty.insert(province);
    }

    /// Drains the dirty set and forwards it to the active mode, if any.
    /// No-op (and doesn't touch the dirty set) when no mode is active yet.
    pub fn flush_dirty(&mut self, ctx: &MapModeContext, out: &mut dyn MapModeTextureWriter) {
        let Some(active) = self.active else { return };
        if self.dirty.is_empty() {
            return;
        }
        let dirty: Vec<ProvinceId> = self.dirty.drain().collect();
        if let Some(handler) = &mut self.slots[active] {
            handler.on_texture_update_requested(ctx, &dirty, out);
        }
    }

    pub fn active_mode_name(&self) -> Option<&str> {
        self.active.and_then(|i| self.slots[i].as_ref()).map(|h| h.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_core::{CountryCold, CountryId, CountrySystem, ProvinceSystem};

    struct RecordingWriter {
        writes: Vec<(ProvinceId, [u8; 4])>,
    }

    impl MapModeTextureWriter for RecordingWriter {
        fn write_province_palette_entry(&mut self, province: ProvinceId, rgba: [u8; 4]) {
            self.writes.push((province, rgba));
        }
    }

    fn setup() -> (ProvinceSystem, CountrySystem) {
        let mut provinces = ProvinceSystem::new(4, 2);
        let mut countries = CountrySystem::new(2);
        countries
            .register("SWE", CountryCold { tag: "SWE".into(), display_name: "Sweden".into(), preferred_religion: None, revolutionary_color: None, full_color: [10, 20, 30] })
            .unwrap();
        provinces.set_owner(ProvinceId(1), CountryId(1), 0).unwrap();
        provinces.swap_buffers();
        (provinces, countries)
    }

    #[test]
    fn test_default_manager_has_political_and_terrain() {
        let manager = MapModeManager::default();
        assert!(manager.slots[0].is_some());
        assert!(manager.slots[1].is_some());
    }

    #[test]
    fn test_set_mode_invokes_on_enter_and_populates_political() {
        let (provinces, countries) = setup();
        let ctx = MapModeContext { provinces: &provinces, countries: &countries };
        let mut writer = RecordingWriter { writes: Vec::new() };
        let mut manager = MapModeManager::default();
        manager.set_mode(0, &ctx, &mut writer).unwrap();
        assert!(writer.writes.iter().any(|(p, _)| *p == ProvinceId(1)));
        assert_eq!(manager.active_mode_name(), Some("political"));
    }

    #[test]
    fn test_unknown_slot_is_rejected() {
        let (provinces, countries) = setup();
        let ctx = MapModeContext { provinces: &provinces, countries: &countries };
        let mut writer = RecordingWriter { writes: Vec::new() };
        let mut manager = MapModeManager::default();
        assert!(manager.set_mode(99, &ctx, &mut writer).is_err());
    }

    #[test]
    fn test_duplicate_registration_overwrites() {
        let mut manager = MapModeManager::default();
        manager.register_handler(0, Box::new(TerrainMapMode)).unwrap();
        assert_eq!(manager.slots[0].as_ref().unwrap().name(), "terrain");
    }

    #[test]
    fn test_flush_dirty_only_touches_marked_provinces() {
        let (provinces, countries) = setup();
        let ctx = MapModeContext { provinces: &provinces, countries: &countries };
        let mut writer = RecordingWriter { writes: Vec::new() };
        let mut manager = MapModeManager::default();
        manager.set_mode(0, &ctx, &mut writer).unwrap();
        writer.writes.clear();

        manager.mark_dirty(ProvinceId(1));
        manager.flush_dirty(&ctx, &mut writer);
        assert_eq!(writer.writes.len(), 1);
        assert_eq!(writer.writes[0].0, ProvinceId(1));
    }
}
