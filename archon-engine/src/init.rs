//! Initialization orchestrator (§4.7, §9): loads a scenario from a base data
//! directory and assembles a ready-to-run [`GameState`], in the fixed
//! dependency order the engine requires: static registries → bitmap +
//! definition → province registry → country registry → scenario history →
//! adjacency scan → (caller-driven) map textures → "everything ready".
//!
//! Required-phase failures abort the whole bootstrap and are reported as a
//! single `EngineError::InitPhaseFailed` naming the phase (§7 propagation
//! policy); per-file loader failures inside an optional phase (scenario
//! history, country records) are already logged-and-skipped by the loaders
//! themselves and never reach this orchestrator as a hard error.

use crate::context::ServiceContext;
use crate::error::{EngineError, EngineResult};
use crate::state::GameState;
use archon_core::{
    CommandBus, CountryCold, CountrySystem, Date, DiplomacySystem, EventBus, FixedPoint64,
    ProvinceHot, ProvinceSystem, ResourceInventory, RngStreams, TimeSystem,
};
use archon_core::ids::{CountryId, ProvinceId};
use archon_data::adjacency::build_adjacency_graph;
use archon_data::countries::{load_country_map, load_tags};
use archon_data::definition::ProvinceRoster;
use archon_data::history::load_province_history;
use archon_data::terrain::load_terrain;
use archon_data::{cultures, religions};
use archon_txt::RawDate;
use std::collections::HashMap;
use std::path::Path;

/// Every shipped scenario starts here; history is folded up to this date
/// (§4.7 step "scenario history"). A future multi-scenario engine would make
/// this a parameter, but only one start date exists today.
pub const SCENARIO_START: RawDate = RawDate { year: 1444, month: 11, day: 11 };

fn phase_err(phase: &'static str) -> impl Fn(archon_data::DataError) -> EngineError {
    move |e| EngineError::InitPhaseFailed { phase, reason: e.to_string() }
}

/// Loads everything under `base_path` and returns a ready `GameState`.
/// `on_progress(phase, percent)` is called at the start and end of each
/// phase so an embedding UI can render a loading bar; percent is always
/// 0..=100 within a phase, never across the whole run.
pub fn bootstrap(
    base_path: &Path,
    ctx: ServiceContext,
    rng_seed: u64,
    mut on_progress: impl FnMut(&'static str, u8),
) -> EngineResult<GameState> {
    let config = ctx.config().clone();
    log::info!(target: ctx.log_target(), "bootstrapping scenario from {}", base_path.display());

    on_progress("static_registries", 0);
    cultures::load_cultures(base_path).map_err(phase_err("static_registries"))?;
    religions::load_religions(base_path).map_err(phase_err("static_registries"))?;
    on_progress("static_registries", 100);

    on_progress("bitmap_and_definition", 0);
    let roster = ProvinceRoster::load(&base_path.join("map/definition.csv"))
        .map_err(phase_err("bitmap_and_definition"))?;
    on_progress("bitmap_and_definition", 100);

    // Country tags/records are read ahead of constructing either system so
    // `ProvinceSystem::new` can be sized for the real country count up
    // front; the "country registry" phase below is the one that actually
    // registers them with the simulation core.
    on_progress("country_tags", 0);
    let tags = load_tags(base_path).map_err(phase_err("country_tags"))?;
    let country_records = load_country_map(base_path, &tags);
    on_progress("country_tags", 100);

    let province_count = roster.len() + 1;
    let country_count = country_records.len() + 1;

    on_progress("province_registry", 0);
    let mut provinces = ProvinceSystem::new(province_count, country_count);
    let terrain = load_terrain(&base_path.join("map/terrain.txt"), &roster)
        .map_err(phase_err("province_registry"))?;
    on_progress("province_registry", 100);

    on_progress("country_registry", 0);
    let mut countries = CountrySystem::new(country_count);
    let mut tag_to_country: HashMap<String, CountryId> = HashMap::new();
    // Sorted so registration order (and therefore assigned CountryId values)
    // is identical across runs regardless of filesystem directory order.
    let mut sorted_tags: Vec<&String> = country_records.keys().collect();
    sorted_tags.sort();
    for tag in sorted_tags {
        let record = &country_records[tag];
        let full_color = match record.color.as_slice() {
            [r, g, b, ..] => [*r, *g, *b],
            _ => [128, 128, 128],
        };
        let id = countries
            .register(
                tag,
                CountryCold {
                    tag: tag.clone(),
                    display_name: tag.clone(),
                    preferred_religion: None,
                    revolutionary_color: None,
                    full_color,
                },
            )
            .map_err(|e| EngineError::InitPhaseFailed { phase: "country_registry", reason: e.to_string() })?;
        tag_to_country.insert(tag.clone(), id);
    }
    on_progress("country_registry", 100);

    on_progress("scenario_history", 0);
    let (history, (loaded, failed)) =
        load_province_history(base_path).map_err(phase_err("scenario_history"))?;
    log::info!(target: "core_data_loading", "loaded {loaded} province history files ({failed} failed)");

    for (dense_index, definition) in roster.iter() {
        let province_id = ProvinceId((dense_index + 1) as u16);
        let mut hot = ProvinceHot::default();
        hot.set_ocean(definition.is_water);

        if let Some(terrain_id) = terrain.overrides.get(&(dense_index as u32)) {
            hot.terrain = terrain_id.0 as u8;
        }

        let fields = history
            .get(&definition.definition_id.0)
            .map(|record| record.effective_at(SCENARIO_START));

        if let Some(fields) = &fields {
            if let Some(owner) = fields.owner.as_ref().and_then(|tag| tag_to_country.get(tag)) {
                hot.owner_id = owner.0;
                hot.controller_id =
                    fields.controller.as_ref().and_then(|tag| tag_to_country.get(tag)).unwrap_or(owner).0;
            }
        }

        provinces
            .seed_hot(province_id, hot)
            .map_err(|e| EngineError::InitPhaseFailed { phase: "scenario_history", reason: e.to_string() })?;

        let cold = provinces.cold_data_mut(province_id);
        cold.display_name = definition.name.clone();
        if let Some(fields) = &fields {
            cold.resources = ResourceInventory {
                base_tax: FixedPoint64::from_f64(fields.base_tax.unwrap_or(0.0) as f64),
                base_production: FixedPoint64::from_f64(fields.base_production.unwrap_or(0.0) as f64),
                base_manpower: FixedPoint64::from_f64(fields.base_manpower.unwrap_or(0.0) as f64),
                trade_good_id: 0,
            };
        }
    }

    provinces
        .sync_buffers_after_load()
        .map_err(|e| EngineError::InitPhaseFailed { phase: "scenario_history", reason: e.to_string() })?;
    on_progress("scenario_history", 100);

    on_progress("adjacency_scan", 0);
    let adjacency = build_adjacency_graph(
        &base_path.join("map/provinces.bmp"),
        &base_path.join("map/adjacencies.csv"),
        &roster,
        config.adjacency_diagonals,
    )
    .map_err(phase_err("adjacency_scan"))?;
    on_progress("adjacency_scan", 100);

    // Map textures are intentionally not built here: they require a
    // `wgpu::Device`/`wgpu::Queue`, which the data-loading bootstrap never
    // owns (§5: GPU buffers are written only by compute dispatchers, and
    // visual-style application is a caller responsibility). Callers build
    // their `archon_render::MapTextureManager` once they have a device,
    // using `GameState::provinces()`/`countries()` to populate the initial
    // textures via the compute dispatchers.
    log::info!(target: ctx.log_target(), "bootstrap complete: {} provinces, {} countries", province_count - 1, country_count - 1);
    on_progress("ready", 100);

    Ok(GameState {
        provinces,
        countries,
        diplomacy: DiplomacySystem::new(),
        time: TimeSystem::new(Date::new(SCENARIO_START.year, SCENARIO_START.month, SCENARIO_START.day)),
        events: EventBus::new(),
        commands: CommandBus::new(),
        rng: RngStreams::new(rng_seed),
        adjacency,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    /// 2x1 24-bit BMP, two distinct colors, headers matching the minimal
    /// parser in `archon_data::bitmap`.
    fn make_bmp(pixels: &[(u8, u8, u8)], width: u32, height: u32) -> Vec<u8> {
        let row_size = (width * 3).div_ceil(4) * 4;
        let pixel_data_size = row_size * height;
        let file_size = 54 + pixel_data_size;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BM");
        bytes.extend_from_slice(&file_size.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(&54u32.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&(width as i32).to_le_bytes());
        bytes.extend_from_slice(&(height as i32).to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&24u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 24]);
        for y in (0..height).rev() {
            let mut row = Vec::new();
            for x in 0..width {
                let (r, g, b) = pixels[(y * width + x) as usize];
                row.extend_from_slice(&[b, g, r]);
            }
            row.resize(row_size as usize, 0);
            bytes.extend_from_slice(&row);
        }
        bytes
    }

    #[test]
    fn test_bootstrap_minimal_scenario() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("map")).unwrap();
        fs::create_dir_all(base.join("common/country_tags")).unwrap();
        fs::create_dir_all(base.join("history/provinces")).unwrap();

        fs::write(
            base.join("map/definition.csv"),
            "province;red;green;blue;x\n1;10;20;30;Stockholm\n2;40;50;60;Ocean;x\n",
        )
        .unwrap();

        let bmp = make_bmp(&[(10, 20, 30), (40, 50, 60)], 2, 1);
        let mut file = fs::File::create(base.join("map/provinces.bmp")).unwrap();
        file.write_all(&bmp).unwrap();

        fs::write(base.join("common/country_tags/00_countries.txt"), "SWE = \"countries/Sweden.txt\"\n").unwrap();
        fs::create_dir_all(base.join("common/countries")).unwrap();
        fs::write(base.join("common/countries/Sweden.txt"), "color = { 10 20 240 }\n").unwrap();

        fs::write(
            base.join("history/provinces/1 - Stockholm.txt"),
            "owner = SWE\ncontroller = SWE\nbase_tax = 4\nbase_production = 3\nbase_manpower = 2\n",
        )
        .unwrap();

        let mut phases_seen = Vec::new();
        let state = bootstrap(base, ServiceContext::default(), 42, |phase, pct| {
            if pct == 100 {
                phases_seen.push(phase);
            }
        })
        .unwrap();

        assert!(phases_seen.contains(&"scenario_history"));
        assert!(phases_seen.contains(&"adjacency_scan"));

        let swe = state.countries().tag_to_id("SWE").unwrap();
        assert_eq!(state.provinces().get_owner(ProvinceId(1)).unwrap(), swe);

        let resources = state.resources().get_resources(ProvinceId(1));
        assert_eq!(resources.base_tax, FixedPoint64::from_int(4));
    }
}
