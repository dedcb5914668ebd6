//! `SaveManager` (SPEC_FULL.md "Supplemented features"): save/load against
//! an already-bootstrapped [`GameState`], plus the §4.12 determinism check
//! that replays a save's command log and compares the resulting province
//! checksum to the one the save captured when it was written.
//!
//! Saves only carry dynamic state (province hot array, time state, command
//! log) — scenario-static data (province roster, terrain, adjacency) is
//! reloaded from the base data directory by `init::bootstrap`, never
//! duplicated into the save file (§4.12 step 4).

use crate::error::{EngineError, EngineResult};
use crate::init::SCENARIO_START;
use crate::state::GameState;
use archon_core::{
    diplomacy_apply_section, diplomacy_to_section, provinces_apply_section, provinces_checksum,
    provinces_to_section, rng_state_from_save, rng_state_to_section, time_state_from_save,
    time_state_to_section, CommandBus, CoreError, Date, GameCommand, SaveFile, SaveMetadata, TimeSystem,
};

pub struct SaveManager;

impl SaveManager {
    /// Snapshots `state`'s dynamic state into a `SaveFile`. `command_log` is
    /// the caller's accumulated tagged command frames (`GameCommand::to_wire`)
    /// since the baseline this save's replay check should start from.
    pub fn save(state: &GameState, metadata: SaveMetadata, command_log: Vec<Vec<u8>>) -> SaveFile {
        SaveFile {
            format_version: archon_core::save::SAVE_FORMAT_VERSION,
            metadata,
            sections: vec![
                time_state_to_section(state.time().state()),
                rng_state_to_section(state.rng_streams()),
                provinces_to_section(state.provinces()),
                diplomacy_to_section(state.modifiers()),
            ],
            command_log,
        }
    }

    /// Applies `save`'s dynamic state onto `state` in place. `state` must
    /// already be sized for the same province count the save was written
    /// from (i.e. bootstrapped from the same scenario).
    pub fn load(state: &mut GameState, save: &SaveFile) -> EngineResult<()> {
        let bytes = save
            .section("provinces")
            .ok_or_else(|| EngineError::Core(CoreError::SaveCorrupt("missing provinces section".into())))?;
        provinces_apply_section(state.provinces_mut(), bytes).map_err(EngineError::Core)?;

        if let Some(modifiers_bytes) = save.section("modifiers") {
            diplomacy_apply_section(state.modifiers_mut(), modifiers_bytes).map_err(EngineError::Core)?;
        }

        *state.rng_streams_mut() = rng_state_from_save(save).map_err(EngineError::Core)?;

        let time_state = time_state_from_save(save).map_err(EngineError::Core)?;
        *state.time_mut() = TimeSystem::from_state(time_state);

        let epoch = Date::new(SCENARIO_START.year, SCENARIO_START.month, SCENARIO_START.day);
        state.time_mut().reconcile_after_load(epoch);
        Ok(())
    }

    /// Replays `save.command_log` against `baseline` (already loaded to the
    /// tick the log's earliest command assumes) and verifies the resulting
    /// province checksum matches the one `save`'s own "provinces" section
    /// implies. Mismatch is reported, not panicked on — callers log it and
    /// decide whether to trust the save anyway (§4.12, §7: `DeterminismMismatch`
    /// is non-fatal by default).
    pub fn replay_and_verify(baseline: &mut GameState, save: &SaveFile) -> EngineResult<()> {
        let mut bus = CommandBus::new();
        let mut ticks: Vec<u64> = Vec::new();
        for frame in &save.command_log {
            let command = GameCommand::from_wire(frame).map_err(EngineError::Core)?;
            let tick = command.execution_tick() as u64;
            if !ticks.contains(&tick) {
                ticks.push(tick);
            }
            bus.submit(command);
        }
        ticks.sort_unstable();

        for tick in ticks {
            bus.run_tick(tick, baseline).map_err(EngineError::Core)?;
        }

        let saved_section = save
            .section("provinces")
            .ok_or_else(|| EngineError::Core(CoreError::SaveCorrupt("missing provinces section".into())))?;
        let expected = crc32fast::hash(saved_section);
        let actual = provinces_checksum(baseline.provinces());

        if expected != actual {
            log::warn!(target: "core_save", "determinism check failed: expected {expected:#x}, got {actual:#x}");
            return Err(EngineError::Core(CoreError::DeterminismMismatch { expected, actual }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

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

    fn minimal_scenario(base: &std::path::Path) {
        fs::create_dir_all(base.join("map")).unwrap();
        fs::create_dir_all(base.join("common/country_tags")).unwrap();
        fs::create_dir_all(base.join("common/countries")).unwrap();
        fs::create_dir_all(base.join("history/provinces")).unwrap();

        fs::write(base.join("map/definition.csv"), "province;red;green;blue;x\n1;10;20;30;Stockholm\n2;40;50;60;Ocean;x\n").unwrap();

        let bmp = make_bmp(&[(10, 20, 30), (40, 50, 60)], 2, 1);
        let mut file = fs::File::create(base.join("map/provinces.bmp")).unwrap();
        file.write_all(&bmp).unwrap();

        fs::write(base.join("common/country_tags/00_countries.txt"), "SWE = \"countries/Sweden.txt\"\nDAN = \"countries/Denmark.txt\"\n").unwrap();
        fs::write(base.join("common/countries/Sweden.txt"), "color = { 10 20 240 }\n").unwrap();
        fs::write(base.join("common/countries/Denmark.txt"), "color = { 200 10 10 }\n").unwrap();

        fs::write(base.join("history/provinces/1 - Stockholm.txt"), "owner = SWE\ncontroller = SWE\nbase_tax = 4\n").unwrap();
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        minimal_scenario(dir.path());

        let mut state =
            init::bootstrap(dir.path(), crate::context::ServiceContext::default(), 1, |_, _| {}).unwrap();

        let metadata = SaveMetadata {
            game_version: "0.1.0".into(),
            display_name: "test campaign".into(),
            timestamp_ticks: 0,
            game_tick: state.time().tick(),
            speed: state.time().state().speed,
            scenario_name: "minimal".into(),
        };
        let save = SaveManager::save(&state, metadata, vec![]);
        let bytes = save.encode();
        let decoded = SaveFile::decode(&bytes).unwrap();

        // The next roll after the save point, to check it's reproduced after load.
        let expected_next_roll = state.rng("diplomacy").next_u64();
        state.rng("diplomacy").next_u64(); // diverge the stream further past the save point

        let swe = state.countries().tag_to_id("SWE").unwrap();
        let dan = state.countries().tag_to_id("DAN").unwrap();
        state.provinces_mut().set_owner(archon_core::ProvinceId(1), dan, state.time().tick()).unwrap();
        state.provinces_mut().swap_buffers();
        assert_eq!(state.provinces().get_owner(archon_core::ProvinceId(1)).unwrap(), dan);

        SaveManager::load(&mut state, &decoded).unwrap();
        assert_eq!(state.provinces().get_owner(archon_core::ProvinceId(1)).unwrap(), swe);
        assert_eq!(state.rng("diplomacy").next_u64(), expected_next_roll);
    }

    #[test]
    fn test_replay_and_verify_matches_on_no_op_log() {
        let dir = tempdir().unwrap();
        minimal_scenario(dir.path());

        let state = init::bootstrap(dir.path(), crate::context::ServiceContext::default(), 1, |_, _| {}).unwrap();
        let metadata = SaveMetadata {
            game_version: "0.1.0".into(),
            display_name: "test campaign".into(),
            timestamp_ticks: 0,
            game_tick: state.time().tick(),
            speed: state.time().state().speed,
            scenario_name: "minimal".into(),
        };
        let save = SaveManager::save(&state, metadata, vec![]);

        let mut replayed =
            init::bootstrap(dir.path(), crate::context::ServiceContext::default(), 1, |_, _| {}).unwrap();
        SaveManager::replay_and_verify(&mut replayed, &save).unwrap();
    }

    #[test]
    fn test_replay_and_verify_detects_divergence() {
        let dir = tempdir().unwrap();
        minimal_scenario(dir.path());

        let state = init::bootstrap(dir.path(), crate::context::ServiceContext::default(), 1, |_, _| {}).unwrap();
        let metadata = SaveMetadata {
            game_version: "0.1.0".into(),
            display_name: "test campaign".into(),
            timestamp_ticks: 0,
            game_tick: state.time().tick(),
            speed: state.time().state().speed,
            scenario_name: "minimal".into(),
        };
        let save = SaveManager::save(&state, metadata, vec![]);

        let mut diverged =
            init::bootstrap(dir.path(), crate::context::ServiceContext::default(), 1, |_, _| {}).unwrap();
        let dan = diverged.countries().tag_to_id("DAN").unwrap();
        diverged.provinces_mut().set_owner(archon_core::ProvinceId(1), dan, 0).unwrap();
        diverged.provinces_mut().swap_buffers();

        let result = SaveManager::replay_and_verify(&mut diverged, &save);
        assert!(matches!(result, Err(EngineError::Core(CoreError::DeterminismMismatch { .. }))));
    }
}
