//! Save format (§3.9) and save/load path (§4.12). Binary, atomic-rename on
//! write, fixed subsystem order on both write and read. Sections are opaque
//! byte blobs to the outer framer; each subsystem owns its own layout.

use crate::diplomacy::{DiplomacySystem, OpinionModifier, RelationHot};
use crate::error::{CoreError, CoreResult};
use crate::fixed::FixedPoint64;
use crate::ids::ProvinceId;
use crate::province::{ProvinceHot, ProvinceSystem};
use crate::rng::RngStreams;
use crate::time::{GameSpeed, TimeState};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"HGSV";
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// Fixed subsystem write/read order per §4.12. A section not present in
/// this list is never emitted; reordering it is a save-format break.
pub const SECTION_ORDER: &[&str] =
    &["time", "rng", "resources", "provinces", "modifiers", "countries", "units", "player", "systems"];

#[derive(Debug, Clone)]
pub struct SaveMetadata {
    pub game_version: String,
    pub display_name: String,
    pub timestamp_ticks: u64,
    pub game_tick: u64,
    pub speed: GameSpeed,
    pub scenario_name: String,
}

/// A section is just a name plus its subsystem-owned opaque bytes.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SaveFile {
    pub format_version: u32,
    pub metadata: SaveMetadata,
    pub sections: Vec<Section>,
    pub command_log: Vec<Vec<u8>>,
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

fn speed_to_u8(speed: GameSpeed) -> u8 {
    match speed {
        GameSpeed::Paused => 0,
        GameSpeed::X1 => 1,
        GameSpeed::X2 => 2,
        GameSpeed::X5 => 5,
    }
}

fn speed_from_u8(byte: u8) -> CoreResult<GameSpeed> {
    match byte {
        0 => Ok(GameSpeed::Paused),
        1 => Ok(GameSpeed::X1),
        2 => Ok(GameSpeed::X2),
        5 => Ok(GameSpeed::X5),
        other => Err(CoreError::SaveCorrupt(format!("unknown game speed byte {other}"))),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(CoreError::SaveCorrupt("unexpected end of save file".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> CoreResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> CoreResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> CoreResult<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_string(&mut self) -> CoreResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| CoreError::SaveCorrupt(e.to_string()))
    }

    fn read_bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

impl SaveFile {
    /// Serializes the full save, including the trailing checksum, in the
    /// wire order described by §3.9.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(MAGIC);
        write_string(&mut body, &self.metadata.game_version);
        write_u32(&mut body, self.format_version);
        write_string(&mut body, &self.metadata.display_name);
        write_u64(&mut body, self.metadata.timestamp_ticks);
        write_u64(&mut body, self.metadata.game_tick);
        body.push(speed_to_u8(self.metadata.speed));
        write_string(&mut body, &self.metadata.scenario_name);

        write_u32(&mut body, self.sections.len() as u32);
        for section in &self.sections {
            write_string(&mut body, &section.name);
            write_bytes(&mut body, &section.bytes);
        }

        write_u32(&mut body, self.command_log.len() as u32);
        for command in &self.command_log {
            write_bytes(&mut body, command);
        }

        let checksum = crc32fast::hash(&body);
        write_u32(&mut body, checksum);
        body
    }

    /// Parses a save file, verifying the magic and checksum. Version
    /// mismatches are logged (warn-and-continue), not rejected: the caller
    /// decides whether to run an explicit migration.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < 4 + 4 {
            return Err(CoreError::SaveCorrupt("file too short".into()));
        }
        let checksum_offset = bytes.len() - 4;
        let expected = u32::from_le_bytes(bytes[checksum_offset..].try_into().unwrap());
        let actual = crc32fast::hash(&bytes[..checksum_offset]);
        if expected != actual {
            return Err(CoreError::DeterminismMismatch { expected, actual });
        }

        let mut reader = Reader::new(&bytes[..checksum_offset]);
        let magic = reader.take(4)?;
        if magic != MAGIC {
            return Err(CoreError::SaveCorrupt("bad magic".into()));
        }

        let game_version = reader.read_string()?;
        let format_version = reader.read_u32()?;
        if format_version != SAVE_FORMAT_VERSION {
            log::warn!(
                target: "core_save",
                "save format version {format_version} does not match engine version {SAVE_FORMAT_VERSION}; loading anyway"
            );
        }

        let display_name = reader.read_string()?;
        let timestamp_ticks = reader.read_u64()?;
        let game_tick = reader.read_u64()?;
        let speed = speed_from_u8(reader.read_u8()?)?;
        let scenario_name = reader.read_string()?;

        let section_count = reader.read_u32()?;
        let mut sections = Vec::with_capacity(section_count as usize);
        for _ in 0..section_count {
            let name = reader.read_string()?;
            let data = reader.read_bytes()?;
            sections.push(Section { name, bytes: data });
        }

        let command_count = reader.read_u32()?;
        let mut command_log = Vec::with_capacity(command_count as usize);
        for _ in 0..command_count {
            command_log.push(reader.read_bytes()?);
        }

        Ok(SaveFile {
            format_version,
            metadata: SaveMetadata { game_version, display_name, timestamp_ticks, game_tick, speed, scenario_name },
            sections,
            command_log,
        })
    }

    pub fn section(&self, name: &str) -> Option<&[u8]> {
        self.sections.iter().find(|s| s.name == name).map(|s| s.bytes.as_slice())
    }
}

/// Writes `save` to `<path>.sav.tmp` then renames over `path`, so a reader
/// never observes a half-written save file.
pub fn write_atomic(path: &Path, save: &SaveFile) -> CoreResult<()> {
    let tmp_path = path.with_extension("sav.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&save.encode())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_from_path(path: &Path) -> CoreResult<SaveFile> {
    let mut file = fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    SaveFile::decode(&bytes)
}

/// Reconstructs `TimeState` from a decoded save's metadata plus the
/// `"time"` section (which carries the accumulator and pause state that
/// the outer metadata doesn't).
pub fn time_state_from_save(save: &SaveFile) -> CoreResult<TimeState> {
    let bytes = save.section("time").ok_or_else(|| CoreError::SaveCorrupt("missing time section".into()))?;
    let mut reader = Reader::new(bytes);
    let tick = reader.read_u64()?;
    let accumulator = f64::from_le_bytes(reader.take(8)?.try_into().unwrap());
    let paused = reader.read_u8()? != 0;
    let hour_of_day = reader.read_u32()?;
    let year = reader.read_u32()? as i32;
    let month = reader.read_u8()?;
    let day = reader.read_u8()?;

    Ok(TimeState {
        tick,
        date: crate::date::Date::new(year, month, day),
        speed: save.metadata.speed,
        paused,
        accumulator,
        hour_of_day,
    })
}

/// Serializes the full province hot array (§3.2) into the `"provinces"`
/// section: every province's `owner_id`/`controller_id`/`development`/
/// `terrain`/`fort_level`/`flags`, in dense-index order. Cold data (names,
/// buildings, resources) is scenario-static and reloaded from the base data
/// directory rather than duplicated into the save.
pub fn provinces_to_section(system: &ProvinceSystem) -> Section {
    let snapshot = system.hot_snapshot();
    let mut bytes = Vec::with_capacity(4 + snapshot.len() * 8);
    write_u32(&mut bytes, snapshot.len() as u32);
    for hot in snapshot {
        bytes.extend_from_slice(&hot.owner_id.to_le_bytes());
        bytes.extend_from_slice(&hot.controller_id.to_le_bytes());
        bytes.push(hot.development);
        bytes.push(hot.terrain);
        bytes.push(hot.fort_level);
        bytes.push(hot.flags);
    }
    Section { name: "provinces".to_string(), bytes }
}

/// Applies a `"provinces"` section onto an already-bootstrapped system (the
/// system must have been sized for the same province count the section was
/// written from). Calls `seed_hot` for every entry, then
/// `sync_buffers_after_load` once, matching the bootstrap path's own
/// bulk-seed convention.
pub fn provinces_apply_section(system: &mut ProvinceSystem, bytes: &[u8]) -> CoreResult<()> {
    let mut reader = Reader::new(bytes);
    let count = reader.read_u32()? as usize;
    if count != system.province_count() {
        return Err(CoreError::SaveCorrupt(format!(
            "save has {count} provinces but the loaded scenario has {}",
            system.province_count()
        )));
    }
    for i in 0..count {
        let owner_id = u16::from_le_bytes(reader.take(2)?.try_into().unwrap());
        let controller_id = u16::from_le_bytes(reader.take(2)?.try_into().unwrap());
        let development = reader.read_u8()?;
        let terrain = reader.read_u8()?;
        let fort_level = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let hot = ProvinceHot { owner_id, controller_id, development, terrain, fort_level, flags };
        system.seed_hot(ProvinceId(i as u16), hot)?;
    }
    system.sync_buffers_after_load()
}

/// CRC32 of the province hot array's wire encoding, used as the
/// determinism-check fingerprint (§4.12, §8 property 6): two systems with
/// identical hot state always produce the same value, and this is cheap
/// enough to compute every `checksum_frequency` ticks.
pub fn provinces_checksum(system: &ProvinceSystem) -> u32 {
    crc32fast::hash(&provinces_to_section(system).bytes)
}

/// Serializes every named RNG stream (§4.13) into the `"rng"` section, so a
/// loaded save resumes drawing exactly where the saved game left off rather
/// than replaying from the bootstrap seed.
pub fn rng_state_to_section(rng: &RngStreams) -> Section {
    let json = serde_json::to_vec(rng).expect("RngStreams serialization is infallible");
    Section { name: "rng".to_string(), bytes: json }
}

pub fn rng_state_from_save(save: &SaveFile) -> CoreResult<RngStreams> {
    let bytes = save.section("rng").ok_or_else(|| CoreError::SaveCorrupt("missing rng section".into()))?;
    serde_json::from_slice(bytes).map_err(|e| CoreError::SaveCorrupt(e.to_string()))
}

/// Serializes diplomatic relation state (§3.6) into the `"modifiers"`
/// section: the relation table plus the live opinion-modifier list.
/// `FixedPoint64` fields keep their own big-endian wire encoding (§3.1's
/// carve-out); only the outer framing (counts, keys, flags) is
/// little-endian like the rest of the save.
pub fn diplomacy_to_section(diplomacy: &DiplomacySystem) -> Section {
    let mut bytes = Vec::new();

    let relations = diplomacy.relations_snapshot();
    write_u32(&mut bytes, relations.len() as u32);
    for (key, hot) in relations {
        write_u64(&mut bytes, *key);
        bytes.extend_from_slice(&hot.base_opinion.to_be_bytes());
        bytes.push(hot.at_war as u8);
        write_u32(&mut bytes, hot.treaty_mask);
    }

    let modifiers = diplomacy.modifiers_snapshot();
    write_u32(&mut bytes, modifiers.len() as u32);
    for (key, modifier) in modifiers {
        write_u64(&mut bytes, *key);
        bytes.extend_from_slice(&modifier.type_id.to_le_bytes());
        bytes.extend_from_slice(&modifier.value.to_be_bytes());
        write_i32(&mut bytes, modifier.applied_tick);
        write_i32(&mut bytes, modifier.decay_rate);
    }

    Section { name: "modifiers".to_string(), bytes }
}

/// Applies a `"modifiers"` section onto `diplomacy`, replacing its relation
/// table and modifier list wholesale.
pub fn diplomacy_apply_section(diplomacy: &mut DiplomacySystem, bytes: &[u8]) -> CoreResult<()> {
    let mut reader = Reader::new(bytes);

    let relation_count = reader.read_u32()?;
    let mut relations = HashMap::with_capacity(relation_count as usize);
    for _ in 0..relation_count {
        let key = reader.read_u64()?;
        let base_opinion = FixedPoint64::from_be_bytes(reader.take(8)?.try_into().unwrap());
        let at_war = reader.read_u8()? != 0;
        let treaty_mask = reader.read_u32()?;
        relations.insert(key, RelationHot { base_opinion, at_war, treaty_mask });
    }

    let modifier_count = reader.read_u32()?;
    let mut modifiers = Vec::with_capacity(modifier_count as usize);
    for _ in 0..modifier_count {
        let key = reader.read_u64()?;
        let type_id = u16::from_le_bytes(reader.take(2)?.try_into().unwrap());
        let value = FixedPoint64::from_be_bytes(reader.take(8)?.try_into().unwrap());
        let applied_tick = reader.read_i32()?;
        let decay_rate = reader.read_i32()?;
        modifiers.push((key, OpinionModifier { type_id, value, applied_tick, decay_rate }));
    }

    diplomacy.restore(relations, modifiers);
    Ok(())
}

pub fn time_state_to_section(state: &TimeState) -> Section {
    let mut bytes = Vec::new();
    write_u64(&mut bytes, state.tick);
    bytes.extend_from_slice(&state.accumulator.to_le_bytes());
    bytes.push(state.paused as u8);
    write_u32(&mut bytes, state.hour_of_day);
    write_u32(&mut bytes, state.date.year as u32);
    bytes.push(state.date.month);
    bytes.push(state.date.day);
    Section { name: "time".to_string(), bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::Date;
    use crate::ids::CountryId;
    use tempfile::tempdir;

    fn sample_save() -> SaveFile {
        let time_state = TimeState {
            tick: 123,
            date: Date::new(1444, 3, 2),
            speed: GameSpeed::X1,
            paused: false,
            accumulator: 0.5,
            hour_of_day: 3,
        };

        SaveFile {
            format_version: SAVE_FORMAT_VERSION,
            metadata: SaveMetadata {
                game_version: "0.1.0".into(),
                display_name: "my campaign".into(),
                timestamp_ticks: 1000,
                game_tick: 123,
                speed: GameSpeed::X1,
                scenario_name: "1444_start".into(),
            },
            sections: vec![time_state_to_section(&time_state), Section { name: "provinces".into(), bytes: vec![1, 2, 3] }],
            command_log: vec![vec![0xAA, 0xBB]],
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let save = sample_save();
        let bytes = save.encode();
        let decoded = SaveFile::decode(&bytes).unwrap();

        assert_eq!(decoded.metadata.display_name, "my campaign");
        assert_eq!(decoded.metadata.game_tick, 123);
        assert_eq!(decoded.sections.len(), 2);
        assert_eq!(decoded.section("provinces"), Some([1u8, 2, 3].as_slice()));
        assert_eq!(decoded.command_log, vec![vec![0xAA, 0xBB]]);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let save = sample_save();
        let mut bytes = save.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let result = SaveFile::decode(&bytes);
        assert!(matches!(result, Err(CoreError::DeterminismMismatch { .. })));
    }

    #[test]
    fn test_version_mismatch_warns_but_loads() {
        let save = sample_save();
        let mut bytes = save.encode();
        // Format version is the 4 bytes right after the length-prefixed
        // game_version string; corrupt it in place, then re-checksum.
        let version_offset = 4 + 4 + save.metadata.game_version.len();
        bytes[version_offset..version_offset + 4].copy_from_slice(&999u32.to_le_bytes());
        let checksum_offset = bytes.len() - 4;
        let new_checksum = crc32fast::hash(&bytes[..checksum_offset]);
        bytes[checksum_offset..].copy_from_slice(&new_checksum.to_le_bytes());

        let decoded = SaveFile::decode(&bytes).unwrap();
        assert_eq!(decoded.format_version, 999);
    }

    #[test]
    fn test_atomic_write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("campaign.sav");
        let save = sample_save();

        write_atomic(&path, &save).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("sav.tmp").exists());

        let loaded = read_from_path(&path).unwrap();
        assert_eq!(loaded.metadata.display_name, "my campaign");
    }

    #[test]
    fn test_time_state_section_round_trip() {
        let state = TimeState {
            tick: 77,
            date: Date::new(1500, 6, 15),
            speed: GameSpeed::X2,
            paused: true,
            accumulator: 0.25,
            hour_of_day: 5,
        };
        let save = SaveFile {
            format_version: SAVE_FORMAT_VERSION,
            metadata: SaveMetadata {
                game_version: "0.1.0".into(),
                display_name: "x".into(),
                timestamp_ticks: 0,
                game_tick: 77,
                speed: GameSpeed::X2,
                scenario_name: "x".into(),
            },
            sections: vec![time_state_to_section(&state)],
            command_log: vec![],
        };

        let restored = time_state_from_save(&save).unwrap();
        assert_eq!(restored.tick, 77);
        assert_eq!(restored.date, Date::new(1500, 6, 15));
        assert!(restored.paused);
        assert_eq!(restored.hour_of_day, 5);
    }

    #[test]
    fn test_provinces_section_round_trip() {
        let mut system = ProvinceSystem::new(3, 2);
        system.seed_hot(ProvinceId(1), ProvinceHot { owner_id: 1, development: 5, ..Default::default() }).unwrap();
        system.seed_hot(ProvinceId(2), ProvinceHot { owner_id: 1, development: 2, terrain: 3, ..Default::default() }).unwrap();
        system.sync_buffers_after_load().unwrap();

        let section = provinces_to_section(&system);
        let checksum = provinces_checksum(&system);

        let mut restored = ProvinceSystem::new(3, 2);
        provinces_apply_section(&mut restored, &section.bytes).unwrap();

        assert_eq!(restored.get_owner(ProvinceId(1)).unwrap(), CountryId(1));
        assert_eq!(restored.get_development(ProvinceId(2)).unwrap(), 2);
        assert_eq!(provinces_checksum(&restored), checksum);
    }

    #[test]
    fn test_rng_section_round_trip() {
        let mut streams = RngStreams::new(42);
        let first_draw = streams.stream("diplomacy").next_u64();

        let section = rng_state_to_section(&streams);
        let save = SaveFile {
            format_version: SAVE_FORMAT_VERSION,
            metadata: SaveMetadata {
                game_version: "0.1.0".into(),
                display_name: "x".into(),
                timestamp_ticks: 0,
                game_tick: 0,
                speed: GameSpeed::X1,
                scenario_name: "x".into(),
            },
            sections: vec![section],
            command_log: vec![],
        };

        let mut restored = rng_state_from_save(&save).unwrap();
        assert_eq!(restored.global_seed(), streams.global_seed());
        assert_eq!(restored.stream("diplomacy").next_u64(), streams.stream("diplomacy").next_u64());
        let _ = first_draw;
    }

    #[test]
    fn test_diplomacy_section_round_trip() {
        use crate::diplomacy::OpinionModifier;

        let mut diplomacy = DiplomacySystem::new();
        let a = CountryId(1);
        let b = CountryId(2);
        diplomacy.set_base_opinion(a, b, FixedPoint64::from_int(25));
        diplomacy.set_at_war(a, b, true);
        diplomacy.add_treaty(a, b, crate::diplomacy::TREATY_ALLIANCE);
        diplomacy.add_modifier(
            a,
            b,
            OpinionModifier { type_id: 3, value: FixedPoint64::from_int(10), applied_tick: 5, decay_rate: 50 },
        );

        let section = diplomacy_to_section(&diplomacy);

        let mut restored = DiplomacySystem::new();
        diplomacy_apply_section(&mut restored, &section.bytes).unwrap();

        let relation = restored.get_relation(a, b);
        assert_eq!(relation.base_opinion, FixedPoint64::from_int(25));
        assert!(relation.at_war);
        assert!(restored.has_treaty(a, b, crate::diplomacy::TREATY_ALLIANCE));
        assert_eq!(restored.current_opinion(a, b, 5), FixedPoint64::from_int(35));
    }

    #[test]
    fn test_provinces_section_rejects_wrong_size() {
        let system = ProvinceSystem::new(3, 2);
        let section = provinces_to_section(&system);

        let mut mismatched = ProvinceSystem::new(4, 2);
        let result = provinces_apply_section(&mut mismatched, &section.bytes);
        assert!(matches!(result, Err(CoreError::SaveCorrupt(_))));
    }
}
