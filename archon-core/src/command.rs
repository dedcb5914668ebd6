//! Command bus (§4.5): the sole mutator of simulation state during
//! gameplay. Every command is a fixed-size binary wire frame (§3.8); the
//! byte layout is part of the save/network contract and must never change
//! shape without a format version bump.

use crate::country::CountrySystem;
use crate::diplomacy::DiplomacySystem;
use crate::error::{CoreError, CoreResult};
use crate::ids::{CountryId, ProvinceId};
use crate::province::ProvinceSystem;
use std::collections::VecDeque;

/// Everything a command needs to validate and execute against. Implemented
/// by the engine-level game state hub; kept as a trait here so the command
/// bus has no dependency on that hub's concrete shape.
pub trait CommandContext {
    fn provinces(&self) -> &ProvinceSystem;
    fn provinces_mut(&mut self) -> &mut ProvinceSystem;
    fn countries(&self) -> &CountrySystem;
    fn diplomacy_mut(&mut self) -> &mut DiplomacySystem;
    fn current_tick(&self) -> u64;
}

/// A simple CRC-8 (polynomial 0x07) checksum over a command's payload
/// bytes, used as the wire frame's trailing integrity byte.
fn crc8(bytes: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &b in bytes {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
    }
    crc
}

/// `ChangeOwner`: 13 bytes, `executionTick:u32 | playerID:u16 |
/// provinceID:u16 | newOwnerID:u16 | newControllerID:u16 | crc:u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOwner {
    pub execution_tick: u32,
    pub player_id: u16,
    pub province_id: ProvinceId,
    pub new_owner: CountryId,
    pub new_controller: CountryId,
}

impl ChangeOwner {
    pub const WIRE_SIZE: usize = 13;

    pub fn validate(&self, ctx: &dyn CommandContext) -> Result<(), String> {
        if !ctx.provinces().exists(self.province_id) {
            return Err(format!("province {} does not exist", self.province_id.0));
        }
        if !ctx.countries().exists(self.new_owner) {
            return Err(format!("country {} does not exist", self.new_owner.0));
        }
        if !ctx.countries().exists(self.new_controller) {
            return Err(format!("country {} does not exist", self.new_controller.0));
        }
        let hot_owner = ctx.provinces().get_owner(self.province_id).map_err(|e| e.to_string())?;
        let _ = hot_owner;
        Ok(())
    }

    pub fn execute(&self, ctx: &mut dyn CommandContext) -> Result<(), String> {
        let tick = ctx.current_tick();
        ctx.provinces_mut()
            .set_owner(self.province_id, self.new_owner, tick)
            .map_err(|e| e.to_string())
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) -> usize {
        let start = buf.len();
        buf.extend_from_slice(&self.execution_tick.to_be_bytes());
        buf.extend_from_slice(&self.player_id.to_be_bytes());
        buf.extend_from_slice(&self.province_id.0.to_be_bytes());
        buf.extend_from_slice(&self.new_owner.0.to_be_bytes());
        buf.extend_from_slice(&self.new_controller.0.to_be_bytes());
        let payload = &buf[start..start + 12];
        let crc = crc8(payload);
        buf.push(crc);
        buf.len() - start
    }

    pub fn deserialize(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < Self::WIRE_SIZE {
            return Err(CoreError::SaveCorrupt("ChangeOwner frame truncated".into()));
        }
        let payload = &bytes[0..12];
        let crc = bytes[12];
        if crc8(payload) != crc {
            return Err(CoreError::SaveCorrupt("ChangeOwner crc mismatch".into()));
        }
        Ok(ChangeOwner {
            execution_tick: u32::from_be_bytes(bytes[0..4].try_into().unwrap()),
            player_id: u16::from_be_bytes(bytes[4..6].try_into().unwrap()),
            province_id: ProvinceId(u16::from_be_bytes(bytes[6..8].try_into().unwrap())),
            new_owner: CountryId(u16::from_be_bytes(bytes[8..10].try_into().unwrap())),
            new_controller: CountryId(u16::from_be_bytes(bytes[10..12].try_into().unwrap())),
        })
    }
}

/// `DeclareWar`: 9 bytes, `executionTick:u32 | attackerID:u16 |
/// defenderID:u16 | crc:u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclareWar {
    pub execution_tick: u32,
    pub attacker: CountryId,
    pub defender: CountryId,
}

impl DeclareWar {
    pub const WIRE_SIZE: usize = 9;

    pub fn validate(&self, ctx: &dyn CommandContext) -> Result<(), String> {
        if !ctx.countries().exists(self.attacker) {
            return Err(format!("country {} does not exist", self.attacker.0));
        }
        if !ctx.countries().exists(self.defender) {
            return Err(format!("country {} does not exist", self.defender.0));
        }
        if self.attacker == self.defender {
            return Err("cannot declare war on self".into());
        }
        Ok(())
    }

    pub fn execute(&self, ctx: &mut dyn CommandContext) -> Result<(), String> {
        ctx.diplomacy_mut().set_at_war(self.attacker, self.defender, true);
        Ok(())
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) -> usize {
        let start = buf.len();
        buf.extend_from_slice(&self.execution_tick.to_be_bytes());
        buf.extend_from_slice(&self.attacker.0.to_be_bytes());
        buf.extend_from_slice(&self.defender.0.to_be_bytes());
        let payload = &buf[start..start + 8];
        let crc = crc8(payload);
        buf.push(crc);
        buf.len() - start
    }

    pub fn deserialize(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < Self::WIRE_SIZE {
            return Err(CoreError::SaveCorrupt("DeclareWar frame truncated".into()));
        }
        let payload = &bytes[0..8];
        let crc = bytes[8];
        if crc8(payload) != crc {
            return Err(CoreError::SaveCorrupt("DeclareWar crc mismatch".into()));
        }
        Ok(DeclareWar {
            execution_tick: u32::from_be_bytes(bytes[0..4].try_into().unwrap()),
            attacker: CountryId(u16::from_be_bytes(bytes[4..6].try_into().unwrap())),
            defender: CountryId(u16::from_be_bytes(bytes[6..8].try_into().unwrap())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameCommand {
    ChangeOwner(ChangeOwner),
    DeclareWar(DeclareWar),
}

impl GameCommand {
    pub fn execution_tick(&self) -> u32 {
        match self {
            GameCommand::ChangeOwner(c) => c.execution_tick,
            GameCommand::DeclareWar(c) => c.execution_tick,
        }
    }

    fn validate(&self, ctx: &dyn CommandContext) -> Result<(), String> {
        match self {
            GameCommand::ChangeOwner(c) => c.validate(ctx),
            GameCommand::DeclareWar(c) => c.validate(ctx),
        }
    }

    fn execute(&self, ctx: &mut dyn CommandContext) -> Result<(), String> {
        match self {
            GameCommand::ChangeOwner(c) => c.execute(ctx),
            GameCommand::DeclareWar(c) => c.execute(ctx),
        }
    }

    /// Tagged wire encoding for the save's command log (§3.9): a one-byte
    /// variant discriminant followed by the command's own untagged wire
    /// frame. The untagged per-variant frames stay the §3.8 network
    /// replication format; the tag only exists so a command log entry is
    /// self-describing when read back without external context.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            GameCommand::ChangeOwner(c) => {
                buf.push(0);
                c.serialize(&mut buf);
            }
            GameCommand::DeclareWar(c) => {
                buf.push(1);
                c.serialize(&mut buf);
            }
        }
        buf
    }

    pub fn from_wire(bytes: &[u8]) -> CoreResult<Self> {
        let (tag, rest) = bytes.split_first().ok_or_else(|| CoreError::SaveCorrupt("empty command frame".into()))?;
        match tag {
            0 => Ok(GameCommand::ChangeOwner(ChangeOwner::deserialize(rest)?)),
            1 => Ok(GameCommand::DeclareWar(DeclareWar::deserialize(rest)?)),
            other => Err(CoreError::SaveCorrupt(format!("unknown command tag {other}"))),
        }
    }
}

/// FIFO queue of commands scheduled by execution tick. Commands are
/// inserted in submission order and executed in that same order once their
/// `executionTick` arrives; this bus never reorders by any other key.
#[derive(Debug, Default)]
pub struct CommandBus {
    queue: VecDeque<GameCommand>,
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub rejected: Vec<String>,
    pub executed: usize,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, command: GameCommand) {
        self.queue.push_back(command);
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Pops every command scheduled for `tick`, validating then executing
    /// each in insertion order. Validation failures are discarded and
    /// logged; an execution failure is returned as a fatal `CoreError`
    /// since it indicates state corruption (§4.5).
    pub fn run_tick(&mut self, tick: u64, ctx: &mut dyn CommandContext) -> CoreResult<CommandOutcome> {
        let mut outcome = CommandOutcome { rejected: Vec::new(), executed: 0 };

        let mut deferred = VecDeque::new();
        while let Some(command) = self.queue.pop_front() {
            if command.execution_tick() as u64 != tick {
                deferred.push_back(command);
                continue;
            }

            if let Err(reason) = command.validate(ctx) {
                log::warn!(target: "core_commands", "command rejected: {reason}");
                outcome.rejected.push(reason);
                continue;
            }

            match command.execute(ctx) {
                Ok(()) => outcome.executed += 1,
                Err(reason) => {
                    self.queue = deferred;
                    return Err(CoreError::ExecutionFailed(reason));
                }
            }
        }

        self.queue = deferred;
        Ok(outcome)
    }
}
