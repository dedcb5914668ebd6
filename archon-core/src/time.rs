//! Time system (§4.4): a layered tick scheduler driven by an accumulator.
//! Wall-clock delta (scaled by game speed) feeds the accumulator; whole
//! hours are consumed one at a time so the hour/day/month/year layers fire
//! in strict order with no skipped ticks, regardless of frame rate.

use crate::date::Date;
use serde::{Deserialize, Serialize};

/// One in-game hour per tick, matching the spec's Tick definition.
pub const TICKS_PER_HOUR: u64 = 1;
pub const HOURS_PER_DAY: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameSpeed {
    Paused,
    X1,
    X2,
    X5,
}

impl GameSpeed {
    /// In-game hours consumed per real second at this speed. At 1x, one
    /// real-world hour of wall clock equals one in-game hour.
    fn hours_per_real_second(self) -> f64 {
        match self {
            GameSpeed::Paused => 0.0,
            GameSpeed::X1 => 1.0 / 3600.0,
            GameSpeed::X2 => 2.0 / 3600.0,
            GameSpeed::X5 => 5.0 / 3600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Paused,
    Running(GameSpeed),
}

/// Emitted once per consumed hour, in this fixed order within a single
/// call to `advance`: hour, then (conditionally) day, month, year.
#[derive(Debug, Clone, Copy)]
pub struct HourlyTickEvent {
    pub tick: u64,
    pub date: Date,
}

#[derive(Debug, Clone, Copy)]
pub struct DailyTickEvent {
    pub tick: u64,
    pub date: Date,
}

#[derive(Debug, Clone, Copy)]
pub struct MonthlyTickEvent {
    pub tick: u64,
    pub date: Date,
}

#[derive(Debug, Clone, Copy)]
pub struct YearlyTickEvent {
    pub tick: u64,
    pub date: Date,
}

#[derive(Debug, Clone, Default)]
pub struct TickLayerEvents {
    pub hourly: Vec<HourlyTickEvent>,
    pub daily: Vec<DailyTickEvent>,
    pub monthly: Vec<MonthlyTickEvent>,
    pub yearly: Vec<YearlyTickEvent>,
}

/// Determinism-critical state: saved and restored verbatim, never derived
/// from wall-clock at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeState {
    pub tick: u64,
    pub date: Date,
    pub speed: GameSpeed,
    pub paused: bool,
    /// Raw accumulator value, in fractional hours. Preserved across pause.
    pub accumulator: f64,
    /// Hour-of-day, 0..24, tracked separately from `date` so a day
    /// boundary is detected without re-deriving it from the tick count.
    pub hour_of_day: u32,
}

impl Default for TimeState {
    fn default() -> Self {
        Self {
            tick: 0,
            date: Date::default(),
            speed: GameSpeed::X1,
            paused: true,
            accumulator: 0.0,
            hour_of_day: 0,
        }
    }
}

pub struct TimeSystem {
    state: TimeState,
}

impl TimeSystem {
    pub fn new(start_date: Date) -> Self {
        Self {
            state: TimeState { date: start_date, ..TimeState::default() },
        }
    }

    pub fn from_state(state: TimeState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &TimeState {
        &self.state
    }

    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    pub fn date(&self) -> Date {
        self.state.date
    }

    pub fn run_state(&self) -> RunState {
        if self.state.paused {
            RunState::Paused
        } else {
            RunState::Running(self.state.speed)
        }
    }

    /// Idempotent: setting the same speed twice is a no-op.
    pub fn set_speed(&mut self, speed: GameSpeed) {
        self.state.speed = speed;
    }

    /// Idempotent: pausing while already paused preserves the accumulator
    /// untouched, as does unpausing while already running.
    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    /// Feeds `real_seconds` of wall-clock time into the accumulator (scaled
    /// by the current speed) and consumes as many whole hours as are ready,
    /// firing layered events in hour→day→month→year order for each one.
    pub fn advance(&mut self, real_seconds: f64) -> TickLayerEvents {
        let mut events = TickLayerEvents::default();

        if self.state.paused {
            return events;
        }

        self.state.accumulator += real_seconds * self.state.speed.hours_per_real_second();

        while self.state.accumulator >= 1.0 {
            self.state.accumulator -= 1.0;
            self.consume_one_hour(&mut events);
        }

        events
    }

    /// Consumes exactly one in-game hour: advances the tick counter and
    /// date, firing whichever layers cross a boundary.
    fn consume_one_hour(&mut self, events: &mut TickLayerEvents) {
        self.state.tick += TICKS_PER_HOUR;
        self.state.hour_of_day += 1;

        events.hourly.push(HourlyTickEvent { tick: self.state.tick, date: self.state.date });

        if self.state.hour_of_day >= HOURS_PER_DAY {
            self.state.hour_of_day = 0;
            self.state.date = self.state.date.add_days(1);

            events.daily.push(DailyTickEvent { tick: self.state.tick, date: self.state.date });

            if self.state.date.is_month_start() {
                events.monthly.push(MonthlyTickEvent { tick: self.state.tick, date: self.state.date });
            }
            if self.state.date.is_year_start() {
                events.yearly.push(YearlyTickEvent { tick: self.state.tick, date: self.state.date });
            }
        }
    }

    /// Re-derives `date`/`hour_of_day` from `tick` alone and logs a
    /// warning if the stored date doesn't match, per §4.4's load-time
    /// reconciliation rule.
    pub fn reconcile_after_load(&mut self, epoch: Date) {
        let total_hours = self.state.tick;
        let days = total_hours / HOURS_PER_DAY as u64;
        let hour_of_day = (total_hours % HOURS_PER_DAY as u64) as u32;
        let derived_date = epoch.add_days(days as u32);

        if derived_date != self.state.date || hour_of_day != self.state.hour_of_day {
            log::warn!(
                target: "core_time",
                "save had inconsistent date/tick relationship (stored {:?}, derived {:?}); reconstructing from tick",
                self.state.date,
                derived_date
            );
            self.state.date = derived_date;
            self.state.hour_of_day = hour_of_day;
        }
    }
}
