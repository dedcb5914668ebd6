//! The `GameState` hub (§6): the single handle the embedding game layer
//! holds. It owns every simulation subsystem and exposes the narrow
//! accessor surface §6 guarantees; everything else is internal wiring.

use archon_core::{
    CommandBus, CommandContext, CountrySystem, DiplomacySystem, EventBus, ProvinceQuery,
    ProvinceSystem, RngStreams, SimConfig, TimeSystem,
};
use archon_data::adjacency::AdjacencyGraph;
use archon_pathfinding::{AStar, CostCalculator};

/// Movement cost policy backing `GameState::pathfinding`. Uniform cost,
/// zero heuristic (plain Dijkstra) is the only policy the engine ships;
/// game-specific weighting (terrain, rivers, supply) is a caller concern
/// layered on top via a different `CostCalculator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformCost;

impl CostCalculator for UniformCost {
    fn calculate_cost(&self, _from: u32, _to: u32) -> u32 {
        1
    }

    fn calculate_heuristic(&self, _from: u32, _target: u32) -> u32 {
        0
    }
}

/// Read-only view over the `ProvinceSystem`'s adjacency graph, exposed so
/// callers can run their own `archon_pathfinding::AStar` queries without the
/// engine having to own every possible cost policy.
pub struct PathfindingHandle<'a> {
    graph: &'a AdjacencyGraph,
}

impl<'a> PathfindingHandle<'a> {
    /// Shortest path between two runtime `ProvinceId`s under `cost`. Ids are
    /// converted to the adjacency graph's 0-based dense index and back
    /// (§3.5's "+1 offset" convention); `ProvinceId::NONE` never resolves.
    pub fn find_path<C: CostCalculator>(
        &self,
        start: archon_core::ProvinceId,
        goal: archon_core::ProvinceId,
        cost: &C,
    ) -> Option<(Vec<archon_core::ProvinceId>, u32)> {
        if start.is_none() || goal.is_none() {
            return None;
        }
        let dense_start = (start.0 - 1) as u32;
        let dense_goal = (goal.0 - 1) as u32;
        let (path, total) = AStar::find_path(self.graph, dense_start, dense_goal, cost)?;
        Some((path.into_iter().map(|d| archon_core::ProvinceId((d + 1) as u16)).collect(), total))
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        self.graph
    }
}

/// The game-layer's handle onto the simulation. Built by `init::bootstrap`
/// and otherwise opaque construction; everything the game layer needs is
/// reached through the accessor methods below (§6).
pub struct GameState {
    pub(crate) provinces: ProvinceSystem,
    pub(crate) countries: CountrySystem,
    pub(crate) diplomacy: DiplomacySystem,
    pub(crate) time: TimeSystem,
    pub(crate) events: EventBus,
    pub(crate) commands: CommandBus,
    pub(crate) rng: RngStreams,
    pub(crate) adjacency: AdjacencyGraph,
    pub(crate) config: SimConfig,
}

impl CommandContext for GameState {
    fn provinces(&self) -> &ProvinceSystem {
        &self.provinces
    }

    fn provinces_mut(&mut self) -> &mut ProvinceSystem {
        &mut self.provinces
    }

    fn countries(&self) -> &CountrySystem {
        &self.countries
    }

    fn diplomacy_mut(&mut self) -> &mut DiplomacySystem {
        &mut self.diplomacy
    }

    fn current_tick(&self) -> u64 {
        self.time.tick()
    }
}

impl GameState {
    pub fn provinces(&self) -> &ProvinceSystem {
        &self.provinces
    }

    pub fn provinces_mut(&mut self) -> &mut ProvinceSystem {
        &mut self.provinces
    }

    pub fn countries(&self) -> &CountrySystem {
        &self.countries
    }

    pub fn countries_mut(&mut self) -> &mut CountrySystem {
        &mut self.countries
    }

    pub fn time(&self) -> &TimeSystem {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut TimeSystem {
        &mut self.time
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn commands(&mut self) -> &mut CommandBus {
        &mut self.commands
    }

    pub fn adjacency(&self) -> &AdjacencyGraph {
        &self.adjacency
    }

    pub fn pathfinding(&self) -> PathfindingHandle<'_> {
        PathfindingHandle { graph: &self.adjacency }
    }

    /// Province-cold-data-backed resource query (§3.2's "detailed resource
    /// inventory" lives on `ProvinceCold`, not a standalone subsystem).
    pub fn resources(&self) -> ProvinceQuery<'_> {
        ProvinceQuery::new(&self.provinces)
    }

    /// The engine's one generic modifier mechanism is the diplomacy
    /// system's opinion-modifier list; there is no separate Modifier
    /// subsystem (diplomacy modifiers as domain content are out of scope).
    pub fn modifiers(&self) -> &DiplomacySystem {
        &self.diplomacy
    }

    pub fn modifiers_mut(&mut self) -> &mut DiplomacySystem {
        &mut self.diplomacy
    }

    pub fn rng(&mut self, stream_name: &str) -> &mut archon_core::DeterministicRandom {
        self.rng.stream(stream_name)
    }

    pub fn rng_streams(&self) -> &RngStreams {
        &self.rng
    }

    pub fn rng_streams_mut(&mut self) -> &mut RngStreams {
        &mut self.rng
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Advances the simulation by `real_seconds` of wall-clock time. The
    /// time system may consume several whole hourly ticks in one call (or
    /// none, if paused or under an hour accumulated); the command bus runs
    /// once per tick actually consumed, in order, matching §5's ordering
    /// guarantee (`command.Execute` before any emitted event before the
    /// frame's event drain). Callers still own calling
    /// `events().process_events::<T>()` for whichever event types they
    /// subscribe to — this only enqueues.
    ///
    /// A command execution failure (distinct from validation rejection) is
    /// fatal per §4.5: it means state already assumed consistent wasn't, so
    /// an emergency save is attempted for diagnosis before the error
    /// propagates to the caller.
    pub fn advance_tick(&mut self, real_seconds: f64) -> archon_core::CoreResult<()> {
        let layers = self.time.advance(real_seconds);

        for hourly in &layers.hourly {
            // `self.commands` is swapped out so the bus can take `self` as a
            // `&mut dyn CommandContext` without a conflicting double borrow.
            let mut commands = std::mem::take(&mut self.commands);
            let result = commands.run_tick(hourly.tick, self);
            self.commands = commands;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(err @ archon_core::CoreError::ExecutionFailed(_)) => {
                    self.emergency_save();
                    return Err(err);
                }
                Err(err) => return Err(err),
            };

            if !outcome.rejected.is_empty() {
                log::warn!(
                    target: "core_commands",
                    "{} commands rejected at tick {}", outcome.rejected.len(), hourly.tick
                );
            }
            for changed in self.provinces.drain_ownership_events() {
                self.events.emit(changed);
            }
            self.provinces.swap_buffers();
            self.events.emit(*hourly);

            if self.config.checksum_frequency > 0 && hourly.tick % self.config.checksum_frequency as u64 == 0 {
                let checksum = archon_core::provinces_checksum(&self.provinces);
                log::debug!(target: "core_commands", "tick {}: checksum={:08x}", hourly.tick, checksum);
            }
        }
        for daily in &layers.daily {
            self.events.emit(*daily);
        }
        for monthly in &layers.monthly {
            self.events.emit(*monthly);
        }
        for yearly in &layers.yearly {
            self.events.emit(*yearly);
        }
        Ok(())
    }

    /// Writes an out-of-band diagnostic save to `emergency.sav` in the
    /// current directory, best-effort: a failure here is logged, not
    /// propagated, since the caller is already unwinding a worse error.
    fn emergency_save(&self) {
        let save = crate::save_manager::SaveManager::save(
            self,
            archon_core::SaveMetadata {
                game_version: env!("CARGO_PKG_VERSION").to_string(),
                display_name: "emergency".to_string(),
                timestamp_ticks: 0,
                game_tick: self.time.tick(),
                speed: self.time.state().speed,
                scenario_name: "emergency".to_string(),
            },
            Vec::new(),
        );
        let path = std::path::Path::new("emergency.sav");
        if let Err(err) = archon_core::write_atomic(path, &save) {
            log::error!(target: "core_commands", "emergency save failed: {err}");
        } else {
            log::error!(target: "core_commands", "wrote emergency save to {}", path.display());
        }
    }
}
