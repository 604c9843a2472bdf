use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use zatacka_core::error::SettingsError;
use zatacka_core::input::TurnIntent;
use zatacka_core::player::{PlayerId, PowerKind};
use zatacka_core::powerup::ActivePower;
use zatacka_core::registry::PlayerRegistry;
use zatacka_core::render::{GridPos, Renderer, WALL_COLOR};

use crate::arena::{self, Heading};
use crate::collision::{self, EliminationCause, PlannedMove};
use crate::config::EngineConfig;
use crate::grid::{Cell, Grid};
use crate::physics;

/// Lifecycle of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Pending,
    Running,
    Complete,
    Aborted,
}

/// How a completed round ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundResult {
    /// Sole survivor.
    Won(PlayerId),
    /// The last cycles were eliminated in the same tick.
    Tie(Vec<PlayerId>),
    /// Nobody was left to win.
    NoWinner,
}

impl RoundResult {
    pub fn winner(&self) -> Option<PlayerId> {
        match self {
            Self::Won(id) => Some(*id),
            Self::Tie(_) | Self::NoWinner => None,
        }
    }
}

/// One entry of the elimination order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elimination {
    pub player_id: PlayerId,
    pub tick: u32,
    pub cause: EliminationCause,
}

/// Events emitted while a round runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoundEvent {
    RoundStarted {
        round: u32,
        players: Vec<PlayerId>,
    },
    PowerActivated {
        player_id: PlayerId,
        power: PowerKind,
        tick: u32,
    },
    PowerExpired {
        player_id: PlayerId,
        power: PowerKind,
        tick: u32,
    },
    PlayerEliminated(Elimination),
    RoundCompleted {
        round: u32,
        result: RoundResult,
    },
    RoundAborted {
        round: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    NotRunning(RoundPhase),
}

impl std::fmt::Display for RoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRunning(phase) => write!(f, "round is not running (phase: {phase:?})"),
        }
    }
}

impl std::error::Error for RoundError {}

/// Per-player movement state for the current round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleState {
    pub pos: GridPos,
    pub heading: Heading,
    pub power: PowerKind,
    pub active_power: Option<ActivePower>,
    pub charges: u8,
    /// Head cell drawn while laying no trail; cleared once the cycle moves on.
    pub gap_cell: Option<GridPos>,
    /// Spawn grace ticks left.
    pub grace: u32,
    /// Trail ticks left before the next periodic gap.
    pub gap_in: u32,
    /// Ticks left in the current periodic gap.
    pub gap_left: u32,
}

impl CycleState {
    fn is_active(&self, kind: PowerKind) -> bool {
        self.active_power.is_some_and(|p| p.kind == kind)
    }
}

/// What a cycle leaves on the cell it moves onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stroke {
    Trail,
    Wall,
    Gap,
}

/// Input latched between two ticks.
#[derive(Debug, Clone, Copy, Default)]
struct PendingInput {
    turn: Option<TurnIntent>,
    power: bool,
}

/// Ephemeral state of the round in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub round: u32,
    pub tick: u32,
    pub phase: RoundPhase,
    pub cycles: BTreeMap<PlayerId, CycleState>,
    pub grid: Grid,
    pub eliminations: Vec<Elimination>,
    pub result: Option<RoundResult>,
}

/// Runs one round at a time on an integer grid.
///
/// Player identity and alive flags stay in the [`PlayerRegistry`], which is
/// passed into every call that needs it.
pub struct RoundEngine {
    config: EngineConfig,
    state: RoundState,
    pending: BTreeMap<PlayerId, PendingInput>,
    /// Wall-maker barriers; they outlive the round that laid them.
    walls: BTreeSet<GridPos>,
    /// Gap timing.
    rng: StdRng,
}

impl RoundEngine {
    /// Fails when `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self, SettingsError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let grid = Grid::new(config.field_width, config.field_height);
        Ok(Self {
            config,
            state: RoundState {
                round: 0,
                tick: 0,
                phase: RoundPhase::Pending,
                cycles: BTreeMap::new(),
                grid,
                eliminations: Vec::new(),
                result: None,
            },
            pending: BTreeMap::new(),
            walls: BTreeSet::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase
    }

    pub fn tick_count(&self) -> u32 {
        self.state.tick
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.state.result.as_ref()
    }

    pub fn eliminations(&self) -> &[Elimination] {
        &self.state.eliminations
    }

    pub fn walls(&self) -> &BTreeSet<GridPos> {
        &self.walls
    }

    /// Serialize the round state for observers.
    pub fn serialize_state(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(&self.state)
    }

    /// Reset the field and place every living player on its spawn cell.
    ///
    /// With one or no living players the round completes at tick 0.
    pub fn start_round(
        &mut self,
        round: u32,
        players: &mut PlayerRegistry,
        renderer: &mut dyn Renderer,
    ) -> Vec<RoundEvent> {
        players.revive_all();

        // Walls stay; holes were cleared when their cycle moved on
        for (pos, cell) in self.state.grid.occupied() {
            if matches!(cell, Cell::Trail(_)) {
                renderer.clear(pos);
            }
        }
        for cycle in self.state.cycles.values() {
            if let Some(gap) = cycle.gap_cell {
                renderer.clear(gap);
            }
        }

        let mut grid = Grid::new(self.config.field_width, self.config.field_height);
        for &pos in &self.walls {
            grid.set(pos, Cell::Wall);
        }

        let living: Vec<PlayerId> = players.living_players().into_iter().collect();
        let spawns = arena::spawn_points(grid.width(), grid.height(), living.len());
        let mut cycles = BTreeMap::new();
        for (&id, spawn) in living.iter().zip(&spawns) {
            let Some(player) = players.get(id) else {
                continue;
            };
            if self.walls.remove(&spawn.pos) {
                tracing::debug!(player_id = id, pos = ?spawn.pos, "Cleared wall from spawn cell");
            }
            grid.set(spawn.pos, Cell::Trail(id));
            renderer.mark(spawn.pos, player.color.code());
            cycles.insert(
                id,
                CycleState {
                    pos: spawn.pos,
                    heading: spawn.heading,
                    power: player.power,
                    active_power: None,
                    charges: self.config.power_charges,
                    gap_cell: None,
                    grace: self.config.grace_ticks,
                    gap_in: draw_gap_interval(&mut self.rng, &self.config),
                    gap_left: 0,
                },
            );
        }

        self.state = RoundState {
            round,
            tick: 0,
            phase: RoundPhase::Running,
            cycles,
            grid,
            eliminations: Vec::new(),
            result: None,
        };
        self.pending.clear();

        tracing::info!(round, players = living.len(), "Round started");
        let mut events = vec![RoundEvent::RoundStarted {
            round,
            players: living,
        }];
        self.check_completion(players, &[], &mut events);
        events
    }

    /// Buffer an intent for the next tick. The latest turn wins; a power
    /// request stays latched until the tick consumes it.
    ///
    /// Returns `false` when the intent was dropped.
    pub fn queue_intent(
        &mut self,
        players: &PlayerRegistry,
        player_id: PlayerId,
        intent: TurnIntent,
    ) -> bool {
        if self.state.phase != RoundPhase::Running
            || !self.state.cycles.contains_key(&player_id)
            || !players.is_alive(player_id)
        {
            tracing::debug!(player_id, ?intent, "Dropped intent for inactive cycle");
            return false;
        }
        let pending = self.pending.entry(player_id).or_default();
        match intent {
            TurnIntent::Power => pending.power = true,
            turn => pending.turn = Some(turn),
        }
        true
    }

    /// Advance every living cycle by one cell.
    ///
    /// All moves are planned from the pre-tick state and judged together
    /// before anything is applied.
    pub fn tick(
        &mut self,
        players: &mut PlayerRegistry,
        renderer: &mut dyn Renderer,
    ) -> Result<Vec<RoundEvent>, RoundError> {
        if self.state.phase != RoundPhase::Running {
            return Err(RoundError::NotRunning(self.state.phase));
        }

        self.state.tick += 1;
        let tick = self.state.tick;
        let inputs = std::mem::take(&mut self.pending);
        let mut events = Vec::new();

        // Plan
        let mut plans: Vec<(PlayerId, CycleState, PlannedMove, Stroke)> = Vec::new();
        let mut graced = BTreeSet::new();
        for (&id, cycle) in &self.state.cycles {
            if !players.is_alive(id) {
                continue;
            }
            let input = inputs.get(&id).copied().unwrap_or_default();
            let mut next = cycle.clone();
            next.heading = physics::apply_turn(cycle.heading, input.turn);

            if input.power
                && next.active_power.is_none()
                && next.charges > 0
                && next.power != PowerKind::None
            {
                next.active_power = Some(ActivePower::new(
                    next.power,
                    self.config.power_ticks(next.power),
                ));
                next.charges -= 1;
                events.push(RoundEvent::PowerActivated {
                    player_id: id,
                    power: next.power,
                    tick,
                });
            }

            let in_grace = next.grace > 0;
            next.grace = next.grace.saturating_sub(1);
            if in_grace {
                graced.insert(id);
            }
            let in_gap = !in_grace && step_gap(&mut self.rng, &self.config, &mut next);
            let stroke = if in_grace || in_gap || next.is_active(PowerKind::HoleMaker) {
                Stroke::Gap
            } else if next.is_active(PowerKind::WallMaker) {
                Stroke::Wall
            } else {
                Stroke::Trail
            };

            let phasing = next.is_active(PowerKind::BorderPhaser);
            let to = physics::advance(&self.state.grid, cycle.pos, next.heading, phasing);
            plans.push((
                id,
                next,
                PlannedMove {
                    player_id: id,
                    from: cycle.pos,
                    to,
                },
                stroke,
            ));
        }

        // Resolve
        let moves: Vec<PlannedMove> = plans.iter().map(|(_, _, m, _)| *m).collect();
        let mut crashes = collision::resolve_moves(&moves, &self.state.grid);
        crashes.retain(|id, cause| {
            !(graced.contains(id)
                && matches!(cause, EliminationCause::Trail { .. } | EliminationCause::Wall))
        });

        // Apply. Renderer calls are buffered so every clear lands before any
        // mark, whatever order the cycles are applied in.
        let mut clears: Vec<GridPos> = Vec::new();
        let mut marks: Vec<(GridPos, u32)> = Vec::new();
        let mut eliminated_now = Vec::new();
        for (id, mut next, planned, stroke) in plans {
            let color = players.get(id).map_or(WALL_COLOR, |p| p.color.code());
            clears.extend(next.gap_cell.take());

            if let Some(&cause) = crashes.get(&id) {
                self.state.cycles.insert(id, next);
                if players.kill(id) {
                    let elimination = Elimination {
                        player_id: id,
                        tick,
                        cause,
                    };
                    tracing::debug!(player_id = id, tick, ?cause, "Cycle eliminated");
                    self.state.eliminations.push(elimination);
                    events.push(RoundEvent::PlayerEliminated(elimination));
                    eliminated_now.push(id);
                }
                continue;
            }

            let Some(to) = planned.to else {
                continue;
            };
            next.pos = to;
            match stroke {
                Stroke::Gap => {
                    // A graced cycle crossing a trail or wall leaves it as it was
                    if matches!(self.state.grid.get(to), Some(Cell::Empty | Cell::Hole(_))) {
                        self.state.grid.set(to, Cell::Hole(id));
                        next.gap_cell = Some(to);
                        marks.push((to, color));
                    }
                },
                Stroke::Wall => {
                    self.state.grid.set(to, Cell::Wall);
                    self.walls.insert(to);
                    marks.push((to, WALL_COLOR));
                },
                Stroke::Trail => {
                    self.state.grid.set(to, Cell::Trail(id));
                    marks.push((to, color));
                },
            }

            if let Some(power) = next.active_power.as_mut() {
                power.tick();
                if power.is_expired() {
                    events.push(RoundEvent::PowerExpired {
                        player_id: id,
                        power: power.kind,
                        tick,
                    });
                    next.active_power = None;
                }
            }
            self.state.cycles.insert(id, next);
        }

        for pos in clears {
            renderer.clear(pos);
        }
        for (pos, color) in marks {
            renderer.mark(pos, color);
        }

        self.check_completion(players, &eliminated_now, &mut events);
        Ok(events)
    }

    /// Remove a player mid-round, e.g. when they leave the match.
    pub fn eliminate(
        &mut self,
        players: &mut PlayerRegistry,
        renderer: &mut dyn Renderer,
        player_id: PlayerId,
        cause: EliminationCause,
    ) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        if self.state.phase != RoundPhase::Running || !self.state.cycles.contains_key(&player_id)
        {
            return events;
        }
        if let Some(gap) = self
            .state
            .cycles
            .get_mut(&player_id)
            .and_then(|c| c.gap_cell.take())
        {
            renderer.clear(gap);
        }
        if players.kill(player_id) {
            let elimination = Elimination {
                player_id,
                tick: self.state.tick,
                cause,
            };
            self.state.eliminations.push(elimination);
            events.push(RoundEvent::PlayerEliminated(elimination));
            self.pending.remove(&player_id);
            self.check_completion(players, &[], &mut events);
        }
        events
    }

    /// Stop the running round without a winner.
    pub fn abort(&mut self) -> Result<Vec<RoundEvent>, RoundError> {
        if self.state.phase != RoundPhase::Running {
            return Err(RoundError::NotRunning(self.state.phase));
        }
        self.state.phase = RoundPhase::Aborted;
        self.state.result = None;
        self.pending.clear();
        tracing::info!(round = self.state.round, tick = self.state.tick, "Round aborted");
        Ok(vec![RoundEvent::RoundAborted {
            round: self.state.round,
        }])
    }

    fn check_completion(
        &mut self,
        players: &PlayerRegistry,
        eliminated_now: &[PlayerId],
        events: &mut Vec<RoundEvent>,
    ) {
        let living: Vec<PlayerId> = self
            .state
            .cycles
            .keys()
            .copied()
            .filter(|&id| players.is_alive(id))
            .collect();

        let result = if living.len() <= 1 {
            match living.first() {
                Some(&id) => RoundResult::Won(id),
                None if eliminated_now.len() > 1 => RoundResult::Tie(eliminated_now.to_vec()),
                None => RoundResult::NoWinner,
            }
        } else if self.state.tick >= self.config.tick_limit() {
            tracing::warn!(
                round = self.state.round,
                tick = self.state.tick,
                alive = living.len(),
                "Round hit its tick limit"
            );
            RoundResult::NoWinner
        } else {
            return;
        };

        tracing::info!(round = self.state.round, tick = self.state.tick, ?result, "Round complete");
        self.state.phase = RoundPhase::Complete;
        self.state.result = Some(result.clone());
        self.pending.clear();
        events.push(RoundEvent::RoundCompleted {
            round: self.state.round,
            result,
        });
    }
}

/// Ticks of trail before the next periodic gap; 0 when gaps are off.
fn draw_gap_interval(rng: &mut StdRng, config: &EngineConfig) -> u32 {
    if config.gaps_enabled() {
        rng.random_range(config.gap_interval_min..=config.gap_interval_max)
    } else {
        0
    }
}

/// Advance a cycle's gap countdown. Returns whether this tick is a gap tick.
fn step_gap(rng: &mut StdRng, config: &EngineConfig, cycle: &mut CycleState) -> bool {
    if !config.gaps_enabled() {
        return false;
    }
    if cycle.gap_left == 0 {
        if cycle.gap_in > 0 {
            cycle.gap_in -= 1;
            return false;
        }
        cycle.gap_left = rng.random_range(config.gap_duration_min..=config.gap_duration_max);
        cycle.gap_in = draw_gap_interval(rng, config);
    }
    cycle.gap_left = cycle.gap_left.saturating_sub(1);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use zatacka_core::player::PlayerColor;
    use zatacka_core::render::NullRenderer;
    use zatacka_core::test_helpers::{
        DrawCall, RecordingRenderer, make_registry, make_registry_with_power,
    };

    /// 16x16 field without spawn grace or periodic gaps.
    fn small_config() -> EngineConfig {
        EngineConfig {
            field_width: 16,
            field_height: 16,
            grace_ticks: 0,
            gap_interval_min: 0,
            gap_interval_max: 0,
            gap_duration_min: 0,
            gap_duration_max: 0,
            ..EngineConfig::default()
        }
    }

    /// Cycles leave a two-tick gap after every three trail ticks.
    fn gap_config() -> EngineConfig {
        EngineConfig {
            gap_interval_min: 3,
            gap_interval_max: 3,
            gap_duration_min: 2,
            gap_duration_max: 2,
            seed: Some(7),
            ..small_config()
        }
    }

    /// Move `id` to `pos` facing `heading`, leaving its trail there.
    fn place(engine: &mut RoundEngine, id: PlayerId, pos: GridPos, heading: Heading) {
        engine.state.grid.set(pos, Cell::Trail(id));
        let cycle = engine.state.cycles.get_mut(&id).unwrap();
        cycle.pos = pos;
        cycle.heading = heading;
    }

    /// Last renderer call touching `pos`.
    fn last_draw(renderer: &RecordingRenderer, pos: GridPos) -> Option<DrawCall> {
        renderer.calls.iter().rev().copied().find(|call| match *call {
            DrawCall::Mark(p, _) | DrawCall::Clear(p) => p == pos,
        })
    }

    fn run_to_end(engine: &mut RoundEngine, players: &mut PlayerRegistry) -> Vec<RoundEvent> {
        let mut all = Vec::new();
        while engine.phase() == RoundPhase::Running {
            all.extend(engine.tick(players, &mut NullRenderer).unwrap());
        }
        all
    }

    #[test]
    fn start_places_every_player() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(4);
        let mut renderer = RecordingRenderer::default();
        let events = engine.start_round(1, &mut players, &mut renderer);

        assert_eq!(engine.phase(), RoundPhase::Running);
        assert_eq!(engine.state().cycles.len(), 4);
        assert_eq!(renderer.marks().count(), 4, "One mark per spawn cell");
        assert!(matches!(events[0], RoundEvent::RoundStarted { round: 1, .. }));
    }

    #[test]
    fn single_player_wins_at_tick_zero() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(1);
        let events = engine.start_round(1, &mut players, &mut NullRenderer);

        assert_eq!(engine.phase(), RoundPhase::Complete);
        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.result(), Some(&RoundResult::Won(0)));
        assert!(events.iter().any(|e| matches!(
            e,
            RoundEvent::RoundCompleted {
                result: RoundResult::Won(0),
                ..
            }
        )));
    }

    #[test]
    fn head_on_collision_is_a_tie() {
        // Two players spawn facing each other on the same row and meet in the middle
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        run_to_end(&mut engine, &mut players);

        assert_eq!(engine.result(), Some(&RoundResult::Tie(vec![0, 1])));
        let elims = engine.eliminations();
        assert_eq!(elims.len(), 2);
        assert_eq!(elims[0].tick, elims[1].tick, "Both eliminated in the same tick");
        assert!(elims.iter().all(|e| e.cause == EliminationCause::HeadOn));
        assert!(players.living_players().is_empty());
    }

    #[test]
    fn idle_round_terminates_quickly() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        run_to_end(&mut engine, &mut players);
        assert!(engine.tick_count() <= 16);
    }

    #[test]
    fn turning_away_lets_the_other_player_win() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);

        // Player 0 heads West from (14, 8); turning right sends it North
        assert!(engine.queue_intent(&players, 0, TurnIntent::Right));
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        assert_eq!(engine.state().cycles[&0].heading, Heading::North);

        run_to_end(&mut engine, &mut players);
        // Player 0 runs into the top border at tick 9, ending the round
        assert_eq!(engine.result(), Some(&RoundResult::Won(1)));
        assert_eq!(engine.eliminations()[0].cause, EliminationCause::Border);
    }

    #[test]
    fn latest_turn_wins_and_only_one_applies() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);

        engine.queue_intent(&players, 0, TurnIntent::Right);
        engine.queue_intent(&players, 0, TurnIntent::Left);
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        assert_eq!(
            engine.state().cycles[&0].heading,
            Heading::South,
            "Only the latest turn (left of West) applies"
        );
    }

    #[test]
    fn each_tick_marks_new_cells() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);

        let mut renderer = RecordingRenderer::default();
        engine.tick(&mut players, &mut renderer).unwrap();
        let marks: Vec<_> = renderer.marks().collect();
        assert_eq!(
            marks,
            vec![
                (GridPos::new(13, 8), PlayerColor::Red.code()),
                (GridPos::new(3, 8), PlayerColor::Green.code()),
            ]
        );
    }

    #[test]
    fn self_crash_counts_as_own_trail() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);

        // Player 0 drives a tight loop back onto its spawn cell
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        for _ in 0..3 {
            engine.queue_intent(&players, 0, TurnIntent::Right);
            engine.tick(&mut players, &mut NullRenderer).unwrap();
        }
        let elim = engine.eliminations()[0];
        assert_eq!(elim.player_id, 0);
        assert_eq!(elim.cause, EliminationCause::Trail { owner: 0 });
    }

    #[test]
    fn intents_for_dead_players_are_dropped() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(3);
        engine.start_round(1, &mut players, &mut NullRenderer);
        engine.eliminate(&mut players, &mut NullRenderer, 2, EliminationCause::Forfeit);
        assert!(!engine.queue_intent(&players, 2, TurnIntent::Left));
        assert!(!engine.queue_intent(&players, 7, TurnIntent::Left));
    }

    #[test]
    fn double_kill_recorded_once() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(3);
        engine.start_round(1, &mut players, &mut NullRenderer);

        engine.eliminate(&mut players, &mut NullRenderer, 1, EliminationCause::Forfeit);
        let again = engine.eliminate(&mut players, &mut NullRenderer, 1, EliminationCause::Forfeit);
        assert!(again.is_empty());
        assert!(!players.is_alive(1));
        assert_eq!(engine.eliminations().len(), 1);
    }

    #[test]
    fn new_round_revives_players() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        run_to_end(&mut engine, &mut players);
        assert!(!players.is_alive(0));

        let mut renderer = RecordingRenderer::default();
        engine.start_round(2, &mut players, &mut renderer);
        assert!(players.is_alive(0));
        assert!(players.is_alive(1));
        assert!(
            renderer.clears().count() > 0,
            "Previous round's trails are cleared"
        );
        assert!(engine.eliminations().is_empty());
    }

    #[test]
    fn tick_after_completion_fails() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(1);
        engine.start_round(1, &mut players, &mut NullRenderer);
        assert_eq!(
            engine.tick(&mut players, &mut NullRenderer),
            Err(RoundError::NotRunning(RoundPhase::Complete))
        );
    }

    #[test]
    fn abort_reports_no_winner() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        engine.tick(&mut players, &mut NullRenderer).unwrap();

        let events = engine.abort().unwrap();
        assert_eq!(events, vec![RoundEvent::RoundAborted { round: 1 }]);
        assert_eq!(engine.phase(), RoundPhase::Aborted);
        assert!(engine.result().is_none());
        assert_eq!(players.living_players().len(), 2, "Registry stays consistent");
        assert!(engine.abort().is_err());
    }

    #[test]
    fn hole_maker_leaves_no_trail() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry_with_power(2, PowerKind::HoleMaker);
        engine.start_round(1, &mut players, &mut NullRenderer);

        engine.queue_intent(&players, 0, TurnIntent::Power);
        let mut renderer = RecordingRenderer::default();
        let events = engine.tick(&mut players, &mut renderer).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RoundEvent::PowerActivated {
                player_id: 0,
                power: PowerKind::HoleMaker,
                ..
            }
        )));
        assert_eq!(engine.state().grid.get(GridPos::new(13, 8)), Some(Cell::Hole(0)));

        engine.tick(&mut players, &mut renderer).unwrap();
        assert!(
            renderer.clears().any(|p| p == GridPos::new(13, 8)),
            "Gap head is cleared once the cycle moves on"
        );
        assert_eq!(engine.state().cycles[&0].charges, 0);
    }

    #[test]
    fn hole_expires_after_configured_ticks() {
        let config = EngineConfig {
            hole_ticks: 2,
            ..small_config()
        };
        let mut engine = RoundEngine::new(config).unwrap();
        let mut players = make_registry_with_power(2, PowerKind::HoleMaker);
        engine.start_round(1, &mut players, &mut NullRenderer);

        engine.queue_intent(&players, 1, TurnIntent::Power);
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        let events = engine.tick(&mut players, &mut NullRenderer).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            RoundEvent::PowerExpired { player_id: 1, .. }
        )));
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        // Player 1 moves East from (2, 8): (3, 8) and (4, 8) were holes, (5, 8) is trail
        let grid = &engine.state().grid;
        assert_eq!(grid.get(GridPos::new(3, 8)), Some(Cell::Hole(1)));
        assert_eq!(grid.get(GridPos::new(4, 8)), Some(Cell::Hole(1)));
        assert_eq!(grid.get(GridPos::new(5, 8)), Some(Cell::Trail(1)));
    }

    #[test]
    fn power_needs_a_charge() {
        let config = EngineConfig {
            hole_ticks: 1,
            ..small_config()
        };
        let mut engine = RoundEngine::new(config).unwrap();
        let mut players = make_registry_with_power(2, PowerKind::HoleMaker);
        engine.start_round(1, &mut players, &mut NullRenderer);

        engine.queue_intent(&players, 0, TurnIntent::Power);
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        engine.queue_intent(&players, 0, TurnIntent::Power);
        let events = engine.tick(&mut players, &mut NullRenderer).unwrap();
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, RoundEvent::PowerActivated { .. })),
            "Second activation must fail without charges"
        );
    }

    #[test]
    fn wall_maker_walls_survive_the_round() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry_with_power(2, PowerKind::WallMaker);
        engine.start_round(1, &mut players, &mut NullRenderer);

        // Player 0 turns north before laying the wall so it stays off the spawn row
        engine.queue_intent(&players, 0, TurnIntent::Right);
        engine.queue_intent(&players, 0, TurnIntent::Power);
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        assert_eq!(engine.state().grid.get(GridPos::new(14, 7)), Some(Cell::Wall));
        run_to_end(&mut engine, &mut players);

        engine.start_round(2, &mut players, &mut NullRenderer);
        assert!(engine.walls().contains(&GridPos::new(14, 7)));
        assert_eq!(engine.state().grid.get(GridPos::new(14, 7)), Some(Cell::Wall));
    }

    #[test]
    fn wall_on_spawn_cell_is_removed() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.walls.insert(GridPos::new(14, 8));
        engine.start_round(1, &mut players, &mut NullRenderer);
        assert!(!engine.walls().contains(&GridPos::new(14, 8)));
        assert_eq!(engine.state().grid.get(GridPos::new(14, 8)), Some(Cell::Trail(0)));
    }

    #[test]
    fn border_phaser_wraps() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry_with_power(2, PowerKind::BorderPhaser);
        engine.start_round(1, &mut players, &mut NullRenderer);

        // Player 0 turns north at (14, 8) and phases through the top border
        engine.queue_intent(&players, 0, TurnIntent::Right);
        engine.queue_intent(&players, 0, TurnIntent::Power);
        for _ in 0..9 {
            engine.tick(&mut players, &mut NullRenderer).unwrap();
        }
        assert!(players.is_alive(0));
        assert_eq!(engine.state().cycles[&0].pos, GridPos::new(14, 15));
    }

    #[test]
    fn snapshot_encodes() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        let bytes = engine.serialize_state().unwrap();
        let decoded: RoundState = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded.cycles.len(), 2);
        assert_eq!(decoded.phase, RoundPhase::Running);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            field_width: 0,
            field_height: 0,
            ..EngineConfig::default()
        };
        assert!(RoundEngine::new(config).is_err());

        let config = EngineConfig {
            hole_ticks: 3_000_000_000,
            power_charges: 2,
            ..small_config()
        };
        assert!(matches!(
            RoundEngine::new(config),
            Err(SettingsError::OutOfRange {
                setting: "hole_ticks",
                ..
            })
        ));
    }

    #[test]
    fn crossing_a_vacated_gap_renders_in_either_id_order() {
        let handoff = GridPos::new(6, 8);
        for (digger, crosser) in [(0, 1), (1, 0)] {
            let mut engine = RoundEngine::new(small_config()).unwrap();
            let mut players = make_registry_with_power(2, PowerKind::HoleMaker);
            engine.start_round(1, &mut players, &mut NullRenderer);
            engine.state.grid = Grid::new(16, 16);
            // The digger's gap head reaches (6, 8) on tick 1 and moves on as
            // the crosser drives onto it on tick 2
            place(&mut engine, digger, GridPos::new(6, 7), Heading::South);
            place(&mut engine, crosser, GridPos::new(4, 8), Heading::East);
            engine.queue_intent(&players, digger, TurnIntent::Power);

            let mut renderer = RecordingRenderer::default();
            engine.tick(&mut players, &mut renderer).unwrap();
            engine.tick(&mut players, &mut renderer).unwrap();

            assert!(players.is_alive(digger) && players.is_alive(crosser));
            assert_eq!(engine.state().grid.get(handoff), Some(Cell::Trail(crosser)));
            assert_eq!(
                last_draw(&renderer, handoff),
                Some(DrawCall::Mark(
                    handoff,
                    PlayerColor::PALETTE[crosser as usize].code()
                )),
                "Crosser {crosser} must stay visible on the vacated gap cell"
            );
        }
    }

    #[test]
    fn new_round_clears_each_cell_once() {
        let mut engine = RoundEngine::new(small_config()).unwrap();
        let mut players = make_registry_with_power(2, PowerKind::HoleMaker);
        engine.start_round(1, &mut players, &mut NullRenderer);
        engine.queue_intent(&players, 0, TurnIntent::Power);
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        engine.abort().unwrap();

        let mut renderer = RecordingRenderer::default();
        engine.start_round(2, &mut players, &mut renderer);
        let clears: Vec<GridPos> = renderer.clears().collect();
        let unique: BTreeSet<GridPos> = clears.iter().copied().collect();
        assert_eq!(clears.len(), unique.len(), "No cell is cleared twice: {clears:?}");
        // Trails (14, 8) (2, 8) (3, 8) (4, 8) and the live gap head (12, 8)
        assert_eq!(clears.len(), 5);
        assert!(clears.contains(&GridPos::new(12, 8)));
        assert!(
            !clears.contains(&GridPos::new(13, 8)),
            "Gap cell left behind was already cleared"
        );
    }

    #[test]
    fn grace_leaves_no_trail_and_passes_trails() {
        let config = EngineConfig {
            grace_ticks: 2,
            ..small_config()
        };
        let mut engine = RoundEngine::new(config).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        engine.state.grid.set(GridPos::new(13, 8), Cell::Trail(1));

        engine.tick(&mut players, &mut NullRenderer).unwrap();
        assert!(players.is_alive(0), "Graced cycle drives through a trail");
        assert_eq!(
            engine.state().grid.get(GridPos::new(13, 8)),
            Some(Cell::Trail(1)),
            "Crossed trail stays intact"
        );

        engine.tick(&mut players, &mut NullRenderer).unwrap();
        engine.tick(&mut players, &mut NullRenderer).unwrap();
        let grid = &engine.state().grid;
        assert_eq!(grid.get(GridPos::new(12, 8)), Some(Cell::Hole(0)));
        assert_eq!(grid.get(GridPos::new(11, 8)), Some(Cell::Trail(0)));
        assert_eq!(grid.get(GridPos::new(3, 8)), Some(Cell::Hole(1)));
        assert_eq!(grid.get(GridPos::new(5, 8)), Some(Cell::Trail(1)));
    }

    #[test]
    fn grace_does_not_cover_the_border() {
        let config = EngineConfig {
            grace_ticks: 50,
            ..small_config()
        };
        let mut engine = RoundEngine::new(config).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);
        engine.queue_intent(&players, 0, TurnIntent::Right);
        run_to_end(&mut engine, &mut players);

        assert_eq!(engine.result(), Some(&RoundResult::Won(1)));
        assert_eq!(engine.eliminations()[0].cause, EliminationCause::Border);
    }

    #[test]
    fn periodic_gaps_leave_holes() {
        let mut engine = RoundEngine::new(gap_config()).unwrap();
        let mut players = make_registry(2);
        engine.start_round(1, &mut players, &mut NullRenderer);

        let mut renderer = RecordingRenderer::default();
        for _ in 0..5 {
            engine.tick(&mut players, &mut renderer).unwrap();
        }
        // Player 1 moves East from (2, 8): three trail cells, then a two-tick gap
        let grid = &engine.state().grid;
        assert_eq!(grid.get(GridPos::new(5, 8)), Some(Cell::Trail(1)));
        assert_eq!(grid.get(GridPos::new(6, 8)), Some(Cell::Hole(1)));
        assert_eq!(grid.get(GridPos::new(7, 8)), Some(Cell::Hole(1)));
        assert_eq!(grid.get(GridPos::new(10, 8)), Some(Cell::Hole(0)));
        assert!(renderer.clears().any(|p| p == GridPos::new(6, 8)));
        assert_eq!(engine.state().cycles[&1].gap_cell, Some(GridPos::new(7, 8)));
    }

    #[test]
    fn gap_timing_follows_the_seed() {
        let config = EngineConfig {
            gap_interval_min: 3,
            gap_interval_max: 9,
            gap_duration_min: 1,
            gap_duration_max: 2,
            seed: Some(42),
            ..small_config()
        };
        let run = || {
            let mut engine = RoundEngine::new(config.clone()).unwrap();
            let mut players = make_registry(4);
            engine.start_round(1, &mut players, &mut NullRenderer);
            run_to_end(&mut engine, &mut players);
            engine.state().grid.clone()
        };
        assert_eq!(run(), run());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn intent() -> impl Strategy<Value = TurnIntent> {
            prop_oneof![
                Just(TurnIntent::Left),
                Just(TurnIntent::Power),
                Just(TurnIntent::Right),
            ]
        }

        proptest! {
            #[test]
            fn rounds_always_terminate(
                n in 2usize..=8,
                script in proptest::collection::vec((0u8..8, intent()), 0..200),
            ) {
                let config = small_config();
                let limit = config.tick_limit();
                let mut engine = RoundEngine::new(config).unwrap();
                let mut players = make_registry_with_power(n, PowerKind::HoleMaker);
                engine.start_round(1, &mut players, &mut NullRenderer);

                let mut script = script.into_iter();
                while engine.phase() == RoundPhase::Running {
                    if let Some((p, i)) = script.next() {
                        engine.queue_intent(&players, p % n as u8, i);
                    }
                    engine.tick(&mut players, &mut NullRenderer).unwrap();
                    prop_assert!(engine.tick_count() <= limit);
                }
                prop_assert_eq!(engine.phase(), RoundPhase::Complete);
                prop_assert!(players.living_players().len() <= 1);
            }

            #[test]
            fn rounds_with_gaps_and_grace_terminate(
                n in 2usize..=8,
                seed in any::<u64>(),
                script in proptest::collection::vec((0u8..8, intent()), 0..200),
            ) {
                let config = EngineConfig {
                    field_width: 16,
                    field_height: 16,
                    seed: Some(seed),
                    ..EngineConfig::default()
                };
                let limit = config.tick_limit();
                let mut engine = RoundEngine::new(config).unwrap();
                let mut players = make_registry_with_power(n, PowerKind::HoleMaker);
                engine.start_round(1, &mut players, &mut NullRenderer);

                let mut script = script.into_iter();
                while engine.phase() == RoundPhase::Running {
                    if let Some((p, i)) = script.next() {
                        engine.queue_intent(&players, p % n as u8, i);
                    }
                    engine.tick(&mut players, &mut NullRenderer).unwrap();
                    prop_assert!(engine.tick_count() <= limit);
                }
                prop_assert!(players.living_players().len() <= 1 || engine.tick_count() == limit);
            }

            #[test]
            fn every_elimination_is_unique(
                script in proptest::collection::vec((0u8..4, intent()), 0..100),
            ) {
                let mut engine = RoundEngine::new(small_config()).unwrap();
                let mut players = make_registry(4);
                engine.start_round(1, &mut players, &mut NullRenderer);

                let mut script = script.into_iter();
                while engine.phase() == RoundPhase::Running {
                    if let Some((p, i)) = script.next() {
                        engine.queue_intent(&players, p, i);
                    }
                    engine.tick(&mut players, &mut NullRenderer).unwrap();
                }
                let ids: BTreeSet<PlayerId> =
                    engine.eliminations().iter().map(|e| e.player_id).collect();
                prop_assert_eq!(ids.len(), engine.eliminations().len());
            }
        }
    }
}
