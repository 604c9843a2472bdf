use serde::{Deserialize, Serialize};
use uuid::Uuid;

use zatacka_core::error::{BindingError, RegistryError, SettingsError};
use zatacka_core::input::{InputSource, KeyBindingRegistry};
use zatacka_core::player::{PlayerColor, PlayerId};
use zatacka_core::registry::PlayerRegistry;
use zatacka_core::render::Renderer;
use zatacka_core::settings::MatchSettings;

use crate::collision::EliminationCause;
use crate::config::EngineConfig;
use crate::error::MatchError;
use crate::round::{RoundEngine, RoundEvent, RoundPhase, RoundResult};
use crate::scoring::{MatchScore, RoundRecord};

/// Lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Setup,
    InProgress,
    Finished,
    Aborted,
}

/// Everything observers are told about a match, round events included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    MatchStarted {
        match_id: Uuid,
        num_rounds: u32,
    },
    Round(RoundEvent),
    PointAwarded {
        player_id: PlayerId,
        round: u32,
        total: u32,
    },
    MatchFinished {
        winner: Option<PlayerId>,
        rounds_played: u32,
    },
    MatchAborted {
        rounds_played: u32,
    },
}

/// One row of the final table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub points: u32,
    pub forfeited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub phase: MatchPhase,
    pub num_rounds: u32,
    pub rounds_played: u32,
    /// Sorted by points, highest first; equal points by id.
    pub standings: Vec<Standing>,
    /// Only set once the match has finished.
    pub winner: Option<PlayerId>,
    pub history: Vec<RoundRecord>,
}

/// Drives a match: owns its settings, players, and key bindings, runs one
/// round after another, and keeps the score.
pub struct MatchController {
    id: Uuid,
    settings: MatchSettings,
    players: PlayerRegistry,
    bindings: KeyBindingRegistry,
    engine: RoundEngine,
    score: MatchScore,
    phase: MatchPhase,
    round: u32,
}

impl MatchController {
    /// Fails when the engine config does not validate.
    pub fn new(
        settings: MatchSettings,
        players: PlayerRegistry,
        bindings: KeyBindingRegistry,
        config: EngineConfig,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            id: Uuid::new_v4(),
            settings,
            players,
            bindings,
            engine: RoundEngine::new(config)?,
            score: MatchScore::default(),
            phase: MatchPhase::Setup,
            round: 0,
        })
    }

    pub fn match_id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Number of the current (or last) round; 0 before the match starts.
    pub fn round_number(&self) -> u32 {
        self.round
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Setters fail with [`SettingsError::MatchAlreadyStarted`] once the
    /// match has started.
    pub fn settings_mut(&mut self) -> &mut MatchSettings {
        &mut self.settings
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn bindings(&self) -> &KeyBindingRegistry {
        &self.bindings
    }

    pub fn round_engine(&self) -> &RoundEngine {
        &self.engine
    }

    /// Validate the setup, freeze the settings, and start round 1.
    pub fn start(&mut self, renderer: &mut dyn Renderer) -> Result<Vec<MatchEvent>, MatchError> {
        if self.phase != MatchPhase::Setup {
            return Err(SettingsError::MatchAlreadyStarted.into());
        }
        self.validate_setup()?;

        let _span = tracing::info_span!("match", match_id = %self.id).entered();
        self.settings.freeze();
        self.score = MatchScore::new(self.players.iter().map(|p| p.id));
        self.phase = MatchPhase::InProgress;
        tracing::info!(
            players = self.players.len(),
            rounds = self.settings.num_rounds(),
            speed = ?self.settings.speed_tier(),
            "Match started"
        );

        let mut events = vec![MatchEvent::MatchStarted {
            match_id: self.id,
            num_rounds: self.settings.num_rounds(),
        }];
        self.begin_round(renderer, &mut events);
        self.settle(renderer, &mut events)?;
        Ok(events)
    }

    fn validate_setup(&self) -> Result<(), MatchError> {
        let expected = self.settings.num_players() as usize;
        if self.players.len() != expected {
            return Err(MatchError::IncompleteSetup(format!(
                "{} of {expected} players registered",
                self.players.len()
            )));
        }
        if let Some(player) = self
            .players
            .iter()
            .find(|p| !self.bindings.is_complete_for(p.id))
        {
            return Err(MatchError::IncompleteSetup(format!(
                "player {} ({}) is missing key bindings",
                player.id, player.name
            )));
        }
        if self.bindings.len() != expected * 3 {
            return Err(MatchError::IncompleteSetup(
                "keys are bound for unregistered players".to_string(),
            ));
        }
        Ok(())
    }

    /// Route a key press to its player's cycle. Returns `false` when the
    /// intent was dropped (the player is dead or forfeited).
    pub fn handle_symbol(&mut self, symbol: char) -> Result<bool, MatchError> {
        self.ensure_in_progress()?;
        let binding = self.bindings.lookup(symbol)?;
        Ok(self
            .engine
            .queue_intent(&self.players, binding.player_id, binding.intent))
    }

    /// Advance the current round by one tick. Completed rounds are scored and
    /// the next one is started in the same call.
    pub fn tick(&mut self, renderer: &mut dyn Renderer) -> Result<Vec<MatchEvent>, MatchError> {
        self.ensure_in_progress()?;
        let _span = tracing::debug_span!("match", match_id = %self.id, round = self.round).entered();
        let mut events: Vec<MatchEvent> = self
            .engine
            .tick(&mut self.players, renderer)?
            .into_iter()
            .map(MatchEvent::Round)
            .collect();
        self.settle(renderer, &mut events)?;
        Ok(events)
    }

    /// Run the match to the end, polling `input` once per tick.
    ///
    /// Unknown keys are ignored. The match is aborted when the input source
    /// asks to stop.
    pub fn play(
        &mut self,
        renderer: &mut dyn Renderer,
        input: &mut dyn InputSource,
    ) -> Result<MatchSummary, MatchError> {
        if self.phase == MatchPhase::Setup {
            self.start(renderer)?;
        }
        while self.phase == MatchPhase::InProgress {
            for symbol in input.poll() {
                match self.handle_symbol(symbol) {
                    Ok(_) => {},
                    Err(MatchError::Binding(BindingError::UnknownBinding(symbol))) => {
                        tracing::debug!(?symbol, "Ignored unbound key");
                    },
                    Err(e) => return Err(e),
                }
            }
            if input.stop_requested() {
                self.abort()?;
                break;
            }
            self.tick(renderer)?;
        }
        Ok(self.summary())
    }

    /// Abort the running round and the match. The score stays queryable.
    pub fn abort(&mut self) -> Result<Vec<MatchEvent>, MatchError> {
        if !matches!(self.phase, MatchPhase::Setup | MatchPhase::InProgress) {
            return Err(MatchError::NotInProgress(self.phase));
        }
        let mut events = Vec::new();
        if self.engine.phase() == RoundPhase::Running {
            events.extend(self.engine.abort()?.into_iter().map(MatchEvent::Round));
        }
        self.phase = MatchPhase::Aborted;
        self.score.freeze();
        let rounds_played = self.score.rounds_recorded();
        tracing::info!(match_id = %self.id, rounds_played, "Match aborted");
        events.push(MatchEvent::MatchAborted { rounds_played });
        Ok(events)
    }

    /// Remove a player from the match. They are eliminated from the current
    /// round and sit out every later one.
    pub fn forfeit(
        &mut self,
        player_id: PlayerId,
        renderer: &mut dyn Renderer,
    ) -> Result<Vec<MatchEvent>, MatchError> {
        self.ensure_in_progress()?;
        if self.players.get(player_id).is_none() {
            return Err(RegistryError::UnknownPlayer(player_id).into());
        }
        let _span = tracing::info_span!("match", match_id = %self.id, round = self.round).entered();
        let mut events: Vec<MatchEvent> = self
            .engine
            .eliminate(&mut self.players, renderer, player_id, EliminationCause::Forfeit)
            .into_iter()
            .map(MatchEvent::Round)
            .collect();
        self.players.forfeit(player_id)?;
        tracing::info!(player_id, remaining = self.players.active_count(), "Player forfeited");
        self.settle(renderer, &mut events)?;
        Ok(events)
    }

    pub fn current_score(&self) -> &MatchScore {
        &self.score
    }

    /// Winner of a finished match, `None` when nobody scored.
    pub fn match_winner(&self) -> Result<Option<PlayerId>, MatchError> {
        match self.phase {
            MatchPhase::Finished => Ok(self.score.leader(self.settings.tie_break())),
            _ => Err(MatchError::MatchNotFinished),
        }
    }

    pub fn summary(&self) -> MatchSummary {
        let mut standings: Vec<Standing> = self
            .players
            .iter()
            .map(|p| Standing {
                player_id: p.id,
                name: p.name.clone(),
                color: p.color,
                points: self.score.points(p.id),
                forfeited: p.forfeited,
            })
            .collect();
        standings.sort_by(|a, b| b.points.cmp(&a.points).then(a.player_id.cmp(&b.player_id)));

        MatchSummary {
            match_id: self.id,
            phase: self.phase,
            num_rounds: self.settings.num_rounds(),
            rounds_played: self.score.rounds_recorded(),
            standings,
            winner: self.match_winner().ok().flatten(),
            history: self.score.history().to_vec(),
        }
    }

    /// MessagePack encoding of the live round state.
    pub fn snapshot(&self) -> Result<Vec<u8>, MatchError> {
        self.engine
            .serialize_state()
            .map_err(|e| MatchError::Snapshot(e.to_string()))
    }

    fn ensure_in_progress(&self) -> Result<(), MatchError> {
        match self.phase {
            MatchPhase::InProgress => Ok(()),
            phase => Err(MatchError::NotInProgress(phase)),
        }
    }

    fn begin_round(&mut self, renderer: &mut dyn Renderer, events: &mut Vec<MatchEvent>) {
        self.round += 1;
        events.extend(
            self.engine
                .start_round(self.round, &mut self.players, renderer)
                .into_iter()
                .map(MatchEvent::Round),
        );
    }

    /// Score every completed round and start the next until a round is
    /// running or the match is over.
    fn settle(
        &mut self,
        renderer: &mut dyn Renderer,
        events: &mut Vec<MatchEvent>,
    ) -> Result<(), MatchError> {
        while self.phase == MatchPhase::InProgress && self.engine.phase() == RoundPhase::Complete {
            let result = self
                .engine
                .result()
                .cloned()
                .unwrap_or(RoundResult::NoWinner);
            let eliminations = self.engine.eliminations().to_vec();
            if let Some((player_id, total)) = self.score.record(self.round, result, eliminations)? {
                tracing::info!(player_id, round = self.round, total, "Point awarded");
                events.push(MatchEvent::PointAwarded {
                    player_id,
                    round: self.round,
                    total,
                });
            }

            if self.should_finish() {
                self.finish(events);
            } else {
                self.begin_round(renderer, events);
            }
        }
        Ok(())
    }

    fn should_finish(&self) -> bool {
        let played = self.score.rounds_recorded();
        if played >= self.settings.num_rounds() {
            return true;
        }
        if let Some(target) = self.settings.points_to_win()
            && self.score.top_points() >= target
        {
            return true;
        }
        self.settings.early_stop() && self.players.active_count() <= 1
    }

    fn finish(&mut self, events: &mut Vec<MatchEvent>) {
        self.phase = MatchPhase::Finished;
        self.score.freeze();
        let winner = self.score.leader(self.settings.tie_break());
        let rounds_played = self.score.rounds_recorded();
        tracing::info!(match_id = %self.id, ?winner, rounds_played, "Match finished");
        events.push(MatchEvent::MatchFinished {
            winner,
            rounds_played,
        });
    }
}
