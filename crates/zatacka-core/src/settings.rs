use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const MIN_PLAYERS: u8 = 2;
pub const MAX_PLAYERS: u8 = 8;

/// How fast the simulation ticks. Every tier moves a cycle one cell per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl SpeedTier {
    pub fn tick_interval(self) -> Duration {
        match self {
            Self::Slow => Duration::from_millis(200),
            Self::Medium => Duration::from_millis(120),
            Self::Fast => Duration::from_millis(60),
        }
    }
}

/// Resolves equal top scores when declaring the match winner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The player who reached the top score first.
    #[default]
    EarliestToScore,
    /// The player who won the most recent round.
    MostRecentWin,
}

/// Match configuration. Validated on every write, frozen once the match starts.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSettings {
    num_players: u8,
    num_rounds: u32,
    speed_tier: SpeedTier,
    early_stop: bool,
    points_to_win: Option<u32>,
    tie_break: TieBreak,
    #[serde(skip)]
    frozen: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            num_players: 2,
            num_rounds: 4,
            speed_tier: SpeedTier::Medium,
            early_stop: false,
            points_to_win: None,
            tie_break: TieBreak::EarliestToScore,
            frozen: false,
        }
    }
}

impl MatchSettings {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_mutable(&self) -> Result<(), SettingsError> {
        if self.frozen {
            Err(SettingsError::MatchAlreadyStarted)
        } else {
            Ok(())
        }
    }

    pub fn set_num_players(&mut self, n: u8) -> Result<(), SettingsError> {
        self.ensure_mutable()?;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n) {
            return Err(SettingsError::OutOfRange {
                setting: "num_players",
                value: n as u32,
                min: MIN_PLAYERS as u32,
                max: MAX_PLAYERS as u32,
            });
        }
        self.num_players = n;
        Ok(())
    }

    pub fn set_num_rounds(&mut self, n: u32) -> Result<(), SettingsError> {
        self.ensure_mutable()?;
        if n == 0 {
            return Err(SettingsError::OutOfRange {
                setting: "num_rounds",
                value: n,
                min: 1,
                max: u32::MAX,
            });
        }
        self.num_rounds = n;
        Ok(())
    }

    pub fn set_speed_tier(&mut self, tier: SpeedTier) -> Result<(), SettingsError> {
        self.ensure_mutable()?;
        self.speed_tier = tier;
        Ok(())
    }

    /// End the match once at most one player is still taking part.
    pub fn set_early_stop(&mut self, enabled: bool) -> Result<(), SettingsError> {
        self.ensure_mutable()?;
        self.early_stop = enabled;
        Ok(())
    }

    /// End the match as soon as a player reaches `points`.
    pub fn set_points_to_win(&mut self, points: Option<u32>) -> Result<(), SettingsError> {
        self.ensure_mutable()?;
        if points == Some(0) {
            return Err(SettingsError::OutOfRange {
                setting: "points_to_win",
                value: 0,
                min: 1,
                max: u32::MAX,
            });
        }
        self.points_to_win = points;
        Ok(())
    }

    pub fn set_tie_break(&mut self, tie_break: TieBreak) -> Result<(), SettingsError> {
        self.ensure_mutable()?;
        self.tie_break = tie_break;
        Ok(())
    }

    pub fn num_players(&self) -> u8 {
        self.num_players
    }

    pub fn num_rounds(&self) -> u32 {
        self.num_rounds
    }

    pub fn speed_tier(&self) -> SpeedTier {
        self.speed_tier
    }

    pub fn early_stop(&self) -> bool {
        self.early_stop
    }

    pub fn points_to_win(&self) -> Option<u32> {
        self.points_to_win
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Lock the settings for the rest of the match.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}
