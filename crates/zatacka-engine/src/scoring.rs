use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use zatacka_core::player::PlayerId;
use zatacka_core::settings::TieBreak;

use crate::error::MatchError;
use crate::round::{Elimination, RoundResult};

/// Points awarded to the sole survivor of a round.
pub const WIN_POINTS: u32 = 1;

/// Outcome of one finished round, kept for the match summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub result: RoundResult,
    pub eliminations: Vec<Elimination>,
}

/// Running score of a match. Only round winners score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchScore {
    points: BTreeMap<PlayerId, u32>,
    history: Vec<RoundRecord>,
    frozen: bool,
}

impl MatchScore {
    /// Zero points for every listed player.
    pub fn new(players: impl IntoIterator<Item = PlayerId>) -> Self {
        Self {
            points: players.into_iter().map(|id| (id, 0)).collect(),
            ..Self::default()
        }
    }

    /// Record a finished round. Returns the winner and their new total when a
    /// point was awarded.
    pub fn record(
        &mut self,
        round: u32,
        result: RoundResult,
        eliminations: Vec<Elimination>,
    ) -> Result<Option<(PlayerId, u32)>, MatchError> {
        if self.frozen {
            return Err(MatchError::ScoreFrozen);
        }
        let awarded = result.winner().map(|id| {
            let total = self.points.entry(id).or_insert(0);
            *total += WIN_POINTS;
            (id, *total)
        });
        self.history.push(RoundRecord {
            round,
            result,
            eliminations,
        });
        Ok(awarded)
    }

    pub fn points(&self, player_id: PlayerId) -> u32 {
        self.points.get(&player_id).copied().unwrap_or(0)
    }

    pub fn all_points(&self) -> &BTreeMap<PlayerId, u32> {
        &self.points
    }

    /// Sum of all points; never exceeds the number of recorded rounds.
    pub fn total(&self) -> u32 {
        self.points.values().sum()
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn rounds_recorded(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn top_points(&self) -> u32 {
        self.points.values().copied().max().unwrap_or(0)
    }

    /// Current leader, or `None` while nobody has scored.
    ///
    /// Players level on points are separated by the round of their last win:
    /// the earliest for [`TieBreak::EarliestToScore`], the latest for
    /// [`TieBreak::MostRecentWin`]. Lowest id settles anything left.
    pub fn leader(&self, tie_break: TieBreak) -> Option<PlayerId> {
        let top = self.top_points();
        if top == 0 {
            return None;
        }
        let last_win = |id: PlayerId| {
            self.history
                .iter()
                .rev()
                .find(|r| r.result.winner() == Some(id))
                .map_or(0, |r| r.round)
        };
        let candidates = self
            .points
            .iter()
            .filter(|(_, p)| **p == top)
            .map(|(id, _)| (*id, last_win(*id)));

        match tie_break {
            TieBreak::EarliestToScore => candidates
                .min_by_key(|(id, round)| (*round, *id))
                .map(|(id, _)| id),
            TieBreak::MostRecentWin => candidates
                .max_by_key(|(id, round)| (*round, std::cmp::Reverse(*id)))
                .map(|(id, _)| id),
        }
    }

    /// Lock the score once the match ends.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
