use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use zatacka_core::player::PlayerId;
use zatacka_core::render::GridPos;

use crate::grid::{Cell, Grid};

/// Why a cycle was eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationCause {
    /// Drove off the field without border-phasing.
    Border,
    /// Hit a trail cell. `owner == player` is a self-crash.
    Trail { owner: PlayerId },
    /// Hit a wall-maker barrier.
    Wall,
    /// Reached the same cell as another cycle, or swapped cells with one.
    HeadOn,
    /// Left the match.
    Forfeit,
}

/// A cycle's intended move for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    pub player_id: PlayerId,
    pub from: GridPos,
    /// `None` when the move leaves the field.
    pub to: Option<GridPos>,
}

/// Decide which planned moves are fatal.
///
/// Every move is judged against the same pre-tick `grid`, so the outcome does
/// not depend on the order of `moves`.
pub fn resolve_moves(
    moves: &[PlannedMove],
    grid: &Grid,
) -> BTreeMap<PlayerId, EliminationCause> {
    let mut crashes = BTreeMap::new();

    for m in moves {
        let cause = match m.to.map(|to| grid.get(to)) {
            None | Some(None) => Some(EliminationCause::Border),
            Some(Some(Cell::Trail(owner))) => Some(EliminationCause::Trail { owner }),
            Some(Some(Cell::Wall)) => Some(EliminationCause::Wall),
            Some(Some(Cell::Empty | Cell::Hole(_))) => None,
        };
        if let Some(cause) = cause {
            crashes.insert(m.player_id, cause);
        }
    }

    let mut targets: HashMap<GridPos, Vec<PlayerId>> = HashMap::new();
    for m in moves {
        if let Some(to) = m.to {
            targets.entry(to).or_default().push(m.player_id);
        }
    }
    for ids in targets.values().filter(|ids| ids.len() > 1) {
        for &id in ids {
            crashes.entry(id).or_insert(EliminationCause::HeadOn);
        }
    }

    for (i, a) in moves.iter().enumerate() {
        for b in &moves[i + 1..] {
            if a.to == Some(b.from) && b.to == Some(a.from) {
                crashes.entry(a.player_id).or_insert(EliminationCause::HeadOn);
                crashes.entry(b.player_id).or_insert(EliminationCause::HeadOn);
            }
        }
    }

    crashes
}
