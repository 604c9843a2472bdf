use std::collections::BTreeSet;

use crate::error::RegistryError;
use crate::player::{Player, PlayerColor, PlayerId, PowerKind};
use crate::settings::MatchSettings;

/// Owns every [`Player`] of a match.
///
/// Ids are handed out in registration order starting at 0. Rounds refer to
/// players by id only; alive flags live here and nowhere else.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    capacity: u8,
}

impl PlayerRegistry {
    pub fn new(capacity: u8) -> Self {
        Self {
            players: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    /// Registry sized for the configured player count.
    pub fn for_settings(settings: &MatchSettings) -> Self {
        Self::new(settings.num_players())
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        color: PlayerColor,
        power: PowerKind,
    ) -> Result<PlayerId, RegistryError> {
        if self.players.len() >= self.capacity as usize {
            return Err(RegistryError::RegistryFull {
                capacity: self.capacity,
            });
        }
        if let Some(owner) = self.players.iter().find(|p| p.color == color) {
            return Err(RegistryError::ColorConflict {
                color,
                owner: owner.id,
            });
        }

        let id = self.players.len() as PlayerId;
        let player = Player::new(id, name, color, power);
        tracing::debug!(player_id = id, name = %player.name, %color, "Registered player");
        self.players.push(player);
        Ok(id)
    }

    /// Mark a player dead. Returns `true` only for the call that performed the kill;
    /// killing a dead player is a no-op.
    pub fn kill(&mut self, id: PlayerId) -> bool {
        match self.players.get_mut(id as usize) {
            Some(player) if player.alive => {
                player.alive = false;
                true
            },
            Some(_) => false,
            None => {
                tracing::error!(player_id = id, "Kill issued for unknown player");
                debug_assert!(false, "kill issued for unknown player {id}");
                false
            },
        }
    }

    /// Remove a player from the rest of the match. Their color stays reserved.
    pub fn forfeit(&mut self, id: PlayerId) -> Result<(), RegistryError> {
        let player = self
            .players
            .get_mut(id as usize)
            .ok_or(RegistryError::UnknownPlayer(id))?;
        player.forfeited = true;
        player.alive = false;
        Ok(())
    }

    /// Bring every non-forfeited player back for a new round.
    pub fn revive_all(&mut self) {
        for player in self.players.iter_mut().filter(|p| !p.forfeited) {
            player.alive = true;
        }
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.get(id).is_some_and(|p| p.alive)
    }

    /// Snapshot of the ids currently alive.
    pub fn living_players(&self) -> BTreeSet<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    /// Players still taking part in the match.
    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| !p.forfeited).count()
    }
}
