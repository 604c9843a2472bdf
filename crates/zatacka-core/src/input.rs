use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BindingError;
use crate::player::PlayerId;

/// What a bound key asks the player's cycle to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnIntent {
    Left,
    Power,
    Right,
}

impl TurnIntent {
    /// Key order used by [`KeyBindingRegistry::bind_player`]: left, power, right.
    pub const ALL: [TurnIntent; 3] = [TurnIntent::Left, TurnIntent::Power, TurnIntent::Right];
}

/// Target of a bound key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub player_id: PlayerId,
    pub intent: TurnIntent,
}

/// Write-once map from input symbols to `(player, intent)` pairs.
#[derive(Debug, Clone, Default)]
pub struct KeyBindingRegistry {
    bindings: HashMap<char, KeyBinding>,
}

impl KeyBindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `symbol`. Re-binding a symbol or giving a player a second key for
    /// the same intent fails and leaves the registry untouched.
    pub fn bind(
        &mut self,
        symbol: char,
        player_id: PlayerId,
        intent: TurnIntent,
    ) -> Result<(), BindingError> {
        if let Some(existing) = self.bindings.get(&symbol) {
            tracing::debug!(?symbol, player_id, "Rejected duplicate key binding");
            return Err(BindingError::DuplicateBinding {
                symbol,
                existing: *existing,
            });
        }
        if self
            .bindings
            .values()
            .any(|b| b.player_id == player_id && b.intent == intent)
        {
            return Err(BindingError::DuplicateIntent { player_id, intent });
        }
        self.bindings
            .insert(symbol, KeyBinding { player_id, intent });
        Ok(())
    }

    /// Bind a player's `[left, power, right]` keys, all or nothing.
    pub fn bind_player(&mut self, player_id: PlayerId, keys: [char; 3]) -> Result<(), BindingError> {
        for (i, &symbol) in keys.iter().enumerate() {
            if let Some(existing) = self.bindings.get(&symbol) {
                return Err(BindingError::DuplicateBinding {
                    symbol,
                    existing: *existing,
                });
            }
            if let Some(j) = keys[..i].iter().position(|&k| k == symbol) {
                return Err(BindingError::DuplicateBinding {
                    symbol,
                    existing: KeyBinding {
                        player_id,
                        intent: TurnIntent::ALL[j],
                    },
                });
            }
        }
        if let Some(b) = self.bindings.values().find(|b| b.player_id == player_id) {
            return Err(BindingError::DuplicateIntent {
                player_id,
                intent: b.intent,
            });
        }

        for (symbol, intent) in keys.into_iter().zip(TurnIntent::ALL) {
            self.bindings
                .insert(symbol, KeyBinding { player_id, intent });
        }
        Ok(())
    }

    pub fn lookup(&self, symbol: char) -> Result<KeyBinding, BindingError> {
        self.bindings
            .get(&symbol)
            .copied()
            .ok_or(BindingError::UnknownBinding(symbol))
    }

    /// All `(symbol, intent)` pairs bound for a player, ordered by intent.
    pub fn bindings_for(&self, player_id: PlayerId) -> Vec<(char, TurnIntent)> {
        let mut keys: Vec<(char, TurnIntent)> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.player_id == player_id)
            .map(|(&symbol, b)| (symbol, b.intent))
            .collect();
        keys.sort_by_key(|&(_, intent)| TurnIntent::ALL.iter().position(|&i| i == intent));
        keys
    }

    /// Whether the player has exactly one key for each intent.
    pub fn is_complete_for(&self, player_id: PlayerId) -> bool {
        let keys = self.bindings_for(player_id);
        keys.len() == TurnIntent::ALL.len()
            && TurnIntent::ALL
                .iter()
                .all(|intent| keys.iter().any(|(_, i)| i == intent))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Source of raw key symbols, polled once per tick.
pub trait InputSource {
    fn poll(&mut self) -> Vec<char>;

    /// Ask a synchronous driver to abort the match after the current tick.
    fn stop_requested(&mut self) -> bool {
        false
    }
}

/// An input source that never produces a key press.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn poll(&mut self) -> Vec<char> {
        Vec::new()
    }
}
