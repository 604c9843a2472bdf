use crate::input::{KeyBinding, TurnIntent};
use crate::player::{PlayerColor, PlayerId};

/// Broad classification shared by every error in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad configuration: out-of-range settings, duplicate colors or keys.
    Validation,
    /// A match was started before every player and binding was registered.
    SetupIncomplete,
    /// The operation is not allowed in the current lifecycle state.
    State,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    DuplicateBinding { symbol: char, existing: KeyBinding },
    DuplicateIntent { player_id: PlayerId, intent: TurnIntent },
    UnknownBinding(char),
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateBinding { symbol, existing } => write!(
                f,
                "key {symbol:?} is already bound to player {} ({:?})",
                existing.player_id, existing.intent
            ),
            Self::DuplicateIntent { player_id, intent } => {
                write!(f, "player {player_id} already has a {intent:?} key")
            },
            Self::UnknownBinding(symbol) => write!(f, "no binding for key {symbol:?}"),
        }
    }
}

impl std::error::Error for BindingError {}

impl BindingError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    ColorConflict { color: PlayerColor, owner: PlayerId },
    RegistryFull { capacity: u8 },
    UnknownPlayer(PlayerId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColorConflict { color, owner } => {
                write!(f, "color {color} is already taken by player {owner}")
            },
            Self::RegistryFull { capacity } => {
                write!(f, "all {capacity} player slots are filled")
            },
            Self::UnknownPlayer(id) => write!(f, "unknown player {id}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl RegistryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ColorConflict { .. } | Self::RegistryFull { .. } => ErrorClass::Validation,
            Self::UnknownPlayer(_) => ErrorClass::State,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    OutOfRange {
        setting: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    MatchAlreadyStarted,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange {
                setting,
                value,
                min,
                max,
            } => {
                if *max == u32::MAX {
                    write!(f, "{setting} must be at least {min}, got {value}")
                } else {
                    write!(f, "{setting} must be in {min}..={max}, got {value}")
                }
            },
            Self::MatchAlreadyStarted => {
                write!(f, "settings are frozen once the match has started")
            },
        }
    }
}

impl std::error::Error for SettingsError {}

impl SettingsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::OutOfRange { .. } => ErrorClass::Validation,
            Self::MatchAlreadyStarted => ErrorClass::State,
        }
    }
}
