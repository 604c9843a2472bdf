use zatacka_core::error::{BindingError, ErrorClass, RegistryError, SettingsError};

use crate::controller::MatchPhase;
use crate::round::RoundError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    Binding(BindingError),
    Registry(RegistryError),
    Settings(SettingsError),
    Round(RoundError),
    /// Players or bindings missing when the match was started.
    IncompleteSetup(String),
    /// A winner was requested before the match finished.
    MatchNotFinished,
    NotInProgress(MatchPhase),
    ScoreFrozen,
    Snapshot(String),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binding(e) => write!(f, "binding error: {e}"),
            Self::Registry(e) => write!(f, "registry error: {e}"),
            Self::Settings(e) => write!(f, "settings error: {e}"),
            Self::Round(e) => write!(f, "round error: {e}"),
            Self::IncompleteSetup(msg) => write!(f, "incomplete setup: {msg}"),
            Self::MatchNotFinished => write!(f, "match has not finished"),
            Self::NotInProgress(phase) => write!(f, "match is not in progress (phase: {phase:?})"),
            Self::ScoreFrozen => write!(f, "score is frozen"),
            Self::Snapshot(msg) => write!(f, "snapshot encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for MatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Binding(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Settings(e) => Some(e),
            Self::Round(e) => Some(e),
            _ => None,
        }
    }
}

impl MatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Binding(e) => e.class(),
            Self::Registry(e) => e.class(),
            Self::Settings(e) => e.class(),
            Self::IncompleteSetup(_) => ErrorClass::SetupIncomplete,
            Self::Round(_)
            | Self::MatchNotFinished
            | Self::NotInProgress(_)
            | Self::ScoreFrozen
            | Self::Snapshot(_) => ErrorClass::State,
        }
    }
}

impl From<BindingError> for MatchError {
    fn from(e: BindingError) -> Self {
        Self::Binding(e)
    }
}

impl From<RegistryError> for MatchError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<SettingsError> for MatchError {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

impl From<RoundError> for MatchError {
    fn from(e: RoundError) -> Self {
        Self::Round(e)
    }
}
