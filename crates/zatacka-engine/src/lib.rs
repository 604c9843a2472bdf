//! Round-based light-cycle match engine.
//!
//! A [`MatchController`] owns the players, their key bindings, and the match
//! settings, and runs rounds on a [`RoundEngine`] one tick at a time.

pub mod arena;
pub mod collision;
pub mod config;
pub mod controller;
pub mod error;
pub mod grid;
pub mod physics;
pub mod round;
pub mod scoring;
pub mod setup;

pub use config::EngineConfig;
pub use controller::{MatchController, MatchEvent, MatchPhase, MatchSummary};
pub use error::MatchError;
pub use round::{RoundEngine, RoundEvent, RoundPhase, RoundResult};
pub use scoring::MatchScore;
pub use setup::{MatchSetup, SetupError};
