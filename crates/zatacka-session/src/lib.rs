//! Real-time driver for a [`zatacka_engine::MatchController`].

pub mod session;

pub use session::{SessionBroadcast, SessionCommand, SessionConfig, spawn_match_session};
