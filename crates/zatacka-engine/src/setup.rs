//! TOML match setup: settings, players, and their keys in one file.
//!
//! ```toml
//! seed = 7
//!
//! [settings]
//! num_rounds = 5
//! speed = "fast"
//!
//! [[players]]
//! name = "Ana"
//! color = "red"
//! power = "hole_maker"
//! keys = "asd"
//!
//! [[players]]
//! name = "Bo"
//! power = "random"
//! keys = "jkl"
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use zatacka_core::error::{BindingError, ErrorClass, RegistryError, SettingsError};
use zatacka_core::input::KeyBindingRegistry;
use zatacka_core::player::{PlayerColor, PowerKind};
use zatacka_core::registry::PlayerRegistry;
use zatacka_core::settings::{MatchSettings, SpeedTier, TieBreak};

use crate::config::EngineConfig;
use crate::controller::MatchController;

/// Default location of the match file, relative to the working directory.
pub const DEFAULT_SETUP_PATH: &str = "config/match.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    Io { path: String, message: String },
    Parse(String),
    InvalidKeys { player: String, keys: String },
    NoFreeColor { player: String },
    Binding(BindingError),
    Registry(RegistryError),
    Settings(SettingsError),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "failed to read {path}: {message}"),
            Self::Parse(msg) => write!(f, "invalid match setup: {msg}"),
            Self::InvalidKeys { player, keys } => write!(
                f,
                "player {player} needs exactly 3 keys (left, power, right), got {keys:?}"
            ),
            Self::NoFreeColor { player } => write!(f, "no color left for player {player}"),
            Self::Binding(e) => write!(f, "{e}"),
            Self::Registry(e) => write!(f, "{e}"),
            Self::Settings(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Binding(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Settings(e) => Some(e),
            _ => None,
        }
    }
}

impl SetupError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Binding(e) => e.class(),
            Self::Registry(e) => e.class(),
            Self::Settings(e) => e.class(),
            Self::Io { .. } | Self::Parse(_) | Self::InvalidKeys { .. } | Self::NoFreeColor { .. } => {
                ErrorClass::Validation
            },
        }
    }
}

impl From<BindingError> for SetupError {
    fn from(e: BindingError) -> Self {
        Self::Binding(e)
    }
}

impl From<RegistryError> for SetupError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<SettingsError> for SetupError {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

/// The `[settings]` table. Omitted keys take the match defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSetup {
    /// Defaults to the number of `[[players]]` entries.
    pub num_players: Option<u8>,
    pub num_rounds: Option<u32>,
    pub speed: SpeedTier,
    pub early_stop: bool,
    pub points_to_win: Option<u32>,
    pub tie_break: TieBreak,
}

/// Power as written in the setup file; `random` is resolved at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSetup {
    #[default]
    None,
    HoleMaker,
    WallMaker,
    BorderPhaser,
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSetup {
    pub name: String,
    /// First unused palette color when omitted.
    #[serde(default)]
    pub color: Option<PlayerColor>,
    #[serde(default)]
    pub power: PowerSetup,
    /// Left, power, and right keys, in that order.
    pub keys: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    /// Seed for `random` powers. Drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub settings: SettingsSetup,
    #[serde(default)]
    pub players: Vec<PlayerSetup>,
}

/// Validated pieces of a match, ready for [`MatchController::new`].
#[derive(Debug, Clone)]
pub struct BuiltMatch {
    pub settings: MatchSettings,
    pub players: PlayerRegistry,
    pub bindings: KeyBindingRegistry,
}

impl MatchSetup {
    pub fn from_toml_str(contents: &str) -> Result<Self, SetupError> {
        toml::from_str(contents).map_err(|e| SetupError::Parse(e.to_string()))
    }

    pub fn from_path(path: &str) -> Result<Self, SetupError> {
        let contents = std::fs::read_to_string(path).map_err(|e| SetupError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from `ZATACKA_MATCH_CONFIG`, or [`DEFAULT_SETUP_PATH`].
    pub fn load() -> Result<Self, SetupError> {
        let path =
            std::env::var("ZATACKA_MATCH_CONFIG").unwrap_or_else(|_| DEFAULT_SETUP_PATH.to_string());
        tracing::debug!(path, "Loading match setup");
        Self::from_path(&path)
    }

    /// Validate settings, register every player, and bind their keys.
    pub fn build(&self) -> Result<BuiltMatch, SetupError> {
        let mut settings = MatchSettings::new();
        let num_players = match self.settings.num_players {
            Some(n) => n,
            None => u8::try_from(self.players.len()).unwrap_or(u8::MAX),
        };
        settings.set_num_players(num_players)?;
        if let Some(rounds) = self.settings.num_rounds {
            settings.set_num_rounds(rounds)?;
        }
        settings.set_speed_tier(self.settings.speed)?;
        settings.set_early_stop(self.settings.early_stop)?;
        settings.set_points_to_win(self.settings.points_to_win)?;
        settings.set_tie_break(self.settings.tie_break)?;

        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut players = PlayerRegistry::for_settings(&settings);
        let mut bindings = KeyBindingRegistry::new();
        for entry in &self.players {
            let keys = parse_keys(entry)?;
            let color = match entry.color {
                Some(color) => color,
                None => PlayerColor::PALETTE
                    .into_iter()
                    .find(|c| players.iter().all(|p| p.color != *c))
                    .ok_or_else(|| SetupError::NoFreeColor {
                        player: entry.name.clone(),
                    })?,
            };
            let power = match entry.power {
                PowerSetup::None => PowerKind::None,
                PowerSetup::HoleMaker => PowerKind::HoleMaker,
                PowerSetup::WallMaker => PowerKind::WallMaker,
                PowerSetup::BorderPhaser => PowerKind::BorderPhaser,
                PowerSetup::Random => {
                    let power = PowerKind::ACTIVE[rng.random_range(0..PowerKind::ACTIVE.len())];
                    tracing::debug!(player = %entry.name, ?power, seed, "Drew random power");
                    power
                },
            };
            let id = players.register(entry.name.clone(), color, power)?;
            bindings.bind_player(id, keys)?;
        }

        Ok(BuiltMatch {
            settings,
            players,
            bindings,
        })
    }

    /// Build the match and hand it to a controller. Without its own seed the
    /// engine times gaps from the setup seed.
    pub fn into_controller(self, mut config: EngineConfig) -> Result<MatchController, SetupError> {
        config.seed = config.seed.or(self.seed);
        let built = self.build()?;
        Ok(MatchController::new(
            built.settings,
            built.players,
            built.bindings,
            config,
        )?)
    }
}

fn parse_keys(entry: &PlayerSetup) -> Result<[char; 3], SetupError> {
    let chars: Vec<char> = entry.keys.chars().collect();
    <[char; 3]>::try_from(chars).map_err(|_| SetupError::InvalidKeys {
        player: entry.name.clone(),
        keys: entry.keys.clone(),
    })
}
