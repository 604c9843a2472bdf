use serde::{Deserialize, Serialize};

/// Unique identifier for a player within a match, assigned in registration order.
pub type PlayerId = u8;

/// A registered player. Owned by the [`PlayerRegistry`](crate::registry::PlayerRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub power: PowerKind,
    pub alive: bool,
    /// Left the match. Never revived by later rounds.
    pub forfeited: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, color: PlayerColor, power: PowerKind) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            power,
            alive: true,
            forfeited: false,
        }
    }
}

/// Trail color selection. Each color may be held by at most one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Red,
    Green,
    Blue,
    Magenta,
    Yellow,
    White,
    Orange,
    Cyan,
}

impl PlayerColor {
    /// All selectable colors, in lobby order.
    pub const PALETTE: [PlayerColor; 8] = [
        PlayerColor::Red,
        PlayerColor::Green,
        PlayerColor::Blue,
        PlayerColor::Magenta,
        PlayerColor::Yellow,
        PlayerColor::White,
        PlayerColor::Orange,
        PlayerColor::Cyan,
    ];

    /// Packed `0xRRGGBB` code handed to the renderer.
    pub fn code(self) -> u32 {
        match self {
            Self::Red => 0xFF0000,
            Self::Green => 0x00FF00,
            Self::Blue => 0x0066FF,
            Self::Magenta => 0xFF00FF,
            Self::Yellow => 0xFFFF00,
            Self::White => 0xFFFFFF,
            Self::Orange => 0xFF8800,
            Self::Cyan => 0x00FFFF,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Green => "Green",
            Self::Blue => "Blue",
            Self::Magenta => "Magenta",
            Self::Yellow => "Yellow",
            Self::White => "White",
            Self::Orange => "Orange",
            Self::Cyan => "Cyan",
        }
    }
}

impl std::fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Special ability a player can trigger with their power key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerKind {
    #[default]
    None,
    /// Stop leaving a trail for a few ticks.
    HoleMaker,
    /// Lay a barrier that outlives the round.
    WallMaker,
    /// Wrap around the field edges instead of crashing into them.
    BorderPhaser,
}

impl PowerKind {
    /// Powers a player can actually activate.
    pub const ACTIVE: [PowerKind; 3] = [
        PowerKind::HoleMaker,
        PowerKind::WallMaker,
        PowerKind::BorderPhaser,
    ];
}
