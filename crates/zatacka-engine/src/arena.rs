use serde::{Deserialize, Serialize};

use zatacka_core::input::TurnIntent;
use zatacka_core::render::GridPos;

/// Cardinal heading on the grid. North points towards `y = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    /// Rotate 90 degrees. `Power` leaves the heading untouched.
    pub fn turn(self, intent: TurnIntent) -> Self {
        match (self, intent) {
            (Self::North, TurnIntent::Left) => Self::West,
            (Self::North, TurnIntent::Right) => Self::East,
            (Self::East, TurnIntent::Left) => Self::North,
            (Self::East, TurnIntent::Right) => Self::South,
            (Self::South, TurnIntent::Left) => Self::East,
            (Self::South, TurnIntent::Right) => Self::West,
            (Self::West, TurnIntent::Left) => Self::South,
            (Self::West, TurnIntent::Right) => Self::North,
            (heading, TurnIntent::Power) => heading,
        }
    }

    /// Unit step `(dx, dy)` for one movement unit.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

/// A spawn cell with its starting heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub pos: GridPos,
    pub heading: Heading,
}

/// Spawn cells for `count` players, evenly spaced on a circle inset from the
/// field border, each facing inward. Deterministic for a given field and count.
pub fn spawn_points(width: u32, height: u32, count: usize) -> Vec<SpawnPoint> {
    let short_edge = width.min(height) as f64;
    let margin = (short_edge / 8.0).floor().max(2.0);
    let radius = short_edge / 2.0 - margin;
    let cx = (width / 2) as i32;
    let cy = (height / 2) as i32;

    (0..count)
        .map(|i| {
            let angle = std::f64::consts::TAU * (i as f64) / (count.max(1) as f64);
            let x = cx + (radius * angle.cos()).round() as i32;
            let y = cy + (radius * angle.sin()).round() as i32;

            let dx = cx - x;
            let dy = cy - y;
            let heading = if dx.abs() >= dy.abs() {
                if dx > 0 { Heading::East } else { Heading::West }
            } else if dy > 0 {
                Heading::South
            } else {
                Heading::North
            };

            SpawnPoint {
                pos: GridPos::new(x, y),
                heading,
            }
        })
        .collect()
}
