use zatacka_core::input::TurnIntent;
use zatacka_core::render::GridPos;

use crate::arena::Heading;
use crate::grid::Grid;

/// Heading after applying the tick's turn, if any.
pub fn apply_turn(heading: Heading, turn: Option<TurnIntent>) -> Heading {
    match turn {
        Some(intent) => heading.turn(intent),
        None => heading,
    }
}

/// Cell reached after one movement unit along `heading`.
///
/// Leaving the field wraps to the opposite edge while `phasing`; otherwise the
/// move has no destination and the cycle crashes into the border.
pub fn advance(grid: &Grid, pos: GridPos, heading: Heading, phasing: bool) -> Option<GridPos> {
    let (dx, dy) = heading.delta();
    let next = GridPos::new(pos.x + dx, pos.y + dy);
    if grid.contains(next) {
        Some(next)
    } else if phasing {
        Some(grid.wrap(next))
    } else {
        None
    }
}
