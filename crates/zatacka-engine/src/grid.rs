use serde::{Deserialize, Serialize};

use zatacka_core::player::PlayerId;
use zatacka_core::render::GridPos;

/// Occupancy of a single field cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Trail(PlayerId),
    Wall,
    /// Cell a cycle crossed without laying trail. Passable.
    Hole(PlayerId),
}

/// Row-major occupancy grid for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Occupancy at `pos`, or `None` off the field.
    pub fn get(&self, pos: GridPos) -> Option<Cell> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Set a cell. Off-field writes are ignored.
    pub fn set(&mut self, pos: GridPos, cell: Cell) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = cell;
        }
    }

    /// Wrap an off-field position onto the opposite edge.
    pub fn wrap(&self, pos: GridPos) -> GridPos {
        GridPos::new(
            pos.x.rem_euclid(self.width.max(1) as i32),
            pos.y.rem_euclid(self.height.max(1) as i32),
        )
    }

    /// Every non-empty cell with its occupancy.
    pub fn occupied(&self) -> impl Iterator<Item = (GridPos, Cell)> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != Cell::Empty)
            .map(move |(i, c)| (GridPos::new((i % width) as i32, (i / width) as i32), *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_field_reads_none() {
        let grid = Grid::new(16, 16);
        assert_eq!(grid.get(GridPos::new(-1, 0)), None);
        assert_eq!(grid.get(GridPos::new(16, 3)), None);
        assert_eq!(grid.get(GridPos::new(15, 15)), Some(Cell::Empty));
    }

    #[test]
    fn set_and_list_occupied() {
        let mut grid = Grid::new(16, 16);
        grid.set(GridPos::new(3, 4), Cell::Trail(1));
        grid.set(GridPos::new(0, 0), Cell::Wall);
        grid.set(GridPos::new(99, 0), Cell::Wall);
        let occupied: Vec<_> = grid.occupied().collect();
        assert_eq!(
            occupied,
            vec![
                (GridPos::new(0, 0), Cell::Wall),
                (GridPos::new(3, 4), Cell::Trail(1))
            ]
        );
    }

    #[test]
    fn wrap_crosses_edges() {
        let grid = Grid::new(16, 20);
        assert_eq!(grid.wrap(GridPos::new(-1, 5)), GridPos::new(15, 5));
        assert_eq!(grid.wrap(GridPos::new(16, 20)), GridPos::new(0, 0));
        assert_eq!(grid.wrap(GridPos::new(4, -1)), GridPos::new(4, 19));
    }

    #[test]
    fn wrap_on_empty_grid_does_not_panic() {
        let grid = Grid::new(0, 0);
        assert_eq!(grid.wrap(GridPos::new(-1, 3)), GridPos::new(0, 0));
    }
}
