use serde::{Deserialize, Serialize};

/// Integer cell coordinate on the play field. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Packed color used for wall-maker barriers.
pub const WALL_COLOR: u32 = 0x808080;

/// Display collaborator. The engine reports cell occupancy changes and nothing else.
pub trait Renderer {
    /// A cell became occupied (or a cycle head moved onto it).
    fn mark(&mut self, pos: GridPos, color: u32);
    /// A cell's occupancy was removed.
    fn clear(&mut self, pos: GridPos);
}

/// Renderer that discards every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn mark(&mut self, _pos: GridPos, _color: u32) {}

    fn clear(&mut self, _pos: GridPos) {}
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn mark(&mut self, pos: GridPos, color: u32) {
        (**self).mark(pos, color);
    }

    fn clear(&mut self, pos: GridPos) {
        (**self).clear(pos);
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn mark(&mut self, pos: GridPos, color: u32) {
        (**self).mark(pos, color);
    }

    fn clear(&mut self, pos: GridPos) {
        (**self).clear(pos);
    }
}
