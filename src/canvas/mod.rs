//! Grid-level data model shared by the parser, post-processor, dispatcher
//! and prompt renderer.

pub mod neighbor;
pub mod state;

pub use neighbor::{Direction, NeighborSnapshot, PixelDelta, density_hint};
pub use state::LocalCanvasState;

use crate::color::HexColor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cells per side of one agent's sub-grid.
pub const GRID_SIZE: i32 = 20;
/// Largest valid coordinate on either axis.
pub const MAX_COORD: i32 = GRID_SIZE - 1;
/// Upper bound on commands accepted from a single reply.
pub const MAX_BATCH: usize = 400;

pub fn in_bounds(x: i32, y: i32) -> bool {
    (0..GRID_SIZE).contains(&x) && (0..GRID_SIZE).contains(&y)
}

/// Set one cell of the agent's sub-grid to one color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCommand {
    pub x: i32,
    pub y: i32,
    pub color: HexColor,
}

impl PixelCommand {
    pub fn new(x: i32, y: i32, color: HexColor) -> Self {
        Self { x, y, color }
    }

    pub fn coord(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0, MAX_COORD),
            y: self.y.clamp(0, MAX_COORD),
            color: self.color,
        }
    }
}

impl fmt::Display for PixelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}{}", self.x, self.y, self.color)
    }
}

/// An agent's cell in the shared world, relative to the world origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Where this cell sits relative to the world origin.
    pub fn compass_name(self) -> &'static str {
        match (self.x.signum(), self.y.signum()) {
            (0, 0) => "CENTER",
            (0, 1) => "SOUTH",
            (0, _) => "NORTH",
            (1, 0) => "EAST",
            (_, 0) => "WEST",
            (1, 1) => "SOUTHEAST",
            (1, _) => "NORTHEAST",
            (_, 1) => "SOUTHWEST",
            _ => "NORTHWEST",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive_of_nineteen() {
        assert!(in_bounds(0, 0));
        assert!(in_bounds(19, 19));
        assert!(!in_bounds(20, 0));
        assert!(!in_bounds(0, -1));
    }

    #[test]
    fn clamp_pulls_into_grid() {
        let cmd = PixelCommand::new(-3, 42, HexColor::BLACK).clamped();
        assert_eq!(cmd.coord(), (0, 19));
    }

    #[test]
    fn compass_names_cover_all_octants() {
        let cases = [
            ((0, 0), "CENTER"),
            ((0, -2), "NORTH"),
            ((0, 3), "SOUTH"),
            ((4, 0), "EAST"),
            ((-1, 0), "WEST"),
            ((1, -1), "NORTHEAST"),
            ((-1, -1), "NORTHWEST"),
            ((2, 5), "SOUTHEAST"),
            ((-2, 5), "SOUTHWEST"),
        ];
        for ((x, y), name) in cases {
            assert_eq!(Position::new(x, y).compass_name(), name, "({x},{y})");
        }
    }

    #[test]
    fn command_display_is_compact_token() {
        let cmd = PixelCommand::new(3, 4, HexColor::from_rgb(255, 0, 0));
        assert_eq!(cmd.to_string(), "3,4#ff0000");
    }
}
