use super::Position;
use crate::color::HexColor;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Compass direction from this agent's cell to a neighbor's cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum Direction {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl Direction {
    /// World-grid offset of the neighbor in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::N => (0, -1),
            Self::S => (0, 1),
            Self::E => (1, 0),
            Self::W => (-1, 0),
            Self::NE => (1, -1),
            Self::NW => (-1, -1),
            Self::SE => (1, 1),
            Self::SW => (-1, 1),
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        Self::iter().find(|d| d.delta() == (dx, dy))
    }

    pub fn neighbor_of(self, origin: Position) -> Position {
        let (dx, dy) = self.delta();
        origin.offset(dx, dy)
    }

    pub fn is_cardinal(self) -> bool {
        matches!(self, Self::N | Self::S | Self::E | Self::W)
    }
}

/// One confirmed pixel change observed on a neighbor's sub-grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PixelDelta {
    pub x: i32,
    pub y: i32,
    pub color: HexColor,
    pub at: DateTime<Utc>,
}

/// Read-only summary of one adjacent agent, rebuilt each iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborSnapshot {
    pub user_id: String,
    pub direction: Direction,
    pub position: Position,
    pub pixel_count: usize,
    /// Most recent first, bounded by the world view's ring buffer.
    pub recent: Vec<PixelDelta>,
    pub last_strategy: Option<String>,
    /// Share of the shared edge (0.0–1.0) where both sides hold the same color.
    pub border_similarity: f64,
    /// Share of the neighbor's colors that this agent also uses (0.0–1.0).
    pub echo_ratio: f64,
    /// Distinct colors along the neighbor's edge facing this agent.
    pub border_palette: Vec<HexColor>,
}

/// One-line pixel count per direction, e.g. `N:12 S:0 E:3 ...`.
/// Directions without a neighbor read as zero.
pub fn density_hint(neighbors: &[NeighborSnapshot]) -> String {
    let mut out = String::from("Neighbors density");
    for direction in Direction::iter() {
        let count = neighbors
            .iter()
            .find(|n| n.direction == direction)
            .map_or(0, |n| n.pixel_count);
        let _ = write!(out, " {direction}:{count}");
    }
    out
}
