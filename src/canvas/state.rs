use super::{GRID_SIZE, PixelCommand, in_bounds};
use crate::color::HexColor;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Last color this agent applied to each of its own cells.
///
/// Updated optimistically as commands are dispatched, not on transport
/// acknowledgement. Unpainted cells read as black.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCanvasState {
    cells: HashMap<(i32, i32), HexColor>,
}

impl LocalCanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, x: i32, y: i32) -> Option<HexColor> {
        self.cells.get(&(x, y)).copied()
    }

    /// Record a painted cell. Repeating the same command is a no-op.
    pub fn mark_painted(&mut self, cmd: &PixelCommand) {
        if in_bounds(cmd.x, cmd.y) {
            self.cells.insert(cmd.coord(), cmd.color);
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Cells in row-major order, unpainted ones as black.
    pub fn rows(&self) -> Vec<Vec<HexColor>> {
        (0..GRID_SIZE)
            .map(|y| {
                (0..GRID_SIZE)
                    .map(|x| self.get(x, y).unwrap_or(HexColor::BLACK))
                    .collect()
            })
            .collect()
    }

    /// Distinct colors in use, most frequent first.
    pub fn palette(&self) -> Vec<HexColor> {
        let mut counts: HashMap<HexColor, usize> = HashMap::new();
        for color in self.cells.values() {
            *counts.entry(*color).or_default() += 1;
        }
        let mut colors: Vec<(HexColor, usize)> = counts.into_iter().collect();
        colors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        colors.into_iter().map(|(c, _)| c).collect()
    }

    /// Plain-text dump of the grid: a header of column numbers, then one
    /// line per row listing every cell's color.
    pub fn render_table(&self) -> String {
        let mut out = String::from("y\\x");
        for x in 0..GRID_SIZE {
            let _ = write!(out, " {x:>7}");
        }
        out.push('\n');
        for (y, row) in self.rows().iter().enumerate() {
            let _ = write!(out, "{y:>3}");
            for color in row {
                let _ = write!(out, " {color}");
            }
            out.push('\n');
        }
        out
    }
}
