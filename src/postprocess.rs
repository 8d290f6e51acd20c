//! Turns parsed commands into a batch worth sending: every coordinate on
//! the grid, each cell at most once, no repaint that changes nothing.

use crate::canvas::{LocalCanvasState, MAX_BATCH, PixelCommand};
use crate::parser::dedupe_last_wins;

/// What post-processing removed or changed, for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostReport {
    pub clamped: usize,
    pub duplicates: usize,
    pub unchanged: usize,
    pub truncated: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PostProcessor {
    max_batch: usize,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(MAX_BATCH)
    }
}

impl PostProcessor {
    pub fn new(max_batch: usize) -> Self {
        Self {
            max_batch: max_batch.clamp(1, MAX_BATCH),
        }
    }

    pub fn process(
        &self,
        commands: Vec<PixelCommand>,
        state: &LocalCanvasState,
    ) -> (Vec<PixelCommand>, PostReport) {
        let mut report = PostReport::default();

        let clamped: Vec<PixelCommand> = commands
            .into_iter()
            .map(|cmd| {
                let fixed = cmd.clamped();
                if fixed != cmd {
                    report.clamped += 1;
                }
                fixed
            })
            .collect();

        let before = clamped.len();
        let unique = dedupe_last_wins(clamped);
        report.duplicates = before - unique.len();

        let before = unique.len();
        let mut changed: Vec<PixelCommand> = unique
            .into_iter()
            .filter(|cmd| state.get(cmd.x, cmd.y) != Some(cmd.color))
            .collect();
        report.unchanged = before - changed.len();

        if changed.len() > self.max_batch {
            report.truncated = changed.len() - self.max_batch;
            changed.truncate(self.max_batch);
        }

        if report != PostReport::default() {
            tracing::debug!(
                clamped = report.clamped,
                duplicates = report.duplicates,
                unchanged = report.unchanged,
                truncated = report.truncated,
                kept = changed.len(),
                "batch post-processed"
            );
        }
        (changed, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::in_bounds;
    use crate::color::HexColor;
    use std::collections::HashSet;

    fn cmd(x: i32, y: i32, hex: &str) -> PixelCommand {
        PixelCommand::new(x, y, HexColor::parse(hex).unwrap())
    }

    #[test]
    fn clamps_then_dedupes_with_last_winning() {
        let (out, report) = PostProcessor::default().process(
            vec![cmd(25, 3, "#ff0000"), cmd(19, 3, "#00ff00")],
            &LocalCanvasState::new(),
        );
        assert_eq!(out, vec![cmd(19, 3, "#00ff00")]);
        assert_eq!(report.clamped, 1);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn skips_repaints_of_the_same_color() {
        let mut state = LocalCanvasState::new();
        state.mark_painted(&cmd(1, 1, "#ffffff"));
        let (out, report) = PostProcessor::default()
            .process(vec![cmd(1, 1, "#FFF"), cmd(2, 2, "#fff")], &state);
        assert_eq!(out, vec![cmd(2, 2, "#ffffff")]);
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn caps_batch_size_discarding_tail() {
        let many: Vec<PixelCommand> = (0..20)
            .flat_map(|y| (0..20).map(move |x| cmd(x, y, "#123456")))
            .chain((0..5).map(|x| cmd(x, 0, "#654321")))
            .collect();
        let (out, _) = PostProcessor::new(10).process(many, &LocalCanvasState::new());
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn max_batch_is_bounded_to_grid_capacity() {
        let (out, report) = PostProcessor::new(10_000).process(
            (0..20)
                .flat_map(|y| (0..20).map(move |x| cmd(x, y, "#010101")))
                .collect(),
            &LocalCanvasState::new(),
        );
        assert_eq!(out.len(), 400);
        assert_eq!(report.truncated, 0);
    }

    #[test]
    fn output_is_unique_and_in_bounds_for_messy_input() {
        let messy: Vec<PixelCommand> = (-30..60)
            .map(|i| cmd(i, (i * 7) % 45 - 10, "#abcdef"))
            .collect();
        let (out, _) = PostProcessor::default().process(messy, &LocalCanvasState::new());
        let mut seen = HashSet::new();
        for c in &out {
            assert!(in_bounds(c.x, c.y));
            assert!(seen.insert(c.coord()));
        }
    }
}
