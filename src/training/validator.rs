use super::exercises::{ExerciseSpec, Rule, Zone};
use crate::canvas::PixelCommand;
use crate::color::HexColor;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Whether `commands` satisfy the exercise. Order never matters.
pub fn validate(spec: &ExerciseSpec, commands: &[PixelCommand]) -> bool {
    check(spec, commands).is_accepted()
}

/// Like [`validate`], with the first violated constraint spelled out.
pub fn check(spec: &ExerciseSpec, commands: &[PixelCommand]) -> Verdict {
    let result = match spec.rule {
        Rule::ExactSet(expected) => exact_set(expected, commands),
        Rule::Coordinates { coords, forbidden } => coordinates(coords, forbidden, commands),
        Rule::Zones {
            count,
            zones,
            forbidden,
            min_per_zone,
        } => zoned(count, zones, forbidden, min_per_zone, commands),
        Rule::Open => Ok(()),
    };
    match result {
        Ok(()) => Verdict::Accepted,
        Err(reason) => Verdict::Rejected(reason),
    }
}

fn exact_set(expected: &[(i32, i32, HexColor)], commands: &[PixelCommand]) -> Result<(), String> {
    if commands.len() != expected.len() {
        return Err(format!(
            "expected {} pixels, got {}",
            expected.len(),
            commands.len()
        ));
    }
    let given: HashSet<(i32, i32, HexColor)> =
        commands.iter().map(|c| (c.x, c.y, c.color)).collect();
    for &(x, y, color) in expected {
        if !given.contains(&(x, y, color)) {
            return Err(format!("missing {x},{y}{color}"));
        }
    }
    Ok(())
}

fn unique_and_allowed(commands: &[PixelCommand], forbidden: &[HexColor]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for cmd in commands {
        if !seen.insert(cmd.coord()) {
            return Err(format!("duplicate coordinate {},{}", cmd.x, cmd.y));
        }
        if forbidden.contains(&cmd.color) {
            return Err(format!("forbidden color {} at {},{}", cmd.color, cmd.x, cmd.y));
        }
    }
    Ok(())
}

fn coordinates(
    coords: &[(i32, i32)],
    forbidden: &[HexColor],
    commands: &[PixelCommand],
) -> Result<(), String> {
    if commands.len() != coords.len() {
        return Err(format!(
            "expected {} pixels, got {}",
            coords.len(),
            commands.len()
        ));
    }
    unique_and_allowed(commands, forbidden)?;
    if let Some(stray) = commands.iter().find(|c| !coords.contains(&c.coord())) {
        return Err(format!("unexpected coordinate {},{}", stray.x, stray.y));
    }
    Ok(())
}

fn zoned(
    count: usize,
    zones: &[Zone],
    forbidden: &[HexColor],
    min_per_zone: usize,
    commands: &[PixelCommand],
) -> Result<(), String> {
    if commands.len() != count {
        return Err(format!("expected {count} pixels, got {}", commands.len()));
    }
    unique_and_allowed(commands, forbidden)?;
    let mut per_zone = vec![0usize; zones.len()];
    for cmd in commands {
        let Some(index) = zones.iter().position(|z| z.contains(cmd)) else {
            return Err(format!("{},{} lies outside every allowed zone", cmd.x, cmd.y));
        };
        per_zone[index] += 1;
    }
    for (zone, hits) in zones.iter().zip(per_zone) {
        if hits < min_per_zone {
            return Err(format!(
                "zone {} has {hits} pixels, needs {min_per_zone}",
                zone.name
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::exercises::{CENTER_COLOR, CORNER_COLOR, exercise};

    fn a1_batch() -> Vec<PixelCommand> {
        [(0, 0), (19, 19), (0, 19), (19, 0)]
            .into_iter()
            .map(|(x, y)| PixelCommand::new(x, y, CORNER_COLOR))
            .chain(
                [(9, 9), (10, 10), (10, 9), (9, 10)]
                    .into_iter()
                    .map(|(x, y)| PixelCommand::new(x, y, CENTER_COLOR)),
            )
            .collect()
    }

    fn spec(id: &str) -> &'static ExerciseSpec {
        exercise(id).unwrap()
    }

    #[test]
    fn a1_accepts_exact_set_in_any_order() {
        let mut batch = a1_batch();
        assert!(validate(spec("A1"), &batch));
        batch.reverse();
        assert!(validate(spec("A1"), &batch));
    }

    #[test]
    fn a1_rejects_missing_extra_and_recolored() {
        let mut missing = a1_batch();
        missing.pop();
        assert!(!validate(spec("A1"), &missing));

        let mut extra = a1_batch();
        extra.push(PixelCommand::new(5, 5, CORNER_COLOR));
        assert!(!validate(spec("A1"), &extra));

        let mut recolored = a1_batch();
        recolored[0].color = CENTER_COLOR;
        assert!(!validate(spec("A1"), &recolored));
    }

    #[test]
    fn a2_needs_the_anchor_coordinates_with_any_non_black_color() {
        let palette = [
            HexColor::from_rgb(10, 20, 30),
            HexColor::from_rgb(200, 100, 50),
        ];
        let mut batch: Vec<PixelCommand> = a1_batch()
            .into_iter()
            .enumerate()
            .map(|(i, c)| PixelCommand::new(c.x, c.y, palette[i % 2]))
            .collect();
        assert!(validate(spec("A2"), &batch));

        batch[3].color = HexColor::BLACK;
        assert!(matches!(check(spec("A2"), &batch), Verdict::Rejected(r) if r.contains("forbidden")));
    }

    #[test]
    fn a2_rejects_duplicates_and_strays() {
        let mut dup = a1_batch();
        dup[1] = dup[0];
        assert!(!validate(spec("A2"), &dup));

        let mut stray = a1_batch();
        stray[0].x = 1;
        assert!(!validate(spec("A2"), &stray));
    }

    #[test]
    fn a3_requires_both_zones() {
        let color = HexColor::from_rgb(90, 200, 90);
        let corners_only: Vec<PixelCommand> = [(0, 0), (1, 1), (18, 18), (19, 19), (0, 18), (1, 19), (18, 0), (19, 1)]
            .into_iter()
            .map(|(x, y)| PixelCommand::new(x, y, color))
            .collect();
        assert!(matches!(check(spec("A3"), &corners_only), Verdict::Rejected(r) if r.contains("center")));

        let mut mixed = corners_only;
        mixed[7] = PixelCommand::new(10, 9, color);
        assert!(validate(spec("A3"), &mixed));
    }

    #[test]
    fn a3_rejects_out_of_zone_pixels() {
        let color = HexColor::from_rgb(90, 200, 90);
        let mut batch: Vec<PixelCommand> = [(0, 0), (1, 1), (18, 18), (19, 19), (9, 9), (10, 10), (9, 10), (10, 9)]
            .into_iter()
            .map(|(x, y)| PixelCommand::new(x, y, color))
            .collect();
        assert!(validate(spec("A3"), &batch));
        batch[0] = PixelCommand::new(5, 5, color);
        assert!(!validate(spec("A3"), &batch));
    }

    #[test]
    fn open_exercises_accept_anything() {
        assert!(validate(spec("D14"), &[]));
        assert!(validate(spec("B6"), &a1_batch()));
    }
}
