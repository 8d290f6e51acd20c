use crate::canvas::PixelCommand;
use crate::color::HexColor;

pub const CORNER_COLOR: HexColor = HexColor::from_rgb(0xff, 0x57, 0x33);
pub const CENTER_COLOR: HexColor = HexColor::from_rgb(0x2e, 0xcc, 0x71);

const FORBID_BLACK: &[HexColor] = &[HexColor::BLACK];

const ANCHORS: &[(i32, i32)] = &[
    (0, 0),
    (19, 19),
    (0, 19),
    (19, 0),
    (9, 9),
    (10, 10),
    (10, 9),
    (9, 10),
];

const ANCHOR_COLORS: &[(i32, i32, HexColor)] = &[
    (0, 0, CORNER_COLOR),
    (19, 19, CORNER_COLOR),
    (0, 19, CORNER_COLOR),
    (19, 0, CORNER_COLOR),
    (9, 9, CENTER_COLOR),
    (10, 10, CENTER_COLOR),
    (10, 9, CENTER_COLOR),
    (9, 10, CENTER_COLOR),
];

/// A rectangular-ish region given as allowed x and y values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub name: &'static str,
    pub xs: &'static [i32],
    pub ys: &'static [i32],
}

impl Zone {
    pub fn contains(&self, cmd: &PixelCommand) -> bool {
        self.xs.contains(&cmd.x) && self.ys.contains(&cmd.y)
    }
}

const CORNER_AND_CENTER: &[Zone] = &[
    Zone {
        name: "corner",
        xs: &[0, 1, 18, 19],
        ys: &[0, 1, 18, 19],
    },
    Zone {
        name: "center",
        xs: &[9, 10],
        ys: &[9, 10],
    },
];

/// Structural constraint a batch must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The batch must be exactly this coordinate→color set.
    ExactSet(&'static [(i32, i32, HexColor)]),
    /// The batch must cover exactly these coordinates once each, with any
    /// allowed color.
    Coordinates {
        coords: &'static [(i32, i32)],
        forbidden: &'static [HexColor],
    },
    /// `count` commands, each inside one of `zones`, unique coordinates,
    /// no forbidden color, and at least `min_per_zone` in every zone.
    Zones {
        count: usize,
        zones: &'static [Zone],
        forbidden: &'static [HexColor],
        min_per_zone: usize,
    },
    /// Prompt-only exercise; any batch is accepted.
    Open,
}

/// One entry of the training programme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseSpec {
    pub id: &'static str,
    /// Built-in instruction, used when the fragment library has none.
    pub prompt: &'static str,
    pub rule: Rule,
    /// Move on to the next exercise automatically after an accepted batch.
    pub auto_advance: bool,
}

static EXERCISES: [ExerciseSpec; 14] = [
    ExerciseSpec {
        id: "A1",
        prompt: "TRAINING (A1): Place EXACTLY these pairs (corners={{colorCoins}}, center={{colorCenter}}).\n\
                 Your FIRST AND ONLY line MUST be exactly this, no other pixels, no prose before or after:\n\
                 pixels: 0,0:{{colorCoins}} 19,19:{{colorCoins}} 0,19:{{colorCoins}} 19,0:{{colorCoins}} \
                 9,9:{{colorCenter}} 10,10:{{colorCenter}} 10,9:{{colorCenter}} 9,10:{{colorCenter}}",
        rule: Rule::ExactSet(ANCHOR_COLORS),
        auto_advance: true,
    },
    ExerciseSpec {
        id: "A2",
        prompt: "TRAINING (A2): Place 4 pixels in the corners and 4 in the center (free colors, no #000000). \
                 Required pairs: 0,0 19,19 0,19 19,0 9,9 10,10 10,9 9,10. Format: pixels: x,y:#HEX ...",
        rule: Rule::Coordinates {
            coords: ANCHORS,
            forbidden: FORBID_BLACK,
        },
        auto_advance: true,
    },
    ExerciseSpec {
        id: "A3",
        prompt: "TRAINING (A3): Corners and center, free x,y, free colors. Constraints: corners use \
                 x,y in {0,1,18,19}, center uses x,y in {9,10}. Forbidden: #000/#000000, duplicates.",
        rule: Rule::Zones {
            count: 8,
            zones: CORNER_AND_CENTER,
            forbidden: FORBID_BLACK,
            min_per_zone: 1,
        },
        auto_advance: true,
    },
    ExerciseSpec {
        id: "A4",
        prompt: "TRAINING (A4): Two-color checkerboard (20x20). You may subsample (one cell in two). \
                 Format: pixels: x,y:#HEX ...",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "A5",
        prompt: "TRAINING (A5): Complementary checkerboard. Swap the two colors of the previous \
                 checkerboard. Format: pixels: x,y:#HEX ...",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "B6",
        prompt: "TRAINING (B6): Copy the densest cardinal neighbor. {{neighborHint}}. If no neighbor is \
                 significant (>=10px), draw a centered 10x10 motif inspired by the dominant colors.",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "B7",
        prompt: "TRAINING (B7): Copy a cardinal neighbor mirrored vertically (x -> 19-x). \
                 {{neighborHint}}. Same fallbacks as B6.",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "B8",
        prompt: "TRAINING (B8): Copy a diagonal neighbor and rotate it 90 degrees clockwise \
                 ((x,y) -> (y,19-x)). Fallback: the densest cardinal neighbor.",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "C9",
        prompt: "TRAINING (C9): Radial gradient from center to edge between two harmonious colors (6 rings).",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "C10",
        prompt: "TRAINING (C10): Stylized landscape (3 bands + 1 salient element), >=120 pixels, \
                 no pure black at first.",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "C11",
        prompt: "TRAINING (C11): Main features of a face over the landscape (eyes, nose, mouth), \
                 60-150 pixels, no black.",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "D12",
        prompt: "TRAINING (D12): Complete a neighbor (continuity of shapes and colors). \
                 Fallback: reinforce an internal motif (phase C).",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "D13",
        prompt: "TRAINING (D13): Build a visual bridge between two neighbors of your choice, with \
                 continuous hue and even thickness. {{neighborHint}}",
        rule: Rule::Open,
        auto_advance: false,
    },
    ExerciseSpec {
        id: "D14",
        prompt: "TRAINING (D14): Free drawing. Total creativity, no duplicates, no out-of-range \
                 coordinates, density > 50.",
        rule: Rule::Open,
        auto_advance: false,
    },
];

/// Exercise ids in programme order.
pub fn exercise_ids() -> impl Iterator<Item = &'static str> {
    EXERCISES.iter().map(|e| e.id)
}

/// Look up an exercise by id, case-insensitively.
pub fn exercise(id: &str) -> Option<&'static ExerciseSpec> {
    EXERCISES.iter().find(|e| e.id.eq_ignore_ascii_case(id.trim()))
}

/// The exercise after `id`, or `None` at the end of the programme.
pub fn next_exercise(id: &str) -> Option<&'static ExerciseSpec> {
    let index = EXERCISES
        .iter()
        .position(|e| e.id.eq_ignore_ascii_case(id.trim()))?;
    EXERCISES.get(index + 1)
}

pub fn all() -> &'static [ExerciseSpec] {
    &EXERCISES
}
