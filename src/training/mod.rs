//! Training mode: a fixed programme of drawing exercises, some of which
//! carry structural rules that a parsed batch must satisfy before it is
//! painted.

pub mod exercises;
pub mod validator;

pub use exercises::{
    CENTER_COLOR, CORNER_COLOR, ExerciseSpec, Rule, Zone, all, exercise, exercise_ids, next_exercise,
};
pub use validator::{Verdict, check, validate};
