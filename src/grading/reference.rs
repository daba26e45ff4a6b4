//! Reference answer table naming

use crate::state_machine::state::{Exercise, Track};

/// Name of the staff-loaded reference table holding the expected rows for
/// one question. Tracks see different data, so each track has its own set.
///
/// `exercise` and `track` come from closed enums and `question` from the
/// splitter's positional numbering, so the identifier cannot carry anything
/// student-controlled.
pub fn reference_table(exercise: Exercise, question: usize, track: Track) -> String {
    format!("hw{exercise}_q{question}_{track}_reference")
}
