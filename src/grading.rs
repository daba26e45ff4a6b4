//! Answer verification
//!
//! Splits a raw submission into per-question queries, executes each against
//! the live database and compares the rows to the staff reference answers.

mod engine;
mod reference;
mod splitter;

pub use engine::{
    GradingEngine, GradingOutcome, GradingResult, Verdict, VerdictStatus, MAX_ATTEMPTS,
};
pub use reference::reference_table;
pub use splitter::split_submission;
