//! Events that drive a session

use crate::grading::GradingOutcome;
use crate::state_machine::state::{Exercise, Profile};

/// Events that trigger state transitions.
///
/// The first group arrives from the transport; the rest are produced by the
/// session runtime when an effect that consulted a collaborator finishes.
#[derive(Debug, Clone)]
pub enum Event {
    // Inbound from the student
    Start,
    Text { text: String },
    File { name: String, content: String },
    /// Escape hatch back to the main menu, honored from every state.
    BackToMenu,

    // Collaborator results, fed back by the effect executor
    LookupFinished { student_id: String, found: bool },
    AuthFinished { profile: Option<Profile> },
    EmailFetched { current: Option<String> },
    QuotaChecked { exercise: Exercise, used: u32 },
    GradingFinished { outcome: GradingOutcome },
    PasswordSaved { ok: bool },
    EmailSaved { ok: bool, email: String },
}
