//! Effects produced by state transitions

use crate::state_machine::state::{Exercise, Menu, Profile};

/// Effects to be executed by the session runtime after a transition.
///
/// Effects that consult a collaborator (identity store, quota ledger,
/// grading engine) generate a follow-up [`crate::state_machine::Event`]
/// which re-enters the transition loop before the next inbound message is
/// read.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver a message (with an optional reply menu) to the student.
    SendText { text: String, menu: Option<Menu> },

    /// Look up a student id in the identity store.
    LookupStudent { student_id: String },

    /// Validate (student id, password) against the identity store.
    Authenticate { student_id: String, password: String },

    /// Fetch the currently registered notification email.
    FetchEmail { student_id: String },

    /// Ask the quota ledger how many attempts this pair has used.
    CheckQuota { student_id: String, exercise: Exercise },

    /// Hand a raw submission to the verification engine.
    Grade {
        profile: Profile,
        exercise: Exercise,
        submission: String,
    },

    /// Store a replacement password.
    SavePassword { student_id: String, password: String },

    /// Store a notification email.
    SaveEmail { student_id: String, email: String },
}

impl Effect {
    pub fn send(text: impl Into<String>) -> Self {
        Effect::SendText {
            text: text.into(),
            menu: None,
        }
    }

    pub fn send_with_menu(text: impl Into<String>, menu: Menu) -> Self {
        Effect::SendText {
            text: text.into(),
            menu: Some(menu),
        }
    }
}
