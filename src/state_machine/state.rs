//! Session state types

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Closed enumerations - the only values allowed to reach reference-table
// identifier construction
// ============================================================================

/// Student program, selecting between the parallel reference datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    ComputerScience,
    Statistics,
}

impl Track {
    /// Short tag used in reference-table names and stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Track::ComputerScience => "cs",
            Track::Statistics => "stat",
        }
    }

    /// Human-readable program name for prompts.
    pub fn label(self) -> &'static str {
        match self {
            Track::ComputerScience => "Computer Science",
            Track::Statistics => "Statistics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cs" => Some(Track::ComputerScience),
            "stat" => Some(Track::Statistics),
            _ => None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Homework assignment identifier. The course runs exercises 3 through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exercise {
    Three,
    Four,
    Five,
    Six,
}

impl Exercise {
    pub const ALL: [Exercise; 4] = [
        Exercise::Three,
        Exercise::Four,
        Exercise::Five,
        Exercise::Six,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Exercise::Three => "3",
            Exercise::Four => "4",
            Exercise::Five => "5",
            Exercise::Six => "6",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "3" => Some(Exercise::Three),
            "4" => Some(Exercise::Four),
            "5" => Some(Exercise::Five),
            "6" => Some(Exercise::Six),
            _ => None,
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Identified student, attached to a session once authentication succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub student_id: String,
    pub display_name: String,
    pub track: Track,
}

// ============================================================================
// Menus
// ============================================================================

/// Menu labels. Menu clicks arrive as plain text, so the transition function
/// matches inbound text against these exact strings.
pub mod menu {
    pub const NEW_EXERCISE: &str = "New exercise";
    pub const END: &str = "End";
    pub const CHANGE_PASSWORD: &str = "Change password";
    pub const SET_EMAIL: &str = "Set notification email";
    pub const BACK: &str = "Back to main menu";
}

/// Reply menu attached to an outbound message. Rendering is the client's
/// problem; the core only names the rows of options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    Exercises,
    BackOnly,
}

impl Menu {
    /// Option labels, one inner vec per keyboard row.
    pub fn rows(self) -> Vec<Vec<String>> {
        let rows: &[&[&str]] = match self {
            Menu::Main => &[
                &[menu::NEW_EXERCISE],
                &[menu::CHANGE_PASSWORD, menu::SET_EMAIL],
                &[menu::END],
            ],
            Menu::Exercises => &[&["3", "4"], &["5", "6"], &[menu::BACK]],
            Menu::BackOnly => &[&[menu::BACK]],
        };
        rows.iter()
            .map(|row| row.iter().map(|s| (*s).to_string()).collect())
            .collect()
    }
}

// ============================================================================
// Session state
// ============================================================================

/// Conversation state for one identity.
///
/// Each variant carries only the data that state needs; identification
/// states hold no exercise, and nothing pre-auth holds a profile. The whole
/// thing is soft state: it lives in the session task's memory and is lost on
/// restart.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// No conversation in progress; only `/start` does anything.
    #[default]
    Idle,

    /// Waiting for the student to send their student id.
    AwaitingStudentId,

    /// Student id found; waiting for the matching password.
    AwaitingPassword { student_id: String },

    /// Authenticated; waiting for an exercise choice.
    SelectingExercise { profile: Profile },

    /// Exercise chosen and quota cleared; waiting for SQL text or a .sql file.
    AwaitingSubmission { profile: Profile, exercise: Exercise },

    /// Waiting for a replacement password.
    AwaitingNewPassword { profile: Profile },

    /// Waiting for a notification email address.
    AwaitingNewEmail { profile: Profile },

    /// At the main menu after a finished flow.
    Completed { profile: Profile },
}

impl SessionState {
    /// Short tag for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingStudentId => "awaiting_student_id",
            SessionState::AwaitingPassword { .. } => "awaiting_password",
            SessionState::SelectingExercise { .. } => "selecting_exercise",
            SessionState::AwaitingSubmission { .. } => "awaiting_submission",
            SessionState::AwaitingNewPassword { .. } => "awaiting_new_password",
            SessionState::AwaitingNewEmail { .. } => "awaiting_new_email",
            SessionState::Completed { .. } => "completed",
        }
    }

    /// The profile attached to this state, if identification has completed.
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::SelectingExercise { profile }
            | SessionState::AwaitingSubmission { profile, .. }
            | SessionState::AwaitingNewPassword { profile }
            | SessionState::AwaitingNewEmail { profile }
            | SessionState::Completed { profile } => Some(profile),
            SessionState::Idle
            | SessionState::AwaitingStudentId
            | SessionState::AwaitingPassword { .. } => None,
        }
    }
}
