//! Pure state transition function
//!
//! `transition` is pure: given the same state and event it always produces
//! the same new state and effects, with no I/O. All database and grading
//! work happens in the effects the session runtime executes afterwards.

use super::state::{menu, Exercise, Menu, Profile, SessionState};
use super::{Effect, Event};
use crate::grading::{GradingOutcome, GradingResult, MAX_ATTEMPTS};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::OnceLock;

const MIN_PASSWORD_LEN: usize = 4;

const WELCOME: &str = "Welcome to the database-course homework bot!\n\
How it works:\n\
1. Sign in with your student id and password\n\
2. Pick an exercise (3, 4, 5 or 6)\n\
3. Send your SQL as text or as a .sql file\n\n\
Put a comment line like `# number 1` before each question's query and end \
each query with `;`. Extra whitespace is fine. Every exercise may be \
submitted at most 10 times.";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.+-]+@[\w-]+(\.[\w-]+)+$").unwrap())
}

/// Result of a state transition.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionOutcome {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function.
///
/// Invalid input re-prompts without changing state; there are no fatal
/// transitions. Collaborator-result events arriving in a state that is not
/// expecting them are dropped.
pub fn transition(state: &SessionState, event: Event) -> TransitionOutcome {
    // /start restarts identification from anywhere.
    if matches!(event, Event::Start) {
        return TransitionOutcome::new(SessionState::AwaitingStudentId)
            .with_effect(Effect::send(WELCOME))
            .with_effect(Effect::send("Please enter your student id:"));
    }

    // The escape hatch comes before any state-specific handling. Menu
    // clicks arrive as plain text, so the Back label is a signal too.
    match &event {
        Event::BackToMenu => return back_to_menu(state),
        Event::Text { text } if text.trim() == menu::BACK => return back_to_menu(state),
        _ => {}
    }

    match (state, event) {
        (SessionState::Idle, Event::Text { .. } | Event::File { .. }) => {
            TransitionOutcome::new(SessionState::Idle)
                .with_effect(Effect::send("Send /start to begin."))
        }

        // ------------------------------------------------------------
        // Identification
        // ------------------------------------------------------------
        (SessionState::AwaitingStudentId, Event::Text { text }) => {
            TransitionOutcome::new(SessionState::AwaitingStudentId).with_effect(
                Effect::LookupStudent {
                    student_id: text.trim().to_string(),
                },
            )
        }

        (SessionState::AwaitingStudentId, Event::LookupFinished { student_id, found }) => {
            if found {
                TransitionOutcome::new(SessionState::AwaitingPassword { student_id })
                    .with_effect(Effect::send("Please enter your password:"))
            } else {
                TransitionOutcome::new(SessionState::AwaitingStudentId)
                    .with_effect(Effect::send("Student id not found. Enter it again:"))
            }
        }

        (SessionState::AwaitingPassword { student_id }, Event::Text { text }) => {
            TransitionOutcome::new(SessionState::AwaitingPassword {
                student_id: student_id.clone(),
            })
            .with_effect(Effect::Authenticate {
                student_id: student_id.clone(),
                password: text.trim().to_string(),
            })
        }

        (SessionState::AwaitingPassword { .. }, Event::AuthFinished { profile: Some(p) }) => {
            let greeting = format!(
                "Signed in as {} ({}). Pick an exercise:",
                p.display_name,
                p.track.label()
            );
            TransitionOutcome::new(SessionState::SelectingExercise { profile: p })
                .with_effect(Effect::send_with_menu(greeting, Menu::Exercises))
        }

        (state @ SessionState::AwaitingPassword { .. }, Event::AuthFinished { profile: None }) => {
            TransitionOutcome::new(state.clone())
                .with_effect(Effect::send("Wrong password. Try again:"))
        }

        // ------------------------------------------------------------
        // Exercise selection
        // ------------------------------------------------------------
        (SessionState::SelectingExercise { profile }, Event::Text { text }) => {
            match Exercise::parse(text.trim()) {
                Some(exercise) => TransitionOutcome::new(SessionState::SelectingExercise {
                    profile: profile.clone(),
                })
                .with_effect(Effect::CheckQuota {
                    student_id: profile.student_id.clone(),
                    exercise,
                }),
                None => TransitionOutcome::new(SessionState::SelectingExercise {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send_with_menu(
                    "Pick a valid exercise number.",
                    Menu::Exercises,
                )),
            }
        }

        (SessionState::SelectingExercise { profile }, Event::QuotaChecked { exercise, used }) => {
            if used >= MAX_ATTEMPTS {
                let text = format!(
                    "You have already submitted exercise {exercise} {MAX_ATTEMPTS} times \
                     and may not submit it again. Pick another exercise:"
                );
                TransitionOutcome::new(SessionState::SelectingExercise {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send_with_menu(text, Menu::Exercises))
            } else {
                let remaining = MAX_ATTEMPTS - used;
                let text = format!(
                    "Exercise {exercise} selected. Submissions remaining: {remaining}.\n\
                     Send your SQL as text or as a .sql file:"
                );
                TransitionOutcome::new(SessionState::AwaitingSubmission {
                    profile: profile.clone(),
                    exercise,
                })
                .with_effect(Effect::send_with_menu(text, Menu::BackOnly))
            }
        }

        // ------------------------------------------------------------
        // Submission
        // ------------------------------------------------------------
        (SessionState::AwaitingSubmission { profile, exercise }, Event::Text { text }) => {
            grade_submission(profile, *exercise, text)
        }

        (SessionState::AwaitingSubmission { profile, exercise }, Event::File { name, content }) => {
            if name.to_lowercase().ends_with(".sql") {
                grade_submission(profile, *exercise, content)
            } else {
                TransitionOutcome::new(SessionState::AwaitingSubmission {
                    profile: profile.clone(),
                    exercise: *exercise,
                })
                .with_effect(Effect::send_with_menu(
                    "Please send a valid .sql file.",
                    Menu::BackOnly,
                ))
            }
        }

        (SessionState::AwaitingSubmission { profile, exercise }, Event::GradingFinished { outcome }) => {
            match outcome {
                GradingOutcome::Graded { result, used } => {
                    TransitionOutcome::new(SessionState::Completed {
                        profile: profile.clone(),
                    })
                    .with_effect(Effect::send_with_menu(
                        format_summary(*exercise, &result, used),
                        Menu::Main,
                    ))
                }
                GradingOutcome::QuotaExhausted => TransitionOutcome::new(SessionState::Completed {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send_with_menu(
                    format!(
                        "You have already submitted exercise {exercise} {MAX_ATTEMPTS} times \
                         and may not submit it again."
                    ),
                    Menu::Main,
                )),
                GradingOutcome::PersistFailed { error } => {
                    TransitionOutcome::new(SessionState::AwaitingSubmission {
                        profile: profile.clone(),
                        exercise: *exercise,
                    })
                    .with_effect(Effect::send_with_menu(
                        format!(
                            "Could not save your submission ({error}). The attempt was not \
                             counted; please send it again."
                        ),
                        Menu::BackOnly,
                    ))
                }
            }
        }

        // ------------------------------------------------------------
        // Main menu
        // ------------------------------------------------------------
        (SessionState::Completed { profile }, Event::Text { text }) => {
            match text.trim() {
                menu::NEW_EXERCISE => TransitionOutcome::new(SessionState::SelectingExercise {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send_with_menu(
                    "Pick an exercise:",
                    Menu::Exercises,
                )),
                menu::END => TransitionOutcome::new(SessionState::Idle).with_effect(Effect::send(
                    "Thanks for using the homework bot! Send /start to begin again.",
                )),
                menu::CHANGE_PASSWORD => {
                    TransitionOutcome::new(SessionState::AwaitingNewPassword {
                        profile: profile.clone(),
                    })
                    .with_effect(Effect::send(format!(
                        "Enter a new password (at least {MIN_PASSWORD_LEN} characters):"
                    )))
                }
                menu::SET_EMAIL => TransitionOutcome::new(SessionState::Completed {
                    profile: profile.clone(),
                })
                .with_effect(Effect::FetchEmail {
                    student_id: profile.student_id.clone(),
                }),
                _ => TransitionOutcome::new(SessionState::Completed {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send_with_menu(
                    "Pick one of the menu options.",
                    Menu::Main,
                )),
            }
        }

        (SessionState::Completed { profile }, Event::EmailFetched { current }) => {
            let status = match current {
                Some(email) => format!("Current email: {email}"),
                None => "No email registered yet.".to_string(),
            };
            TransitionOutcome::new(SessionState::AwaitingNewEmail {
                profile: profile.clone(),
            })
            .with_effect(Effect::send(format!(
                "{status}\nEnter your notification email:"
            )))
        }

        // ------------------------------------------------------------
        // Account maintenance
        // ------------------------------------------------------------
        (SessionState::AwaitingNewPassword { profile }, Event::Text { text }) => {
            let password = text.trim();
            if password.chars().count() < MIN_PASSWORD_LEN {
                TransitionOutcome::new(SessionState::AwaitingNewPassword {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send(format!(
                    "Password must be at least {MIN_PASSWORD_LEN} characters. Try again:"
                )))
            } else {
                TransitionOutcome::new(SessionState::AwaitingNewPassword {
                    profile: profile.clone(),
                })
                .with_effect(Effect::SavePassword {
                    student_id: profile.student_id.clone(),
                    password: password.to_string(),
                })
            }
        }

        (SessionState::AwaitingNewPassword { profile }, Event::PasswordSaved { ok }) => {
            let text = if ok {
                "Password updated."
            } else {
                "Could not update the password. Try again later."
            };
            TransitionOutcome::new(SessionState::Completed {
                profile: profile.clone(),
            })
            .with_effect(Effect::send_with_menu(text, Menu::Main))
        }

        (SessionState::AwaitingNewEmail { profile }, Event::Text { text }) => {
            let email = text.trim();
            if email_regex().is_match(email) {
                TransitionOutcome::new(SessionState::AwaitingNewEmail {
                    profile: profile.clone(),
                })
                .with_effect(Effect::SaveEmail {
                    student_id: profile.student_id.clone(),
                    email: email.to_string(),
                })
            } else {
                TransitionOutcome::new(SessionState::AwaitingNewEmail {
                    profile: profile.clone(),
                })
                .with_effect(Effect::send(
                    "That does not look like an email address. Try again:",
                ))
            }
        }

        (SessionState::AwaitingNewEmail { profile }, Event::EmailSaved { ok, email }) => {
            let text = if ok {
                format!("Email registered: {email}")
            } else {
                "Could not register the email. Try again later.".to_string()
            };
            TransitionOutcome::new(SessionState::Completed {
                profile: profile.clone(),
            })
            .with_effect(Effect::send_with_menu(text, Menu::Main))
        }

        // File payloads outside the submission state
        (state, Event::File { .. }) => TransitionOutcome::new(state.clone())
            .with_effect(Effect::send("Please follow the steps from /start.")),

        // Text in a state that is waiting on a collaborator result, or a
        // stale collaborator event: re-prompt / drop without changing state.
        (state, Event::Text { .. }) => TransitionOutcome::new(state.clone())
            .with_effect(Effect::send("Please follow the steps from /start.")),
        (state, _) => TransitionOutcome::new(state.clone()),
    }
}

fn grade_submission(profile: &Profile, exercise: Exercise, submission: String) -> TransitionOutcome {
    TransitionOutcome::new(SessionState::AwaitingSubmission {
        profile: profile.clone(),
        exercise,
    })
    .with_effect(Effect::Grade {
        profile: profile.clone(),
        exercise,
        submission,
    })
}

fn back_to_menu(state: &SessionState) -> TransitionOutcome {
    match state.profile() {
        Some(profile) => TransitionOutcome::new(SessionState::Completed {
            profile: profile.clone(),
        })
        .with_effect(Effect::send_with_menu("Back to the main menu:", Menu::Main)),
        // Nothing to return to before identification completes.
        None => TransitionOutcome::new(SessionState::Idle)
            .with_effect(Effect::send("Session reset. Send /start to begin.")),
    }
}

/// Human-readable grading summary: score fraction, incorrect questions (or
/// the all-correct marker) and the attempt budget.
fn format_summary(exercise: Exercise, result: &GradingResult, used: u32) -> String {
    let mut out = format!(
        "Grading complete for exercise {exercise}!\nScore: {}/{}\n",
        result.correct_count, result.total_count
    );

    if result.total_count == 0 {
        out.push_str(
            "No questions were recognized. Mark each question with a \
             `# number N` comment line.\n",
        );
    } else {
        let incorrect = result.incorrect_questions();
        if incorrect.is_empty() {
            out.push_str("All questions correct. Well done!\n");
        } else {
            let list = incorrect
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "Incorrect or failed questions: {list}");
        }
    }

    let remaining = MAX_ATTEMPTS.saturating_sub(used);
    let _ = writeln!(out, "Submissions used: {used}/{MAX_ATTEMPTS}");
    let _ = writeln!(out, "Submissions remaining: {remaining}");
    if remaining == 0 {
        out.push_str("This was your last allowed attempt for this exercise.\n");
    }
    out.push_str("Start a new exercise?");
    out
}
