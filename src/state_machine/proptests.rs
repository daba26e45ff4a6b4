//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::transition;
use super::*;
use crate::grading::{GradingOutcome, GradingResult, Verdict, VerdictStatus};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_track() -> impl Strategy<Value = Track> {
    prop_oneof![Just(Track::ComputerScience), Just(Track::Statistics)]
}

fn arb_exercise() -> impl Strategy<Value = Exercise> {
    proptest::sample::select(&Exercise::ALL)
}

fn arb_profile() -> impl Strategy<Value = Profile> {
    ("[0-9]{8}", "[a-zA-Z ]{1,20}", arb_track()).prop_map(|(student_id, display_name, track)| {
        Profile {
            student_id,
            display_name,
            track,
        }
    })
}

fn arb_verdict() -> impl Strategy<Value = Verdict> {
    (
        1usize..10,
        prop_oneof![
            Just(VerdictStatus::Correct),
            Just(VerdictStatus::Incorrect),
            "[a-z ]{1,20}".prop_map(|detail| VerdictStatus::ExecutionError { detail }),
        ],
    )
        .prop_map(|(question_index, status)| Verdict {
            question_index,
            status,
        })
}

fn arb_grading_outcome() -> impl Strategy<Value = GradingOutcome> {
    prop_oneof![
        (proptest::collection::vec(arb_verdict(), 0..6), 1u32..=10).prop_map(|(verdicts, used)| {
            GradingOutcome::Graded {
                result: GradingResult::from_verdicts(verdicts),
                used,
            }
        }),
        Just(GradingOutcome::QuotaExhausted),
        "[a-z ]{1,20}".prop_map(|error| GradingOutcome::PersistFailed { error }),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        Just(SessionState::Idle),
        Just(SessionState::AwaitingStudentId),
        "[0-9]{8}".prop_map(|student_id| SessionState::AwaitingPassword { student_id }),
        arb_profile().prop_map(|profile| SessionState::SelectingExercise { profile }),
        (arb_profile(), arb_exercise())
            .prop_map(|(profile, exercise)| SessionState::AwaitingSubmission { profile, exercise }),
        arb_profile().prop_map(|profile| SessionState::AwaitingNewPassword { profile }),
        arb_profile().prop_map(|profile| SessionState::AwaitingNewEmail { profile }),
        arb_profile().prop_map(|profile| SessionState::Completed { profile }),
    ]
}

// Everything except Start, which legitimately re-identifies the session.
fn arb_event_no_restart() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::BackToMenu),
        "[a-zA-Z0-9 #;.@-]{0,40}".prop_map(|text| Event::Text { text }),
        ("[a-z]{1,8}\\.(sql|txt)", "[a-zA-Z0-9 ;]{0,40}")
            .prop_map(|(name, content)| Event::File { name, content }),
        ("[0-9]{8}", any::<bool>())
            .prop_map(|(student_id, found)| Event::LookupFinished { student_id, found }),
        proptest::option::of(arb_profile()).prop_map(|profile| Event::AuthFinished { profile }),
        proptest::option::of("[a-z]{1,8}@x\\.com".prop_map(String::from))
            .prop_map(|current| Event::EmailFetched { current }),
        (arb_exercise(), 0u32..=12)
            .prop_map(|(exercise, used)| Event::QuotaChecked { exercise, used }),
        arb_grading_outcome().prop_map(|outcome| Event::GradingFinished { outcome }),
        any::<bool>().prop_map(|ok| Event::PasswordSaved { ok }),
        ("[a-z]{1,8}@x\\.com", any::<bool>())
            .prop_map(|(email, ok)| Event::EmailSaved { ok, email }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![Just(Event::Start), arb_event_no_restart()]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: transition is total. Any event in any state produces a
    // new state without panicking, across arbitrary sequences.
    #[test]
    fn prop_transition_is_total(
        start in arb_state(),
        events in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let mut state = start;
        for event in events {
            state = transition(&state, event).new_state;
        }
    }

    // Invariant 2: no transition conjures a profile out of thin air. A
    // profile can only enter the state via AuthFinished carrying one.
    #[test]
    fn prop_profile_requires_authentication(
        start in prop_oneof![
            Just(SessionState::Idle),
            Just(SessionState::AwaitingStudentId),
            "[0-9]{8}".prop_map(|student_id| SessionState::AwaitingPassword { student_id }),
        ],
        event in arb_event(),
    ) {
        let outcome = transition(&start, event.clone());
        if outcome.new_state.profile().is_some() {
            prop_assert!(
                matches!(event, Event::AuthFinished { profile: Some(_) }),
                "profile appeared without authentication: {:?}",
                outcome.new_state
            );
        }
    }

    // Invariant 3: short of /start, which re-identifies the session, no
    // event changes whose session this is once a profile is attached.
    #[test]
    fn prop_profile_is_stable_once_attached(
        profile in arb_profile(),
        events in proptest::collection::vec(arb_event_no_restart(), 0..20),
    ) {
        let mut state = SessionState::Completed { profile: profile.clone() };
        for event in events {
            state = transition(&state, event).new_state;
            if let Some(p) = state.profile() {
                prop_assert_eq!(&p.student_id, &profile.student_id);
            }
        }
    }

    // Invariant 4: /start restarts identification from any state.
    #[test]
    fn prop_start_restarts_identification(state in arb_state()) {
        let outcome = transition(&state, Event::Start);
        prop_assert_eq!(outcome.new_state, SessionState::AwaitingStudentId);
    }

    // Invariant 5: the escape hatch always lands at the main menu, or at
    // idle when there is no profile to return to.
    #[test]
    fn prop_back_to_menu_is_safe(state in arb_state()) {
        let outcome = transition(&state, Event::BackToMenu);
        match state.profile() {
            Some(p) => prop_assert_eq!(
                outcome.new_state,
                SessionState::Completed { profile: p.clone() }
            ),
            None => prop_assert_eq!(outcome.new_state, SessionState::Idle),
        }
    }

    // Invariant 6: inbound text always draws a reaction. Either a message
    // goes back to the student or a collaborator is consulted.
    #[test]
    fn prop_text_never_ignored(state in arb_state(), text in "[a-zA-Z0-9 ]{0,30}") {
        let outcome = transition(&state, Event::Text { text });
        prop_assert!(!outcome.effects.is_empty());
    }

    // Invariant 7: a quota answer at or above the cap never admits the
    // student into the submission state.
    #[test]
    fn prop_exhausted_quota_blocks_submission(
        profile in arb_profile(),
        exercise in arb_exercise(),
        used in 10u32..=20,
    ) {
        let state = SessionState::SelectingExercise { profile };
        let outcome = transition(&state, Event::QuotaChecked { exercise, used });
        prop_assert!(
            !matches!(outcome.new_state, SessionState::AwaitingSubmission { .. }),
            "exhausted quota must not admit student into submission state"
        );
    }

    // Invariant 8: a persist failure keeps the submission state so the
    // student can resend without reselecting the exercise.
    #[test]
    fn prop_persist_failure_keeps_submission_state(
        profile in arb_profile(),
        exercise in arb_exercise(),
        error in "[a-z ]{1,20}",
    ) {
        let state = SessionState::AwaitingSubmission { profile, exercise };
        let outcome = transition(
            &state,
            Event::GradingFinished {
                outcome: GradingOutcome::PersistFailed { error },
            },
        );
        prop_assert_eq!(outcome.new_state, state);
    }

    // Invariant 9: only .sql files reach the grading engine.
    #[test]
    fn prop_only_sql_files_are_graded(
        profile in arb_profile(),
        exercise in arb_exercise(),
        name in "[a-z]{1,8}\\.(txt|py|pdf|docx)",
        content in "[a-zA-Z ;]{0,30}",
    ) {
        let state = SessionState::AwaitingSubmission { profile, exercise };
        let outcome = transition(&state, Event::File { name, content });
        prop_assert_eq!(outcome.new_state, state);
        prop_assert!(
            !outcome.effects.iter().any(|e| matches!(e, Effect::Grade { .. })),
            "non-sql file must not produce a Grade effect"
        );
    }
}
