//! Grading engine
//!
//! Runs each question of a submission against the live database, compares
//! rows to the reference answers under set equality and appends the graded
//! attempt to the ledger.

use super::reference::reference_table;
use super::splitter::split_submission;
use crate::db::{NewSubmission, QueryError, ResultSet, Row};
use crate::runtime::traits::{QueryRunner, SubmissionLedger};
use crate::state_machine::state::{Exercise, Profile};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts allowed per student and exercise.
pub const MAX_ATTEMPTS: u32 = 10;

/// Outcome for one question of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Positional question number, starting at 1.
    pub question_index: usize,
    pub status: VerdictStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerdictStatus {
    Correct,
    /// Ran fine but produced the wrong rows.
    Incorrect,
    /// Did not produce rows at all. Counts as wrong, never as a service
    /// fault; the detail goes back to the student verbatim.
    ExecutionError { detail: String },
}

/// Per-question verdicts plus the derived score.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    pub verdicts: Vec<Verdict>,
    pub correct_count: usize,
    pub total_count: usize,
}

impl GradingResult {
    pub fn from_verdicts(verdicts: Vec<Verdict>) -> Self {
        let correct_count = verdicts
            .iter()
            .filter(|v| v.status == VerdictStatus::Correct)
            .count();
        let total_count = verdicts.len();
        Self {
            verdicts,
            correct_count,
            total_count,
        }
    }

    /// Question numbers that did not pass, in order.
    pub fn incorrect_questions(&self) -> Vec<usize> {
        self.verdicts
            .iter()
            .filter(|v| v.status != VerdictStatus::Correct)
            .map(|v| v.question_index)
            .collect()
    }

}

/// What became of one grading request.
#[derive(Debug, Clone)]
pub enum GradingOutcome {
    /// Graded and recorded. `used` is the attempt count including this one.
    Graded { result: GradingResult, used: u32 },
    /// The quota re-check at grading time found no attempts left.
    QuotaExhausted,
    /// Grading finished but the ledger append failed. The attempt does not
    /// count and the student may resend.
    PersistFailed { error: String },
}

/// Grades submissions against reference answers.
///
/// Generic over the query runner and the ledger so tests can substitute
/// either; production wires both to [`crate::db::Database`].
pub struct GradingEngine<Q, L> {
    runner: Q,
    ledger: L,
    query_timeout: Duration,
}

impl<Q: QueryRunner, L: SubmissionLedger> GradingEngine<Q, L> {
    pub fn new(runner: Q, ledger: L, query_timeout: Duration) -> Self {
        Self {
            runner,
            ledger,
            query_timeout,
        }
    }

    /// The ledger, for quota checks outside a grading run
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Grade one submission end to end.
    ///
    /// The quota is re-checked here even though exercise selection already
    /// checked it; the submission state can be arbitrarily old. A ledger
    /// read failure fails open: grading proceeds rather than locking every
    /// student out on a transient fault.
    pub async fn grade(
        &self,
        profile: &Profile,
        exercise: Exercise,
        submission: &str,
    ) -> GradingOutcome {
        let used = match self.ledger.count(&profile.student_id, exercise).await {
            Ok(n) => n,
            Err(error) => {
                warn!(
                    student_id = %profile.student_id,
                    %exercise,
                    %error,
                    "Ledger read failed, assuming zero attempts"
                );
                0
            }
        };
        if used >= MAX_ATTEMPTS {
            return GradingOutcome::QuotaExhausted;
        }

        let questions = split_submission(submission);
        debug!(
            student_id = %profile.student_id,
            %exercise,
            question_count = questions.len(),
            "Grading submission"
        );

        let mut verdicts = Vec::with_capacity(questions.len());
        for (i, sql) in questions.iter().enumerate() {
            let question_index = i + 1;
            let status = self.check_question(profile, exercise, question_index, sql).await;
            verdicts.push(Verdict {
                question_index,
                status,
            });
        }

        let result = GradingResult::from_verdicts(verdicts);
        let record = NewSubmission {
            student_id: profile.student_id.clone(),
            student_name: profile.display_name.clone(),
            track: profile.track,
            exercise,
            score: result.correct_count as u32,
        };
        match self.ledger.append(&record).await {
            Ok(_) => GradingOutcome::Graded {
                result,
                used: used + 1,
            },
            Err(error) => {
                warn!(
                    student_id = %profile.student_id,
                    %exercise,
                    %error,
                    "Ledger append failed, attempt not counted"
                );
                GradingOutcome::PersistFailed { error }
            }
        }
    }

    async fn check_question(
        &self,
        profile: &Profile,
        exercise: Exercise,
        question: usize,
        sql: &str,
    ) -> VerdictStatus {
        let actual = match self.run_with_timeout(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                return VerdictStatus::ExecutionError {
                    detail: e.to_string(),
                }
            }
        };

        let table = reference_table(exercise, question, profile.track);
        let expected = match self.run_with_timeout(&format!("SELECT * FROM {table}")).await {
            Ok(rows) => rows,
            Err(error) => {
                // Missing reference table is a staff problem, not a wrong
                // answer, but the question still cannot be scored.
                warn!(%table, %error, "Reference answer unavailable");
                return VerdictStatus::ExecutionError {
                    detail: format!("reference answer for question {question} unavailable"),
                };
            }
        };

        if as_set(&actual) == as_set(&expected) {
            VerdictStatus::Correct
        } else {
            VerdictStatus::Incorrect
        }
    }

    /// One query under the hard time limit. On expiry the in-flight
    /// statement is interrupted so it cannot hold the connection hostage.
    async fn run_with_timeout(&self, sql: &str) -> Result<ResultSet, QueryError> {
        match tokio::time::timeout(self.query_timeout, self.runner.run_query(sql)).await {
            Ok(result) => result,
            Err(_) => {
                self.runner.interrupt();
                Err(QueryError::Timeout(self.query_timeout))
            }
        }
    }
}

/// Rows as a set: order collapses and duplicates coincide, matching the
/// course's definition of a correct answer.
fn as_set(rows: &ResultSet) -> HashSet<&Row> {
    rows.iter().collect()
}
