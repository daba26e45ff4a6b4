//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor and grading engine with mock
//! implementations. Production wires every one of them to [`Database`].

use crate::db::{Database, NewSubmission, QueryError, ResultSet, StudentRecord};
use crate::state_machine::state::Exercise;
use async_trait::async_trait;

/// Roster lookups and account maintenance
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up a student by id. `Ok(None)` means unknown id.
    async fn get_student(&self, student_id: &str) -> Result<Option<StudentRecord>, String>;

    /// Check a credential pair. `Ok(None)` means it does not match.
    async fn authenticate(
        &self,
        student_id: &str,
        password: &str,
    ) -> Result<Option<StudentRecord>, String>;

    async fn set_password(&self, student_id: &str, password: &str) -> Result<(), String>;

    async fn set_email(&self, student_id: &str, email: &str) -> Result<(), String>;

    async fn get_email(&self, student_id: &str) -> Result<Option<String>, String>;
}

/// The persisted record of graded attempts
#[async_trait]
pub trait SubmissionLedger: Send + Sync {
    /// Attempts already used for this student and exercise
    async fn count(&self, student_id: &str, exercise: Exercise) -> Result<u32, String>;

    /// Record a graded attempt, returning its ledger id
    async fn append(&self, submission: &NewSubmission) -> Result<i64, String>;
}

/// Executes student SQL and reference lookups
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, sql: &str) -> Result<ResultSet, QueryError>;

    /// Abort the statement currently running, if the backend supports it.
    /// Called from the timeout path; the default is a no-op.
    fn interrupt(&self) {}
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl IdentityStore for Database {
    async fn get_student(&self, student_id: &str) -> Result<Option<StudentRecord>, String> {
        Database::get_student(self, student_id).map_err(|e| e.to_string())
    }

    async fn authenticate(
        &self,
        student_id: &str,
        password: &str,
    ) -> Result<Option<StudentRecord>, String> {
        Database::authenticate(self, student_id, password).map_err(|e| e.to_string())
    }

    async fn set_password(&self, student_id: &str, password: &str) -> Result<(), String> {
        Database::set_password(self, student_id, password).map_err(|e| e.to_string())
    }

    async fn set_email(&self, student_id: &str, email: &str) -> Result<(), String> {
        Database::set_email(self, student_id, email).map_err(|e| e.to_string())
    }

    async fn get_email(&self, student_id: &str) -> Result<Option<String>, String> {
        Database::get_email(self, student_id).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl SubmissionLedger for Database {
    async fn count(&self, student_id: &str, exercise: Exercise) -> Result<u32, String> {
        Database::count_submissions(self, student_id, exercise).map_err(|e| e.to_string())
    }

    async fn append(&self, submission: &NewSubmission) -> Result<i64, String> {
        Database::append_submission(self, submission).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl QueryRunner for Database {
    /// Student queries can run for a while and hold the connection lock, so
    /// they go through `spawn_blocking` to keep the runtime responsive and
    /// to let the timeout path fire while the query is still executing.
    async fn run_query(&self, sql: &str) -> Result<ResultSet, QueryError> {
        let db = self.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || db.run_student_query(&sql))
            .await
            .map_err(|e| QueryError::Execution(format!("query task failed: {e}")))?
    }

    fn interrupt(&self) {
        Database::interrupt(self);
    }
}
