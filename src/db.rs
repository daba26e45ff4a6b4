//! Database module for the grading service
//!
//! One SQLite database holds the student roster, the submission ledger and
//! the staff-loaded reference answer tables. Student queries execute against
//! the same connection, so grading sees exactly the data the references were
//! computed from.

mod schema;

pub use schema::*;

use crate::state_machine::state::{Exercise, Track};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, InterruptHandle};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Student not found: {0}")]
    StudentNotFound(String),
    #[error("Unknown track in roster: {0}")]
    InvalidTrack(String),
    #[error("Unknown exercise in ledger: {0}")]
    InvalidExercise(String),
    #[error("Corrupt timestamp in ledger: {0}")]
    InvalidTimestamp(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Failure of a single student query. Distinct from [`DbError`] because an
/// execution error is a wrong answer, not a service fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Query failed: {0}")]
    Execution(String),
    #[error("Query exceeded the {0:?} time limit")]
    Timeout(Duration),
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Roster Operations ====================

    /// Look up a student by id. `Ok(None)` means no such student.
    pub fn get_student(&self, student_id: &str) -> DbResult<Option<StudentRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT student_id, name, track, email FROM students WHERE student_id = ?1",
        )?;

        let mut rows = stmt.query(params![student_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_student(row)?)),
            None => Ok(None),
        }
    }

    /// Check a (student id, password) pair. `Ok(None)` means the password
    /// does not match or the student does not exist; the caller cannot tell
    /// which, which is intentional.
    pub fn authenticate(
        &self,
        student_id: &str,
        password: &str,
    ) -> DbResult<Option<StudentRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT student_id, name, track, email FROM students
             WHERE student_id = ?1 AND password = ?2",
        )?;

        let mut rows = stmt.query(params![student_id, password])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_student(row)?)),
            None => Ok(None),
        }
    }

    /// Replace a student's password
    pub fn set_password(&self, student_id: &str, password: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE students SET password = ?1 WHERE student_id = ?2",
            params![password, student_id],
        )?;
        if updated == 0 {
            return Err(DbError::StudentNotFound(student_id.to_string()));
        }
        Ok(())
    }

    /// Register or replace a student's notification email
    pub fn set_email(&self, student_id: &str, email: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE students SET email = ?1 WHERE student_id = ?2",
            params![email, student_id],
        )?;
        if updated == 0 {
            return Err(DbError::StudentNotFound(student_id.to_string()));
        }
        Ok(())
    }

    /// The currently registered email, if any
    pub fn get_email(&self, student_id: &str) -> DbResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT email FROM students WHERE student_id = ?1")?;

        let mut rows = stmt.query(params![student_id])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Err(DbError::StudentNotFound(student_id.to_string())),
        }
    }

    /// Add a student to the roster. Used by seeding scripts and tests.
    #[allow(dead_code)]
    pub fn add_student(
        &self,
        student_id: &str,
        name: &str,
        track: Track,
        password: &str,
    ) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO students (student_id, name, track, password) VALUES (?1, ?2, ?3, ?4)",
            params![student_id, name, track.as_str(), password],
        )?;
        Ok(())
    }

    // ==================== Ledger Operations ====================

    /// Attempts this student has already used for this exercise.
    ///
    /// The count is always derived from the persisted rows. There is no
    /// cached counter to drift out of sync.
    pub fn count_submissions(&self, student_id: &str, exercise: Exercise) -> DbResult<u32> {
        let conn = self.conn.lock().unwrap();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM submissions WHERE student_id = ?1 AND exercise = ?2",
            params![student_id, exercise.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Append a graded attempt to the ledger
    pub fn append_submission(&self, submission: &NewSubmission) -> DbResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO submissions (student_id, student_name, track, exercise, score, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                submission.student_id,
                submission.student_name,
                submission.track.as_str(),
                submission.exercise.as_str(),
                submission.score,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All attempts for one student and exercise, oldest first
    #[allow(dead_code)] // Used in tests
    pub fn list_submissions(
        &self,
        student_id: &str,
        exercise: Exercise,
    ) -> DbResult<Vec<SubmissionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, student_id, student_name, track, exercise, score, submitted_at
             FROM submissions WHERE student_id = ?1 AND exercise = ?2 ORDER BY id",
        )?;

        let mut records = Vec::new();
        let mut rows = stmt.query(params![student_id, exercise.as_str()])?;
        while let Some(row) = rows.next()? {
            let track_tag: String = row.get(3)?;
            let exercise_tag: String = row.get(4)?;
            records.push(SubmissionRecord {
                id: row.get(0)?,
                student_id: row.get(1)?,
                student_name: row.get(2)?,
                track: Track::parse(&track_tag).ok_or(DbError::InvalidTrack(track_tag))?,
                exercise: Exercise::parse(&exercise_tag)
                    .ok_or(DbError::InvalidExercise(exercise_tag))?,
                score: row.get(5)?,
                submitted_at: parse_datetime(&row.get::<_, String>(6)?)?,
            });
        }
        Ok(records)
    }

    // ==================== Student Queries ====================

    /// Execute one student query and collect its full result set.
    ///
    /// Any rusqlite error becomes `QueryError::Execution` with the message
    /// the student will see. Write statements are not screened out; they run
    /// and produce zero rows, matching what the reference tables expect from
    /// read-only homework.
    pub fn run_student_query(&self, sql: &str) -> Result<ResultSet, QueryError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let column_count = stmt.column_count();

        let mut rows = stmt
            .query([])
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let mut result = ResultSet::new();
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let mut out = Row::with_capacity(column_count);
                    for idx in 0..column_count {
                        let value = row
                            .get_ref(idx)
                            .map_err(|e| QueryError::Execution(e.to_string()))?;
                        out.push(read_value(value));
                    }
                    result.push(out);
                }
                Ok(None) => break,
                Err(e) => return Err(QueryError::Execution(e.to_string())),
            }
        }
        Ok(result)
    }

    /// Abort the statement currently running on this connection. Safe to
    /// call from another thread while `run_student_query` is blocked.
    ///
    /// The connection is shared across sessions, so this is best effort:
    /// if the timed-out statement completed before the interrupt landed,
    /// whatever statement is running instead gets aborted and surfaces an
    /// interrupted error to its own caller.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

fn read_student(row: &rusqlite::Row<'_>) -> DbResult<StudentRecord> {
    let track_tag: String = row.get(2)?;
    Ok(StudentRecord {
        student_id: row.get(0)?,
        name: row.get(1)?,
        track: Track::parse(&track_tag).ok_or(DbError::InvalidTrack(track_tag))?,
        email: row.get(3)?,
    })
}

fn read_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

fn parse_datetime(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::InvalidTimestamp(s.to_string()))
}
