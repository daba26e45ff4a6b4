//! Database schema and types

use crate::state_machine::state::{Exercise, Track};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// SQL schema for initialization.
///
/// Reference tables (`hw{exercise}_q{n}_{track}_reference`) are loaded into
/// the same database out of band by course staff and are not part of this
/// schema.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    student_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    track TEXT NOT NULL,
    password TEXT NOT NULL,
    email TEXT
);

CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL,
    student_name TEXT NOT NULL,
    track TEXT NOT NULL,
    exercise TEXT NOT NULL,
    score INTEGER NOT NULL,
    submitted_at TEXT NOT NULL,

    FOREIGN KEY (student_id) REFERENCES students(student_id)
);

CREATE INDEX IF NOT EXISTS idx_submissions_student_exercise
    ON submissions(student_id, exercise);
"#;

/// Enrollment record from the roster table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    pub track: Track,
    pub email: Option<String>,
}

/// A graded attempt about to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub student_id: String,
    pub student_name: String,
    pub track: Track,
    pub exercise: Exercise,
    /// Count of correctly answered questions.
    pub score: u32,
}

/// A graded attempt read back from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: i64,
    pub student_id: String,
    pub student_name: String,
    pub track: Track,
    pub exercise: Exercise,
    pub score: u32,
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Query result values
// ============================================================================

/// One cell of a query result, covering SQLite's storage classes.
///
/// `Real` compares by bit pattern so rows can live in a `HashSet` for the
/// order-insensitive answer comparison. Reference answers are exact values
/// written by the same engine, so bitwise equality is the right notion here.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Integer(a), SqlValue::Integer(b)) => a == b,
            (SqlValue::Real(a), SqlValue::Real(b)) => a.to_bits() == b.to_bits(),
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Blob(a), SqlValue::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            SqlValue::Null => 0u8.hash(state),
            SqlValue::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            SqlValue::Real(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            SqlValue::Text(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            SqlValue::Blob(b) => {
                4u8.hash(state);
                b.hash(state);
            }
        }
    }
}

/// One row of a query result.
pub type Row = Vec<SqlValue>;

/// All rows a query produced, in arrival order.
pub type ResultSet = Vec<Row>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn real_values_compare_by_bits() {
        assert_eq!(SqlValue::Real(1.5), SqlValue::Real(1.5));
        assert_ne!(SqlValue::Real(0.0), SqlValue::Real(-0.0));
        assert_eq!(SqlValue::Real(f64::NAN), SqlValue::Real(f64::NAN));
    }

    #[test]
    fn rows_deduplicate_in_a_set() {
        let row = || vec![SqlValue::Integer(1), SqlValue::Text("a".into())];
        let set: HashSet<Row> = vec![row(), row()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn storage_classes_never_cross_compare() {
        assert_ne!(SqlValue::Integer(1), SqlValue::Real(1.0));
        assert_ne!(SqlValue::Text("1".into()), SqlValue::Integer(1));
        assert_ne!(SqlValue::Null, SqlValue::Integer(0));
    }
}
