//! Mock collaborators for executor and engine tests

use super::traits::{IdentityStore, QueryRunner, SubmissionLedger};
use crate::db::{Database, NewSubmission, QueryError, ResultSet, StudentRecord};
use crate::state_machine::state::{Exercise, Track};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory roster with per-call failure switches
#[derive(Clone, Default)]
pub struct MockIdentityStore {
    inner: Arc<Mutex<IdentityState>>,
}

#[derive(Default)]
struct IdentityState {
    students: HashMap<String, (StudentRecord, String)>,
    fail_with: Option<String>,
}

impl MockIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_student(self, student_id: &str, name: &str, track: Track, password: &str) -> Self {
        self.inner.lock().unwrap().students.insert(
            student_id.to_string(),
            (
                StudentRecord {
                    student_id: student_id.to_string(),
                    name: name.to_string(),
                    track,
                    email: None,
                },
                password.to_string(),
            ),
        );
        self
    }

    /// Make every call fail with the given message
    pub fn failing(error: &str) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().fail_with = Some(error.to_string());
        store
    }

    pub fn email_of(&self, student_id: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .students
            .get(student_id)
            .and_then(|(record, _)| record.email.clone())
    }

    fn check_failure(&self) -> Result<(), String> {
        match &self.inner.lock().unwrap().fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn get_student(&self, student_id: &str) -> Result<Option<StudentRecord>, String> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.students.get(student_id).map(|(r, _)| r.clone()))
    }

    async fn authenticate(
        &self,
        student_id: &str,
        password: &str,
    ) -> Result<Option<StudentRecord>, String> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .students
            .get(student_id)
            .filter(|(_, pw)| pw == password)
            .map(|(r, _)| r.clone()))
    }

    async fn set_password(&self, student_id: &str, password: &str) -> Result<(), String> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.students.get_mut(student_id) {
            Some((_, pw)) => {
                *pw = password.to_string();
                Ok(())
            }
            None => Err(format!("no such student: {student_id}")),
        }
    }

    async fn set_email(&self, student_id: &str, email: &str) -> Result<(), String> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.students.get_mut(student_id) {
            Some((record, _)) => {
                record.email = Some(email.to_string());
                Ok(())
            }
            None => Err(format!("no such student: {student_id}")),
        }
    }

    async fn get_email(&self, student_id: &str) -> Result<Option<String>, String> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .students
            .get(student_id)
            .and_then(|(r, _)| r.email.clone()))
    }
}

/// Ledger with scriptable count and append behavior
#[derive(Clone)]
pub struct MockLedger {
    inner: Arc<Mutex<LedgerState>>,
}

struct LedgerState {
    count: Result<u32, String>,
    append_error: Option<String>,
    records: Vec<NewSubmission>,
}

impl MockLedger {
    pub fn with_count(count: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerState {
                count: Ok(count),
                append_error: None,
                records: Vec::new(),
            })),
        }
    }

    pub fn failing_count(error: &str) -> Self {
        let ledger = Self::with_count(0);
        ledger.inner.lock().unwrap().count = Err(error.to_string());
        ledger
    }

    pub fn failing_append(error: &str) -> Self {
        let ledger = Self::with_count(0);
        ledger.inner.lock().unwrap().append_error = Some(error.to_string());
        ledger
    }

    pub fn records(&self) -> Vec<NewSubmission> {
        self.inner.lock().unwrap().records.clone()
    }
}

#[async_trait]
impl SubmissionLedger for MockLedger {
    async fn count(&self, _student_id: &str, _exercise: Exercise) -> Result<u32, String> {
        self.inner.lock().unwrap().count.clone()
    }

    async fn append(&self, submission: &NewSubmission) -> Result<i64, String> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = &inner.append_error {
            return Err(e.clone());
        }
        inner.records.push(submission.clone());
        Ok(inner.records.len() as i64)
    }
}

/// Wraps a real database and counts how many queries actually ran
#[derive(Clone)]
pub struct CountingRunner {
    db: Database,
    calls: Arc<AtomicUsize>,
}

impl CountingRunner {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn queries_run(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryRunner for CountingRunner {
    async fn run_query(&self, sql: &str) -> Result<ResultSet, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.db.run_query(sql).await
    }
}
