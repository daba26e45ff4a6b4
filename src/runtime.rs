//! Runtime for executing student sessions
//!
//! Each identity gets one long-lived tokio task owning its session state.
//! The transport feeds events in over an mpsc channel; replies fan out over
//! a broadcast channel to however many stream subscribers are attached.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::db::Database;
use crate::grading::GradingEngine;
use crate::state_machine::Event;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Production runtime backed by the database for every collaborator
pub type ProductionRuntime = SessionRuntime<Database, Database, Database>;

/// A reply on its way to the student
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    /// Reply menu rows, when the client should offer canned answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu: Option<Vec<Vec<String>>>,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<OutboundMessage>,
}

/// Manager for all session runtimes
pub struct SessionManager {
    db: Database,
    query_timeout: Duration,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(db: Database, query_timeout: Duration) -> Self {
        Self {
            db,
            query_timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create a runtime for an identity
    pub async fn get_or_create(&self, identity: &str) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(identity) {
                return handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        // Two first contacts can race past the read check; the write lock
        // decides which one creates the runtime, the other reuses it.
        if let Some(handle) = sessions.get(identity) {
            return handle.clone();
        }

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let engine = GradingEngine::new(self.db.clone(), self.db.clone(), self.query_timeout);
        let runtime: ProductionRuntime = SessionRuntime::new(
            identity.to_string(),
            self.db.clone(),
            engine,
            event_rx,
            broadcast_tx.clone(),
        );

        let session_id = identity.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(identity = %session_id, "Session runtime finished");
        });

        let handle = SessionHandle {
            event_tx,
            broadcast_tx,
        };
        sessions.insert(identity.to_string(), handle.clone());

        handle
    }

    /// Send an event to a session
    pub async fn send_event(&self, identity: &str, event: Event) -> Result<(), String> {
        let handle = self.get_or_create(identity).await;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Subscribe to a session's outbound messages
    pub async fn subscribe(&self, identity: &str) -> broadcast::Receiver<OutboundMessage> {
        let handle = self.get_or_create(identity).await;
        handle.broadcast_tx.subscribe()
    }
}
