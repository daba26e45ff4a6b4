//! HTTP API for the grading service
//!
//! Thin transport over the session runtimes: inbound messages become
//! events, replies stream back over SSE. Clients (chat bridges, a web UI)
//! render the optional reply menus however they like.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::runtime::SessionManager;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(db: Database, query_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(db, query_timeout)),
        }
    }
}
