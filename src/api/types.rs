//! API request and response types

use serde::{Deserialize, Serialize};

/// Request to send a text message into a session
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Request to send an uploaded file into a session
#[derive(Debug, Deserialize)]
pub struct FileRequest {
    /// Original filename, used for the .sql extension check
    pub name: String,
    pub content: String,
}

/// Response for accepted inbound events
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub queued: bool,
}

/// Error payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
