//! HTTP request handlers

use super::sse::message_stream;
use super::types::{
    AcceptedResponse, ErrorResponse, FileRequest, HealthResponse, MessageRequest,
};
use super::AppState;
use crate::state_machine::Event;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions/:identity/messages", post(send_message))
        .route("/api/sessions/:identity/files", post(send_file))
        .route("/api/sessions/:identity/stream", get(stream_session))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Accept a text message. Slash commands map to their own events; any
/// other text goes through as-is for the state machine to interpret.
async fn send_message(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    let event = parse_command(&req.text);
    state
        .sessions
        .send_event(&identity, event)
        .await
        .map_err(AppError::Internal)?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { queued: true })))
}

async fn send_file(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(req): Json<FileRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    state
        .sessions
        .send_event(
            &identity,
            Event::File {
                name: req.name,
                content: req.content,
            },
        )
        .await
        .map_err(AppError::Internal)?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { queued: true })))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> impl IntoResponse {
    let rx = state.sessions.subscribe(&identity).await;
    message_stream(rx)
}

fn parse_command(text: &str) -> Event {
    match text.trim() {
        "/start" => Event::Start,
        "/menu" => Event::BackToMenu,
        other => Event::Text {
            text: other.to_string(),
        },
    }
}

// ============================================================
// Error handling
// ============================================================

enum AppError {
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let db = Database::open_in_memory().unwrap();
        create_router(AppState::new(db, Duration::from_secs(5)))
    }

    #[test]
    fn slash_commands_map_to_events() {
        assert!(matches!(parse_command("/start"), Event::Start));
        assert!(matches!(parse_command("  /menu "), Event::BackToMenu));
        assert!(matches!(parse_command("3"), Event::Text { .. }));
        // Unknown slash commands are plain text for the state machine.
        assert!(matches!(parse_command("/help"), Event::Text { .. }));
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn messages_are_accepted() {
        let response = test_app()
            .oneshot(
                Request::post("/api/sessions/chat-42/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"/start"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn files_are_accepted() {
        let response = test_app()
            .oneshot(
                Request::post("/api/sessions/chat-42/files")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"hw3.sql","content":"SELECT 1;"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
