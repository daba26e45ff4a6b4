//! Server-Sent Events support

use crate::runtime::OutboundMessage;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session's broadcast channel into an SSE stream
pub fn message_stream(
    broadcast_rx: tokio::sync::broadcast::Receiver<OutboundMessage>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let messages = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(message) => Some(Ok(message_to_sse(&message))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(messages).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn message_to_sse(message: &OutboundMessage) -> Event {
    let data = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("message").data(data)
}
