//! Live preview updates over Server-Sent Events.
//!
//! GET /previews/events
//!
//! Opens with a `connected` event, then forwards every `PreviewEvent` as an
//! SSE event named after its `type`. A subscriber that falls behind the
//! broadcast buffer gets a `lagged` event with the number of missed messages.

use crate::services::preview_service::PreviewService;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

pub async fn stream_events(
    State(service): State<PreviewService>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = service.notifier.subscribe();
    tracing::debug!(
        subscribers = service.notifier.subscriber_count(),
        "event stream opened"
    );

    let connected =
        stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });

    let events = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Event::default()
                .event(event.kind())
                .json_data(&event)
                .ok()
                .map(Ok),
            Err(BroadcastStreamRecvError::Lagged(missed)) => Event::default()
                .event("lagged")
                .json_data(serde_json::json!({ "missed": missed }))
                .ok()
                .map(Ok),
        }
    });

    Sse::new(connected.chain(events)).keep_alive(KeepAlive::default())
}
