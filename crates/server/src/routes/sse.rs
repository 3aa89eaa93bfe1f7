use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use events::EventEnvelope;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub session_id: Option<String>,
}

fn matches_session(envelope: &EventEnvelope, session_id: Option<&str>) -> bool {
    match session_id {
        Some(wanted) => envelope.event.session_id() == Some(wanted),
        None => true,
    }
}

fn envelope_to_sse_event(envelope: &EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.sequence.to_string())
        .event(envelope.event.event_type())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    params(
        ("session_id" = Option<String>, Query, description = "Only stream events of this session"),
    ),
    responses(
        (status = 200, description = "SSE stream of sequenced orchestration events"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = query.session_id.filter(|s| !s.is_empty());
    let rx = state.event_bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let session_id = session_id.clone();

        async move {
            match result {
                Ok(envelope) => matches_session(&envelope, session_id.as_deref())
                    .then(|| envelope_to_sse_event(&envelope)),
                Err(e) => {
                    tracing::warn!("SSE broadcast error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
