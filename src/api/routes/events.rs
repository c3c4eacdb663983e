use std::convert::Infallible;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tracing::warn;
use crate::api::AppState;
use crate::errors::EngineError;
use super::parse_category;

/// Live events for one category, as server-sent events named by payload
/// kind. Only events published after the client connects are delivered.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, EngineError> {
    let category = parse_category(&category)?;
    let events = state.engine.bus.subscribe(category).into_stream().filter_map(|event| async move {
        match Event::default().event(event.payload.kind()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                warn!(error = %e, "Failed to encode event");
                None
            }
        }
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
