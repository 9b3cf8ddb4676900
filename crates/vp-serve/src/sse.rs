use crate::routes::error::map_error;
use crate::{AppState, build_valet};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use vp_events::types::EventRecord;

/// History after `after`, then live events from the bus. The bus receiver is
/// taken before history is read so nothing committed in between is missed;
/// live events already present in history are skipped by sequence number.
pub fn subscribe(state: AppState, after: Option<i64>) -> Response {
    let receiver = state.event_bus.subscribe();
    let history = match build_valet(&state).and_then(|valet| valet.events().list(after, None)) {
        Ok(events) => events,
        Err(err) => return map_error(&err, None).into_response(),
    };
    let last_seen = history.last().map_or(after.unwrap_or(0), |event| event.seq);

    let history_stream = stream::iter(history.into_iter().map(to_sse));
    let live_stream = BroadcastStream::new(receiver).filter_map(move |item| async move {
        match item {
            Ok(event) if event.seq > last_seen => Some(to_sse(event)),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "sse subscriber lagged");
                None
            }
        }
    });

    Sse::new(history_stream.chain(live_stream))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn to_sse(event: EventRecord) -> Result<Event, Infallible> {
    let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    let sse = Event::default().id(event.seq.to_string()).data(json);
    Ok(match event.kind() {
        Some(kind) => sse.event(kind),
        None => sse,
    })
}
