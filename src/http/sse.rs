use std::convert::Infallible;
use std::future;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use crate::engine::QualitySession;

pub type QualityStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of published quality results.
pub fn quality(session: &QualitySession) -> QualityStream {
    let stream = session.result_stream().filter_map(|result| {
        let event = serde_json::to_string(&result)
            .ok()
            .map(|payload| Ok(Event::default().event("quality").data(payload)));
        future::ready(event)
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    )
}
