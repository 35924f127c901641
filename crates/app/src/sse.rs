use std::{
    convert::Infallible,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use axum::response::sse::{Event, KeepAlive};
use metrics::gauge;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tracing::warn;

use crate::form::{FormSession, FormView};

const EVENT_NAME: &str = "view";

/// Tracks how many view streams are open across all form sessions.
#[derive(Clone, Default)]
pub struct ViewStreams {
    clients: Arc<AtomicUsize>,
}

impl ViewStreams {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn clients(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Streams the session's current view followed by every later change.
    ///
    /// Intermediate views published faster than the client reads are
    /// skipped; the latest one is always delivered.
    pub fn open(&self, session: &FormSession) -> SseStream {
        let guard = ClientGuard::new(self.clients.clone());
        let stream = WatchStream::new(session.subscribe()).filter_map(|view| {
            match view_event(&view) {
                Ok(event) => Some(Ok(event)),
                Err(err) => {
                    warn!(stage = "sse", error = %err, "failed to serialize form view");
                    None
                }
            }
        });
        SseStream {
            inner: Box::pin(stream),
            _guard: guard,
        }
    }
}

pub fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text("heartbeat")
}

fn view_event(view: &FormView) -> Result<Event, serde_json::Error> {
    let data = serde_json::to_string(view)?;
    Ok(Event::default()
        .id(view.version.to_string())
        .event(EVENT_NAME)
        .data(data))
}

pub struct SseStream {
    inner: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>,
    _guard: ClientGuard,
}

impl Stream for SseStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.as_mut().poll_next(cx)
    }
}

struct ClientGuard {
    clients: Arc<AtomicUsize>,
}

impl ClientGuard {
    fn new(clients: Arc<AtomicUsize>) -> Self {
        let value = clients.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!("sse_clients").set(value as f64);
        Self { clients }
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        let value = self
            .clients
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        gauge!("sse_clients").set(value as f64);
    }
}
