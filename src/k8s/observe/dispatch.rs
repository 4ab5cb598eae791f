/**
 * Event dispatcher
 *
 * Drains one open stream session into a `HandlerSet`. Events are handled one at a
 * time in arrival order; the next event is not pulled until the current handler
 * has returned. Handler failures stay here: they are logged and never end the
 * session.
 */
use super::errors::ClientError;
use super::handler::HandlerSet;
use super::resource::{ChangeEvent, EventKind};
use super::source::EventStream;
use futures::StreamExt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Why a session stopped
#[derive(Debug)]
pub enum SessionEnd {
    /// The server closed the stream
    Closed,
    /// Reading the stream failed
    Failed(ClientError),
    /// The caller cancelled
    Cancelled,
}

#[derive(Debug)]
pub struct SessionReport {
    /// Events of a recognized kind that were handed to the handler set
    pub delivered: u64,
    pub end: SessionEnd,
}

/// Consume `stream` until it ends, fails or `cancel` fires
pub async fn dispatch_session(
    mut stream: EventStream,
    handlers: &mut HandlerSet,
    cancel: &CancellationToken,
) -> SessionReport {
    let mut delivered = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return SessionReport { delivered, end: SessionEnd::Cancelled };
            }
            next = stream.next() => next,
        };

        match next {
            None => {
                return SessionReport {
                    delivered,
                    end: SessionEnd::Closed,
                };
            }
            Some(Err(e)) => {
                return SessionReport {
                    delivered,
                    end: SessionEnd::Failed(e),
                };
            }
            Some(Ok(event)) => {
                if dispatch_event(&event, handlers) {
                    delivered += 1;
                }
            }
        }
    }
}

/// Route one event to its handler. Returns false for unrecognized kinds.
pub fn dispatch_event(event: &ChangeEvent, handlers: &mut HandlerSet) -> bool {
    let name = event.snapshot.name().unwrap_or("<unknown>");

    if let EventKind::Unknown(raw) = &event.kind {
        debug!("❔ Skipping unknown event type {} for {}", raw, name);
        return false;
    }

    let Some(handler) = handlers.handler_for(&event.kind) else {
        debug!("No handler for {} event on {}", event.kind, name);
        return true;
    };

    match catch_unwind(AssertUnwindSafe(|| handler(&event.snapshot))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!("⚠️ {} handler failed for {}: {:#}", event.kind, name, e);
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!("❌ {} handler panicked for {}: {}", event.kind, name, reason);
        }
    }

    true
}
