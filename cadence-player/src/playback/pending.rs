//! Per-class holder for an outstanding command result

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::Result;

/// Settles a command result exactly once
pub type Responder<T> = oneshot::Sender<Result<T>>;

/// At most one outstanding result for one command class
///
/// Installing a new responder supersedes the previous one, which is settled
/// with the supplied value first so no caller is left waiting.
pub struct PendingSlot<T> {
    name: &'static str,
    responder: Option<Responder<T>>,
}

impl<T> PendingSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, responder: None }
    }

    pub fn is_pending(&self) -> bool {
        self.responder.is_some()
    }

    /// Install `responder`, settling any previous one with `superseded`
    pub fn install(&mut self, responder: Responder<T>, superseded: Result<T>) {
        self.settle(superseded);
        self.responder = Some(responder);
    }

    /// Settle the outstanding result, if any; returns whether one was pending
    pub fn settle(&mut self, result: Result<T>) -> bool {
        match self.responder.take() {
            Some(responder) => {
                trace!("Settling pending {} (ok: {})", self.name, result.is_ok());
                // The caller may have stopped waiting; that is not an error here
                let _ = responder.send(result);
                true
            }
            None => false,
        }
    }
}
