//! Ctrl+C handling for interactive chats.

use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Routes an interrupt to whichever turn is currently running.
///
/// Every turn gets a fresh token from [`Interrupt::arm`]; [`Interrupt::trigger`]
/// cancels the token of the turn in flight.  Triggering is safe from a signal
/// handler thread.
#[derive(Debug, Default)]
pub struct Interrupt {
    current: Mutex<CancellationToken>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn and return the token it should watch.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    /// Cancel the turn in flight, if any.
    pub fn trigger(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}
