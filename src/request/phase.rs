//! Request lifecycle states.

use crate::error::RequestError;
use std::fmt;

/// Where a request is in its lifecycle. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Idle,
    Connecting,
    Handshaking,
    Sending,
    ReceivingResponse,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Handshaking => "handshaking",
            Phase::Sending => "sending",
            Phase::ReceivingResponse => "receiving response",
            Phase::Done => "done",
        })
    }
}

/// Tracks and logs the phase of one request.
#[derive(Debug)]
pub struct Lifecycle {
    url: String,
    phase: Phase,
}

impl Lifecycle {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "phase moved from {} to {}", self.phase, next);
        tracing::debug!(url = %self.url, from = %self.phase, to = %next, "Request phase");
        self.phase = next;
    }

    /// Records the terminal failure; the error itself goes back to the caller.
    pub fn fail(&self, error: &RequestError) {
        tracing::debug!(
            url = %self.url,
            phase = %self.phase,
            code = error.code(),
            "Request failed"
        );
    }
}
