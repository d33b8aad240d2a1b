//! Reconnect state machine.
//!
//! `Connecting` walks the candidate list; once every candidate has failed in
//! a row the machine enters `BackingOff` with the next backoff delay. A
//! successful connect moves to `Streaming` and resets both the round and the
//! backoff.

use std::time::Duration;

use crate::backoff::Backoff;
use crate::error::{WsError, WsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting { candidate: usize },
    Streaming { candidate: usize },
    BackingOff { delay: Duration },
}

#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    candidates: Vec<String>,
    index: usize,
    failures_in_round: usize,
    backoff: Backoff,
    state: StreamState,
}

impl ReconnectMachine {
    pub fn new(candidates: Vec<String>, backoff: Backoff) -> WsResult<Self> {
        if candidates.is_empty() {
            return Err(WsError::NoCandidates);
        }
        Ok(Self {
            candidates,
            index: 0,
            failures_in_round: 0,
            backoff,
            state: StreamState::Connecting { candidate: 0 },
        })
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// URL to try next. Moves the machine to `Connecting`.
    pub fn target(&mut self) -> &str {
        self.state = StreamState::Connecting {
            candidate: self.index,
        };
        &self.candidates[self.index]
    }

    pub fn on_connected(&mut self) {
        self.failures_in_round = 0;
        self.backoff.reset();
        self.state = StreamState::Streaming {
            candidate: self.index,
        };
    }

    /// Connect failure or stream end.
    ///
    /// Returns the delay to sleep when a full round has failed, `None` when
    /// the next candidate should be tried immediately.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.index = (self.index + 1) % self.candidates.len();
        self.failures_in_round += 1;
        if self.failures_in_round < self.candidates.len() {
            self.state = StreamState::Connecting {
                candidate: self.index,
            };
            return None;
        }
        self.failures_in_round = 0;
        let delay = self.backoff.next_delay();
        self.state = StreamState::BackingOff { delay };
        Some(delay)
    }
}
