//! Per-chunk retry state machine
//!
//! ```text
//! Pending -> Attempting(n) -> Succeeded
//!                          -> PermanentlyFailed
//!                          -> Retrying(n, delay) -> Attempting(n + 1) -> ...
//! any non-terminal state   -> Cancelled
//! ```
//!
//! The machine owns no I/O. A worker asks it when to wait and when to send,
//! feeds back each [`ChunkAttempt`], and finally folds it into a [`ChunkReport`].

use super::backoff::RetryPolicy;
use super::job::ChunkSpan;
use super::result::{ChunkOutcome, ChunkReport};
use super::transport::{FailureKind, TransportError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Current state of one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    PermanentlyFailed { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl ChunkState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChunkState::Succeeded { .. }
                | ChunkState::PermanentlyFailed { .. }
                | ChunkState::Cancelled { .. }
        )
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        match self {
            ChunkState::Pending => 0,
            ChunkState::Attempting { attempt } | ChunkState::Retrying { attempt, .. } => *attempt,
            ChunkState::Succeeded { attempts }
            | ChunkState::PermanentlyFailed { attempts }
            | ChunkState::Cancelled { attempts } => *attempts,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ChunkState::Pending => "pending",
            ChunkState::Attempting { .. } => "attempting",
            ChunkState::Retrying { .. } => "retrying",
            ChunkState::Succeeded { .. } => "succeeded",
            ChunkState::PermanentlyFailed { .. } => "permanently-failed",
            ChunkState::Cancelled { .. } => "cancelled",
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("chunk {index}: cannot {event} while {state}")]
pub struct InvalidTransition {
    pub index: usize,
    pub event: &'static str,
    pub state: &'static str,
}

/// Outcome of a single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientFailure(TransportError),
    PermanentFailure(TransportError),
}

impl From<Result<(), TransportError>> for AttemptOutcome {
    fn from(result: Result<(), TransportError>) -> Self {
        match result {
            Ok(()) => AttemptOutcome::Success,
            Err(e) => match e.kind() {
                FailureKind::Transient => AttemptOutcome::TransientFailure(e),
                FailureKind::Permanent => AttemptOutcome::PermanentFailure(e),
            },
        }
    }
}

/// One transmission attempt of one chunk
#[derive(Debug, Clone)]
pub struct ChunkAttempt {
    pub span: ChunkSpan,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub latency: Duration,
}

impl ChunkAttempt {
    fn log(&self) {
        let latency_ms = self.latency.as_millis() as u64;
        match &self.outcome {
            AttemptOutcome::Success => debug!(
                chunk = self.span.index,
                attempt = self.attempt,
                latency_ms,
                "Chunk uploaded"
            ),
            AttemptOutcome::TransientFailure(e) => warn!(
                chunk = self.span.index,
                attempt = self.attempt,
                latency_ms,
                error = %e,
                "Chunk attempt failed (transient)"
            ),
            AttemptOutcome::PermanentFailure(e) => warn!(
                chunk = self.span.index,
                attempt = self.attempt,
                latency_ms,
                error = %e,
                "Chunk attempt failed (permanent)"
            ),
        }
    }
}

/// State machine for one chunk
#[derive(Debug)]
pub struct ChunkMachine {
    span: ChunkSpan,
    state: ChunkState,
    last_error: Option<String>,
}

impl ChunkMachine {
    pub fn new(span: ChunkSpan) -> Self {
        Self {
            span,
            state: ChunkState::Pending,
            last_error: None,
        }
    }

    pub fn span(&self) -> ChunkSpan {
        self.span
    }

    pub fn state(&self) -> &ChunkState {
        &self.state
    }

    /// Backoff to sleep before the next attempt, if the chunk is retrying
    pub fn pending_delay(&self) -> Option<Duration> {
        match self.state {
            ChunkState::Retrying { delay, .. } => Some(delay),
            _ => None,
        }
    }

    fn invalid(&self, event: &'static str) -> InvalidTransition {
        InvalidTransition {
            index: self.span.index,
            event,
            state: self.state.name(),
        }
    }

    /// `Pending | Retrying -> Attempting`. Returns the new attempt number.
    pub fn begin_attempt(&mut self) -> Result<u32, InvalidTransition> {
        let attempt = match self.state {
            ChunkState::Pending => 1,
            ChunkState::Retrying { attempt, .. } => attempt + 1,
            _ => return Err(self.invalid("begin attempt")),
        };
        self.state = ChunkState::Attempting { attempt };
        Ok(attempt)
    }

    /// Fold an attempt's outcome into the state.
    ///
    /// A transient failure retries until `policy.max_attempts()` attempts have
    /// been made; a permanent failure ends the chunk immediately.
    pub fn record(
        &mut self,
        attempt: ChunkAttempt,
        policy: &RetryPolicy,
    ) -> Result<&ChunkState, InvalidTransition> {
        let current = match self.state {
            ChunkState::Attempting { attempt } => attempt,
            _ => return Err(self.invalid("record attempt")),
        };
        if attempt.attempt != current {
            return Err(self.invalid("record stale attempt"));
        }
        attempt.log();

        self.state = match attempt.outcome {
            AttemptOutcome::Success => ChunkState::Succeeded { attempts: current },
            AttemptOutcome::PermanentFailure(e) => {
                self.last_error = Some(e.to_string());
                ChunkState::PermanentlyFailed { attempts: current }
            }
            AttemptOutcome::TransientFailure(e) if current >= policy.max_attempts() => {
                self.last_error = Some(format!("gave up after {current} attempts: {e}"));
                ChunkState::PermanentlyFailed { attempts: current }
            }
            AttemptOutcome::TransientFailure(e) => {
                let delay = policy.next_delay(current, e.retry_after());
                debug!(
                    chunk = self.span.index,
                    attempt = current,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying chunk after backoff"
                );
                self.last_error = Some(e.to_string());
                ChunkState::Retrying {
                    attempt: current,
                    delay,
                }
            }
        };

        Ok(&self.state)
    }

    /// Move any non-terminal state to `Cancelled`. Returns false if already terminal.
    pub fn cancel(&mut self, reason: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let attempts = self.state.attempts();
        self.last_error = Some(reason.into());
        self.state = ChunkState::Cancelled { attempts };
        true
    }

    /// Final report. Non-terminal states are reported as cancelled.
    pub fn into_report(self) -> ChunkReport {
        let outcome = match self.state {
            ChunkState::Succeeded { .. } => ChunkOutcome::Succeeded,
            ChunkState::PermanentlyFailed { .. } => ChunkOutcome::Failed,
            _ => ChunkOutcome::Cancelled,
        };
        let last_error = match outcome {
            ChunkOutcome::Succeeded => None,
            _ => self.last_error,
        };

        ChunkReport {
            index: self.span.index,
            offset: self.span.offset,
            len: self.span.len,
            attempts: self.state.attempts(),
            outcome,
            last_error,
        }
    }
}
