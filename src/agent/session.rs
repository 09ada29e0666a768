use super::ledger::{Step, StepLedger};
use serde::Serialize;
use std::time::Instant;
use strum::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where the loop currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Thinking,
    Acting,
    Done,
    Error,
}

/// Per-run loop state. Exactly one lives inside an [`AgentLoop`]; starting
/// a new run replaces it and cancels the previous run's token.
///
/// [`AgentLoop`]: super::controller::AgentLoop
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub ledger: StepLedger,
    pub status: SessionStatus,
    pub iteration: u32,
    started_at: Instant,
    cancel: CancellationToken,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ledger: StepLedger::new(),
            status: SessionStatus::Idle,
            iteration: 0,
            started_at: Instant::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Read-only view for external trace consumers.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            steps: self.ledger.steps().to_vec(),
            status: self.status,
            iteration: self.iteration,
            elapsed_ms: self.elapsed_ms(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the live session, safe to hand across threads.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub steps: Vec<Step>,
    pub status: SessionStatus,
    pub iteration: u32,
    pub elapsed_ms: u64,
}
