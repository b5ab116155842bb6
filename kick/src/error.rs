//! Kick error types.

use thiserror::Error;

use crate::fence::FenceHandle;

/// Errors reported by a fence backend while translating external fences.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenceError {
    /// The configured backend cannot handle this kind of fence.
    #[error("fence kind not supported by the configured backend")]
    Unsupported,
    /// The backend does not know the given fence.
    #[error("unknown fence {0:?}")]
    UnknownFence(FenceHandle),
    /// The backend failed internally.
    #[error("fence backend failure: {0}")]
    Backend(String),
}

/// Result reported by the scheduler collaborator when it rejects a command.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The command queue is temporarily full.
    #[error("command queue full, retry later")]
    Retry,
    /// Any other scheduler failure, carrying the scheduler's error code.
    #[error("scheduler failed with code {0}")]
    Failed(u32),
}

/// Errors that can occur while building and submitting a kick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KickError {
    /// The kick request is malformed. Nothing was mutated.
    #[error("invalid kick parameters: {0}")]
    InvalidParams(String),
    /// External fences could not be turned into tickets. Every ticket taken
    /// for this kick has been rolled back.
    #[error("fence resolution failed after {tickets_taken} source tickets ({rolled_back} rolled back): {source}")]
    FenceResolution {
        /// The backend error.
        source: FenceError,
        /// Source tickets the fence adapter had taken before failing.
        tickets_taken: usize,
        /// Total tickets given back for this kick.
        rolled_back: usize,
    },
    /// The scheduler could not accept the command right now. All tickets
    /// have been rolled back; resubmit the same request later.
    #[error("scheduler busy, kick rolled back")]
    Retry,
    /// The scheduler rejected the command. Tickets are left taken.
    #[error("kick submission failed with code {code}")]
    Fatal {
        /// Scheduler error code.
        code: u32,
    },
    /// The command was queued but processing of non-blocking fences failed
    /// afterwards.
    #[error("deferred fence processing failed: {0}")]
    DeferredFence(FenceError),
}

impl KickError {
    /// Whether the caller is expected to resubmit the same request.
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry)
    }
}

/// Convenience result alias for kick operations.
pub type KickResult<T> = Result<T, KickError>;
