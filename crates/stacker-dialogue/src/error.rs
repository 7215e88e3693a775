//! Error types for the dialogue engine.

use stacker_core::error::StackerError;

use crate::lifecycle::Phase;
use crate::types::Slot;

/// Errors raised while handling a chat update.
///
/// Only `Internal` (and anything that escapes a turn unexpectedly) reaches
/// the user as a generic apology; the other variants have their own short
/// user-facing replies.
#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("session expired or not found")]
    SessionExpired,
    #[error("invalid value for {slot}: {reason}")]
    Validation { slot: Slot, reason: String },
    #[error("no match for reference: {0}")]
    ResolutionMiss(String),
    #[error("broadcast failed: {0}")]
    Broadcast(String),
    #[error("local cache error: {0}")]
    Cache(String),
    #[error("chat transport error: {0}")]
    Transport(String),
    #[error("no handler registered for intent: {0}")]
    UnknownIntent(String),
    #[error("invalid session transition: {0} -> {1}")]
    InvalidTransition(Phase, Phase),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DialogueError {
    pub fn validation(slot: Slot, reason: impl Into<String>) -> Self {
        DialogueError::Validation {
            slot,
            reason: reason.into(),
        }
    }
}

impl From<StackerError> for DialogueError {
    fn from(err: StackerError) -> Self {
        DialogueError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for DialogueError {
    fn from(err: serde_json::Error) -> Self {
        DialogueError::Cache(err.to_string())
    }
}
