//! Pending request lifecycle with validated transitions.
//!
//! Collecting <-> Confirming while the request is alive, then exactly one
//! terminal exit: Executed (accept), Cancelled (cancel keyword or reject)
//! or Expired (inactivity).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DialogueError;

/// Live sub-state of a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubState {
    Collecting,
    Confirming,
}

/// Every phase a request can be in, including terminal exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collecting,
    Confirming,
    Executed,
    Cancelled,
    Expired,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Executed | Phase::Cancelled | Phase::Expired)
    }
}

impl From<SubState> for Phase {
    fn from(state: SubState) -> Self {
        match state {
            SubState::Collecting => Phase::Collecting,
            SubState::Confirming => Phase::Confirming,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Collecting => write!(f, "collecting"),
            Phase::Confirming => write!(f, "confirming"),
            Phase::Executed => write!(f, "executed"),
            Phase::Cancelled => write!(f, "cancelled"),
            Phase::Expired => write!(f, "expired"),
        }
    }
}

/// Validate that a phase transition is allowed.
///
/// Valid transitions:
/// - Collecting -> Collecting (slot filled, more missing)
/// - Collecting -> Confirming (last missing slot filled)
/// - Confirming -> Confirming (edit while awaiting accept)
/// - Confirming -> Collecting (a slot was re-opened, e.g. another link)
/// - Confirming -> Executed
/// - Collecting | Confirming -> Cancelled
/// - Collecting | Confirming -> Expired
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), DialogueError> {
    let valid = matches!(
        (from, to),
        (Phase::Collecting, Phase::Collecting)
            | (Phase::Collecting, Phase::Confirming)
            | (Phase::Confirming, Phase::Confirming)
            | (Phase::Confirming, Phase::Collecting)
            | (Phase::Confirming, Phase::Executed)
            | (Phase::Collecting, Phase::Cancelled)
            | (Phase::Confirming, Phase::Cancelled)
            | (Phase::Collecting, Phase::Expired)
            | (Phase::Confirming, Phase::Expired)
    );

    if valid {
        Ok(())
    } else {
        Err(DialogueError::InvalidTransition(from, to))
    }
}
