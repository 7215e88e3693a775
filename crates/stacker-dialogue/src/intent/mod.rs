//! Intent detection and per-intent handlers.
//!
//! Every slot-filling intent has one [`IntentHandler`] that declares its
//! slots, reacts to fills that change what is still needed, renders the
//! confirmation summary and turns a complete request into a domain event.

pub mod patterns;
pub mod progress;
pub mod project;
pub mod query;
pub mod task;
pub mod transaction;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use stacker_core::events::DomainEvent;

use crate::cache::CacheMutation;
use crate::error::DialogueError;
use crate::normalizer::ExtractedEntities;
use crate::types::{Intent, PendingRequest, Slot, SlotData, SlotValue, TransactionKind};

pub use patterns::{PatternMatch, PatternSet};

/// Initial split of an intent's slots after extraction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotSeed {
    pub filled: Vec<(Slot, SlotValue)>,
    /// In the order they will be asked.
    pub missing: Vec<Slot>,
}

/// What `execute` needs besides the request.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub today: NaiveDate,
    /// Channel tag put on every event.
    pub source: String,
}

/// Result of executing a confirmed request.
#[derive(Clone, Debug)]
pub struct Execution {
    pub event: DomainEvent,
    pub mutations: Vec<CacheMutation>,
    pub success_text: String,
}

/// Behavior of one slot-filling intent.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    fn intent(&self) -> Intent;

    /// Slots asked in this order when not extracted from the first message.
    fn required_slots(&self) -> &'static [Slot];

    /// Slots that are never asked but may be set through an edit, or that a
    /// fill injects later.
    fn optional_slots(&self) -> &'static [Slot] {
        &[]
    }

    /// Whether `slot` belongs to this intent at all.
    fn accepts(&self, slot: Slot) -> bool {
        self.required_slots().contains(&slot) || self.optional_slots().contains(&slot)
    }

    /// Take extracted values for this intent's slots; everything else
    /// required is missing in declared order.
    fn compute_initial_slots(&self, extracted: &ExtractedEntities) -> SlotSeed {
        let mut seed = SlotSeed::default();
        for slot in self.required_slots().iter().chain(self.optional_slots()) {
            if let Some(value) = extracted.get(*slot) {
                seed.filled.push((*slot, value.clone()));
            } else if self.required_slots().contains(slot) {
                seed.missing.push(*slot);
            }
        }
        seed
    }

    /// Reject a value that is well-formed but does not fit the rest of the
    /// request. The orchestrator re-asks the slot with the error as guidance.
    fn validate_fill(
        &self,
        _request: &PendingRequest,
        _slot: Slot,
        _value: &SlotValue,
    ) -> Result<(), DialogueError> {
        Ok(())
    }

    /// Hook run after every fill, including edits and initial extraction.
    fn on_slot_filled(&self, _request: &mut PendingRequest, _slot: Slot, _value: &SlotValue) {}

    fn build_summary(&self, request: &PendingRequest) -> String;

    async fn execute(
        &self,
        request: &PendingRequest,
        ctx: &ExecutionContext,
    ) -> Result<Execution, DialogueError>;
}

// =============================================================================
// Registry
// =============================================================================

/// Handler lookup by intent.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<Intent, Arc<dyn IntentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in slot-filling handler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(transaction::TransactionHandler::new(
            TransactionKind::Expense,
        )));
        registry.register(Arc::new(transaction::TransactionHandler::new(
            TransactionKind::Income,
        )));
        registry.register(Arc::new(task::TaskHandler));
        registry.register(Arc::new(project::ProjectHandler));
        registry.register(Arc::new(progress::ProgressHandler));
        registry
    }

    /// Register a handler, replacing any previous one for the same intent.
    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        self.handlers.insert(handler.intent(), handler);
    }

    pub fn get(&self, intent: Intent) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.get(&intent).cloned()
    }

    /// Like `get`, but a missing handler is an error.
    pub fn require(&self, intent: Intent) -> Result<Arc<dyn IntentHandler>, DialogueError> {
        self.get(intent)
            .ok_or_else(|| DialogueError::UnknownIntent(intent.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// =============================================================================
// Slot accessors shared by handlers
// =============================================================================

fn missing_slot(request: &PendingRequest, slot: Slot) -> DialogueError {
    DialogueError::Internal(format!(
        "{} request executed without a usable {}",
        request.intent(),
        slot
    ))
}

pub(crate) fn text_of(request: &PendingRequest, slot: Slot) -> Result<&str, DialogueError> {
    request
        .get(slot)
        .and_then(|v| v.value.as_text())
        .ok_or_else(|| missing_slot(request, slot))
}

/// Text of an optional slot; absent or skipped gives `None`.
pub(crate) fn optional_text(request: &PendingRequest, slot: Slot) -> Option<&str> {
    request
        .get(slot)
        .filter(|v| !v.is_skipped())
        .and_then(|v| v.value.as_text())
        .filter(|t| !t.trim().is_empty())
}

pub(crate) fn amount_of(request: &PendingRequest, slot: Slot) -> Result<i64, DialogueError> {
    request
        .get(slot)
        .and_then(|v| v.value.as_amount())
        .ok_or_else(|| missing_slot(request, slot))
}

pub(crate) fn date_of(request: &PendingRequest, slot: Slot) -> Result<NaiveDate, DialogueError> {
    request
        .get(slot)
        .and_then(|v| v.value.as_date())
        .ok_or_else(|| missing_slot(request, slot))
}

pub(crate) fn data_of(request: &PendingRequest, slot: Slot) -> Result<&SlotData, DialogueError> {
    request
        .get(slot)
        .map(|v| &v.value)
        .ok_or_else(|| missing_slot(request, slot))
}

/// Summary line for an optional text slot.
pub(crate) fn display_optional(request: &PendingRequest, slot: Slot) -> String {
    optional_text(request, slot).unwrap_or("-").to_string()
}
