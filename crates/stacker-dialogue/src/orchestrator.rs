//! Slot-filling turn logic.
//!
//! The orchestrator decides what a message or button tap means for the
//! chat's pending request and returns a [`Step`]. It performs no I/O: the
//! engine sends the message carried by the step and writes the request back
//! to the session store only after that.
//!
//! Text with a pending request is tried, in order, as: cancel word, yes/no
//! while confirming, a new creation command, a mid-flow edit, and finally
//! the answer to the first missing slot.

use std::sync::Arc;

use chrono::NaiveDate;
use stacker_core::types::{ChatId, UserId};
use tracing::{debug, info};

use crate::cache::{CachedProject, UserSnapshot};
use crate::edit::{detect_edit, EditCommand};
use crate::error::DialogueError;
use crate::intent::{HandlerRegistry, IntentHandler, PatternSet};
use crate::lifecycle::Phase;
use crate::normalizer::amount::format_rupiah;
use crate::normalizer::date::format_human;
use crate::normalizer::keywords::{
    format_minutes, is_cancel, is_confirm_no, is_confirm_yes, is_skip,
};
use crate::normalizer::{EntityNormalizer, ExtractedEntities, NormalizeContext, SynonymTable};
use crate::prompts::{self, CONFIRM_HINT};
use crate::types::{
    Category, Intent, OutboundMessage, PendingRequest, Slot, SlotData, SlotValue, TransactionKind,
};

/// Who is talking and what is known about them this turn.
#[derive(Clone, Copy)]
pub struct Turn<'a> {
    pub chat_id: ChatId,
    pub user_id: &'a UserId,
    pub snapshot: &'a UserSnapshot,
    pub today: NaiveDate,
}

/// Outcome of one turn.
#[derive(Debug)]
pub enum Step {
    /// Store the request and ask the message's question.
    Ask {
        request: PendingRequest,
        message: OutboundMessage,
    },
    /// Store the request, now confirming, and show the summary.
    Confirm {
        request: PendingRequest,
        message: OutboundMessage,
    },
    Accept,
    Reject,
    Cancel,
    /// A read-only intent, answered from the snapshot.
    Query(Intent),
    /// A button for a request that no longer wants it.
    Stale,
    NotUnderstood,
}

pub struct Orchestrator {
    registry: Arc<HandlerRegistry>,
    normalizer: Arc<dyn EntityNormalizer>,
    patterns: PatternSet,
    synonyms: Arc<SynonymTable>,
}

/// Optional text slots a skip word may fill.
fn skippable(intent: Intent, slot: Slot) -> bool {
    match slot {
        Slot::Note => intent != Intent::LogProgress,
        Slot::Link | Slot::LinkTitle => true,
        _ => false,
    }
}

/// How a filled value reads back to the user.
fn display_value(value: &SlotData) -> String {
    match value {
        SlotData::Text(text) => text.clone(),
        SlotData::Amount(amount) => format_rupiah(*amount),
        SlotData::Date(date) => format_human(*date),
        SlotData::Percent(percent) => format!("{}%", percent),
        SlotData::Minutes(minutes) => format_minutes(*minutes),
        SlotData::Flag(true) => "ya".to_string(),
        SlotData::Flag(false) => "tidak".to_string(),
    }
}

impl Orchestrator {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        normalizer: Arc<dyn EntityNormalizer>,
        synonyms: Arc<SynonymTable>,
    ) -> Self {
        Self {
            registry,
            normalizer,
            patterns: PatternSet::new(),
            synonyms,
        }
    }

    fn context<'a>(&'a self, intent: Intent, turn: &Turn<'a>) -> NormalizeContext<'a> {
        NormalizeContext {
            intent,
            today: turn.today,
            courses: &turn.snapshot.courses,
            projects: &turn.snapshot.projects,
            synonyms: &self.synonyms,
        }
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// A text message, with or without a pending request.
    pub fn handle_text(
        &self,
        pending: Option<PendingRequest>,
        turn: &Turn<'_>,
        text: &str,
    ) -> Result<Step, DialogueError> {
        let Some(request) = pending else {
            return self.handle_fresh(turn, text);
        };

        if is_cancel(text) {
            return Ok(Step::Cancel);
        }
        if request.is_confirming() {
            if is_confirm_yes(text) {
                return Ok(Step::Accept);
            }
            if is_confirm_no(text) {
                return Ok(Step::Reject);
            }
        }
        if let Some(command) = self.patterns.interrupting(text) {
            if command.intent.fills_slots() {
                info!(
                    chat_id = %turn.chat_id,
                    replaced = %request.intent(),
                    intent = %command.intent,
                    exit = %Phase::Cancelled,
                    "Pending request replaced by a new command"
                );
                return self.start(turn, command.intent, text);
            }
        }

        let handler = self.registry.require(request.intent())?;
        if let Some(edit) = detect_edit(text, request.intent()) {
            match edit {
                EditCommand::Slot { slot, value } if handler.accepts(slot) => {
                    return self.edit(handler.as_ref(), request, turn, slot, &value);
                }
                EditCommand::SwitchKind(kind) if request.intent().is_transaction() => {
                    return self.switch_kind(request, kind);
                }
                other => debug!(chat_id = %turn.chat_id, edit = ?other, "Edit does not apply to this request"),
            }
        }

        match request.next_missing() {
            Some(slot) => self.answer(handler.as_ref(), request, turn, slot, text),
            None => {
                let message = prompts::with_prefix(
                    CONFIRM_HINT,
                    prompts::confirmation(handler.build_summary(&request)),
                );
                Ok(Step::Confirm { request, message })
            }
        }
    }

    /// A slot button tap.
    pub fn handle_button(
        &self,
        pending: Option<PendingRequest>,
        turn: &Turn<'_>,
        slot: Slot,
        value: &str,
    ) -> Result<Step, DialogueError> {
        let Some(request) = pending else {
            return Err(DialogueError::SessionExpired);
        };
        let handler = self.registry.require(request.intent())?;

        if request.next_missing() == Some(slot) {
            self.answer(handler.as_ref(), request, turn, slot, value)
        } else if handler.accepts(slot) {
            self.edit(handler.as_ref(), request, turn, slot, value)
        } else {
            debug!(chat_id = %turn.chat_id, slot = %slot, intent = %request.intent(), "Stale slot button");
            Ok(Step::Stale)
        }
    }

    /// Begin a new request for `intent`, taking whatever the text already says.
    pub fn start(&self, turn: &Turn<'_>, intent: Intent, text: &str) -> Result<Step, DialogueError> {
        let ctx = self.context(intent, turn);
        let extracted = self.normalizer.extract(text, &ctx);
        self.start_with(turn, intent, text, &extracted)
    }

    /// Begin logging progress for a project picked from a list.
    pub fn start_progress(
        &self,
        turn: &Turn<'_>,
        project: &CachedProject,
    ) -> Result<Step, DialogueError> {
        let mut extracted = ExtractedEntities::default();
        extracted.insert(
            Slot::Project,
            SlotValue::text(project.title.clone()).resolved(Some(project.id.to_string())),
        );
        let raw = format!("progress {}", project.title);
        self.start_with(turn, Intent::LogProgress, &raw, &extracted)
    }

    fn handle_fresh(&self, turn: &Turn<'_>, text: &str) -> Result<Step, DialogueError> {
        if is_cancel(text) {
            return Ok(Step::Cancel);
        }
        // a "ya" with nothing to confirm answers a request that is gone
        if is_confirm_yes(text) {
            return Err(DialogueError::SessionExpired);
        }
        match self.patterns.best(text) {
            Some(found) if found.intent.fills_slots() => self.start(turn, found.intent, text),
            Some(found) => {
                debug!(chat_id = %turn.chat_id, intent = %found.intent, confidence = found.confidence, "Read-only intent");
                Ok(Step::Query(found.intent))
            }
            None => {
                debug!(chat_id = %turn.chat_id, "No intent matched");
                Ok(Step::NotUnderstood)
            }
        }
    }

    fn start_with(
        &self,
        turn: &Turn<'_>,
        intent: Intent,
        text: &str,
        extracted: &ExtractedEntities,
    ) -> Result<Step, DialogueError> {
        let handler = self.registry.require(intent)?;
        let seed = handler.compute_initial_slots(extracted);

        let mut request = PendingRequest::new(turn.chat_id, turn.user_id.clone(), intent, text);
        request.queue(seed.missing.iter().copied());
        let prefilled = seed.filled.len();
        for (slot, value) in seed.filled {
            self.fill(handler.as_ref(), &mut request, slot, value);
        }

        info!(
            chat_id = %turn.chat_id,
            intent = %intent,
            prefilled,
            missing = request.missing().len(),
            "Pending request created"
        );
        self.advance(handler.as_ref(), request, None)
    }

    // =========================================================================
    // Filling
    // =========================================================================

    /// Normalize an answer for `slot` and check it against the request.
    fn resolve(
        &self,
        handler: &dyn IntentHandler,
        request: &PendingRequest,
        turn: &Turn<'_>,
        slot: Slot,
        text: &str,
    ) -> Result<SlotValue, DialogueError> {
        let value = if is_skip(text) && skippable(request.intent(), slot) {
            SlotValue::skipped(text.trim())
        } else {
            let ctx = self.context(request.intent(), turn);
            self.normalizer.normalize_slot(slot, text, &ctx)?
        };
        handler.validate_fill(request, slot, &value)?;
        Ok(value)
    }

    fn fill(
        &self,
        handler: &dyn IntentHandler,
        request: &mut PendingRequest,
        slot: Slot,
        value: SlotValue,
    ) {
        request.fill(slot, value.clone());
        handler.on_slot_filled(request, slot, &value);
    }

    /// Answer to the slot currently being asked.
    fn answer(
        &self,
        handler: &dyn IntentHandler,
        mut request: PendingRequest,
        turn: &Turn<'_>,
        slot: Slot,
        text: &str,
    ) -> Result<Step, DialogueError> {
        match self.resolve(handler, &request, turn, slot, text) {
            Ok(value) => {
                debug!(chat_id = %turn.chat_id, slot = %slot, "Slot filled");
                self.fill(handler, &mut request, slot, value);
                self.advance(handler, request, None)
            }
            Err(DialogueError::Validation { reason, .. }) => {
                debug!(chat_id = %turn.chat_id, slot = %slot, reason = %reason, "Answer rejected");
                self.advance(handler, request, Some(prompts::guidance(&reason)))
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite a slot in place, wherever the request is.
    fn edit(
        &self,
        handler: &dyn IntentHandler,
        mut request: PendingRequest,
        turn: &Turn<'_>,
        slot: Slot,
        text: &str,
    ) -> Result<Step, DialogueError> {
        match self.resolve(handler, &request, turn, slot, text) {
            Ok(value) => {
                let shown = display_value(&value.value);
                self.fill(handler, &mut request, slot, value);
                info!(chat_id = %turn.chat_id, intent = %request.intent(), slot = %slot, "Slot edited");
                // A handler that consumed the slot (the link loop) has
                // reopened a question; the question is the reply.
                let ack = request
                    .is_filled(slot)
                    .then(|| format!("✏️ Oke, {} udah kuganti jadi {}!", slot.label(), shown));
                self.advance(handler, request, ack)
            }
            Err(DialogueError::Validation { reason, .. }) => {
                self.advance(handler, request, Some(prompts::guidance(&reason)))
            }
            Err(e) => Err(e),
        }
    }

    /// Turn an expense into income or back. A category that does not fit the
    /// new kind is asked again.
    fn switch_kind(
        &self,
        mut request: PendingRequest,
        kind: TransactionKind,
    ) -> Result<Step, DialogueError> {
        let target = match kind {
            TransactionKind::Income => Intent::AddIncome,
            TransactionKind::Expense => Intent::AddExpense,
        };
        let allowed: &[Category] = match kind {
            TransactionKind::Income => &Category::INCOME_CHOICES,
            TransactionKind::Expense => &Category::EXPENSE_CHOICES,
        };

        if request.intent() != target {
            request.set_intent(target);
            let fits = request
                .get(Slot::Category)
                .and_then(|v| v.value.as_text())
                .and_then(|t| t.parse::<Category>().ok())
                .map_or(true, |c| allowed.contains(&c));
            if !fits {
                request.unfill(Slot::Category);
                request.inject_front(Slot::Category);
            }
            info!(chat_id = %request.chat_id(), intent = %target, "Transaction kind switched");
        }

        let handler = self.registry.require(target)?;
        let ack = match kind {
            TransactionKind::Income => "✏️ Oke, jadi pemasukan ya!",
            TransactionKind::Expense => "✏️ Oke, jadi pengeluaran ya!",
        };
        self.advance(handler.as_ref(), request, Some(ack.to_string()))
    }

    /// Ask for the next missing slot, or confirm when nothing is missing.
    fn advance(
        &self,
        handler: &dyn IntentHandler,
        mut request: PendingRequest,
        prefix: Option<String>,
    ) -> Result<Step, DialogueError> {
        let decorate = |message: OutboundMessage| match &prefix {
            Some(prefix) => prompts::with_prefix(prefix, message),
            None => message,
        };

        match request.next_missing() {
            Some(slot) => {
                let message = decorate(prompts::slot_prompt(&request, slot, &self.synonyms));
                Ok(Step::Ask { request, message })
            }
            None => {
                request.begin_confirmation()?;
                let message = decorate(prompts::confirmation(handler.build_summary(&request)));
                Ok(Step::Confirm { request, message })
            }
        }
    }
}
