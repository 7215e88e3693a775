//! Update dispatch.
//!
//! [`DialogueEngine::handle_update`] is the single entry point for chat
//! updates. Updates for the same chat are serialized; different chats run
//! concurrently. Every error is turned into a short reply here, so nothing
//! escapes to the transport loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use stacker_core::config::StackerConfig;
use stacker_core::events::DEFAULT_SOURCE;
use stacker_core::types::{ChatId, MessageId, UserId};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broadcast::Broadcaster;
use crate::cache::{LocalCache, UserSnapshot};
use crate::callback::CallbackAction;
use crate::chat::ChatClient;
use crate::confirmation::{ConfirmationEngine, BROADCAST_TIMEOUT};
use crate::error::DialogueError;
use crate::intent::query::{self, QueryResponder};
use crate::intent::{ExecutionContext, HandlerRegistry};
use crate::lifecycle::Phase;
use crate::normalizer::{EntityNormalizer, RuleBasedNormalizer, SynonymTable};
use crate::orchestrator::{Orchestrator, Step, Turn};
use crate::prompts::{self, APOLOGY_TEXT, CANCELLED_TEXT, EXPIRED_TEXT, FALLBACK_TEXT, NOT_FOUND_TEXT};
use crate::session::{ChatLocks, SessionStore};
use crate::types::{OutboundMessage, PendingRequest, TaskStatus, Update};

/// Toast shown for a button whose request has moved on.
const STALE_TOAST: &str = "Tombol ini udah nggak berlaku.";

/// Engine knobs, usually taken from [`StackerConfig`].
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Origin tag stamped on every event.
    pub source: String,
    pub max_message_length: usize,
    pub transactions_per_page: usize,
    /// Upper bound on a broadcast before the request completes offline.
    pub broadcast_timeout: Duration,
    /// Fixed "today" for relative dates. `None` uses the local clock.
    pub today: Option<NaiveDate>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            max_message_length: 2000,
            transactions_per_page: 5,
            broadcast_timeout: BROADCAST_TIMEOUT,
            today: None,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &StackerConfig) -> Self {
        Self {
            source: config.broadcast.source_tag.clone(),
            max_message_length: config.dialogue.max_message_length,
            transactions_per_page: config.dialogue.transactions_per_page,
            broadcast_timeout: Duration::from_millis(config.broadcast.timeout_ms),
            today: None,
        }
    }
}

/// Collaborators the engine talks to.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<dyn SessionStore>,
    pub cache: Arc<dyn LocalCache>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub chat: Arc<dyn ChatClient>,
}

pub struct DialogueEngine {
    settings: EngineSettings,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<dyn LocalCache>,
    chat: Arc<dyn ChatClient>,
    orchestrator: Orchestrator,
    confirmation: ConfirmationEngine,
    responder: QueryResponder,
    locks: ChatLocks,
}

impl DialogueEngine {
    /// Engine with the built-in handlers and the rule-based normalizer.
    pub fn new(settings: EngineSettings, services: Services, synonyms: SynonymTable) -> Self {
        Self::with_parts(
            settings,
            services,
            synonyms,
            Arc::new(HandlerRegistry::with_defaults()),
            Arc::new(RuleBasedNormalizer::new()),
        )
    }

    pub fn with_parts(
        settings: EngineSettings,
        services: Services,
        synonyms: SynonymTable,
        registry: Arc<HandlerRegistry>,
        normalizer: Arc<dyn EntityNormalizer>,
    ) -> Self {
        let confirmation = ConfirmationEngine::new(
            registry.clone(),
            services.sessions.clone(),
            services.broadcaster,
            services.cache.clone(),
            services.chat.clone(),
            settings.source.clone(),
        )
        .with_broadcast_timeout(settings.broadcast_timeout);
        Self {
            responder: QueryResponder::new(settings.transactions_per_page),
            orchestrator: Orchestrator::new(registry, normalizer, Arc::new(synonyms)),
            confirmation,
            sessions: services.sessions,
            cache: services.cache,
            chat: services.chat,
            locks: ChatLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn today(&self) -> NaiveDate {
        self.settings
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn execution_context(&self) -> ExecutionContext {
        ExecutionContext {
            today: self.today(),
            source: self.settings.source.clone(),
        }
    }

    // =========================================================================
    // Entry point
    // =========================================================================

    /// Handle one inbound update to completion.
    pub async fn handle_update(&self, update: Update) {
        let chat_id = update.chat_id();
        let lock = match self.locks.for_chat(chat_id) {
            Ok(lock) => lock,
            Err(e) => {
                self.report(chat_id, e).await;
                return;
            }
        };

        {
            let _turn = lock.lock().await;
            let result = match update {
                Update::Message {
                    chat_id,
                    user_id,
                    message_id,
                    text,
                } => self.on_message(chat_id, &user_id, message_id, &text).await,
                Update::Callback {
                    chat_id,
                    user_id,
                    callback_id,
                    message_id,
                    data,
                } => {
                    self.on_callback(chat_id, &user_id, &callback_id, message_id, &data)
                        .await
                }
            };
            if let Err(e) = result {
                self.report(chat_id, e).await;
            }
        }

        drop(lock);
        self.locks.prune();
    }

    /// Reply to an error that ended a turn.
    async fn report(&self, chat_id: ChatId, err: DialogueError) {
        let text = match &err {
            DialogueError::SessionExpired => {
                debug!(chat_id = %chat_id, exit = %Phase::Expired, "No live request");
                EXPIRED_TEXT.to_string()
            }
            DialogueError::ResolutionMiss(what) => {
                debug!(chat_id = %chat_id, what = %what, "Referenced record not found");
                NOT_FOUND_TEXT.to_string()
            }
            DialogueError::Validation { reason, .. } => prompts::guidance(reason),
            other => {
                error!(chat_id = %chat_id, error = %other, "Update failed");
                APOLOGY_TEXT.to_string()
            }
        };
        if let Err(e) = self.chat.send_message(chat_id, &OutboundMessage::text(text)).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to send error reply");
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    async fn on_message(
        &self,
        chat_id: ChatId,
        user_id: &UserId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), DialogueError> {
        let text = text.trim();
        if text.is_empty() {
            debug!(chat_id = %chat_id, message_id = %message_id, "Ignoring empty message");
            return Ok(());
        }
        let length = text.chars().count();
        if length > self.settings.max_message_length {
            info!(chat_id = %chat_id, length, "Message too long");
            let reply = prompts::too_long_text(self.settings.max_message_length);
            self.send(chat_id, OutboundMessage::text(reply)).await?;
            return Ok(());
        }

        let snapshot = self.snapshot(user_id).await;
        let pending = self.sessions.get(chat_id)?;
        let turn = Turn {
            chat_id,
            user_id,
            snapshot: &snapshot,
            today: self.today(),
        };
        let step = self.orchestrator.handle_text(pending.clone(), &turn, text)?;
        self.apply(step, pending, &turn, text).await
    }

    /// Carry out what the orchestrator decided.
    async fn apply(
        &self,
        step: Step,
        previous: Option<PendingRequest>,
        turn: &Turn<'_>,
        text: &str,
    ) -> Result<(), DialogueError> {
        let chat_id = turn.chat_id;
        match step {
            Step::Ask { request, message } => {
                self.present(request, message, false, previous.as_ref()).await
            }
            Step::Confirm { request, message } => {
                self.present(request, message, true, previous.as_ref()).await
            }
            Step::Accept => self.confirmation.accept(chat_id, turn.today).await.map(|_| ()),
            Step::Reject => self.confirmation.reject(chat_id).await,
            Step::Cancel => self.cancel(chat_id, previous.as_ref()).await,
            Step::Query(intent) => {
                let reply = self.responder.respond(intent, text, turn.snapshot);
                self.send(chat_id, reply).await.map(|_| ())
            }
            Step::NotUnderstood => self
                .send(chat_id, OutboundMessage::text(FALLBACK_TEXT))
                .await
                .map(|_| ()),
            Step::Stale => Ok(()),
        }
    }

    /// Send a question or summary and store the request it belongs to.
    async fn present(
        &self,
        mut request: PendingRequest,
        message: OutboundMessage,
        confirming: bool,
        previous: Option<&PendingRequest>,
    ) -> Result<(), DialogueError> {
        let chat_id = request.chat_id();
        if let Some(old) = previous.and_then(|p| p.prompt_message()) {
            self.clear_buttons(chat_id, old).await;
        }

        let sent = self.send(chat_id, message).await?;
        request.set_prompt_message(Some(sent));
        request.set_confirmation_message(confirming.then_some(sent));
        self.sessions.set(chat_id, request)
    }

    async fn cancel(
        &self,
        chat_id: ChatId,
        previous: Option<&PendingRequest>,
    ) -> Result<(), DialogueError> {
        self.sessions.clear(chat_id)?;
        if let Some(request) = previous {
            info!(chat_id = %chat_id, intent = %request.intent(), exit = %Phase::Cancelled, "Request cancelled");
            if let Some(old) = request.prompt_message() {
                self.clear_buttons(chat_id, old).await;
            }
        }
        self.send(chat_id, OutboundMessage::text(CANCELLED_TEXT))
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Buttons
    // =========================================================================

    async fn on_callback(
        &self,
        chat_id: ChatId,
        user_id: &UserId,
        callback_id: &str,
        message_id: Option<MessageId>,
        data: &str,
    ) -> Result<(), DialogueError> {
        let action = CallbackAction::parse(data);
        debug!(chat_id = %chat_id, action = ?action, "Callback");

        let result = self.dispatch(chat_id, user_id, message_id, action).await;
        let toast = match &result {
            Ok(toast) => *toast,
            Err(_) => None,
        };
        if let Err(e) = self.chat.answer_callback(callback_id, toast).await {
            debug!(chat_id = %chat_id, error = %e, "Could not answer callback");
        }
        result.map(|_| ())
    }

    /// Run a button action. Returns an optional toast for the tap.
    async fn dispatch(
        &self,
        chat_id: ChatId,
        user_id: &UserId,
        message_id: Option<MessageId>,
        action: CallbackAction,
    ) -> Result<Option<&'static str>, DialogueError> {
        let today = self.today();
        match action {
            CallbackAction::Confirm => {
                self.confirmation.accept(chat_id, today).await?;
            }
            CallbackAction::Reject => self.confirmation.reject(chat_id).await?,
            CallbackAction::Cancel => {
                let previous = self.sessions.get(chat_id)?;
                self.cancel(chat_id, previous.as_ref()).await?;
            }
            CallbackAction::FillSlot { slot, value } => {
                let snapshot = self.snapshot(user_id).await;
                let pending = self.sessions.get(chat_id)?;
                let turn = Turn {
                    chat_id,
                    user_id,
                    snapshot: &snapshot,
                    today,
                };
                let step = self
                    .orchestrator
                    .handle_button(pending.clone(), &turn, slot, &value)?;
                if matches!(step, Step::Stale) {
                    return Ok(Some(STALE_TOAST));
                }
                self.apply(step, pending, &turn, &value).await?;
            }
            CallbackAction::StartProgress { project_id } => {
                let snapshot = self.snapshot(user_id).await;
                let id = parse_id(&project_id)?;
                let project = snapshot
                    .project(id)
                    .ok_or_else(|| DialogueError::ResolutionMiss(format!("project {}", id)))?;
                let pending = self.sessions.get(chat_id)?;
                let turn = Turn {
                    chat_id,
                    user_id,
                    snapshot: &snapshot,
                    today,
                };
                let step = self.orchestrator.start_progress(&turn, project)?;
                self.apply(step, pending, &turn, "").await?;
            }
            CallbackAction::TransactionPage { page, mode } => {
                let snapshot = self.snapshot(user_id).await;
                self.dismiss(chat_id, message_id).await;
                self.send(chat_id, self.responder.transactions_page(&snapshot, page, mode))
                    .await?;
            }
            CallbackAction::EditTransaction { id } => {
                let snapshot = self.snapshot(user_id).await;
                let id = parse_id(&id)?;
                let tx = snapshot
                    .transaction(id)
                    .ok_or_else(|| DialogueError::ResolutionMiss(format!("transaction {}", id)))?;
                self.send(chat_id, self.responder.transaction_detail(tx)).await?;
            }
            CallbackAction::AskDeleteTransaction { id } => {
                let snapshot = self.snapshot(user_id).await;
                let id = parse_id(&id)?;
                let tx = snapshot
                    .transaction(id)
                    .ok_or_else(|| DialogueError::ResolutionMiss(format!("transaction {}", id)))?;
                self.send(chat_id, self.responder.delete_prompt(tx)).await?;
            }
            CallbackAction::DeleteTransaction { id } => {
                let snapshot = self.snapshot(user_id).await;
                let id = parse_id(&id)?;
                let execution =
                    query::delete_transaction(&snapshot, id, user_id, &self.execution_context())?;
                self.dismiss(chat_id, message_id).await;
                info!(chat_id = %chat_id, transaction = %id, "Transaction deleted");
                self.confirmation.complete(chat_id, user_id, execution).await;
            }
            CallbackAction::EditTask { id } => {
                let snapshot = self.snapshot(user_id).await;
                let id = parse_id(&id)?;
                let task = snapshot
                    .task(id)
                    .ok_or_else(|| DialogueError::ResolutionMiss(format!("task {}", id)))?;
                self.send(chat_id, self.responder.task_status_menu(task)).await?;
            }
            CallbackAction::SetTaskStatus { id, status } => {
                let Ok(status) = status.parse::<TaskStatus>() else {
                    debug!(chat_id = %chat_id, status = %status, "Unknown task status, ignoring");
                    return Ok(None);
                };
                let snapshot = self.snapshot(user_id).await;
                let id = parse_id(&id)?;
                let execution = query::set_task_status(
                    &snapshot,
                    id,
                    status,
                    user_id,
                    &self.execution_context(),
                )?;
                self.dismiss(chat_id, message_id).await;
                info!(chat_id = %chat_id, task = %id, status = %status, "Task status changed");
                self.confirmation.complete(chat_id, user_id, execution).await;
            }
            CallbackAction::DismissTransactionAction | CallbackAction::DismissTaskEdit => {
                self.dismiss(chat_id, message_id).await;
            }
            CallbackAction::Unknown(data) => {
                debug!(chat_id = %chat_id, data = %data, "Unknown callback, ignoring");
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn snapshot(&self, user: &UserId) -> UserSnapshot {
        match self.cache.read(user).await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                warn!(user = %user, error = %e, "Cache read failed, using an empty snapshot");
                UserSnapshot::default()
            }
        }
    }

    async fn send(&self, chat_id: ChatId, message: OutboundMessage) -> Result<MessageId, DialogueError> {
        self.chat.send_message(chat_id, &message).await
    }

    async fn clear_buttons(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.chat.clear_buttons(chat_id, message_id).await {
            debug!(chat_id = %chat_id, message_id = %message_id, error = %e, "Could not clear buttons");
        }
    }

    /// Delete the message a button was tapped on.
    async fn dismiss(&self, chat_id: ChatId, message_id: Option<MessageId>) {
        let Some(message_id) = message_id else {
            return;
        };
        if let Err(e) = self.chat.delete_message(chat_id, message_id).await {
            debug!(chat_id = %chat_id, message_id = %message_id, error = %e, "Could not delete message");
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid, DialogueError> {
    Uuid::parse_str(id).map_err(|_| DialogueError::ResolutionMiss(id.to_string()))
}
