//! Accepting and rejecting a confirmed request.
//!
//! Accepting is at-most-once per pending request: the session is cleared
//! before the handler runs, so a second "ya" (or a double-tapped button)
//! finds nothing and gets the expiry reply instead of a second event.
//! The broadcast and the local cache write run side by side, and the
//! broadcast is bounded by a timeout, so a failed or slow consumer never
//! holds back the cache or the reply.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use stacker_core::types::{ChatId, UserId};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broadcast::Broadcaster;
use crate::cache::{apply_mutations, LocalCache};
use crate::chat::ChatClient;
use crate::error::DialogueError;
use crate::intent::{Execution, ExecutionContext, HandlerRegistry};
use crate::lifecycle::{validate_transition, Phase};
use crate::prompts::{CANCELLED_TEXT, OFFLINE_NOTICE};
use crate::session::SessionStore;
use crate::types::OutboundMessage;

/// Default wait for a broadcast before treating the consumer as offline.
pub const BROADCAST_TIMEOUT: Duration = Duration::from_secs(2);

/// What happened to an accepted request's event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delivered {
    pub event_id: Uuid,
    /// Whether a live consumer received the event.
    pub online: bool,
}

pub struct ConfirmationEngine {
    registry: Arc<HandlerRegistry>,
    sessions: Arc<dyn SessionStore>,
    broadcaster: Arc<dyn Broadcaster>,
    cache: Arc<dyn LocalCache>,
    chat: Arc<dyn ChatClient>,
    source: String,
    broadcast_timeout: Duration,
}

impl ConfirmationEngine {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        sessions: Arc<dyn SessionStore>,
        broadcaster: Arc<dyn Broadcaster>,
        cache: Arc<dyn LocalCache>,
        chat: Arc<dyn ChatClient>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            sessions,
            broadcaster,
            cache,
            chat,
            source: source.into(),
            broadcast_timeout: BROADCAST_TIMEOUT,
        }
    }

    pub fn with_broadcast_timeout(mut self, timeout: Duration) -> Self {
        self.broadcast_timeout = timeout;
        self
    }

    /// Execute the chat's confirming request.
    ///
    /// Fails with `SessionExpired`, and changes nothing, when there is no
    /// request or it is still collecting.
    pub async fn accept(&self, chat_id: ChatId, today: NaiveDate) -> Result<Delivered, DialogueError> {
        let request = match self.sessions.get(chat_id)? {
            Some(request) if request.is_confirming() => request,
            Some(request) => {
                debug!(chat_id = %chat_id, intent = %request.intent(), "Accept while still collecting");
                return Err(DialogueError::SessionExpired);
            }
            None => return Err(DialogueError::SessionExpired),
        };
        validate_transition(request.sub_state().into(), Phase::Executed)?;
        self.sessions.clear(chat_id)?;

        if let Some(message_id) = request.confirmation_message() {
            if let Err(e) = self.chat.clear_buttons(chat_id, message_id).await {
                debug!(chat_id = %chat_id, error = %e, "Could not clear confirmation buttons");
            }
        }

        let handler = self.registry.require(request.intent())?;
        let ctx = ExecutionContext {
            today,
            source: self.source.clone(),
        };
        let execution = handler.execute(&request, &ctx).await?;
        info!(
            chat_id = %chat_id,
            intent = %request.intent(),
            event_type = %execution.event.event_type,
            exit = %Phase::Executed,
            "Request executed"
        );
        Ok(self.complete(chat_id, request.user_id(), execution).await)
    }

    /// Deliver an execution: broadcast and patch the local cache together,
    /// then tell the user. Only the reply can be skipped on failure.
    pub async fn complete(&self, chat_id: ChatId, user: &UserId, execution: Execution) -> Delivered {
        let Execution {
            event,
            mutations,
            success_text,
        } = execution;

        let broadcast = async {
            match tokio::time::timeout(self.broadcast_timeout, self.broadcaster.send(user, &event)).await {
                Ok(Ok(receipt)) => receipt.online,
                Ok(Err(e)) => {
                    warn!(chat_id = %chat_id, event_id = %event.event_id, error = %e, "Broadcast failed, continuing offline");
                    false
                }
                Err(_) => {
                    warn!(
                        chat_id = %chat_id,
                        event_id = %event.event_id,
                        timeout_ms = self.broadcast_timeout.as_millis() as u64,
                        "Broadcast timed out, continuing offline"
                    );
                    false
                }
            }
        };
        let patch = async {
            if let Err(e) = apply_mutations(self.cache.as_ref(), user, &mutations).await {
                error!(chat_id = %chat_id, event_id = %event.event_id, error = %e, "Failed to update local cache");
            }
        };
        let (online, ()) = tokio::join!(broadcast, patch);

        let text = if online {
            success_text
        } else {
            format!("{}\n\n{}", success_text, OFFLINE_NOTICE)
        };
        if let Err(e) = self.chat.send_message(chat_id, &OutboundMessage::text(text)).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to send success message");
        }

        Delivered {
            event_id: event.event_id,
            online,
        }
    }

    /// Drop the chat's request and say so. Works from either sub-state.
    pub async fn reject(&self, chat_id: ChatId) -> Result<(), DialogueError> {
        let request = self.sessions.get(chat_id)?;
        self.sessions.clear(chat_id)?;

        if let Some(message_id) = request.as_ref().and_then(|r| r.confirmation_message()) {
            if let Err(e) = self.chat.delete_message(chat_id, message_id).await {
                debug!(chat_id = %chat_id, error = %e, "Could not delete confirmation message");
            }
        }
        if let Some(request) = &request {
            info!(chat_id = %chat_id, intent = %request.intent(), exit = %Phase::Cancelled, "Request rejected");
        }

        self.chat
            .send_message(chat_id, &OutboundMessage::text(CANCELLED_TEXT))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{BroadcastReceipt, ChannelBroadcaster};
    use crate::cache::InMemoryCache;
    use crate::chat::{ChatAction, RecordingChat};
    use crate::session::InMemorySessionStore;
    use crate::types::{Intent, PendingRequest, Slot, SlotData, SlotValue};
    use async_trait::async_trait;
    use stacker_core::events::DomainEvent;
    use stacker_core::types::MessageId;

    struct FailingBroadcaster;

    #[async_trait]
    impl Broadcaster for FailingBroadcaster {
        async fn send(
            &self,
            _user: &UserId,
            _event: &DomainEvent,
        ) -> Result<BroadcastReceipt, DialogueError> {
            Err(DialogueError::Broadcast("connection refused".into()))
        }
    }

    struct SlowBroadcaster;

    #[async_trait]
    impl Broadcaster for SlowBroadcaster {
        async fn send(
            &self,
            _user: &UserId,
            _event: &DomainEvent,
        ) -> Result<BroadcastReceipt, DialogueError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(BroadcastReceipt { online: true })
        }
    }

    struct Fixture {
        engine: ConfirmationEngine,
        sessions: Arc<InMemorySessionStore>,
        cache: Arc<InMemoryCache>,
        chat: Arc<RecordingChat>,
    }

    fn fixture(broadcaster: Arc<dyn Broadcaster>) -> Fixture {
        let sessions = Arc::new(InMemorySessionStore::new(15));
        let cache = Arc::new(InMemoryCache::new());
        let chat = Arc::new(RecordingChat::new());
        let engine = ConfirmationEngine::new(
            Arc::new(HandlerRegistry::with_defaults()),
            sessions.clone(),
            broadcaster,
            cache.clone(),
            chat.clone(),
            "telegram",
        );
        Fixture {
            engine,
            sessions,
            cache,
            chat,
        }
    }

    fn expense(confirming: bool) -> PendingRequest {
        let mut request =
            PendingRequest::new(ChatId(7), UserId::new("u1"), Intent::AddExpense, "beli kopi 50rb");
        request.fill(Slot::Amount, SlotValue::new(SlotData::Amount(50_000), "50rb"));
        request.fill(Slot::Category, SlotValue::text("Food"));
        if confirming {
            request.fill(Slot::Note, SlotValue::text("kopi"));
            request.begin_confirmation().unwrap();
            request.set_confirmation_message(Some(MessageId(3)));
        } else {
            request.queue([Slot::Note]);
        }
        request
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[tokio::test]
    async fn test_accept_once() {
        let f = fixture(Arc::new(ChannelBroadcaster::new()));
        f.sessions.set(ChatId(7), expense(true)).unwrap();

        let delivered = f.engine.accept(ChatId(7), today()).await.unwrap();
        assert!(!delivered.online);
        assert!(f.sessions.get(ChatId(7)).unwrap().is_none());

        let snapshot = f.cache.read(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(snapshot.current_balance, -50_000);

        let again = f.engine.accept(ChatId(7), today()).await;
        assert!(matches!(again, Err(DialogueError::SessionExpired)));
        let snapshot = f.cache.read(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(snapshot.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_accept_while_collecting_changes_nothing() {
        let f = fixture(Arc::new(ChannelBroadcaster::new()));
        f.sessions.set(ChatId(7), expense(false)).unwrap();

        let result = f.engine.accept(ChatId(7), today()).await;
        assert!(matches!(result, Err(DialogueError::SessionExpired)));
        assert!(f.sessions.get(ChatId(7)).unwrap().is_some());
        assert!(f.cache.read(&UserId::new("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_online_reply_has_no_offline_notice() {
        let broadcaster = Arc::new(ChannelBroadcaster::new());
        let _rx = broadcaster.subscribe();
        let f = fixture(broadcaster);
        f.sessions.set(ChatId(7), expense(true)).unwrap();

        assert!(f.engine.accept(ChatId(7), today()).await.unwrap().online);
        let reply = f.chat.last_sent().unwrap();
        assert!(!reply.text.contains(OFFLINE_NOTICE));
        assert!(f
            .chat
            .actions()
            .contains(&ChatAction::ButtonsCleared {
                chat_id: ChatId(7),
                message_id: MessageId(3)
            }));
    }

    #[tokio::test]
    async fn test_failed_broadcast_still_updates_cache() {
        let f = fixture(Arc::new(FailingBroadcaster));
        f.sessions.set(ChatId(7), expense(true)).unwrap();

        let delivered = f.engine.accept(ChatId(7), today()).await.unwrap();
        assert!(!delivered.online);
        let snapshot = f.cache.read(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(snapshot.current_balance, -50_000);
        assert!(f.chat.last_sent().unwrap().text.contains(OFFLINE_NOTICE));
    }

    #[tokio::test]
    async fn test_slow_broadcast_times_out_offline() {
        let mut f = fixture(Arc::new(SlowBroadcaster));
        f.engine = f.engine.with_broadcast_timeout(Duration::from_millis(50));
        f.sessions.set(ChatId(7), expense(true)).unwrap();

        let started = std::time::Instant::now();
        let delivered = f.engine.accept(ChatId(7), today()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!delivered.online);

        let snapshot = f.cache.read(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(snapshot.current_balance, -50_000);
        assert!(f.chat.last_sent().unwrap().text.contains(OFFLINE_NOTICE));
    }

    #[tokio::test]
    async fn test_reject_clears_and_deletes_summary() {
        let f = fixture(Arc::new(ChannelBroadcaster::new()));
        f.sessions.set(ChatId(7), expense(true)).unwrap();

        f.engine.reject(ChatId(7)).await.unwrap();
        assert!(f.sessions.get(ChatId(7)).unwrap().is_none());
        assert_eq!(f.chat.last_sent().unwrap().text, CANCELLED_TEXT);
        assert!(f.chat.actions().contains(&ChatAction::Deleted {
            chat_id: ChatId(7),
            message_id: MessageId(3)
        }));
        assert!(f.cache.read(&UserId::new("u1")).await.unwrap().is_none());
    }
}
