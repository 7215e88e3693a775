//! Outbound chat transport.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use stacker_core::types::{ChatId, MessageId};

use crate::error::DialogueError;
use crate::types::OutboundMessage;

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageId, DialogueError>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId)
        -> Result<(), DialogueError>;

    /// Remove the inline keyboard from a sent message.
    async fn clear_buttons(&self, chat_id: ChatId, message_id: MessageId)
        -> Result<(), DialogueError>;

    /// Acknowledge a button tap, optionally with a short toast.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), DialogueError>;
}

/// Something a [`RecordingChat`] was asked to do.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatAction {
    Sent {
        chat_id: ChatId,
        message_id: MessageId,
        message: OutboundMessage,
    },
    Deleted {
        chat_id: ChatId,
        message_id: MessageId,
    },
    ButtonsCleared {
        chat_id: ChatId,
        message_id: MessageId,
    },
    Answered {
        callback_id: String,
        text: Option<String>,
    },
}

/// Chat client that remembers every call. Used by tests and dry runs.
#[derive(Default)]
pub struct RecordingChat {
    actions: Mutex<Vec<ChatAction>>,
    next_id: AtomicI64,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<ChatAction> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Messages sent, oldest first.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                ChatAction::Sent { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn last_sent(&self) -> Option<OutboundMessage> {
        self.sent().pop()
    }

    pub fn clear(&self) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.clear();
        }
    }

    fn record(&self, action: ChatAction) -> Result<(), DialogueError> {
        self.actions
            .lock()
            .map_err(|e| DialogueError::Transport(format!("recording lock poisoned: {}", e)))?
            .push(action);
        Ok(())
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_message(
        &self,
        chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageId, DialogueError> {
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(ChatAction::Sent {
            chat_id,
            message_id,
            message: message.clone(),
        })?;
        Ok(message_id)
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DialogueError> {
        self.record(ChatAction::Deleted { chat_id, message_id })
    }

    async fn clear_buttons(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DialogueError> {
        self.record(ChatAction::ButtonsCleared { chat_id, message_id })
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), DialogueError> {
        self.record(ChatAction::Answered {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        })
    }
}
