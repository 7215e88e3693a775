//! Terminal chat transport.
//!
//! Prints outbound messages to stdout and numbers them like a chat
//! platform would, so the engine's buttons can be tapped by typing
//! `/tap <payload>`.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use stacker_core::types::{ChatId, MessageId};
use stacker_dialogue::{ChatClient, DialogueError, OutboundMessage};

#[derive(Default)]
pub struct ConsoleChat {
    next_id: AtomicI64,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Render a message and its keyboard as plain text.
pub fn render(message_id: MessageId, message: &OutboundMessage) -> String {
    let mut out = format!("[#{}] {}", message_id.0, message.text);
    for row in &message.keyboard {
        let cells: Vec<String> = row
            .iter()
            .map(|b| format!("[{}] /tap {}", b.label, b.data))
            .collect();
        out.push_str("\n    ");
        out.push_str(&cells.join("   "));
    }
    out
}

#[async_trait]
impl ChatClient for ConsoleChat {
    async fn send_message(
        &self,
        _chat_id: ChatId,
        message: &OutboundMessage,
    ) -> Result<MessageId, DialogueError> {
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        println!("{}\n", render(message_id, message));
        Ok(message_id)
    }

    async fn delete_message(
        &self,
        _chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DialogueError> {
        println!("(pesan #{} dihapus)", message_id.0);
        Ok(())
    }

    async fn clear_buttons(
        &self,
        _chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DialogueError> {
        tracing::debug!(message_id = message_id.0, "Buttons cleared");
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), DialogueError> {
        if let Some(text) = text {
            println!("({})", text);
        }
        Ok(())
    }
}

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput<'a> {
    Quit,
    Tap(&'a str),
    Say(&'a str),
}

pub fn parse_input(line: &str) -> ConsoleInput<'_> {
    let line = line.trim();
    if line == "/quit" || line == "/exit" {
        return ConsoleInput::Quit;
    }
    match line.strip_prefix("/tap ") {
        Some(payload) => ConsoleInput::Tap(payload.trim()),
        None => ConsoleInput::Say(line),
    }
}
