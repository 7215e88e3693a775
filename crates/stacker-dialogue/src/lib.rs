//! Conversational slot-filling for the Stacker chat bot.
//!
//! Turns free-form Indonesian chat into typed requests (expenses, income,
//! tasks, projects, progress logs), asks for whatever is missing one slot
//! at a time, confirms, and hands the resulting domain event to a
//! broadcaster while patching the user's local cache.

pub mod broadcast;
pub mod cache;
pub mod callback;
pub mod chat;
pub mod confirmation;
pub mod edit;
pub mod engine;
pub mod error;
pub mod intent;
pub mod lifecycle;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod types;

pub use broadcast::{BroadcastReceipt, Broadcaster, ChannelBroadcaster, OutboxBroadcaster};
pub use cache::{
    CacheMutation, CachedProject, CachedTask, CachedTransaction, InMemoryCache, JsonFileCache,
    LocalCache, UserSnapshot,
};
pub use callback::CallbackAction;
pub use chat::{ChatAction, ChatClient, RecordingChat};
pub use confirmation::{ConfirmationEngine, Delivered};
pub use edit::{detect_edit, EditCommand};
pub use engine::{DialogueEngine, EngineSettings, Services};
pub use error::DialogueError;
pub use intent::{HandlerRegistry, IntentHandler, PatternSet};
pub use lifecycle::{Phase, SubState};
pub use normalizer::{Course, EntityNormalizer, KeywordEntry, RuleBasedNormalizer, SynonymTable};
pub use orchestrator::{Orchestrator, Step, Turn};
pub use session::{ChatLocks, InMemorySessionStore, SessionStore};
pub use types::{
    Button, Category, Intent, OutboundMessage, PendingRequest, Slot, SlotData, SlotValue,
    TaskStatus, TransactionKind, Update,
};
