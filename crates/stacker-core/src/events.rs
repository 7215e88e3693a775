use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserId;

/// Default origin tag stamped on events produced by the chat channel.
pub const DEFAULT_SOURCE: &str = "telegram";

// =============================================================================
// Event Types
// =============================================================================

/// Every kind of event the chat channel can hand to the system of record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "transaction.created")]
    TransactionCreated,
    #[serde(rename = "transaction.updated")]
    TransactionUpdated,
    #[serde(rename = "transaction.deleted")]
    TransactionDeleted,
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.deleted")]
    TaskDeleted,
    #[serde(rename = "project.created")]
    ProjectCreated,
    #[serde(rename = "project.updated")]
    ProjectUpdated,
    #[serde(rename = "project.deleted")]
    ProjectDeleted,
    #[serde(rename = "progress.logged")]
    ProgressLogged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TransactionCreated => "transaction.created",
            EventType::TransactionUpdated => "transaction.updated",
            EventType::TransactionDeleted => "transaction.deleted",
            EventType::TaskCreated => "task.created",
            EventType::TaskUpdated => "task.updated",
            EventType::TaskDeleted => "task.deleted",
            EventType::ProjectCreated => "project.created",
            EventType::ProjectUpdated => "project.updated",
            EventType::ProjectDeleted => "project.deleted",
            EventType::ProgressLogged => "progress.logged",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// A completed user action, ready to be delivered to the system of record.
///
/// Built only when a request is confirmed. The dialogue engine never
/// persists events itself; ownership passes to the broadcaster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub actor_user_id: UserId,
    /// Serialized as ISO-8601.
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub source: String,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        actor: UserId,
        payload: serde_json::Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            actor_user_id: actor,
            timestamp: Utc::now(),
            payload,
            source: source.into(),
        }
    }

    /// Use a specific event id, typically the id of the record the event describes.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.event_id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_wire_names() {
        let json = serde_json::to_string(&EventType::ProgressLogged).unwrap();
        assert_eq!(json, "\"progress.logged\"");
        assert_eq!(EventType::TaskCreated.to_string(), "task.created");
    }

    #[test]
    fn test_envelope_uses_camel_case_keys() {
        let event = DomainEvent::new(
            EventType::TransactionCreated,
            UserId::new("7"),
            json!({ "amount": 50000 }),
            DEFAULT_SOURCE,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "transaction.created");
        assert_eq!(value["actorUserId"], "7");
        assert_eq!(value["source"], "telegram");
        assert_eq!(value["payload"]["amount"], 50000);
        assert!(value["eventId"].is_string());
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_with_id_overrides_event_id() {
        let id = Uuid::new_v4();
        let event = DomainEvent::new(
            EventType::TaskUpdated,
            UserId::new("7"),
            json!({}),
            DEFAULT_SOURCE,
        )
        .with_id(id);
        assert_eq!(event.event_id, id);
    }
}
