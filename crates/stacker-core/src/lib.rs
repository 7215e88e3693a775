//! Shared kernel for the Stacker chat bot: configuration, errors, identifiers
//! and the domain event envelope handed to the system of record.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::StackerConfig;
pub use error::{Result, StackerError};
pub use events::{DomainEvent, EventType};
pub use types::*;
