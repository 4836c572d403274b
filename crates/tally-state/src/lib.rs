//! # Tally State
//!
//! Collaborators consumed by the debt engine: durable debt storage, the
//! user directory and the outbound notifier, with in-memory implementations.

pub mod directory;
pub mod notifier;
pub mod store;

pub use directory::{InMemoryUserDirectory, UserDirectory};
pub use notifier::{BroadcastNotifier, NotificationFilter, Notifier, SentNotification};
pub use store::{DebtStore, InMemoryDebtStore};
