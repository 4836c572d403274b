//! Common types used across Tally.

use serde::{Deserialize, Serialize};

/// A chat-platform user as resolved by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user id (what debts reference).
    pub id: String,

    /// Display name.
    pub full_name: String,

    /// Platform transport id (where messages are delivered).
    pub transport_id: String,

    /// IANA timezone name, if the platform knows it.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl User {
    /// Create a user without a known timezone.
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        transport_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            transport_id: transport_id.into(),
            timezone: None,
        }
    }

    /// Set the user's timezone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// Reaction kinds the dispatcher acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    /// Borrower confirms they paid.
    MarkPaid,
    /// Host stops tracking the whole order.
    HostCancel,
}

/// An inbound reaction event delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Reaction name (e.g. "money_with_wings").
    pub reaction: String,

    /// Transport id of the user who reacted.
    pub from_user_id: String,

    /// Author of the reacted-to message.
    pub message_user_id: String,

    /// Text of the reacted-to message.
    pub message_text: String,

    /// Channel the reacted-to message lives in.
    pub channel: String,
}

/// An outbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient transport id (user or channel).
    pub transport_id: String,

    /// Message body.
    pub text: String,

    /// Reaction the recipient is invited to add, if any.
    #[serde(default)]
    pub reaction_hint: Option<String>,

    /// Message to thread the reply under, if any.
    #[serde(default)]
    pub thread_message_id: Option<String>,
}

impl Notification {
    /// Create a plain, unthreaded message.
    pub fn new(transport_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            text: text.into(),
            reaction_hint: None,
            thread_message_id: None,
        }
    }

    /// Invite the recipient to react with `reaction`.
    pub fn with_reaction(mut self, reaction: impl Into<String>) -> Self {
        self.reaction_hint = Some(reaction.into());
        self
    }

    /// Thread the message under `message_id`.
    pub fn in_thread(mut self, message_id: impl Into<String>) -> Self {
        self.thread_message_id = Some(message_id.into());
        self
    }
}

/// Why a reminder worker terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No debts left for the order.
    DebtsCleared,
    /// Maximum tracking duration elapsed; the order was cancelled.
    TimedOut,
    /// Stopped from outside (shutdown or explicit stop); debts are kept.
    Stopped,
}
