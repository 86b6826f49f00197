use crate::keyboard::Keyboard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A phone contact shared by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
    /// Platform user id of the contact's owner, when the platform knows it.
    /// Used to tell a self-share from a forwarded third-party card.
    pub user_id: Option<i64>,
}

/// An incoming message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel name (e.g. "telegram").
    pub channel: String,
    /// Platform-specific user ID.
    pub sender_id: String,
    /// Human-readable sender name.
    pub sender_name: Option<String>,
    /// Message text content. Empty when the message carries a contact.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Shared contact payload, if any.
    #[serde(default)]
    pub contact: Option<Contact>,
    /// Platform-specific target for routing the response (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// Platform-specific target for routing (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Reply keyboard to attach, replacing whatever the client currently shows.
    #[serde(default)]
    pub keyboard: Option<Keyboard>,
}
