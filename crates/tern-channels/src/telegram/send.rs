//! Outbound Telegram API calls: messages, keyboards, command registration.

use super::TelegramChannel;
use serde_json::json;
use tern_core::{error::TernError, keyboard::Keyboard};
use tracing::{info, warn};

impl TelegramChannel {
    /// Send a text message, chunked at the Telegram limit. The reply
    /// keyboard, when present, is attached to the final chunk.
    pub(crate) async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TernError> {
        let chunks = split_message(text, 4096);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last {
                if let Some(kb) = keyboard {
                    body["reply_markup"] = reply_markup(kb);
                }
            }

            let resp = self
                .client
                .post(format!("{}/sendMessage", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| TernError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                warn!("telegram send got {status}: {error_text}");
            }
        }

        Ok(())
    }

    /// Send a chat action (e.g. "typing") to a chat.
    pub(crate) async fn send_chat_action(
        &self,
        chat_id: i64,
        action: &str,
    ) -> Result<(), TernError> {
        let url = format!("{}/sendChatAction", self.base_url);
        let body = json!({
            "chat_id": chat_id,
            "action": action,
        });

        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TernError::Channel(format!("telegram sendChatAction failed: {e}")))?;

        Ok(())
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        let commands = json!({
            "commands": [
                { "command": "start", "description": "Register and show the menu" },
                { "command": "help", "description": "Show available commands" },
                { "command": "done", "description": "Evening check-in: everything completed" },
                { "command": "miss", "description": "Evening check-in: not today" },
                { "command": "users", "description": "List registered users (admin)" },
            ]
        });

        let url = format!("{}/setMyCommands", self.base_url);
        match self.client.post(&url).json(&commands).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }
}

/// Build the `ReplyKeyboardMarkup` payload for a keyboard.
pub(super) fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    if button.request_contact {
                        json!({ "text": button.label, "request_contact": true })
                    } else {
                        json!({ "text": button.label })
                    }
                })
                .collect()
        })
        .collect();

    json!({
        "keyboard": rows,
        "resize_keyboard": true,
    })
}

/// Split text into chunks of at most `max_len` bytes, preferring newline
/// boundaries.
pub(super) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = (start + max_len).min(text.len());
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
