//! User registry: upsert-only profiles keyed by chat id.

use super::Store;
use tern_core::error::TernError;

/// A registered user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub chat_id: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
}

impl UserProfile {
    /// Display name with the chat id as fallback.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.chat_id)
    }
}

impl Store {
    /// Register a user on first contact. Ignore-on-conflict: the profile is
    /// frozen at first insert and later calls never refresh name or phone.
    /// Returns `true` if a row was actually inserted.
    pub async fn upsert_user(
        &self,
        chat_id: &str,
        display_name: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<bool, TernError> {
        let result = sqlx::query(
            "INSERT INTO users (chat_id, display_name, phone_number) VALUES (?, ?, ?) \
             ON CONFLICT(chat_id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(display_name)
        .bind(phone_number)
        .execute(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("upsert user failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Look up a profile by chat id.
    pub async fn get_user(&self, chat_id: &str) -> Result<Option<UserProfile>, TernError> {
        let row: Option<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT chat_id, display_name, phone_number FROM users WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("get user failed: {e}")))?;

        Ok(row.map(|(chat_id, display_name, phone_number)| UserProfile {
            chat_id,
            display_name,
            phone_number,
        }))
    }

    /// All registered users, oldest first.
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, TernError> {
        let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT chat_id, display_name, phone_number FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("list users failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(chat_id, display_name, phone_number)| UserProfile {
                chat_id,
                display_name,
                phone_number,
            })
            .collect())
    }

    /// Display name for a chat id, falling back to "Unknown".
    pub async fn display_name(&self, chat_id: &str) -> Result<String, TernError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT display_name FROM users WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TernError::Store(format!("display name lookup failed: {e}")))?;

        Ok(row
            .and_then(|(name,)| name)
            .unwrap_or_else(|| "Unknown".to_string()))
    }
}
