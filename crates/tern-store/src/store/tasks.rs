//! Task CRUD, the status lifecycle, stats, and the completed-task sweep.

use super::Store;
use std::fmt;
use std::str::FromStr;
use tern_core::error::TernError;
use uuid::Uuid;

/// Lifecycle tag of a task. Transitions are one-directional:
/// pending → accepted | rejected, and active | accepted → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Assigned to another user, awaiting their decision.
    Pending,
    Accepted,
    Rejected,
    /// A task the owner keeps for themselves (the default).
    Active,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Statuses a task may move to `self` from. Anything not listed here is
    /// an illegal transition and updates skip those rows.
    fn allowed_sources(&self) -> &'static [&'static str] {
        match self {
            Self::Accepted | Self::Rejected => &["pending"],
            Self::Completed => &["active", "accepted"],
            Self::Pending | Self::Active => &[],
        }
    }

    /// Whether a task in this status can still be completed.
    pub fn is_completable(&self) -> bool {
        matches!(self, Self::Active | Self::Accepted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TernError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(TernError::Store(format!("unknown task status '{other}'"))),
        }
    }
}

/// A task row.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub status: TaskStatus,
    pub created_at: String,
}

type TaskRow = (String, String, String, String, String, Option<String>);

const TASK_COLUMNS: &str = "id, sender_id, receiver_id, task_text, status, created_at";

fn task_from_row(row: TaskRow) -> Result<Task, TernError> {
    let (id, sender_id, receiver_id, text, status, created_at) = row;
    Ok(Task {
        id,
        sender_id,
        receiver_id,
        text,
        status: status.parse()?,
        created_at: created_at.unwrap_or_default(),
    })
}

impl Store {
    /// Insert a task and return its id. Commits immediately.
    pub async fn add_task(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        status: TaskStatus,
    ) -> Result<String, TernError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO tasks (id, sender_id, receiver_id, task_text, status, created_at) \
             VALUES (?, ?, ?, ?, ?, datetime('now'))",
        )
        .bind(&id)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(text)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("add task failed: {e}")))?;

        Ok(id)
    }

    /// Look up a task by id.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, TernError> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| TernError::Store(format!("get task failed: {e}")))?;

        row.map(task_from_row).transpose()
    }

    /// Tasks owned by a user, optionally filtered by status, oldest first.
    pub async fn tasks_for_user(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, TernError> {
        let rows: Vec<TaskRow> = match status {
            Some(s) => {
                sqlx::query_as(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks \
                     WHERE receiver_id = ? AND status = ? \
                     ORDER BY created_at ASC, id ASC"
                ))
                .bind(user_id)
                .bind(s.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks \
                     WHERE receiver_id = ? \
                     ORDER BY created_at ASC, id ASC"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| TernError::Store(format!("list tasks failed: {e}")))?;

        rows.into_iter().map(task_from_row).collect()
    }

    /// Tasks a user assigned to others, with each receiver's display name.
    pub async fn assigned_by(&self, sender_id: &str) -> Result<Vec<(Task, String)>, TernError> {
        let rows: Vec<(String, String, String, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT t.id, t.sender_id, t.receiver_id, t.task_text, t.status, t.created_at, \
                        u.display_name \
                 FROM tasks t LEFT JOIN users u ON u.chat_id = t.receiver_id \
                 WHERE t.sender_id = ? AND t.receiver_id != t.sender_id \
                 ORDER BY t.created_at ASC, t.id ASC",
            )
            .bind(sender_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TernError::Store(format!("list assigned tasks failed: {e}")))?;

        rows.into_iter()
            .map(|(id, sender, receiver, text, status, created_at, name)| {
                let task = task_from_row((id, sender, receiver, text, status, created_at))?;
                Ok((task, name.unwrap_or_else(|| "Unknown".to_string())))
            })
            .collect()
    }

    /// Tasks owned by a user with exactly this text.
    pub async fn find_by_text(&self, user_id: &str, text: &str) -> Result<Vec<Task>, TernError> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE receiver_id = ? AND task_text = ? \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id)
        .bind(text)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("find task failed: {e}")))?;

        rows.into_iter().map(task_from_row).collect()
    }

    /// Move every task matching (owner, text) to a new status, honoring the
    /// one-directional lifecycle. Text-match addressing is a compatibility
    /// shim: duplicate texts are indistinguishable here and all matching
    /// rows change together. Returns rows affected; 0 is a silent no-op.
    pub async fn set_status_by_text(
        &self,
        user_id: &str,
        text: &str,
        new_status: TaskStatus,
    ) -> Result<u64, TernError> {
        let sources = new_status.allowed_sources();
        if sources.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; sources.len()].join(", ");
        let completed_at = if new_status == TaskStatus::Completed {
            "datetime('now')"
        } else {
            "completed_at"
        };
        let sql = format!(
            "UPDATE tasks SET status = ?, completed_at = {completed_at} \
             WHERE receiver_id = ? AND task_text = ? AND status IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql)
            .bind(new_status.as_str())
            .bind(user_id)
            .bind(text);
        for source in sources {
            query = query.bind(source);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| TernError::Store(format!("set status failed: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Remove every task matching (owner, text). Returns rows removed;
    /// 0 is a silent no-op.
    pub async fn delete_by_text(&self, user_id: &str, text: &str) -> Result<u64, TernError> {
        let result = sqlx::query("DELETE FROM tasks WHERE receiver_id = ? AND task_text = ?")
            .bind(user_id)
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(|e| TernError::Store(format!("delete task failed: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Accept a pending task. Returns `false` if the row is gone or no
    /// longer pending.
    pub async fn accept_task(&self, id: &str) -> Result<bool, TernError> {
        let result =
            sqlx::query("UPDATE tasks SET status = 'accepted' WHERE id = ? AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| TernError::Store(format!("accept task failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Reject a pending task. Returns `false` if the row is gone or no
    /// longer pending.
    pub async fn reject_task(&self, id: &str) -> Result<bool, TernError> {
        let result =
            sqlx::query("UPDATE tasks SET status = 'rejected' WHERE id = ? AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| TernError::Store(format!("reject task failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// All-time count of tasks a user created.
    pub async fn count_created_by(&self, sender_id: &str) -> Result<i64, TernError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE sender_id = ?")
            .bind(sender_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TernError::Store(format!("count tasks failed: {e}")))?;

        Ok(count)
    }

    /// (created, completed) counts over the trailing 7 days, both keyed by
    /// creation date.
    pub async fn weekly_stats(&self, user_id: &str) -> Result<(i64, i64), TernError> {
        let (created,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks \
             WHERE receiver_id = ? AND datetime(created_at) >= datetime('now', '-7 days')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("weekly stats failed: {e}")))?;

        let (completed,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks \
             WHERE receiver_id = ? AND status = 'completed' \
             AND datetime(created_at) >= datetime('now', '-7 days')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("weekly stats failed: {e}")))?;

        Ok((created, completed))
    }

    /// Sweep completed tasks older than `days`. Returns rows removed.
    pub async fn purge_completed_older_than(&self, days: u32) -> Result<u64, TernError> {
        let result = sqlx::query(&format!(
            "DELETE FROM tasks WHERE status = 'completed' \
             AND datetime(coalesce(completed_at, created_at)) <= datetime('now', '-{days} days')"
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("purge failed: {e}")))?;

        Ok(result.rows_affected())
    }

    /// True if the owner already has an identical active task. Keeps the
    /// checklist seeding from piling up duplicates.
    pub async fn active_task_exists(&self, user_id: &str, text: &str) -> Result<bool, TernError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tasks \
             WHERE receiver_id = ? AND task_text = ? AND status = 'active'",
        )
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TernError::Store(format!("task exists check failed: {e}")))?;

        Ok(count > 0)
    }
}
