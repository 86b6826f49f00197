//! Menu labels, keyboards, and the conversation state machine types.

use tern_core::keyboard::{Button, Keyboard};
use tern_store::Task;

pub const BTN_NEW_TASK: &str = "➕ New task";
pub const BTN_MY_TASKS: &str = "📋 My tasks";
pub const BTN_COMPLETE: &str = "✅ Complete task";
pub const BTN_DELETE: &str = "🗑 Delete task";
pub const BTN_ASSIGN: &str = "📤 Assign task";
pub const BTN_ASSIGNED: &str = "📨 Assigned by me";
pub const BTN_WEATHER: &str = "🌦 Weather";
pub const BTN_STATS: &str = "📊 Weekly stats";

pub const BTN_YES: &str = "✅ Yes";
pub const BTN_NO: &str = "❌ No";
pub const BTN_ACCEPT: &str = "👍 Accept";
pub const BTN_REJECT: &str = "👎 Reject";
pub const BTN_CANCEL: &str = "◀️ Cancel";
pub const BTN_SHARE_CONTACT: &str = "📱 Share contact";
pub const BTN_SKIP_CONTACT: &str = "▶️ Skip";

/// Where a conversation currently is. One value per chat id, owned by the
/// dispatcher; waiting states carry the payload gathered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversationState {
    /// Main menu; nothing pending.
    #[default]
    Idle,
    /// Waiting for the text of a task the user keeps for themselves.
    AddingTask,
    /// Waiting for the recipient pick of an assignment.
    ChoosingRecipient,
    /// Waiting for the text of a task assigned to `recipient`.
    WritingTaskFor { recipient: String },
    /// Waiting for the user to pick a task to complete.
    SelectingComplete,
    /// Waiting for a yes/no on completing every task with this text.
    ConfirmComplete { text: String },
    /// Waiting for the user to pick a task to delete.
    SelectingDelete,
    /// Waiting for a yes/no on deleting every task with this text.
    ConfirmDelete { text: String },
    /// Waiting for the receiver's verdict on an assigned task.
    AcceptOrReject { task_id: String },
}

/// The main menu, a two-column grid.
pub fn main_menu() -> Keyboard {
    Keyboard::two_column([
        BTN_NEW_TASK,
        BTN_MY_TASKS,
        BTN_COMPLETE,
        BTN_DELETE,
        BTN_ASSIGN,
        BTN_ASSIGNED,
        BTN_WEATHER,
        BTN_STATS,
    ])
}

/// Yes/no confirmation row.
pub fn confirm_menu() -> Keyboard {
    Keyboard {
        rows: vec![vec![Button::text(BTN_YES), Button::text(BTN_NO)]],
    }
}

/// Accept/reject row for an assigned task.
pub fn verdict_menu() -> Keyboard {
    Keyboard {
        rows: vec![vec![Button::text(BTN_ACCEPT), Button::text(BTN_REJECT)]],
    }
}

/// A lone cancel button, shown while waiting for free text.
pub fn cancel_menu() -> Keyboard {
    Keyboard::single_column([BTN_CANCEL])
}

/// One task per row plus a cancel button. Duplicate texts produce duplicate
/// buttons; by-text selection treats them as one.
pub fn task_list_menu(tasks: &[Task]) -> Keyboard {
    let mut kb = Keyboard::single_column(tasks.iter().map(|t| t.text.clone()));
    kb.push_row(vec![Button::text(BTN_CANCEL)]);
    kb
}

/// One labelled button per candidate recipient plus a cancel button.
pub fn recipient_menu(labels: &[String]) -> Keyboard {
    let mut kb = Keyboard::single_column(labels.iter().cloned());
    kb.push_row(vec![Button::text(BTN_CANCEL)]);
    kb
}

/// Share-contact request with a skip option, shown to unregistered users.
pub fn contact_menu() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![Button::contact(BTN_SHARE_CONTACT)],
            vec![Button::text(BTN_SKIP_CONTACT)],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_store::TaskStatus;

    fn task(text: &str) -> Task {
        Task {
            id: "t1".into(),
            sender_id: "u".into(),
            receiver_id: "u".into(),
            text: text.into(),
            status: TaskStatus::Active,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_main_menu_is_two_column_grid() {
        let kb = main_menu();
        assert_eq!(kb.rows.len(), 4);
        assert!(kb.rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_task_list_menu_ends_with_cancel() {
        let kb = task_list_menu(&[task("a"), task("b")]);
        assert_eq!(kb.rows.len(), 3);
        assert_eq!(kb.rows[0][0].label, "a");
        assert_eq!(kb.rows[2][0].label, BTN_CANCEL);
    }

    #[test]
    fn test_contact_menu_requests_contact() {
        let kb = contact_menu();
        assert!(kb.rows[0][0].request_contact);
        assert!(!kb.rows[1][0].request_contact);
    }
}
