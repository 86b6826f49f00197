//! Reply-keyboard model shared between the dispatcher and the channels.
//!
//! Channels translate this into their platform's button layout
//! (Telegram: `ReplyKeyboardMarkup`).

use serde::{Deserialize, Serialize};

/// A single reply-keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Ask the client to share the user's phone contact when pressed.
    #[serde(default)]
    pub request_contact: bool,
}

impl Button {
    /// A plain text button.
    pub fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            request_contact: false,
        }
    }

    /// A share-contact request button.
    pub fn contact(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            request_contact: true,
        }
    }
}

/// A reply keyboard: rows of buttons rendered under the input field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Lay labels out as a two-column grid (menu layout).
    pub fn two_column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        for label in labels {
            row.push(Button::text(label));
            if row.len() == 2 {
                rows.push(std::mem::take(&mut row));
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
        Self { rows }
    }

    /// One button per row (task list layout).
    pub fn single_column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: labels
                .into_iter()
                .map(|label| vec![Button::text(label)])
                .collect(),
        }
    }

    /// Append a row of buttons.
    pub fn push_row(&mut self, row: Vec<Button>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_column_even() {
        let kb = Keyboard::two_column(["a", "b", "c", "d"]);
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[0].len(), 2);
        assert_eq!(kb.rows[1][1].label, "d");
    }

    #[test]
    fn test_two_column_odd_leaves_short_last_row() {
        let kb = Keyboard::two_column(["a", "b", "c"]);
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[1].len(), 1);
        assert_eq!(kb.rows[1][0].label, "c");
    }

    #[test]
    fn test_single_column() {
        let kb = Keyboard::single_column(["one", "two"]);
        assert_eq!(kb.rows.len(), 2);
        assert!(kb.rows.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn test_contact_button_flag() {
        let b = Button::contact("share");
        assert!(b.request_contact);
        assert!(!Button::text("plain").request_contact);
    }
}
