use super::send::{reply_markup, split_message};
use super::types::{TgResponse, TgUpdate};
use tern_core::keyboard::{Button, Keyboard};

#[test]
fn test_split_short_message() {
    let chunks = split_message("hello", 4096);
    assert_eq!(chunks, vec!["hello"]);
}

#[test]
fn test_split_long_message() {
    let text = "a\n".repeat(3000);
    let chunks = split_message(&text, 4096);
    assert!(chunks.len() >= 2);
    for chunk in &chunks {
        assert!(chunk.len() <= 4096);
    }
}

#[test]
fn test_split_prefers_newline_boundaries() {
    let text = format!("{}\n{}", "a".repeat(3000), "b".repeat(3000));
    let chunks = split_message(&text, 4096);
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].ends_with('\n'));
    assert!(chunks[1].starts_with('b'));
}

#[test]
fn test_reply_markup_shape() {
    let mut kb = Keyboard::two_column(["A", "B", "C"]);
    kb.push_row(vec![Button::contact("Share")]);

    let markup = reply_markup(&kb);
    assert_eq!(markup["resize_keyboard"], true);

    let rows = markup["keyboard"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0]["text"], "A");
    // Plain buttons carry no request_contact key at all.
    assert!(rows[0][0].get("request_contact").is_none());
    assert_eq!(rows[2][0]["request_contact"], true);
}

#[test]
fn test_parse_update_with_text() {
    let json = r#"{
        "ok": true,
        "result": [{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "from": {"id": 100, "first_name": "Alice", "last_name": "Ant"},
                "chat": {"id": 100, "type": "private"},
                "text": "hello"
            }
        }]
    }"#;

    let body: TgResponse<Vec<TgUpdate>> = serde_json::from_str(json).unwrap();
    assert!(body.ok);
    let updates = body.result.unwrap();
    assert_eq!(updates[0].update_id, 42);
    let msg = updates[0].message.as_ref().unwrap();
    assert_eq!(msg.text.as_deref(), Some("hello"));
    assert!(msg.contact.is_none());
    assert_eq!(msg.chat.chat_type, "private");
}

#[test]
fn test_parse_update_with_contact() {
    let json = r#"{
        "ok": true,
        "result": [{
            "update_id": 43,
            "message": {
                "message_id": 8,
                "from": {"id": 100, "first_name": "Alice"},
                "chat": {"id": 100, "type": "private"},
                "contact": {"phone_number": "+123", "first_name": "Alice", "user_id": 100}
            }
        }]
    }"#;

    let body: TgResponse<Vec<TgUpdate>> = serde_json::from_str(json).unwrap();
    let updates = body.result.unwrap();
    let msg = updates[0].message.as_ref().unwrap();
    assert!(msg.text.is_none());
    let contact = msg.contact.as_ref().unwrap();
    assert_eq!(contact.phone_number, "+123");
    assert_eq!(contact.user_id, Some(100));
}

#[test]
fn test_parse_error_response() {
    let json = r#"{"ok": false, "description": "Unauthorized"}"#;
    let body: TgResponse<Vec<TgUpdate>> = serde_json::from_str(json).unwrap();
    assert!(!body.ok);
    assert_eq!(body.description.as_deref(), Some("Unauthorized"));
    assert!(body.result.is_none());
}
