use super::flows::{self, ConversationState};
use super::Gateway;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tern_core::config::Config;
use tern_core::error::TernError;
use tern_core::message::{Contact, IncomingMessage, OutgoingMessage};
use tern_core::traits::Channel;
use tern_store::{Store, TaskStatus};
use tern_weather::WeatherClient;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Channel stub that records outgoing messages.
struct RecordingChannel {
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingChannel {
    async fn last(&self) -> OutgoingMessage {
        self.sent.lock().await.last().cloned().expect("no messages sent")
    }

    async fn texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, TernError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), TernError> {
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TernError> {
        Ok(())
    }
}

async fn test_gateway() -> (Arc<Gateway>, Arc<RecordingChannel>) {
    let mut config = Config::default();
    config.store.db_path = ":memory:".to_string();

    let store = Store::new(&config.store).await.unwrap();
    let recorder = Arc::new(RecordingChannel {
        sent: Mutex::new(Vec::new()),
    });
    let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
    channels.insert("telegram".to_string(), recorder.clone());

    let weather = WeatherClient::new(config.weather.clone());
    let gateway = Arc::new(Gateway::new(channels, store, weather, config));
    (gateway, recorder)
}

fn msg(sender: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: Uuid::new_v4(),
        channel: "telegram".to_string(),
        sender_id: sender.to_string(),
        sender_name: Some(format!("User {sender}")),
        text: text.to_string(),
        timestamp: chrono::Utc::now(),
        contact: None,
        reply_target: Some(sender.to_string()),
    }
}

async fn state_of(gateway: &Gateway, sender: &str) -> ConversationState {
    gateway
        .conversations
        .lock()
        .await
        .get(sender)
        .cloned()
        .unwrap_or_default()
}

#[tokio::test]
async fn test_start_asks_unregistered_user_for_contact() {
    let (gw, recorder) = test_gateway().await;

    gw.handle_message(msg("100", "/start")).await;

    // Not registered yet: /start runs before the registry insert.
    assert!(gw.store.get_user("100").await.unwrap().is_none());
    let reply = recorder.last().await;
    assert!(reply.text.contains("Share your contact"));
    let kb = reply.keyboard.unwrap();
    assert!(kb.rows[0][0].request_contact);

    // Sharing the contact completes registration, phone included.
    let mut contact_msg = msg("100", "");
    contact_msg.contact = Some(Contact {
        phone_number: "+111".to_string(),
        first_name: "Alice".to_string(),
        user_id: Some(100),
    });
    gw.handle_message(contact_msg).await;

    let user = gw.store.get_user("100").await.unwrap().unwrap();
    assert_eq!(user.phone_number.as_deref(), Some("+111"));
    assert!(recorder.last().await.text.contains("signed up"));
}

#[tokio::test]
async fn test_plain_message_registers_without_phone() {
    let (gw, _recorder) = test_gateway().await;

    gw.handle_message(msg("100", "hello")).await;

    let user = gw.store.get_user("100").await.unwrap().unwrap();
    assert_eq!(user.display_name.as_deref(), Some("User 100"));
    assert!(user.phone_number.is_none());
}

#[tokio::test]
async fn test_contact_for_registered_user_changes_nothing() {
    let (gw, recorder) = test_gateway().await;
    gw.store
        .upsert_user("100", Some("Alice"), None)
        .await
        .unwrap();

    let mut contact_msg = msg("100", "");
    contact_msg.contact = Some(Contact {
        phone_number: "+999".to_string(),
        first_name: "Alice".to_string(),
        user_id: Some(100),
    });
    gw.handle_message(contact_msg).await;

    // Profiles are frozen at first insert.
    let user = gw.store.get_user("100").await.unwrap().unwrap();
    assert!(user.phone_number.is_none());
    assert!(recorder.last().await.text.contains("already registered"));
}

#[tokio::test]
async fn test_add_task_flow() {
    let (gw, recorder) = test_gateway().await;

    gw.handle_message(msg("100", flows::BTN_NEW_TASK)).await;
    assert_eq!(state_of(&gw, "100").await, ConversationState::AddingTask);

    gw.handle_message(msg("100", "buy milk")).await;
    assert_eq!(state_of(&gw, "100").await, ConversationState::Idle);
    assert!(recorder.last().await.text.contains("Added: buy milk"));

    let tasks = gw.store.tasks_for_user("100", None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "buy milk");
    assert_eq!(tasks[0].status, TaskStatus::Active);
}

#[tokio::test]
async fn test_complete_flow_end_to_end() {
    let (gw, recorder) = test_gateway().await;

    // alice registers and adds a task through the menu.
    gw.handle_message(msg("100", flows::BTN_NEW_TASK)).await;
    gw.handle_message(msg("100", "buy milk")).await;

    // Complete it: select, then confirm.
    gw.handle_message(msg("100", flows::BTN_COMPLETE)).await;
    assert_eq!(
        state_of(&gw, "100").await,
        ConversationState::SelectingComplete
    );

    gw.handle_message(msg("100", "buy milk")).await;
    assert_eq!(
        state_of(&gw, "100").await,
        ConversationState::ConfirmComplete {
            text: "buy milk".to_string()
        }
    );

    gw.handle_message(msg("100", flows::BTN_YES)).await;
    assert!(recorder.last().await.text.contains("Done: buy milk"));

    let active = gw
        .store
        .tasks_for_user("100", Some(TaskStatus::Active))
        .await
        .unwrap();
    assert!(active.is_empty());
    let completed = gw
        .store
        .tasks_for_user("100", Some(TaskStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].text, "buy milk");
}

#[tokio::test]
async fn test_idle_unknown_text_gets_menu_reply() {
    let (gw, recorder) = test_gateway().await;

    gw.handle_message(msg("100", "what's up?")).await;

    assert_eq!(state_of(&gw, "100").await, ConversationState::Idle);
    let reply = recorder.last().await;
    assert!(reply.text.contains("menu"));
    assert!(reply.keyboard.is_some());
}

#[tokio::test]
async fn test_idle_task_text_shortcut_goes_to_confirm() {
    let (gw, _recorder) = test_gateway().await;
    gw.store
        .add_task("100", "100", "exercise", TaskStatus::Active)
        .await
        .unwrap();

    // Tapping a morning-digest task button sends its exact text from Idle.
    gw.handle_message(msg("100", "exercise")).await;
    assert_eq!(
        state_of(&gw, "100").await,
        ConversationState::ConfirmComplete {
            text: "exercise".to_string()
        }
    );
}

#[tokio::test]
async fn test_assign_and_accept_flow() {
    let (gw, recorder) = test_gateway().await;
    gw.store.upsert_user("100", Some("Alice"), None).await.unwrap();
    gw.store.upsert_user("200", Some("Bob"), None).await.unwrap();

    gw.handle_message(msg("100", flows::BTN_ASSIGN)).await;
    assert_eq!(
        state_of(&gw, "100").await,
        ConversationState::ChoosingRecipient
    );
    let pick = recorder.last().await;
    let labels: Vec<_> = pick
        .keyboard
        .unwrap()
        .rows
        .iter()
        .map(|r| r[0].label.clone())
        .collect();
    assert!(labels.contains(&"Bob".to_string()));

    gw.handle_message(msg("100", "Bob")).await;
    assert_eq!(
        state_of(&gw, "100").await,
        ConversationState::WritingTaskFor {
            recipient: "200".to_string()
        }
    );

    gw.handle_message(msg("100", "wash dishes")).await;

    // The row is committed and the recipient notified with a verdict keyboard.
    let tasks = gw.store.tasks_for_user("200", None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Pending);
    assert_eq!(tasks[0].sender_id, "100");

    let sent = recorder.sent.lock().await;
    let notification = sent
        .iter()
        .find(|m| m.reply_target.as_deref() == Some("200"))
        .expect("recipient was not notified");
    assert!(notification.text.contains("Alice assigned you a task"));
    assert!(notification.text.contains("wash dishes"));
    drop(sent);

    assert!(matches!(
        state_of(&gw, "200").await,
        ConversationState::AcceptOrReject { .. }
    ));

    // Bob accepts; the status advances and Alice is told.
    gw.handle_message(msg("200", flows::BTN_ACCEPT)).await;
    let tasks = gw.store.tasks_for_user("200", None).await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Accepted);

    let texts = recorder.texts().await;
    assert!(texts.iter().any(|t| t.contains("Bob accepted: wash dishes")));
}

#[tokio::test]
async fn test_assign_unknown_recipient_falls_back_to_idle() {
    let (gw, recorder) = test_gateway().await;
    gw.store.upsert_user("100", Some("Alice"), None).await.unwrap();
    gw.store.upsert_user("200", Some("Bob"), None).await.unwrap();

    gw.handle_message(msg("100", flows::BTN_ASSIGN)).await;
    gw.handle_message(msg("100", "Charlie")).await;

    assert_eq!(state_of(&gw, "100").await, ConversationState::Idle);
    assert!(recorder.last().await.text.contains("back to the menu"));
}

#[tokio::test]
async fn test_delete_flow_declined_keeps_task()
{
    let (gw, _recorder) = test_gateway().await;
    gw.store
        .add_task("100", "100", "keep me", TaskStatus::Active)
        .await
        .unwrap();

    gw.handle_message(msg("100", flows::BTN_DELETE)).await;
    gw.handle_message(msg("100", "keep me")).await;
    gw.handle_message(msg("100", flows::BTN_NO)).await;

    assert_eq!(state_of(&gw, "100").await, ConversationState::Idle);
    let tasks = gw.store.tasks_for_user("100", None).await.unwrap();
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn test_confirm_with_vanished_selection_reports_gone() {
    let (gw, recorder) = test_gateway().await;
    gw.store
        .add_task("100", "100", "ghost", TaskStatus::Active)
        .await
        .unwrap();

    gw.handle_message(msg("100", flows::BTN_DELETE)).await;
    gw.handle_message(msg("100", "ghost")).await;

    // The row disappears between selection and confirmation.
    gw.store.delete_by_text("100", "ghost").await.unwrap();

    gw.handle_message(msg("100", flows::BTN_YES)).await;
    assert!(recorder.last().await.text.contains("the task is gone"));
    assert_eq!(state_of(&gw, "100").await, ConversationState::Idle);
}

#[tokio::test]
async fn test_users_command_is_admin_only() {
    let (gw, recorder) = {
        let mut config = Config::default();
        config.store.db_path = ":memory:".to_string();
        config.bot.admin_chat_id = "100".to_string();

        let store = Store::new(&config.store).await.unwrap();
        let recorder = Arc::new(RecordingChannel {
            sent: Mutex::new(Vec::new()),
        });
        let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
        channels.insert("telegram".to_string(), recorder.clone());
        let weather = WeatherClient::new(config.weather.clone());
        (
            Arc::new(Gateway::new(channels, store, weather, config)),
            recorder,
        )
    };
    gw.store
        .upsert_user("200", Some("Bob"), Some("+222"))
        .await
        .unwrap();

    gw.handle_message(msg("200", "/users")).await;
    assert!(recorder.last().await.text.contains("Not authorized"));

    gw.handle_message(msg("100", "/users")).await;
    let reply = recorder.last().await;
    assert!(reply.text.contains("Registered users"));
    assert!(reply.text.contains("Bob"));
    assert!(reply.text.contains("+222"));
}

#[tokio::test]
async fn test_waiting_state_payload_can_be_cancelled() {
    let (gw, recorder) = test_gateway().await;

    gw.handle_message(msg("100", flows::BTN_NEW_TASK)).await;
    gw.handle_message(msg("100", flows::BTN_CANCEL)).await;

    assert_eq!(state_of(&gw, "100").await, ConversationState::Idle);
    assert!(recorder.last().await.text.contains("Cancelled"));
    assert!(gw.store.tasks_for_user("100", None).await.unwrap().is_empty());
}
