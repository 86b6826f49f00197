//! Per-message dispatch: registration, commands, and the menu state machine.

use super::flows::{self, ConversationState};
use super::Gateway;
use crate::commands::{self, Command};
use tern_core::message::{Contact, IncomingMessage};
use tern_store::{Task, TaskStatus};
use tracing::{error, info};

/// Which pending two-step operation a selection/confirmation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Complete,
    Delete,
}

impl Gateway {
    /// Process a single incoming message.
    pub(crate) async fn handle_message(&self, incoming: IncomingMessage) {
        let preview = if incoming.text.chars().count() > 60 {
            let truncated: String = incoming.text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            incoming.text.clone()
        };
        info!(
            "[{}] {} says: {}",
            incoming.channel,
            incoming.sender_name.as_deref().unwrap_or("unknown"),
            preview
        );

        // Shared contacts register the sender with a phone number.
        if let Some(contact) = incoming.contact.clone() {
            self.handle_contact(&incoming, &contact).await;
            return;
        }

        if let Some(cmd) = Command::parse(&incoming.text) {
            // /start runs before registration so a first contact share can
            // still capture a phone; everything else registers first.
            if !matches!(cmd, Command::Start) {
                self.ensure_registered(&incoming).await;
            }
            let ctx = commands::CommandContext {
                store: &self.store,
                sender_id: &incoming.sender_id,
                sender_name: incoming.sender_name.as_deref(),
                bot_name: &self.config.bot.name,
                admin_chat_id: &self.config.bot.admin_chat_id,
                morning: &self.config.scheduler.morning,
                evening: &self.config.scheduler.evening,
            };
            let reply = commands::handle(cmd, &ctx).await;
            self.send_reply(&incoming, &reply.text, reply.keyboard).await;
            return;
        }

        self.ensure_registered(&incoming).await;
        self.advance_conversation(incoming).await;
    }

    /// Upsert the sender into the registry. Ignore-on-conflict: repeated
    /// calls are cheap no-ops and never refresh the profile.
    async fn ensure_registered(&self, incoming: &IncomingMessage) {
        if let Err(e) = self
            .store
            .upsert_user(&incoming.sender_id, incoming.sender_name.as_deref(), None)
            .await
        {
            error!("failed to register {}: {e}", incoming.sender_id);
        }
    }

    /// A shared contact: register the sender with their phone number.
    async fn handle_contact(&self, incoming: &IncomingMessage, contact: &Contact) {
        // Only self-shares register a phone; a forwarded third-party card
        // does not speak for the sender.
        if contact
            .user_id
            .is_some_and(|id| id.to_string() != incoming.sender_id)
        {
            self.send_reply(
                incoming,
                "That looks like someone else's contact — share your own to register.",
                Some(flows::contact_menu()),
            )
            .await;
            return;
        }

        let name = incoming
            .sender_name
            .as_deref()
            .unwrap_or(&contact.first_name);

        match self
            .store
            .upsert_user(
                &incoming.sender_id,
                Some(name),
                Some(&contact.phone_number),
            )
            .await
        {
            Ok(true) => {
                self.send_reply(
                    incoming,
                    &format!(
                        "✅ You're signed up, {}! Use the menu below to manage \
                         your tasks.",
                        contact.first_name
                    ),
                    Some(flows::main_menu()),
                )
                .await;
            }
            Ok(false) => {
                self.send_reply(
                    incoming,
                    "You're already registered — saved details stay as they were.",
                    Some(flows::main_menu()),
                )
                .await;
            }
            Err(e) => {
                error!("contact registration failed for {}: {e}", incoming.sender_id);
                self.send_reply(incoming, "Something went wrong. Please try again.", None)
                    .await;
            }
        }
    }

    /// Advance the sender's conversation by one transition.
    async fn advance_conversation(&self, incoming: IncomingMessage) {
        let text = incoming.text.trim().to_string();

        let state = {
            let mut map = self.conversations.lock().await;
            map.remove(&incoming.sender_id).unwrap_or_default()
        };

        let next = self.dispatch_state(&incoming, state, &text).await;

        if next != ConversationState::Idle {
            self.conversations
                .lock()
                .await
                .insert(incoming.sender_id.clone(), next);
        }
    }

    /// The explicit transition function: (state, input) → next state, with
    /// store effects and replies applied along the way.
    async fn dispatch_state(
        &self,
        incoming: &IncomingMessage,
        state: ConversationState,
        text: &str,
    ) -> ConversationState {
        match state {
            ConversationState::Idle => self.dispatch_idle(incoming, text).await,
            ConversationState::AddingTask => self.dispatch_adding(incoming, text).await,
            ConversationState::ChoosingRecipient => {
                self.dispatch_choosing_recipient(incoming, text).await
            }
            ConversationState::WritingTaskFor { recipient } => {
                self.dispatch_writing_for(incoming, text, &recipient).await
            }
            ConversationState::SelectingComplete => {
                self.dispatch_selecting(incoming, text, PendingOp::Complete)
                    .await
            }
            ConversationState::ConfirmComplete { text: task_text } => {
                self.dispatch_confirm(incoming, text, PendingOp::Complete, &task_text)
                    .await
            }
            ConversationState::SelectingDelete => {
                self.dispatch_selecting(incoming, text, PendingOp::Delete)
                    .await
            }
            ConversationState::ConfirmDelete { text: task_text } => {
                self.dispatch_confirm(incoming, text, PendingOp::Delete, &task_text)
                    .await
            }
            ConversationState::AcceptOrReject { task_id } => {
                self.dispatch_verdict(incoming, text, &task_id).await
            }
        }
    }

    async fn dispatch_idle(&self, incoming: &IncomingMessage, text: &str) -> ConversationState {
        let user = incoming.sender_id.as_str();

        match text {
            flows::BTN_NEW_TASK => {
                self.send_reply(incoming, "📝 Send me the task text.", Some(flows::cancel_menu()))
                    .await;
                ConversationState::AddingTask
            }
            flows::BTN_MY_TASKS => {
                let reply = self.my_tasks_text(user).await;
                self.send_reply(incoming, &reply, Some(flows::main_menu())).await;
                ConversationState::Idle
            }
            flows::BTN_COMPLETE => {
                let tasks = self.completable_tasks(user).await;
                if tasks.is_empty() {
                    self.send_reply(
                        incoming,
                        "Nothing to complete 🎉",
                        Some(flows::main_menu()),
                    )
                    .await;
                    return ConversationState::Idle;
                }
                self.send_reply(
                    incoming,
                    "Which task did you finish?",
                    Some(flows::task_list_menu(&tasks)),
                )
                .await;
                ConversationState::SelectingComplete
            }
            flows::BTN_DELETE => {
                let tasks = self
                    .store
                    .tasks_for_user(user, None)
                    .await
                    .unwrap_or_default();
                if tasks.is_empty() {
                    self.send_reply(incoming, "No tasks to delete.", Some(flows::main_menu()))
                        .await;
                    return ConversationState::Idle;
                }
                self.send_reply(
                    incoming,
                    "Which task should I delete?",
                    Some(flows::task_list_menu(&tasks)),
                )
                .await;
                ConversationState::SelectingDelete
            }
            flows::BTN_ASSIGN => {
                let others: Vec<String> = match self.store.list_users().await {
                    Ok(users) => users
                        .iter()
                        .filter(|u| u.chat_id != user)
                        .map(|u| u.label().to_string())
                        .collect(),
                    Err(e) => {
                        error!("list users failed: {e}");
                        Vec::new()
                    }
                };
                if others.is_empty() {
                    self.send_reply(
                        incoming,
                        "No one else is registered yet.",
                        Some(flows::main_menu()),
                    )
                    .await;
                    return ConversationState::Idle;
                }
                self.send_reply(
                    incoming,
                    "Who should get the task?",
                    Some(flows::recipient_menu(&others)),
                )
                .await;
                ConversationState::ChoosingRecipient
            }
            flows::BTN_ASSIGNED => {
                let reply = self.assigned_tasks_text(user).await;
                self.send_reply(incoming, &reply, Some(flows::main_menu())).await;
                ConversationState::Idle
            }
            flows::BTN_WEATHER => {
                // The only slow path: show a typing indicator meanwhile.
                if let (Some(channel), Some(target)) = (
                    self.channels.get(&incoming.channel),
                    incoming.reply_target.as_deref(),
                ) {
                    let _ = channel.send_typing(target).await;
                }

                let reply = match self.weather.fetch().await {
                    Ok(report) => format!(
                        "🌤 Current weather in {}:\n{}",
                        self.weather.city(),
                        report.render()
                    ),
                    Err(e) => {
                        error!("weather lookup failed: {e}");
                        "❗ Failed to fetch weather.".to_string()
                    }
                };
                self.send_reply(incoming, &reply, Some(flows::main_menu())).await;
                ConversationState::Idle
            }
            flows::BTN_STATS => {
                let reply = match (
                    self.store.weekly_stats(user).await,
                    self.store.count_created_by(user).await,
                ) {
                    (Ok((created, completed)), Ok(total)) => format!(
                        "📊 Last 7 days: {created} created, {completed} completed.\n\
                         All-time created: {total}."
                    ),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("stats lookup failed: {e}");
                        "Something went wrong. Please try again.".to_string()
                    }
                };
                self.send_reply(incoming, &reply, Some(flows::main_menu())).await;
                ConversationState::Idle
            }
            flows::BTN_CANCEL => {
                self.send_reply(incoming, "Main menu.", Some(flows::main_menu())).await;
                ConversationState::Idle
            }
            flows::BTN_SKIP_CONTACT => {
                self.send_reply(
                    incoming,
                    "✅ You're signed up! Use the menu below to manage your tasks.",
                    Some(flows::main_menu()),
                )
                .await;
                ConversationState::Idle
            }
            _ => {
                // A tap on a task button from the morning digest lands here:
                // treat exact text of a completable task as a completion pick.
                let matches = self.completable_matching(user, text).await;
                if !matches.is_empty() {
                    let prompt = confirm_prompt(PendingOp::Complete, text, matches.len());
                    self.send_reply(incoming, &prompt, Some(flows::confirm_menu())).await;
                    return ConversationState::ConfirmComplete {
                        text: text.to_string(),
                    };
                }

                self.send_reply(
                    incoming,
                    "Please use the menu buttons 👇",
                    Some(flows::main_menu()),
                )
                .await;
                ConversationState::Idle
            }
        }
    }

    async fn dispatch_adding(&self, incoming: &IncomingMessage, text: &str) -> ConversationState {
        if text == flows::BTN_CANCEL {
            self.send_reply(incoming, "Cancelled.", Some(flows::main_menu())).await;
            return ConversationState::Idle;
        }

        let user = incoming.sender_id.as_str();
        match self
            .store
            .add_task(user, user, text, TaskStatus::Active)
            .await
        {
            Ok(_) => {
                self.send_reply(
                    incoming,
                    &format!("✅ Added: {text}"),
                    Some(flows::main_menu()),
                )
                .await;
            }
            Err(e) => {
                error!("add task failed for {user}: {e}");
                self.send_reply(
                    incoming,
                    "Something went wrong. Please try again.",
                    Some(flows::main_menu()),
                )
                .await;
            }
        }
        ConversationState::Idle
    }

    async fn dispatch_choosing_recipient(
        &self,
        incoming: &IncomingMessage,
        text: &str,
    ) -> ConversationState {
        if text == flows::BTN_CANCEL {
            self.send_reply(incoming, "Cancelled.", Some(flows::main_menu())).await;
            return ConversationState::Idle;
        }

        let recipient = match self.store.list_users().await {
            Ok(users) => users
                .into_iter()
                .find(|u| u.chat_id != incoming.sender_id && u.label() == text),
            Err(e) => {
                error!("list users failed: {e}");
                None
            }
        };

        match recipient {
            Some(user) => {
                self.send_reply(
                    incoming,
                    &format!("📝 What should {} do?", user.label()),
                    Some(flows::cancel_menu()),
                )
                .await;
                ConversationState::WritingTaskFor {
                    recipient: user.chat_id,
                }
            }
            None => {
                // Unrecognized pick: fall back to the menu.
                self.send_reply(
                    incoming,
                    "I don't know that user — back to the menu.",
                    Some(flows::main_menu()),
                )
                .await;
                ConversationState::Idle
            }
        }
    }

    async fn dispatch_writing_for(
        &self,
        incoming: &IncomingMessage,
        text: &str,
        recipient: &str,
    ) -> ConversationState {
        if text == flows::BTN_CANCEL {
            self.send_reply(incoming, "Cancelled.", Some(flows::main_menu())).await;
            return ConversationState::Idle;
        }

        let sender = incoming.sender_id.as_str();
        let task_id = match self
            .store
            .add_task(sender, recipient, text, TaskStatus::Pending)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("assign task failed for {sender}: {e}");
                self.send_reply(
                    incoming,
                    "Something went wrong. Please try again.",
                    Some(flows::main_menu()),
                )
                .await;
                return ConversationState::Idle;
            }
        };

        let sender_label = self
            .store
            .display_name(sender)
            .await
            .unwrap_or_else(|_| "Someone".to_string());
        let recipient_label = self
            .store
            .display_name(recipient)
            .await
            .unwrap_or_else(|_| "Unknown".to_string());

        // The insert above already committed: if the notification fails the
        // row persists and the receiver finds it in their list later.
        let notification = format!("📨 {sender_label} assigned you a task:\n{text}");
        match self
            .send_to(
                &incoming.channel,
                recipient,
                &notification,
                Some(flows::verdict_menu()),
            )
            .await
        {
            Ok(()) => {
                self.conversations.lock().await.insert(
                    recipient.to_string(),
                    ConversationState::AcceptOrReject { task_id },
                );
                self.send_reply(
                    incoming,
                    &format!("📤 Task sent to {recipient_label}."),
                    Some(flows::main_menu()),
                )
                .await;
            }
            Err(e) => {
                error!("failed to notify {recipient} about task {task_id}: {e}");
                self.send_reply(
                    incoming,
                    &format!("Task saved, but I couldn't notify {recipient_label}."),
                    Some(flows::main_menu()),
                )
                .await;
            }
        }

        ConversationState::Idle
    }

    async fn dispatch_verdict(
        &self,
        incoming: &IncomingMessage,
        text: &str,
        task_id: &str,
    ) -> ConversationState {
        let (decided, verb, emoji) = match text {
            flows::BTN_ACCEPT => (
                self.store.accept_task(task_id).await,
                "accepted",
                "👍",
            ),
            flows::BTN_REJECT => (
                self.store.reject_task(task_id).await,
                "rejected",
                "👎",
            ),
            _ => {
                // Unrecognized input: the task stays pending in the list.
                self.send_reply(
                    incoming,
                    "Task left pending — find it under 📋 My tasks.",
                    Some(flows::main_menu()),
                )
                .await;
                return ConversationState::Idle;
            }
        };

        match decided {
            Ok(true) => {
                self.send_reply(
                    incoming,
                    &format!("{emoji} {}.", capitalize(verb)),
                    Some(flows::main_menu()),
                )
                .await;

                // Tell the assigner. Log-only on failure: the decision is
                // already committed.
                if let Ok(Some(task)) = self.store.get_task(task_id).await {
                    let my_label = self
                        .store
                        .display_name(&incoming.sender_id)
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    let note = format!("{emoji} {my_label} {verb}: {}", task.text);
                    if let Err(e) = self
                        .send_to(&incoming.channel, &task.sender_id, &note, None)
                        .await
                    {
                        error!("failed to notify assigner {}: {e}", task.sender_id);
                    }
                }
            }
            Ok(false) => {
                self.send_reply(
                    incoming,
                    "That task is no longer waiting for a decision.",
                    Some(flows::main_menu()),
                )
                .await;
            }
            Err(e) => {
                error!("verdict on task {task_id} failed: {e}");
                self.send_reply(
                    incoming,
                    "Something went wrong. Please try again.",
                    Some(flows::main_menu()),
                )
                .await;
            }
        }

        ConversationState::Idle
    }

    async fn dispatch_selecting(
        &self,
        incoming: &IncomingMessage,
        text: &str,
        op: PendingOp,
    ) -> ConversationState {
        if text == flows::BTN_CANCEL {
            self.send_reply(incoming, "Cancelled.", Some(flows::main_menu())).await;
            return ConversationState::Idle;
        }

        let user = incoming.sender_id.as_str();
        let matches = match op {
            PendingOp::Complete => self.completable_matching(user, text).await,
            PendingOp::Delete => self
                .store
                .find_by_text(user, text)
                .await
                .unwrap_or_default(),
        };

        if matches.is_empty() {
            let reply = match op {
                PendingOp::Complete => "❓ Task not found or already completed.",
                PendingOp::Delete => "❓ Task not found.",
            };
            self.send_reply(incoming, reply, Some(flows::main_menu())).await;
            return ConversationState::Idle;
        }

        let prompt = confirm_prompt(op, text, matches.len());
        self.send_reply(incoming, &prompt, Some(flows::confirm_menu())).await;

        match op {
            PendingOp::Complete => ConversationState::ConfirmComplete {
                text: text.to_string(),
            },
            PendingOp::Delete => ConversationState::ConfirmDelete {
                text: text.to_string(),
            },
        }
    }

    async fn dispatch_confirm(
        &self,
        incoming: &IncomingMessage,
        text: &str,
        op: PendingOp,
        task_text: &str,
    ) -> ConversationState {
        match text {
            flows::BTN_YES => {
                let user = incoming.sender_id.as_str();
                let outcome = match op {
                    PendingOp::Complete => {
                        self.store
                            .set_status_by_text(user, task_text, TaskStatus::Completed)
                            .await
                    }
                    PendingOp::Delete => self.store.delete_by_text(user, task_text).await,
                };

                let reply = match (op, outcome) {
                    (PendingOp::Complete, Ok(rows)) if rows > 0 => {
                        format!("✅ Done: {task_text}")
                    }
                    (PendingOp::Delete, Ok(rows)) if rows > 0 => {
                        format!("🗑 Deleted: {task_text}")
                    }
                    // The selection disappeared under us: nothing to do.
                    (_, Ok(_)) => "❓ Nothing to update — the task is gone.".to_string(),
                    (_, Err(e)) => {
                        error!("confirm {op:?} failed for '{task_text}': {e}");
                        "Something went wrong. Please try again.".to_string()
                    }
                };
                self.send_reply(incoming, &reply, Some(flows::main_menu())).await;
            }
            flows::BTN_NO => {
                self.send_reply(incoming, "Cancelled.", Some(flows::main_menu())).await;
            }
            _ => {
                self.send_reply(
                    incoming,
                    "Back to the menu — nothing changed.",
                    Some(flows::main_menu()),
                )
                .await;
            }
        }
        ConversationState::Idle
    }

    // --- helpers ---

    /// Tasks the user can still complete (active or accepted).
    async fn completable_tasks(&self, user: &str) -> Vec<Task> {
        self.store
            .tasks_for_user(user, None)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.status.is_completable())
            .collect()
    }

    /// Completable tasks with exactly this text.
    async fn completable_matching(&self, user: &str, text: &str) -> Vec<Task> {
        self.store
            .find_by_text(user, text)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.status.is_completable())
            .collect()
    }

    /// Current task list body: active and accepted tasks, plus pending
    /// assignments awaiting the user's decision.
    async fn my_tasks_text(&self, user: &str) -> String {
        let tasks = match self.store.tasks_for_user(user, None).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("list tasks failed for {user}: {e}");
                return "Something went wrong. Please try again.".to_string();
            }
        };

        let mut lines = Vec::new();
        for task in &tasks {
            match task.status {
                TaskStatus::Active => lines.push(format!("• {}", task.text)),
                TaskStatus::Accepted => {
                    let from = self.sender_label(task).await;
                    lines.push(format!("👍 {}{from}", task.text));
                }
                TaskStatus::Pending => {
                    let from = self.sender_label(task).await;
                    lines.push(format!("⏳ {}{from} — awaiting your decision", task.text));
                }
                TaskStatus::Rejected | TaskStatus::Completed => {}
            }
        }

        if lines.is_empty() {
            "You have no tasks 🎉".to_string()
        } else {
            format!("📋 Your tasks:\n\n{}", lines.join("\n"))
        }
    }

    /// " (from Name)" suffix for tasks someone else assigned.
    async fn sender_label(&self, task: &Task) -> String {
        if task.sender_id == task.receiver_id {
            return String::new();
        }
        let name = self
            .store
            .display_name(&task.sender_id)
            .await
            .unwrap_or_else(|_| "Unknown".to_string());
        format!(" (from {name})")
    }

    /// "Assigned by me" body: tasks handed to others, with their status.
    async fn assigned_tasks_text(&self, user: &str) -> String {
        match self.store.assigned_by(user).await {
            Ok(assigned) if assigned.is_empty() => {
                "You haven't assigned any tasks.".to_string()
            }
            Ok(assigned) => {
                let mut out = String::from("📨 Assigned by you:\n");
                for (task, receiver) in &assigned {
                    out.push_str(&format!("\n• {} → {receiver} [{}]", task.text, task.status));
                }
                out
            }
            Err(e) => {
                error!("list assigned failed for {user}: {e}");
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

fn confirm_prompt(op: PendingOp, text: &str, matches: usize) -> String {
    let mut prompt = match op {
        PendingOp::Complete => format!("Complete '{text}'?"),
        PendingOp::Delete => format!("Delete '{text}'?"),
    };
    if matches > 1 {
        prompt.push_str(&format!(
            "\n({matches} tasks share this text; all of them will be affected.)"
        ));
    }
    prompt
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
