//! Built-in bot commands — instant responses, no conversation state.

use crate::gateway::flows;
use tern_core::keyboard::Keyboard;
use tern_store::Store;

/// Known bot commands.
pub enum Command {
    Start,
    Help,
    Done,
    Miss,
    Users,
}

impl Command {
    /// Parse a command from message text. Returns `None` for anything that
    /// is not a known `/` command (which then goes through the menu
    /// dispatcher).
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        // Strip @botname suffix (e.g. "/help@tern_bot" → "/help").
        let cmd = first.split('@').next().unwrap_or(first);
        match cmd {
            "/start" => Some(Self::Start),
            "/help" => Some(Self::Help),
            "/done" => Some(Self::Done),
            "/miss" => Some(Self::Miss),
            "/users" => Some(Self::Users),
            _ => None,
        }
    }
}

/// Grouped context for command execution.
pub struct CommandContext<'a> {
    pub store: &'a Store,
    pub sender_id: &'a str,
    pub sender_name: Option<&'a str>,
    pub bot_name: &'a str,
    pub admin_chat_id: &'a str,
    pub morning: &'a str,
    pub evening: &'a str,
}

/// A command reply: text plus the keyboard to show next.
pub struct CommandReply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Handle a command and return the reply.
pub async fn handle(cmd: Command, ctx: &CommandContext<'_>) -> CommandReply {
    match cmd {
        Command::Start => handle_start(ctx).await,
        Command::Help => CommandReply {
            text: help_text(),
            keyboard: Some(flows::main_menu()),
        },
        Command::Done => CommandReply {
            text: "🎉 Great job! I'm proud of you!".to_string(),
            keyboard: Some(flows::main_menu()),
        },
        Command::Miss => CommandReply {
            text: "💪 No worries! Tomorrow will be better!".to_string(),
            keyboard: Some(flows::main_menu()),
        },
        Command::Users => handle_users(ctx).await,
    }
}

/// /start — greet. Unknown users are asked for their contact before the
/// first registry insert; that is the only moment a phone can be captured,
/// since the registry never refreshes a profile.
async fn handle_start(ctx: &CommandContext<'_>) -> CommandReply {
    match ctx.store.get_user(ctx.sender_id).await {
        Ok(None) => {
            let name_part = ctx
                .sender_name
                .map(|n| format!(" {n}"))
                .unwrap_or_default();
            CommandReply {
                text: format!(
                    "👋 Hi{name_part}! I'm {}, your task and weather assistant.\n\n\
                     Share your contact to finish signing up, or skip — \
                     you can register without a phone number.",
                    ctx.bot_name
                ),
                keyboard: Some(flows::contact_menu()),
            }
        }
        Ok(Some(_)) => CommandReply {
            text: format!(
                "✅ {} is running! The morning plan arrives at {} and the \
                 evening check-in at {}.",
                ctx.bot_name, ctx.morning, ctx.evening
            ),
            keyboard: Some(flows::main_menu()),
        },
        Err(e) => CommandReply {
            text: format!("Error: {e}"),
            keyboard: Some(flows::main_menu()),
        },
    }
}

/// /users — admin-only listing of the registry.
async fn handle_users(ctx: &CommandContext<'_>) -> CommandReply {
    if ctx.admin_chat_id.is_empty() || ctx.admin_chat_id != ctx.sender_id {
        return CommandReply {
            text: "Not authorized.".to_string(),
            keyboard: Some(flows::main_menu()),
        };
    }

    let text = match ctx.store.list_users().await {
        Ok(users) if users.is_empty() => "No users registered yet.".to_string(),
        Ok(users) => {
            let mut out = String::from("👥 Registered users:\n");
            for user in &users {
                let phone = user.phone_number.as_deref().unwrap_or("—");
                out.push_str(&format!("\n• {} — {phone} ({})", user.label(), user.chat_id));
            }
            out
        }
        Err(e) => format!("Error: {e}"),
    };

    CommandReply {
        text,
        keyboard: Some(flows::main_menu()),
    }
}

fn help_text() -> String {
    "ℹ️ Commands:\n\
     /start — register and show the menu\n\
     /help — this message\n\
     /done, /miss — evening check-in replies\n\
     /users — list registered users (admin)\n\n\
     Everything else works through the menu buttons: tasks, assignments, \
     weather and weekly stats."
        .to_string()
}
