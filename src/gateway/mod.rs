//! Gateway — the event loop connecting the chat channel, the store, the
//! weather client, and the conversation state machine.

mod dispatch;
pub mod flows;
mod scheduler;

#[cfg(test)]
mod tests;

use flows::ConversationState;
use std::collections::HashMap;
use std::sync::Arc;
use tern_core::config::Config;
use tern_core::error::TernError;
use tern_core::keyboard::Keyboard;
use tern_core::message::{IncomingMessage, OutgoingMessage};
use tern_core::traits::Channel;
use tern_store::Store;
use tern_weather::WeatherClient;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

/// The central gateway routing messages between the channel, the store,
/// and the scheduler.
pub struct Gateway {
    pub(crate) channels: HashMap<String, Arc<dyn Channel>>,
    pub(crate) store: Store,
    pub(crate) weather: WeatherClient,
    pub(crate) config: Config,
    /// Conversation state per chat id, owned by the dispatcher. No lock is
    /// held across store I/O; concurrent messages from one chat may race,
    /// which is acceptable at this traffic scale.
    pub(crate) conversations: Mutex<HashMap<String, ConversationState>>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        channels: HashMap<String, Arc<dyn Channel>>,
        store: Store,
        weather: WeatherClient,
        config: Config,
    ) -> Self {
        Self {
            channels,
            store,
            weather,
            config,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Run the main event loop until ctrl-c.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Tern gateway running | channels: {}",
            self.channels.keys().cloned().collect::<Vec<_>>().join(", ")
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        // Spawn the scheduler loop.
        if self.config.scheduler.enabled {
            let gw = self.clone();
            tokio::spawn(async move {
                gw.scheduler_loop().await;
            });
        }

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                Some(incoming) = rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_message(incoming).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                error!("failed to stop channel {name}: {e}");
            }
        }

        Ok(())
    }

    /// Send a reply to the chat a message came from. Failures are logged.
    pub(crate) async fn send_reply(
        &self,
        incoming: &IncomingMessage,
        text: &str,
        keyboard: Option<Keyboard>,
    ) {
        let Some(channel) = self.channels.get(&incoming.channel) else {
            error!("no channel found for '{}'", incoming.channel);
            return;
        };

        let msg = OutgoingMessage {
            text: text.to_string(),
            reply_target: incoming.reply_target.clone(),
            keyboard,
        };
        if let Err(e) = channel.send(msg).await {
            error!("failed to send response via {}: {e}", incoming.channel);
        }
    }

    /// Send to an arbitrary chat on a named channel (assignment
    /// notifications, scheduled messages). The caller decides what a
    /// failure means.
    pub(crate) async fn send_to(
        &self,
        channel_name: &str,
        chat_id: &str,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TernError> {
        let channel = self
            .channels
            .get(channel_name)
            .ok_or_else(|| TernError::Channel(format!("no channel '{channel_name}'")))?;

        channel
            .send(OutgoingMessage {
                text: text.to_string(),
                reply_target: Some(chat_id.to_string()),
                keyboard,
            })
            .await
    }
}
