mod commands;
mod gateway;

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use tern_channels::telegram::TelegramChannel;
use tern_core::config;
use tern_store::Store;
use tern_weather::WeatherClient;

#[derive(Parser)]
#[command(name = "tern", version, about = "Tern — Telegram task & weather assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot.
    Start,
    /// Check configuration and report what is enabled.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;

            // Build channels.
            let mut channels: HashMap<String, Arc<dyn tern_core::traits::Channel>> =
                HashMap::new();

            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. \
                             Set it in config.toml or the TELEGRAM_BOT_TOKEN env var."
                        );
                    }
                    let channel = TelegramChannel::new(tg.clone());
                    channels.insert("telegram".to_string(), Arc::new(channel));
                }
            }

            if channels.is_empty() {
                anyhow::bail!(
                    "No channels enabled. Enable [channel.telegram] in config.toml."
                );
            }

            if cfg.weather.api_key.is_empty() {
                tracing::warn!(
                    "weather api_key is empty (set it in config.toml or the \
                     OPENWEATHER_API_KEY env var); weather lookups will fail"
                );
            }

            let store = Store::new(&cfg.store).await?;
            let weather = WeatherClient::new(cfg.weather.clone());

            println!("Tern — starting bot...");
            let gw = Arc::new(gateway::Gateway::new(channels, store, weather, cfg));
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Tern — Status Check\n");
            println!("Config: {}", cli.config);
            println!();

            if let Some(ref tg) = cfg.channel.telegram {
                println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                );
            } else {
                println!("  telegram: not configured");
            }

            println!(
                "  weather: {} ({})",
                if cfg.weather.api_key.is_empty() {
                    "missing api_key"
                } else {
                    "configured"
                },
                cfg.weather.city
            );
            println!("  store: {}", cfg.store.db_path);
            println!(
                "  scheduler: {} (morning {}, evening {})",
                if cfg.scheduler.enabled {
                    "enabled"
                } else {
                    "disabled"
                },
                cfg.scheduler.morning,
                cfg.scheduler.evening
            );
            println!(
                "  admin: {}",
                if cfg.bot.admin_chat_id.is_empty() {
                    "not set"
                } else {
                    cfg.bot.admin_chat_id.as_str()
                }
            );
        }
    }

    Ok(())
}
