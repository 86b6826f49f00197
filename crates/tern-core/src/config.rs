use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TernError;

/// Top-level Tern configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Chat id allowed to run admin commands (/users). Empty = disabled.
    #[serde(default)]
    pub admin_chat_id: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            admin_chat_id: String::new(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Allowed Telegram user ids. Empty = allow all.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

/// Weather provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default = "default_weather_lang")]
    pub lang: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            city: default_city(),
            units: default_units(),
            lang: default_weather_lang(),
        }
    }
}

/// Persistence config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Scheduler configuration — daily messages and the cleanup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Local time of the morning digest, "HH:MM".
    #[serde(default = "default_morning")]
    pub morning: String,
    /// Local time of the evening check-in, "HH:MM".
    #[serde(default = "default_evening")]
    pub evening: String,
    /// Completed tasks older than this many days are swept.
    #[serde(default = "default_retain_days")]
    pub retain_completed_days: u32,
    /// Daily checklist file, one task per line. Empty = no seeding.
    #[serde(default = "default_checklist_path")]
    pub checklist_path: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            morning: default_morning(),
            evening: default_evening(),
            retain_completed_days: default_retain_days(),
            checklist_path: default_checklist_path(),
        }
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "Tern".to_string()
}
fn default_true() -> bool {
    true
}
fn default_city() -> String {
    "Saint Petersburg".to_string()
}
fn default_units() -> String {
    "metric".to_string()
}
fn default_weather_lang() -> String {
    "en".to_string()
}
fn default_db_path() -> String {
    "~/.tern/tasks.db".to_string()
}
fn default_poll_interval() -> u64 {
    60
}
fn default_morning() -> String {
    "07:00".to_string()
}
fn default_evening() -> String {
    "20:00".to_string()
}
fn default_retain_days() -> u32 {
    7
}
fn default_checklist_path() -> String {
    "~/.tern/checklist.txt".to_string()
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Empty secrets are
/// filled from the environment (`TELEGRAM_BOT_TOKEN`, `OPENWEATHER_API_KEY`).
pub fn load(path: &str) -> Result<Config, TernError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TernError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| TernError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        Config {
            channel: ChannelConfig {
                telegram: Some(TelegramConfig {
                    enabled: true,
                    bot_token: String::new(),
                    allowed_users: Vec::new(),
                }),
            },
            ..Config::default()
        }
    };

    if let Some(tg) = config.channel.telegram.as_mut() {
        if tg.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
                tg.bot_token = token;
            }
        }
    }
    if config.weather.api_key.is_empty() {
        if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
            config.weather.api_key = key;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bot.name, "Tern");
        assert_eq!(config.weather.city, "Saint Petersburg");
        assert_eq!(config.weather.units, "metric");
        assert_eq!(config.store.db_path, "~/.tern/tasks.db");
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.morning, "07:00");
        assert_eq!(config.scheduler.evening, "20:00");
        assert_eq!(config.scheduler.retain_completed_days, 7);
        assert!(config.channel.telegram.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [bot]
            name = "Tern Dev"
            admin_chat_id = "12345"

            [channel.telegram]
            enabled = true
            bot_token = "abc"
            allowed_users = [1, 2]

            [weather]
            api_key = "key"
            city = "Helsinki"

            [scheduler]
            morning = "06:30"
            retain_completed_days = 14
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot.admin_chat_id, "12345");
        let tg = config.channel.telegram.unwrap();
        assert!(tg.enabled);
        assert_eq!(tg.allowed_users, vec![1, 2]);
        assert_eq!(config.weather.city, "Helsinki");
        // Untouched fields keep their defaults.
        assert_eq!(config.weather.units, "metric");
        assert_eq!(config.scheduler.morning, "06:30");
        assert_eq!(config.scheduler.evening, "20:00");
        assert_eq!(config.scheduler.retain_completed_days, 14);
    }

    #[test]
    fn test_shellexpand_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(shellexpand("~/x/y"), "/home/tester/x/y");
        assert_eq!(shellexpand("/abs/path"), "/abs/path");
        assert_eq!(shellexpand(":memory:"), ":memory:");
    }
}
