//! Daily scheduled messages: morning digest, evening check-in, weekly
//! stats, checklist seeding, and the completed-task sweep.

use super::flows;
use super::Gateway;
use chrono::{Datelike, Local, NaiveDate, NaiveTime, Weekday};
use std::collections::HashMap;
use std::path::Path;
use tern_core::shellexpand;
use tern_store::TaskStatus;
use tracing::{error, info, warn};

/// Default checklist written on first use, one task per line.
const DEFAULT_CHECKLIST: &str = "Wake up\nExercise\nWork on project\nRead a book\nGo to sleep\n";

/// Local time of the nightly sweep.
const SWEEP_TIME: (u32, u32) = (3, 30);

/// A job fires at the first tick at or after its time, once per local day.
fn is_due(now: NaiveTime, target: NaiveTime, last: Option<NaiveDate>, today: NaiveDate) -> bool {
    now >= target && last != Some(today)
}

fn parse_time(s: &str, fallback: (u32, u32)) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap_or_else(|_| {
        warn!("invalid time '{s}' in scheduler config, using {:02}:{:02}", fallback.0, fallback.1);
        NaiveTime::from_hms_opt(fallback.0, fallback.1, 0).unwrap_or(NaiveTime::MIN)
    })
}

impl Gateway {
    /// Background loop: fires each daily job once per day at its local time.
    /// Runs independently of conversation state and shares the same store.
    pub(crate) async fn scheduler_loop(&self) {
        let morning = parse_time(&self.config.scheduler.morning, (7, 0));
        let evening = parse_time(&self.config.scheduler.evening, (20, 0));
        let sweep = NaiveTime::from_hms_opt(SWEEP_TIME.0, SWEEP_TIME.1, 0)
            .unwrap_or(NaiveTime::MIN);
        let poll_secs = self.config.scheduler.poll_interval_secs;

        info!(
            "scheduler running | morning {morning} | evening {evening} | sweep {sweep} | \
             poll {poll_secs}s"
        );

        let mut last_run: HashMap<&'static str, NaiveDate> = HashMap::new();

        loop {
            tokio::time::sleep(std::time::Duration::from_secs(poll_secs)).await;

            let now = Local::now();
            let today = now.date_naive();
            let time = now.time();

            if is_due(time, sweep, last_run.get("sweep").copied(), today) {
                last_run.insert("sweep", today);
                self.sweep_completed().await;
            }

            if is_due(time, morning, last_run.get("morning").copied(), today) {
                last_run.insert("morning", today);
                self.morning_digest().await;
            }

            if is_due(time, evening, last_run.get("evening").copied(), today) {
                last_run.insert("evening", today);
                self.evening_checkin().await;

                // Weekly stats ride the Sunday evening tick.
                if today.weekday() == Weekday::Sun {
                    self.weekly_stats_roundup().await;
                }
            }
        }
    }

    /// Morning digest: weather, checklist seeding, and today's plan.
    async fn morning_digest(&self) {
        let users = match self.store.list_users().await {
            Ok(users) => users,
            Err(e) => {
                error!("morning digest: list users failed: {e}");
                return;
            }
        };
        if users.is_empty() {
            return;
        }

        let weather_block = match self.weather.fetch().await {
            Ok(report) => format!(
                "📍 Weather in {}:\n{}",
                self.weather.city(),
                report.render()
            ),
            Err(e) => {
                error!("morning digest: weather lookup failed: {e}");
                "❗ Failed to fetch weather.".to_string()
            }
        };

        let checklist = self.read_checklist();

        for user in &users {
            // Seed today's plan, skipping lines that are already active.
            for item in &checklist {
                match self.store.active_task_exists(&user.chat_id, item).await {
                    Ok(true) => {}
                    Ok(false) => {
                        if let Err(e) = self
                            .store
                            .add_task(&user.chat_id, &user.chat_id, item, TaskStatus::Active)
                            .await
                        {
                            error!("checklist seeding failed for {}: {e}", user.chat_id);
                        }
                    }
                    Err(e) => error!("checklist check failed for {}: {e}", user.chat_id),
                }
            }

            let tasks = self
                .store
                .tasks_for_user(&user.chat_id, Some(TaskStatus::Active))
                .await
                .unwrap_or_default();

            let mut text = format!("🌞 Good morning! 💪\n\n{weather_block}");
            let keyboard = if tasks.is_empty() {
                text.push_str("\n\n📋 Nothing planned for today.");
                flows::main_menu()
            } else {
                text.push_str("\n\n📋 Today's plan — tap a task when it's done:");
                flows::task_list_menu(&tasks)
            };

            if let Err(e) = self
                .send_broadcast(&user.chat_id, &text, Some(keyboard))
                .await
            {
                error!("morning digest send failed for {}: {e}", user.chat_id);
            }
        }

        info!("morning digest delivered to {} user(s)", users.len());
    }

    /// Evening check-in.
    async fn evening_checkin(&self) {
        let users = match self.store.list_users().await {
            Ok(users) => users,
            Err(e) => {
                error!("evening check-in: list users failed: {e}");
                return;
            }
        };

        for user in &users {
            let text = "🌙 How was your day? Send /done if you completed everything \
                        or /miss if not.";
            if let Err(e) = self.send_broadcast(&user.chat_id, text, None).await {
                error!("evening check-in send failed for {}: {e}", user.chat_id);
            }
        }
    }

    /// Sunday roundup: trailing 7-day stats per user.
    async fn weekly_stats_roundup(&self) {
        let users = match self.store.list_users().await {
            Ok(users) => users,
            Err(e) => {
                error!("weekly roundup: list users failed: {e}");
                return;
            }
        };

        for user in &users {
            match self.store.weekly_stats(&user.chat_id).await {
                Ok((created, completed)) => {
                    let text = format!(
                        "📊 Your week: {created} task(s) created, {completed} completed."
                    );
                    if let Err(e) = self.send_broadcast(&user.chat_id, &text, None).await {
                        error!("weekly roundup send failed for {}: {e}", user.chat_id);
                    }
                }
                Err(e) => error!("weekly roundup stats failed for {}: {e}", user.chat_id),
            }
        }
    }

    /// Sweep completed tasks past the retention window.
    async fn sweep_completed(&self) {
        match self
            .store
            .purge_completed_older_than(self.config.scheduler.retain_completed_days)
            .await
        {
            Ok(0) => {}
            Ok(n) => info!("sweep: removed {n} completed task(s)"),
            Err(e) => error!("sweep failed: {e}"),
        }
    }

    /// Read the checklist file, creating it with a default plan on first
    /// use. Any error degrades to an empty checklist.
    fn read_checklist(&self) -> Vec<String> {
        let path = shellexpand(&self.config.scheduler.checklist_path);
        if path.is_empty() {
            return Vec::new();
        }

        if !Path::new(&path).exists() {
            if let Some(parent) = Path::new(&path).parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("checklist: failed to create {}: {e}", parent.display());
                    return Vec::new();
                }
            }
            if let Err(e) = std::fs::write(&path, DEFAULT_CHECKLIST) {
                warn!("checklist: failed to write default {path}: {e}");
                return Vec::new();
            }
            info!("checklist: wrote default plan to {path}");
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            Err(e) => {
                error!("checklist: failed to read {path}: {e}");
                Vec::new()
            }
        }
    }

    /// Scheduled sends go through the first (and in practice only) channel;
    /// the registry does not record which channel a user arrived on.
    async fn send_broadcast(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<tern_core::keyboard::Keyboard>,
    ) -> Result<(), tern_core::error::TernError> {
        let Some(name) = self.channels.keys().next() else {
            return Err(tern_core::error::TernError::Channel(
                "no channels configured".into(),
            ));
        };
        self.send_to(name, chat_id, text, keyboard).await
    }
}
