//! Slack incoming-webhook notifications for backup and restore outcomes

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{NotificationConfig, NotifyEvent};

const MAX_ERROR_CHARS: usize = 500;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts operation outcomes to Slack when the event is listed in `notify_on`
pub struct NotificationManager {
    config: NotificationConfig,
}

/// One finished operation
#[derive(Debug, Clone)]
pub struct Notification {
    pub event: NotifyEvent,
    /// "backup", "restore" or "upload"
    pub operation: String,
    pub engine: String,
    pub database: String,
    pub error: Option<String>,
    pub elapsed: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: &'static str,
    fields: Vec<SlackField>,
    footer: &'static str,
    ts: i64,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: &'static str,
    value: String,
    short: bool,
}

impl SlackField {
    fn short(title: &'static str, value: String) -> Self {
        Self { title, value, short: true }
    }
}

impl Notification {
    fn headline(&self) -> String {
        let mut operation = self.operation.clone();
        if let Some(first) = operation.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        match self.event {
            NotifyEvent::Failure => format!(
                ":x: {} of {} database '{}' failed",
                operation, self.engine, self.database
            ),
            NotifyEvent::Success => format!(
                ":white_check_mark: {} of {} database '{}' succeeded",
                operation, self.engine, self.database
            ),
        }
    }

    fn to_slack(&self) -> SlackMessage {
        let mut fields = vec![
            SlackField::short("Engine", self.engine.clone()),
            SlackField::short("Database", self.database.clone()),
        ];
        if let Some(elapsed) = self.elapsed {
            fields.push(SlackField::short("Duration", format_elapsed(elapsed)));
        }
        if let Some(ref error) = self.error {
            fields.push(SlackField {
                title: "Error",
                value: format!("```{}```", truncate_error(error)),
                short: false,
            });
        }

        SlackMessage {
            text: self.headline(),
            attachments: vec![SlackAttachment {
                color: match self.event {
                    NotifyEvent::Failure => "danger",
                    NotifyEvent::Success => "good",
                },
                fields,
                footer: "db-backup-tool",
                ts: chrono::Utc::now().timestamp(),
            }],
        }
    }
}

impl NotificationManager {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Whether `event` would be delivered: a webhook URL is set and the event is listed
    pub fn is_enabled(&self, event: NotifyEvent) -> bool {
        !self.config.slack_webhook_url.trim().is_empty() && self.config.notify_on.contains(&event)
    }

    pub fn send(&self, notification: &Notification) -> Result<()> {
        if !self.is_enabled(notification.event) {
            debug!("{:?} notifications are disabled", notification.event);
            return Ok(());
        }

        self.post(&notification.to_slack())?;
        info!(
            "Sent {:?} notification for {} '{}'",
            notification.event, notification.engine, notification.database
        );
        Ok(())
    }

    pub fn send_failure(
        &self,
        operation: &str,
        engine: &str,
        database: &str,
        error: &str,
        duration_secs: Option<u64>,
    ) -> Result<()> {
        self.send(&Notification {
            event: NotifyEvent::Failure,
            operation: operation.to_string(),
            engine: engine.to_string(),
            database: database.to_string(),
            error: Some(error.to_string()),
            elapsed: duration_secs.map(Duration::from_secs),
        })
    }

    pub fn send_success(
        &self,
        operation: &str,
        engine: &str,
        database: &str,
        duration_secs: u64,
    ) -> Result<()> {
        self.send(&Notification {
            event: NotifyEvent::Success,
            operation: operation.to_string(),
            engine: engine.to_string(),
            database: database.to_string(),
            error: None,
            elapsed: Some(Duration::from_secs(duration_secs)),
        })
    }

    fn post(&self, message: &SlackMessage) -> Result<()> {
        let response = reqwest::blocking::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build webhook client")?
            .post(&self.config.slack_webhook_url)
            .json(message)
            .send()
            .context("Slack webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Slack rejected notification ({}): {}", status, body);
            anyhow::bail!("Slack webhook returned {}: {}", status, body);
        }
        Ok(())
    }
}

/// At most 500 characters, ellipsis included
fn truncate_error(error: &str) -> String {
    match error.char_indices().nth(MAX_ERROR_CHARS) {
        None => error.to_string(),
        Some(_) => {
            let cut: String = error.chars().take(MAX_ERROR_CHARS - 3).collect();
            cut + "..."
        }
    }
}

/// Two most significant units, e.g. "2m 5s" or "1h 30m"; zero units are dropped
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let units = [(total / 3600, "h"), (total % 3600 / 60, "m"), (total % 60, "s")];

    let parts: Vec<String> = units
        .iter()
        .skip_while(|(value, _)| *value == 0)
        .take(2)
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}
