//! RON configuration for the `watch` binary.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use watch_core::{ExtractionRules, DEFAULT_BODY, DEFAULT_SUBJECT};
use watch_engine::FetchSettings;

const HOUR_SECS: u64 = 60 * 60;
const DAY_SECS: u64 = 24 * HOUR_SECS;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    pub database: PathBuf,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub broadcasters: Vec<BroadcasterConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub id: String,
    pub index_url: String,
    pub link_prefix: String,
    #[serde(default = "default_task_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub rules: ExtractionRules,
}

#[derive(Debug, Clone, Deserialize)]
pub enum BroadcasterConfig {
    Log {
        #[serde(default = "default_subject")]
        subject: String,
        #[serde(default = "default_body")]
        body: String,
    },
    Email {
        /// JSON file with `from` and `to`.
        config: PathBuf,
        #[serde(default = "default_subject")]
        subject: String,
        #[serde(default = "default_body")]
        body: String,
        outbox: PathBuf,
    },
}

fn default_poll_interval() -> u64 {
    HOUR_SECS
}

fn default_task_timeout() -> u64 {
    DAY_SECS
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

fn default_body() -> String {
    DEFAULT_BODY.to_string()
}

impl WatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: WatchConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be positive");
        }
        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id.as_str()) {
                bail!("task id '{}' is used more than once", task.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
(
    database: "data/watch.db",
    log_file: Some("watch.log"),
    tasks: [
        (
            id: "half-staff",
            index_url: "https://www.whitehouse.gov/briefing-room/presidential-actions/proclamations",
            link_prefix: "/the-press-office",
        ),
    ],
    broadcasters: [
        Log(body: "{why}"),
        Email(config: "data/.email_config.json", outbox: "data/outbox", subject: "Lowered until {until}"),
    ],
)
"#;

    #[test]
    fn sample_config_uses_defaults() {
        let config = WatchConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.poll_interval_secs, 3600);
        assert_eq!(config.log_file, Some(PathBuf::from("watch.log")));
        assert_eq!(config.tasks[0].timeout_secs, 86_400);
        assert_eq!(config.tasks[0].rules, ExtractionRules::default());
        assert_eq!(config.fetch.redirect_limit, FetchSettings::default().redirect_limit);
        match &config.broadcasters[0] {
            BroadcasterConfig::Log { subject, body } => {
                assert_eq!(subject, DEFAULT_SUBJECT);
                assert_eq!(body, "{why}");
            }
            other => panic!("unexpected broadcaster {other:?}"),
        }
        match &config.broadcasters[1] {
            BroadcasterConfig::Email { subject, body, .. } => {
                assert_eq!(subject, "Lowered until {until}");
                assert_eq!(body, DEFAULT_BODY);
            }
            other => panic!("unexpected broadcaster {other:?}"),
        }
    }

    #[test]
    fn shipped_example_parses() {
        let config = WatchConfig::parse(include_str!("../watch.example.ron")).unwrap();
        assert_eq!(config.tasks[0].id, "half-staff-flag");
        assert_eq!(config.broadcasters.len(), 2);
    }

    #[test]
    fn duplicate_task_ids_are_rejected() {
        let text = r#"(
            database: "watch.db",
            tasks: [
                (id: "a", index_url: "https://example.gov/", link_prefix: "/x"),
                (id: "a", index_url: "https://example.gov/", link_prefix: "/y"),
            ],
        )"#;
        let err = WatchConfig::parse(text).unwrap_err();
        assert!(err.to_string().contains("used more than once"));
    }

    #[test]
    fn fetch_overrides_are_in_seconds() {
        let text = r#"(
            database: "watch.db",
            fetch: (request_timeout: 5, max_bytes: 1024),
            tasks: [],
        )"#;
        let config = WatchConfig::parse(text).unwrap();
        assert_eq!(config.fetch.request_timeout, std::time::Duration::from_secs(5));
        assert_eq!(config.fetch.max_bytes, 1024);
        assert_eq!(config.fetch.connect_timeout, std::time::Duration::from_secs(10));
    }
}
