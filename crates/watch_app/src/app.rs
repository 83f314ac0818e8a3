use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use watch_core::{Clock, ExtractionEngine, NotificationTemplates, Record};
use watch_engine::{
    AnchorIndexSource, Broadcaster, DedupStore, EmailBroadcaster, EmailConfig, Fetcher,
    LogBroadcaster, MonitorTask, Runner, SeenEntry,
};
use watch_logging::watch_info;

use crate::config::{BroadcasterConfig, TaskConfig, WatchConfig};

/// Builds a runner from configuration around the given collaborators.
pub fn build_runner(
    config: &WatchConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn DedupStore>,
    clock: Arc<dyn Clock>,
) -> Result<Runner> {
    let mut runner = Runner::new(Duration::from_secs(config.poll_interval_secs), clock);
    for task in &config.tasks {
        runner.add_task(build_task(task, fetcher.clone(), store.clone())?);
    }
    for broadcaster in &config.broadcasters {
        runner.add_broadcaster(build_broadcaster(broadcaster)?);
    }
    watch_info!(
        "Watching {} task(s) with {} broadcaster(s), polling every {}s",
        config.tasks.len(),
        config.broadcasters.len(),
        config.poll_interval_secs
    );
    Ok(runner)
}

fn build_task(
    task: &TaskConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn DedupStore>,
) -> Result<MonitorTask> {
    let index = AnchorIndexSource::new(&task.index_url, task.link_prefix.clone())
        .with_context(|| format!("task '{}': bad index_url", task.id))?;
    let engine = ExtractionEngine::new(task.rules.clone())
        .with_context(|| format!("task '{}': bad extraction rules", task.id))?;
    Ok(MonitorTask::new(
        task.id.clone(),
        Duration::from_secs(task.timeout_secs),
        Box::new(index),
        engine,
        fetcher,
        store,
    ))
}

fn build_broadcaster(config: &BroadcasterConfig) -> Result<Box<dyn Broadcaster>> {
    match config {
        BroadcasterConfig::Log { subject, body } => {
            let templates = NotificationTemplates::parse(subject, body)
                .context("log broadcaster: bad template")?;
            Ok(Box::new(LogBroadcaster::new("log", templates)))
        }
        BroadcasterConfig::Email {
            config,
            subject,
            body,
            outbox,
        } => {
            let templates = NotificationTemplates::parse(subject, body)
                .context("email broadcaster: bad template")?;
            let email = EmailConfig::load(config)?;
            Ok(Box::new(EmailBroadcaster::new(
                "email",
                templates,
                email,
                outbox.clone(),
            )))
        }
    }
}

/// One line per seen entry: time, then the record's fields.
pub fn format_history(entries: &[SeenEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let fields = match Record::from_fingerprint(&entry.fingerprint) {
                Ok(record) => record
                    .fields()
                    .filter(|(name, _)| *name != "full_text")
                    .map(|(name, value)| format!("{name}={value:?}"))
                    .collect::<Vec<_>>()
                    .join(" "),
                Err(_) => entry.fingerprint.to_string(),
            };
            format!("{}  {}", entry.seen_at.to_rfc3339(), fields)
        })
        .collect()
}
