use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use watch_core::{Notification, NotificationTemplates, Record, TemplateError};
use watch_logging::watch_info;

use crate::filename::message_filename;
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not write to outbox: {0}")]
    Outbox(#[from] PersistError),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// A notification channel: renders records and hands them to a transport.
pub trait Broadcaster: Send + Sync {
    fn name(&self) -> &str;

    fn format(&self, record: &Record) -> Result<Notification, TemplateError>;

    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;

    fn broadcast(&self, record: &Record) -> Result<(), BroadcastError> {
        let notification = self.format(record)?;
        self.deliver(&notification)?;
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone)]
pub struct LogBroadcaster {
    name: String,
    templates: NotificationTemplates,
}

impl LogBroadcaster {
    pub fn new(name: impl Into<String>, templates: NotificationTemplates) -> Self {
        Self {
            name: name.into(),
            templates,
        }
    }
}

impl Broadcaster for LogBroadcaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, record: &Record) -> Result<Notification, TemplateError> {
        self.templates.format(record)
    }

    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        watch_info!("{}\n{}", notification.subject, notification.body);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EmailConfigError {
    #[error("could not read email config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid email config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("email config {path:?} lists no recipients")]
    NoRecipients { path: PathBuf },
}

/// Sender and recipients, kept in a JSON file next to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    pub to: Vec<String>,
}

impl EmailConfig {
    pub fn load(path: &Path) -> Result<Self, EmailConfigError> {
        let text = fs::read_to_string(path).map_err(|source| EmailConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EmailConfig =
            serde_json::from_str(&text).map_err(|source| EmailConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if config.to.is_empty() {
            return Err(EmailConfigError::NoRecipients {
                path: path.to_path_buf(),
            });
        }
        Ok(config)
    }
}

/// Spools each notification as a plain-text email message into an outbox
/// directory. A separate mail transport drains the outbox.
#[derive(Debug, Clone)]
pub struct EmailBroadcaster {
    name: String,
    templates: NotificationTemplates,
    config: EmailConfig,
    outbox: AtomicFileWriter,
}

impl EmailBroadcaster {
    pub fn new(
        name: impl Into<String>,
        templates: NotificationTemplates,
        config: EmailConfig,
        outbox: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            templates,
            config,
            outbox: AtomicFileWriter::new(outbox),
        }
    }

    pub fn outbox(&self) -> &Path {
        self.outbox.dir()
    }

    fn render_message(&self, notification: &Notification) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            header_value(&self.config.from),
            header_value(&self.config.to.join(", ")),
            header_value(&notification.subject),
            Utc::now().to_rfc2822(),
            notification.body.replace("\r\n", "\n").replace('\n', "\r\n"),
        )
    }
}

impl Broadcaster for EmailBroadcaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, record: &Record) -> Result<Notification, TemplateError> {
        self.templates.format(record)
    }

    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let message = self.render_message(notification);
        let filename = message_filename(&notification.subject, &notification.body);
        let path = self.outbox.write(&filename, &message)?;
        watch_info!("Spooled '{}' to {:?}", notification.subject, path);
        Ok(())
    }
}

// Header values must stay on one line.
fn header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}
