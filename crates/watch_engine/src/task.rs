use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use watch_core::{is_eligible, ExtractionEngine, Record};
use watch_logging::{watch_debug, watch_info};

use crate::document::html_paragraphs;
use crate::{DedupStore, FetchError, Fetcher, IndexSource, StoreError, TaskId};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// One monitored index: where to look, how to extract, how often to run.
///
/// Holds no state between cycles; every decision re-reads the store.
pub struct MonitorTask {
    id: TaskId,
    timeout: Duration,
    index: Box<dyn IndexSource>,
    engine: ExtractionEngine,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn DedupStore>,
}

impl MonitorTask {
    pub fn new(
        id: impl Into<TaskId>,
        timeout: Duration,
        index: Box<dyn IndexSource>,
        engine: ExtractionEngine,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn DedupStore>,
    ) -> Self {
        Self {
            id: id.into(),
            timeout,
            index,
            engine,
            fetcher,
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True when more than the timeout has passed since the last cycle start.
    pub fn should_run(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let last_run = self.store.last_run(&self.id)?;
        Ok(is_eligible(last_run, now, self.timeout))
    }

    /// Runs one cycle and returns the new records in reverse discovery order.
    ///
    /// A fetch failure aborts the rest of the cycle; records registered
    /// before it stay registered.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<Vec<Record>, TaskError> {
        self.store.mark_run_start(&self.id, now)?;
        watch_info!("Task '{}' cycle started", self.id);

        let locations = self.index.locations(self.fetcher.as_ref()).await?;
        let mut new_records = Vec::new();
        for location in &locations {
            let html = self.fetcher.fetch(location).await?;
            let paragraphs = html_paragraphs(&html);
            let Some(record) = self
                .engine
                .extract_units(paragraphs.iter().map(String::as_str))
            else {
                watch_debug!("No match in {}", location);
                continue;
            };

            let fingerprint = record.fingerprint();
            if self.store.contains(&self.id, &fingerprint)? {
                watch_debug!("Already reported record from {}", location);
                continue;
            }
            self.store.register(&self.id, &fingerprint, now)?;
            watch_info!("New record from {}", location);
            new_records.push(record);
        }

        // The index lists newest first; deliver oldest first.
        new_records.reverse();
        watch_info!(
            "Task '{}' found {} new record(s) in {} document(s)",
            self.id,
            new_records.len(),
            locations.len()
        );
        Ok(new_records)
    }
}
