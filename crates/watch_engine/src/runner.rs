use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use watch_core::{Clock, Record};
use watch_logging::{set_poll_cycle, watch_error, watch_info, watch_warn};

use crate::{Broadcaster, MonitorTask, TaskError};

/// Outcome counters of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub tasks_run: usize,
    pub tasks_skipped: usize,
    pub tasks_failed: usize,
    pub records: usize,
    pub deliveries_ok: usize,
    pub deliveries_failed: usize,
}

/// Polls every task in turn and routes new records to every broadcaster.
///
/// Tasks run one after another; the only suspension point between cycles is
/// the poll-interval sleep.
pub struct Runner {
    tasks: Vec<MonitorTask>,
    broadcasters: Vec<Box<dyn Broadcaster>>,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
    cycle: u64,
}

impl Runner {
    pub fn new(poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Vec::new(),
            broadcasters: Vec::new(),
            poll_interval,
            clock,
            cycle: 0,
        }
    }

    pub fn add_task(&mut self, task: MonitorTask) {
        self.tasks.push(task);
    }

    /// Broadcasters receive records in registration order.
    pub fn add_broadcaster(&mut self, broadcaster: Box<dyn Broadcaster>) {
        self.broadcasters.push(broadcaster);
    }

    pub fn tasks(&self) -> &[MonitorTask] {
        &self.tasks
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        set_poll_cycle(self.cycle);
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        for task in &self.tasks {
            let now = self.clock.now();
            match task.should_run(now) {
                Ok(true) => {}
                Ok(false) => {
                    report.tasks_skipped += 1;
                    continue;
                }
                Err(err) => {
                    watch_error!("Task '{}' could not read run state: {}", task.id(), err);
                    report.tasks_failed += 1;
                    continue;
                }
            }

            match task.run(now).await {
                Ok(records) => {
                    report.tasks_run += 1;
                    report.records += records.len();
                    for record in &records {
                        deliver(&self.broadcasters, task.id(), record, &mut report);
                    }
                }
                Err(err @ TaskError::Fetch(_)) => {
                    watch_warn!("Task '{}' aborted, retrying next cycle: {}", task.id(), err);
                    report.tasks_failed += 1;
                }
                Err(err @ TaskError::Store(_)) => {
                    watch_error!("Task '{}' aborted: {}", task.id(), err);
                    report.tasks_failed += 1;
                }
            }
        }

        report
    }

    /// Runs cycles until `max_cycles` is reached, or forever when `None`.
    /// `Some(0)` returns without running a cycle.
    pub async fn run(&mut self, max_cycles: Option<u64>) {
        self.run_until(max_cycles, std::future::pending::<()>()).await;
    }

    /// Like [`Runner::run`], but also stops when `shutdown` completes. The
    /// shutdown signal is only observed while sleeping between cycles.
    pub async fn run_until<F>(&mut self, max_cycles: Option<u64>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if max_cycles == Some(0) {
            return;
        }
        tokio::pin!(shutdown);
        let mut completed = 0;
        loop {
            let report = self.run_cycle().await;
            watch_info!(
                "Cycle done: {} run, {} skipped, {} failed, {} new record(s), {} delivered, {} delivery failure(s)",
                report.tasks_run,
                report.tasks_skipped,
                report.tasks_failed,
                report.records,
                report.deliveries_ok,
                report.deliveries_failed
            );
            completed += 1;
            if max_cycles.is_some_and(|max| completed >= max) {
                return;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    watch_info!("Shutdown requested, stopping");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

fn deliver(
    broadcasters: &[Box<dyn Broadcaster>],
    task_id: &str,
    record: &Record,
    report: &mut CycleReport,
) {
    for broadcaster in broadcasters {
        match broadcaster.broadcast(record) {
            Ok(()) => report.deliveries_ok += 1,
            Err(err) => {
                watch_warn!(
                    "Broadcaster '{}' failed for task '{}': {}",
                    broadcaster.name(),
                    task_id,
                    err
                );
                report.deliveries_failed += 1;
            }
        }
    }
}
