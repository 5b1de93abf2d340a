//! Poll fallback.
//!
//! [`Poller::run`] ticks on a fixed, role-dependent interval whether or not
//! the push channel is up, and additionally:
//!
//! - immediately when the channel reports it went down, since the poll is
//!   then the only source of updates;
//! - immediately when a refresh is requested (after lifecycle events and
//!   user actions). Requests made while one is already pending coalesce.
//!
//! A failed fetch is logged and skipped; the next tick retries it.
//! Cancellation also interrupts a fetch in flight.

use std::sync::Arc;
use std::time::Duration;

use taskboard_api::{ApiError, TaskboardApi};
use taskboard_core::log::LogEntry;
use taskboard_core::records::employee_worker;
use taskboard_core::role::{Actor, RoleProfile, MIN_POLL_INTERVAL};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::reconciler::BulkSnapshot;

/// Everything one tick managed to fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    pub snapshot: BulkSnapshot,
    /// The log window (oldest first), when the role reads logs and the
    /// fetch succeeded.
    pub logs: Option<Vec<LogEntry>>,
    /// Number of endpoints that failed this round.
    pub failures: usize,
}

pub struct Poller {
    api: TaskboardApi,
    profile: RoleProfile,
    actor: Actor,
}

impl Poller {
    pub fn new(api: TaskboardApi, profile: RoleProfile, actor: Actor) -> Self {
        Self {
            api,
            profile,
            actor,
        }
    }

    pub fn interval(&self) -> Duration {
        self.profile.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Fetch every endpoint the role reads. Never fails as a whole.
    pub async fn tick(&self) -> PollOutcome {
        let endpoints = &self.profile.endpoints;
        let mut outcome = PollOutcome::default();

        if let Some(path) = endpoints.tasks {
            match self.api.fetch_tasks(path).await {
                Ok(tasks) => outcome.snapshot.tasks.extend(tasks),
                Err(e) => outcome.record_failure(path, &e),
            }
        }
        if let Some(path) = endpoints.workers {
            match self.api.fetch_workers(path).await {
                Ok(workers) => outcome.snapshot.workers.extend(workers),
                Err(e) => outcome.record_failure(path, &e),
            }
        }
        if let Some(path) = endpoints.employees {
            match self.api.fetch_employees(path).await {
                Ok(workers) => outcome.snapshot.workers.extend(workers),
                Err(e) => outcome.record_failure(path, &e),
            }
        }
        if let Some(path) = endpoints.statistics {
            match self.api.fetch_statistics(path).await {
                Ok(stats) => outcome.snapshot.statistics = Some(stats),
                Err(e) => outcome.record_failure(path, &e),
            }
        }
        if let Some(path) = endpoints.logs {
            match self.api.fetch_logs(path).await {
                Ok(logs) => outcome.logs = Some(logs),
                Err(e) => outcome.record_failure(path, &e),
            }
        }
        if let Some(path) = endpoints.employee_dashboard {
            match self.api.fetch_employee_dashboard(path).await {
                Ok(dashboard) => {
                    outcome.snapshot.tasks.extend(dashboard.recent_tasks);
                    let mut me = employee_worker(
                        self.actor.worker_id(),
                        self.actor.full_name.clone(),
                        &dashboard.stats,
                    );
                    if let Some(current) = dashboard.current_task {
                        me.current_task = Some(current.id.clone());
                        // Listed last so the live record wins over history.
                        outcome.snapshot.tasks.push(current);
                    }
                    outcome.snapshot.workers.push(me.normalized());
                }
                Err(e) => outcome.record_failure(path, &e),
            }
        }

        tracing::trace!(
            tasks = outcome.snapshot.tasks.len(),
            workers = outcome.snapshot.workers.len(),
            failures = outcome.failures,
            "Poll tick complete",
        );
        outcome
    }

    /// Run the poll loop until `cancel` fires or `results` is closed.
    pub async fn run(
        self,
        results: mpsc::Sender<PollOutcome>,
        refresh: Arc<Notify>,
        mut connectivity: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(self.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Poll fallback cancelled");
                    break;
                }
                _ = interval.tick() => {}
                _ = refresh.notified() => {
                    tracing::debug!("Immediate refresh requested");
                    interval.reset();
                }
                changed = connectivity.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    if *connectivity.borrow_and_update() {
                        continue;
                    }
                    tracing::info!("Push channel down, polling immediately");
                    interval.reset();
                }
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Poll fallback cancelled mid-fetch");
                    break;
                }
                outcome = self.tick() => outcome,
            };
            if results.send(outcome).await.is_err() {
                break;
            }
        }
    }
}

impl PollOutcome {
    fn record_failure(&mut self, path: &str, error: &ApiError) {
        self.failures += 1;
        tracing::warn!(path, error = %error, "Poll fetch failed");
    }
}
