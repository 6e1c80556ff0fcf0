// src/remote/poller.rs

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

use super::{ImportApi, ImportJob, JobStatus};
use crate::notify::{Level, Notification, Notifier};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// How monitoring of one job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(ImportJob),
    Failed(ImportJob),
    Canceled(ImportJob),
    /// A status request failed; the job itself may still be running.
    PollError(String),
    /// Polling was stopped (or replaced) before a terminal status.
    Stopped,
}

struct ActivePoll {
    job_id: String,
    task: JoinHandle<()>,
    outcome: watch::Receiver<Option<PollOutcome>>,
}

/// Watches at most one server-side import job at a time.
///
/// Starting a new job aborts the previous poll task; dropping the poller
/// aborts the current one. Neither cancels a request already in flight
/// beyond dropping it at its next await point.
pub struct JobPoller {
    api: Arc<dyn ImportApi>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    active: Option<ActivePoll>,
    last_completed: Arc<Mutex<Option<ImportJob>>>,
}

impl JobPoller {
    /// A zero `interval` falls back to `DEFAULT_POLL_INTERVAL`.
    pub fn new(api: Arc<dyn ImportApi>, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("zero poll interval, using default");
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        Self {
            api,
            notifier,
            interval,
            active: None,
            last_completed: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin polling `job_id`, replacing any running poll.
    pub fn start(&mut self, job_id: impl Into<String>) {
        self.stop();

        let job_id = job_id.into();
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(poll_job(
            Arc::clone(&self.api),
            Arc::clone(&self.notifier),
            job_id.clone(),
            self.interval,
            tx,
            Arc::clone(&self.last_completed),
        ));
        info!(job = %job_id, interval_ms = self.interval.as_millis() as u64, "started polling");

        self.active = Some(ActivePoll {
            job_id,
            task,
            outcome: rx,
        });
    }

    /// Prevent any further ticks of the current poll.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            if !active.task.is_finished() {
                debug!(job = %active.job_id, "stopping poll");
            }
            active.task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .map_or(false, |active| !active.task.is_finished())
    }

    pub fn job_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.job_id.as_str())
    }

    /// Wait for the current poll to end. `Stopped` when there is none or it
    /// was aborted.
    pub async fn wait(&self) -> PollOutcome {
        let Some(active) = self.active.as_ref() else {
            return PollOutcome::Stopped;
        };
        let mut rx = active.outcome.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(PollOutcome::Stopped)
    }

    /// The most recent job seen to complete, for refreshing local data.
    pub fn last_completed(&self) -> Option<ImportJob> {
        self.last_completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn completion_summary(job: &ImportJob) -> String {
    let mut msg = format!(
        "{} created, {} updated",
        job.created_records.unwrap_or(0),
        job.updated_records.unwrap_or(0)
    );
    if let Some(errors) = job.error_count.filter(|n| *n > 0) {
        msg.push_str(&format!(", {} errors", errors));
    }
    msg
}

#[instrument(level = "info", skip(api, notifier, period, tx, last_completed))]
async fn poll_job(
    api: Arc<dyn ImportApi>,
    notifier: Arc<dyn Notifier>,
    job_id: String,
    period: Duration,
    tx: watch::Sender<Option<PollOutcome>>,
    last_completed: Arc<Mutex<Option<ImportJob>>>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut furthest: Option<JobStatus> = None;

    loop {
        ticker.tick().await;

        let job = match api.status(&job_id).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "status request failed, monitoring stopped");
                notifier.notify(Notification::new(
                    Level::Error,
                    "Import monitoring stopped",
                    format!("Could not check import job {}: {}", job_id, e),
                ));
                tx.send_replace(Some(PollOutcome::PollError(e.to_string())));
                return;
            }
        };

        debug!(
            status = %job.status,
            page = ?job.current_page,
            total_pages = ?job.total_pages,
            processed = ?job.processed_records,
            "poll tick"
        );

        if let Some(previous) = furthest {
            if job.status.is_behind(previous) {
                warn!(status = %job.status, previous = %previous, "ignoring backward status");
                continue;
            }
        }
        if job.status != JobStatus::Unknown {
            furthest = Some(job.status);
        }

        let outcome = match job.status {
            JobStatus::Completed => {
                info!("import job completed");
                notifier.notify(Notification::new(
                    Level::Success,
                    "Import completed",
                    completion_summary(&job),
                ));
                *last_completed.lock().unwrap_or_else(PoisonError::into_inner) = Some(job.clone());
                PollOutcome::Completed(job)
            }
            JobStatus::Failed => {
                let reason = job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!(reason = %reason, "import job failed");
                notifier.notify(Notification::new(
                    Level::Error,
                    "Import failed",
                    reason,
                ));
                PollOutcome::Failed(job)
            }
            JobStatus::Canceled => {
                info!("import job canceled");
                notifier.notify(Notification::new(
                    Level::Warning,
                    "Import canceled",
                    job.error_message
                        .clone()
                        .unwrap_or_else(|| "The import was canceled".to_string()),
                ));
                PollOutcome::Canceled(job)
            }
            JobStatus::Queued | JobStatus::Processing | JobStatus::Unknown => continue,
        };

        tx.send_replace(Some(outcome));
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use crate::remote::testing::{ScriptedApi, Tick};

    fn poller(api: &Arc<ScriptedApi>, notifier: &Arc<MemoryNotifier>) -> JobPoller {
        JobPoller::new(
            Arc::clone(api) as Arc<dyn ImportApi>,
            Arc::clone(notifier) as Arc<dyn Notifier>,
            DEFAULT_POLL_INTERVAL,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_completed() {
        let api = Arc::new(ScriptedApi::with_ticks(vec![
            Tick::Status(JobStatus::Queued),
            Tick::Status(JobStatus::Processing),
            Tick::Job(ImportJob {
                created_records: Some(7),
                updated_records: Some(2),
                ..ImportJob::with_status(JobStatus::Completed)
            }),
        ]));
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-1");
        let outcome = p.wait().await;
        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(api.polled().len(), 3);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(api.polled().len(), 3);
        assert!(!p.is_active());

        let note = notifier.last().unwrap();
        assert_eq!(note.level, Level::Success);
        assert_eq!(note.message, "7 created, 2 updated");
        assert_eq!(p.last_completed().and_then(|j| j.created_records), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_waits_one_interval() {
        let api = Arc::new(ScriptedApi::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-1");
        time::sleep(Duration::from_millis(1900)).await;
        assert!(api.polled().is_empty());
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(api.polled(), vec!["job-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_reports_server_message() {
        let api = Arc::new(ScriptedApi::with_ticks(vec![Tick::Job(ImportJob {
            error_message: Some("PMS unavailable".into()),
            ..ImportJob::with_status(JobStatus::Failed)
        })]));
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-2");
        assert!(matches!(p.wait().await, PollOutcome::Failed(_)));
        let note = notifier.last().unwrap();
        assert_eq!(note.level, Level::Error);
        assert_eq!(note.message, "PMS unavailable");
        assert!(p.last_completed().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceled_job_stops_polling() {
        let api = Arc::new(ScriptedApi::with_ticks(vec![
            Tick::Status(JobStatus::Processing),
            Tick::Status(JobStatus::Canceled),
        ]));
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-3");
        assert!(matches!(p.wait().await, PollOutcome::Canceled(_)));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.polled().len(), 2);
        assert_eq!(notifier.last().unwrap().level, Level::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_ends_monitoring() {
        let api = Arc::new(ScriptedApi::with_ticks(vec![
            Tick::Status(JobStatus::Processing),
            Tick::TransportError("connection reset"),
            Tick::Status(JobStatus::Completed),
        ]));
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-4");
        match p.wait().await {
            PollOutcome::PollError(msg) => assert!(msg.contains("connection reset")),
            other => panic!("expected poll error, got {other:?}"),
        }
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.polled().len(), 2);
        let note = notifier.last().unwrap();
        assert_eq!(note.title, "Import monitoring stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_job_is_polled() {
        let api = Arc::new(ScriptedApi::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("first");
        p.start("second");
        time::sleep(Duration::from_millis(6100)).await;

        assert_eq!(api.polled(), vec!["second", "second", "second"]);
        assert!(p.is_active());
        assert_eq!(p.job_id(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_mid_poll_replaces_timer() {
        let api = Arc::new(ScriptedApi::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("first");
        time::sleep(Duration::from_millis(4100)).await;
        p.start("second");
        time::sleep(Duration::from_millis(4100)).await;

        assert_eq!(api.polled(), vec!["first", "first", "second", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_ticks() {
        let api = Arc::new(ScriptedApi::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-5");
        time::sleep(Duration::from_millis(2500)).await;
        p.stop();
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(api.polled().len(), 1);
        assert!(!p.is_active());
        assert_eq!(p.wait().await, PollOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_clears_timer() {
        let api = Arc::new(ScriptedApi::new());
        let notifier = Arc::new(MemoryNotifier::new());
        {
            let mut p = poller(&api, &notifier);
            p.start("job-6");
        }
        time::sleep(Duration::from_secs(10)).await;
        assert!(api.polled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backward_and_unknown_statuses_keep_polling() {
        let api = Arc::new(ScriptedApi::with_ticks(vec![
            Tick::Status(JobStatus::Processing),
            Tick::Status(JobStatus::Queued),
            Tick::Status(JobStatus::Unknown),
            Tick::Status(JobStatus::Completed),
        ]));
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = poller(&api, &notifier);

        p.start("job-7");
        assert!(matches!(p.wait().await, PollOutcome::Completed(_)));
        assert_eq!(api.polled().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_uses_default() {
        let api = Arc::new(ScriptedApi::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let mut p = JobPoller::new(
            Arc::clone(&api) as Arc<dyn ImportApi>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Duration::ZERO,
        );
        p.start("z");

        time::sleep(Duration::from_millis(1900)).await;
        assert!(api.polled().is_empty());
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(api.polled(), vec!["z"]);
        p.stop();
    }
}
