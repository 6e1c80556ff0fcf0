// src/remote/importer.rs

use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::{ImportApi, ImportJob, JobPoller, LookupEntry, LookupKind, PmsImportRequest, PollOutcome};
use crate::error::{ImportError, ImportResult};
use crate::notify::{Level, Notification, Notifier};

/// Submits PMS imports and tracks the resulting server-side job.
pub struct RemoteImporter {
    api: Arc<dyn ImportApi>,
    notifier: Arc<dyn Notifier>,
    poller: JobPoller,
}

impl RemoteImporter {
    pub fn new(api: Arc<dyn ImportApi>, notifier: Arc<dyn Notifier>, poll_interval: Duration) -> Self {
        let poller = JobPoller::new(Arc::clone(&api), Arc::clone(&notifier), poll_interval);
        Self {
            api,
            notifier,
            poller,
        }
    }

    /// Submit an import and start polling its job, replacing any job
    /// currently being watched. Returns the job id.
    #[instrument(level = "info", skip_all, fields(page_size = req.page_size))]
    pub async fn submit(&mut self, req: &PmsImportRequest) -> ImportResult<String> {
        req.validate()?;

        let job_id = match self.api.submit(req).await {
            Ok(resp) => resp.job_id,
            Err(e) => {
                warn!(error = %e, "submission rejected");
                self.notify_error("Import not started", &e);
                return Err(e);
            }
        };
        let Some(job_id) = job_id else {
            let e = ImportError::NoJobId;
            warn!("submission returned no job id");
            self.notify_error("Import not started", &e);
            return Err(e);
        };

        info!(job = %job_id, "import job submitted");
        self.notifier.notify(Notification::new(
            Level::Info,
            "Import started",
            format!("Tracking import job {}", job_id),
        ));
        self.poller.start(job_id.clone());
        Ok(job_id)
    }

    /// Ask the server to cancel a job. Polling carries on until a poll
    /// sees the job reach a terminal status.
    pub fn cancel(&self, job_id: &str) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let notifier = Arc::clone(&self.notifier);
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            match api.cancel(&job_id).await {
                Ok(()) => info!(job = %job_id, "cancel requested"),
                Err(e) => {
                    warn!(job = %job_id, error = %e, "cancel request failed");
                    notifier.notify(Notification::new(
                        Level::Error,
                        "Cancel failed",
                        e.to_string(),
                    ));
                }
            }
        })
    }

    pub async fn wait(&self) -> PollOutcome {
        self.poller.wait().await
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    pub fn current_job(&self) -> Option<&str> {
        self.poller.job_id()
    }

    /// Stop watching the current job (the job itself keeps running).
    pub fn stop(&mut self) {
        self.poller.stop();
    }

    pub fn last_completed(&self) -> Option<ImportJob> {
        self.poller.last_completed()
    }

    pub async fn lookups(&self, kind: LookupKind) -> ImportResult<Vec<LookupEntry>> {
        self.api.lookups(kind).await
    }

    fn notify_error(&self, title: &str, e: &ImportError) {
        self.notifier
            .notify(Notification::new(Level::Error, title, e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use crate::remote::poller::DEFAULT_POLL_INTERVAL;
    use crate::remote::testing::{ScriptedApi, Tick};
    use crate::remote::{DateRange, JobStatus};
    use chrono::NaiveDate;
    use tokio::time;

    fn importer(api: &Arc<ScriptedApi>) -> (RemoteImporter, Arc<MemoryNotifier>) {
        let notifier = Arc::new(MemoryNotifier::new());
        let imp = RemoteImporter::new(
            Arc::clone(api) as Arc<dyn ImportApi>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            DEFAULT_POLL_INTERVAL,
        );
        (imp, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_then_complete() -> anyhow::Result<()> {
        let api = Arc::new(ScriptedApi::with_ticks(vec![
            Tick::Status(JobStatus::Queued),
            Tick::Status(JobStatus::Processing),
            Tick::Status(JobStatus::Completed),
        ]));
        api.queue_job_id(Some("77"));
        let (mut imp, notifier) = importer(&api);

        let job = imp.submit(&PmsImportRequest::new(100)).await?;
        assert_eq!(job, "77");
        assert!(imp.is_polling());

        assert!(matches!(imp.wait().await, PollOutcome::Completed(_)));
        assert_eq!(api.polled(), vec!["77", "77", "77"]);
        assert!(imp.last_completed().is_some());
        assert_eq!(notifier.all().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_job_id_fails_fast() {
        let api = Arc::new(ScriptedApi::new());
        api.queue_job_id(None);
        let (mut imp, notifier) = importer(&api);

        let err = imp.submit(&PmsImportRequest::new(10)).await.unwrap_err();
        assert_eq!(err.to_string(), "no job id returned");
        assert!(!imp.is_polling());
        assert_eq!(notifier.last().unwrap().level, Level::Error);

        time::sleep(Duration::from_secs(10)).await;
        assert!(api.polled().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_not_in_progress() {
        let api = Arc::new(ScriptedApi::new());
        api.fail_submit("HTTP 500");
        let (mut imp, _notifier) = importer(&api);

        let err = imp.submit(&PmsImportRequest::new(10)).await.unwrap_err();
        assert!(matches!(err, ImportError::Submit(_)));
        assert!(!imp.is_polling());
        assert!(imp.current_job().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_never_sent() {
        let api = Arc::new(ScriptedApi::new());
        let (mut imp, _notifier) = importer(&api);

        let mut req = PmsImportRequest::new(10);
        req.updated_between = Some(DateRange {
            from: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        assert!(matches!(
            imp.submit(&req).await,
            Err(ImportError::InvalidRequest(_))
        ));
        assert_eq!(api.submitted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submission_keeps_one_poller() -> anyhow::Result<()> {
        let api = Arc::new(ScriptedApi::new());
        api.queue_job_id(Some("a"));
        api.queue_job_id(Some("b"));
        let (mut imp, _notifier) = importer(&api);

        imp.submit(&PmsImportRequest::new(10)).await?;
        time::sleep(Duration::from_millis(2100)).await;
        imp.submit(&PmsImportRequest::new(10)).await?;
        time::sleep(Duration::from_millis(6100)).await;

        assert_eq!(api.polled(), vec!["a", "b", "b", "b"]);
        assert_eq!(imp.current_job(), Some("b"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_does_not_stop_polling() -> anyhow::Result<()> {
        let api = Arc::new(ScriptedApi::new());
        api.queue_job_id(Some("job-9"));
        let (mut imp, _notifier) = importer(&api);

        imp.submit(&PmsImportRequest::new(10)).await?;
        imp.cancel("job-9").await?;
        assert_eq!(api.cancelled(), vec!["job-9"]);

        time::sleep(Duration::from_millis(4100)).await;
        assert!(imp.is_polling());
        assert_eq!(api.polled().len(), 2);

        api.push_tick(Tick::Status(JobStatus::Canceled));
        assert!(matches!(imp.wait().await, PollOutcome::Canceled(_)));
        assert!(!imp.is_polling());
        Ok(())
    }

    #[tokio::test]
    async fn test_lookups_pass_through() -> anyhow::Result<()> {
        let api = Arc::new(ScriptedApi::new());
        let (imp, _notifier) = importer(&api);
        let entries = imp.lookups(LookupKind::Districts).await?;
        assert_eq!(entries[0].name, "districts");
        Ok(())
    }
}
