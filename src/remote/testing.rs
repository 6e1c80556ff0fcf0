// src/remote/testing.rs
//
// Scripted in-process stand-in for the PMS import endpoints.

use futures::{future::BoxFuture, FutureExt};
use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use super::{
    ImportApi, ImportJob, JobStatus, LookupEntry, LookupKind, PmsImportRequest, SubmitResponse,
};
use crate::error::{ImportError, ImportResult};

/// One scripted answer to a status request.
pub(crate) enum Tick {
    Status(JobStatus),
    Job(ImportJob),
    TransportError(&'static str),
}

#[derive(Default)]
pub(crate) struct ScriptedApi {
    job_ids: Mutex<VecDeque<Option<String>>>,
    submit_error: Mutex<Option<String>>,
    ticks: Mutex<VecDeque<Tick>>,
    submitted: Mutex<Vec<PmsImportRequest>>,
    polled: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_ticks(ticks: Vec<Tick>) -> Self {
        let api = Self::new();
        *lock(&api.ticks) = ticks.into();
        api
    }

    pub(crate) fn queue_job_id(&self, id: Option<&str>) {
        lock(&self.job_ids).push_back(id.map(str::to_string));
    }

    pub(crate) fn fail_submit(&self, message: &str) {
        *lock(&self.submit_error) = Some(message.to_string());
    }

    pub(crate) fn push_tick(&self, tick: Tick) {
        lock(&self.ticks).push_back(tick);
    }

    pub(crate) fn polled(&self) -> Vec<String> {
        lock(&self.polled).clone()
    }

    pub(crate) fn submitted(&self) -> usize {
        lock(&self.submitted).len()
    }

    pub(crate) fn cancelled(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }
}

impl ImportApi for ScriptedApi {
    fn submit<'a>(&'a self, req: &'a PmsImportRequest) -> BoxFuture<'a, ImportResult<SubmitResponse>> {
        async move {
            lock(&self.submitted).push(req.clone());
            if let Some(msg) = lock(&self.submit_error).clone() {
                return Err(ImportError::Submit(msg));
            }
            let job_id = lock(&self.job_ids).pop_front().flatten();
            Ok(SubmitResponse { job_id })
        }
        .boxed()
    }

    fn status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, ImportResult<ImportJob>> {
        async move {
            lock(&self.polled).push(job_id.to_string());
            // an exhausted script keeps the job running
            match lock(&self.ticks).pop_front() {
                Some(Tick::Status(status)) => Ok(ImportJob::with_status(status)),
                Some(Tick::Job(job)) => Ok(job),
                Some(Tick::TransportError(msg)) => Err(ImportError::Poll(msg.to_string())),
                None => Ok(ImportJob::with_status(JobStatus::Processing)),
            }
        }
        .boxed()
    }

    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, ImportResult<()>> {
        async move {
            lock(&self.cancelled).push(job_id.to_string());
            Ok(())
        }
        .boxed()
    }

    fn lookups(&self, kind: LookupKind) -> BoxFuture<'_, ImportResult<Vec<LookupEntry>>> {
        async move {
            Ok(vec![LookupEntry {
                id: 1,
                name: kind.path().to_string(),
            }])
        }
        .boxed()
    }
}
