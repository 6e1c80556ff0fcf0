// src/remote/http.rs

use anyhow::{anyhow, Context, Result};
use futures::{future::BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{
    Envelope, ImportApi, ImportJob, LookupEntry, LookupKind, PmsImportRequest, SubmitResponse,
};
use crate::error::{ImportError, ImportResult};

const IMPORTS_PATH: &[&str] = &["pms", "imports"];

/// Error bodies are cut to this many characters in messages.
const MAX_ERROR_BODY: usize = 200;

/// `ImportApi` over the dashboard's REST backend.
#[derive(Clone)]
pub struct HttpImportApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpImportApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("parsing api base url {}", base_url))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("api base url {} cannot hold paths", base_url));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;

        Ok(Self {
            client,
            base,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// `base` + percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base url {} cannot hold paths", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn job_endpoint(&self, job_id: &str, tail: Option<&str>) -> Result<Url> {
        let mut segments: Vec<&str> = IMPORTS_PATH.to_vec();
        segments.push(job_id);
        segments.extend(tail);
        self.endpoint(&segments)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = self
            .authorize(req)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("{} request failed", what))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
            return Err(if snippet.is_empty() {
                anyhow!("{} returned HTTP {}", what, status)
            } else {
                anyhow!("{} returned HTTP {}: {}", what, status, snippet)
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let envelope: Envelope<T> = self
            .send(req, what)
            .await?
            .json()
            .await
            .with_context(|| format!("reading {} response", what))?;
        Ok(envelope.into_inner())
    }

    async fn submit_inner(&self, req: &PmsImportRequest) -> Result<SubmitResponse> {
        let url = self.endpoint(IMPORTS_PATH)?;
        debug!(%url, "submitting pms import");
        self.send_json(self.client.post(url).json(req), "import submission")
            .await
    }

    async fn status_inner(&self, job_id: &str) -> Result<ImportJob> {
        let url = self.job_endpoint(job_id, None)?;
        debug!(%url, "polling import job");
        self.send_json(self.client.get(url), "job status").await
    }

    async fn cancel_inner(&self, job_id: &str) -> Result<()> {
        let url = self.job_endpoint(job_id, Some("cancel"))?;
        debug!(%url, "cancelling import job");
        self.send(self.client.post(url), "cancel").await?;
        Ok(())
    }

    async fn lookups_inner(&self, kind: LookupKind) -> Result<Vec<LookupEntry>> {
        let url = self.endpoint(&[kind.path()])?;
        self.send_json(self.client.get(url), kind.path()).await
    }
}

/// Flatten an error chain into one user-facing line.
fn flatten(e: anyhow::Error) -> String {
    format!("{:#}", e)
}

impl ImportApi for HttpImportApi {
    fn submit<'a>(&'a self, req: &'a PmsImportRequest) -> BoxFuture<'a, ImportResult<SubmitResponse>> {
        async move {
            self.submit_inner(req)
                .await
                .map_err(|e| ImportError::Submit(flatten(e)))
        }
        .boxed()
    }

    fn status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, ImportResult<ImportJob>> {
        async move {
            self.status_inner(job_id)
                .await
                .map_err(|e| ImportError::Poll(flatten(e)))
        }
        .boxed()
    }

    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, ImportResult<()>> {
        async move {
            self.cancel_inner(job_id)
                .await
                .map_err(|e| ImportError::Api(flatten(e)))
        }
        .boxed()
    }

    fn lookups(&self, kind: LookupKind) -> BoxFuture<'_, ImportResult<Vec<LookupEntry>>> {
        async move {
            self.lookups_inner(kind)
                .await
                .map_err(|e| ImportError::Api(flatten(e)))
        }
        .boxed()
    }
}
