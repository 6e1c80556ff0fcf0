// src/remote/mod.rs
//
// Server-side PMS imports: the request/job wire types, the API seam, the
// status poller and the importer that ties them together.

pub mod http;
pub mod importer;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::error::{ImportError, ImportResult};

pub use http::HttpImportApi;
pub use importer::RemoteImporter;
pub use poller::{JobPoller, PollOutcome, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    #[serde(alias = "cancelled")]
    Canceled,
    /// Anything this client does not know; never ends polling.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }

    fn rank(self) -> Option<u8> {
        match self {
            JobStatus::Queued => Some(0),
            JobStatus::Processing => Some(1),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled => Some(2),
            JobStatus::Unknown => None,
        }
    }

    /// True when moving from `previous` to `self` would go backwards.
    pub fn is_behind(self, previous: JobStatus) -> bool {
        match (self.rank(), previous.rank()) {
            (Some(now), Some(before)) => now < before,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Server-side import job as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub current_page: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub processed_records: Option<u64>,
    #[serde(default)]
    pub created_records: Option<u64>,
    #[serde(default)]
    pub updated_records: Option<u64>,
    #[serde(default)]
    pub error_count: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ImportJob {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            id: None,
            status,
            current_page: None,
            total_pages: None,
            processed_records: None,
            created_records: None,
            updated_records: None,
            error_count: None,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, deserialize_with = "string_or_number")]
    pub job_id: Option<String>,
}

/// Accept `"42"`, `42` or null; blank strings count as missing.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Responses may or may not be wrapped in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// Inclusive date range; both ends are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Build a range from optional ends: both or neither.
    pub fn from_parts(
        name: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ImportResult<Option<Self>> {
        match (from, to) {
            (Some(from), Some(to)) => Ok(Some(Self { from, to })),
            (None, None) => Ok(None),
            _ => Err(ImportError::InvalidRequest(format!(
                "{name} needs both a start and an end date"
            ))),
        }
    }
}

/// Body of a PMS import submission. Unset filters are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PmsImportRequest {
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementing_partner_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_after: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_between: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_between: Option<DateRange>,
}

impl PmsImportRequest {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            district_id: None,
            intervention_id: None,
            implementing_partner_id: None,
            updated_after: None,
            created_after: None,
            updated_between: None,
            created_between: None,
        }
    }

    pub fn validate(&self) -> ImportResult<()> {
        if self.page_size == 0 {
            return Err(ImportError::InvalidRequest(
                "page size must be greater than zero".into(),
            ));
        }
        for (name, range) in [
            ("updated_between", &self.updated_between),
            ("created_between", &self.created_between),
        ] {
            if let Some(r) = range {
                if r.from > r.to {
                    return Err(ImportError::InvalidRequest(format!(
                        "{name} starts after it ends ({} > {})",
                        r.from, r.to
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Reference data used to scope a PMS import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Districts,
    Interventions,
    ImplementingPartners,
}

impl LookupKind {
    pub fn path(self) -> &'static str {
        match self {
            LookupKind::Districts => "districts",
            LookupKind::Interventions => "interventions",
            LookupKind::ImplementingPartners => "implementing-partners",
        }
    }
}

impl FromStr for LookupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "districts" | "district" => Ok(LookupKind::Districts),
            "interventions" | "intervention" => Ok(LookupKind::Interventions),
            "implementing-partners" | "implementing-partner" | "partners" => {
                Ok(LookupKind::ImplementingPartners)
            }
            other => Err(format!("unknown lookup `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: i64,
    pub name: String,
}

/// The REST endpoints a PMS import needs. Errors are already user-facing:
/// `submit` yields `Submit`, `status` yields `Poll`, the rest `Api`.
pub trait ImportApi: Send + Sync {
    fn submit<'a>(&'a self, req: &'a PmsImportRequest) -> BoxFuture<'a, ImportResult<SubmitResponse>>;

    fn status<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, ImportResult<ImportJob>>;

    fn cancel<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, ImportResult<()>>;

    fn lookups(&self, kind: LookupKind) -> BoxFuture<'_, ImportResult<Vec<LookupEntry>>>;
}
