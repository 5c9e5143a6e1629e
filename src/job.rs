//! Job lifecycle types.
//!
//! The job state machine:
//!
//! ```text
//!   create_job() ──→ Running ──→ Done { results }
//!                       │
//!                       └──────→ Failed { error }
//! ```
//!
//! **Invariants:**
//! - Every job starts `Running`, with neither results nor an error.
//! - Transitions are monotonic. The terminal state is written exactly once
//!   and never changes afterwards.
//! - `Done` always carries results and `Failed` always carries an error. The
//!   sum type makes any other combination unrepresentable.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a job ID from an existing token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random (UUID v4) job ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a job.
///
/// Serializes to the wire form `{status, results, error}` where exactly the
/// field matching the status is non-null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "JobStatusResponse", try_from = "JobStatusResponse")]
pub enum JobStatus {
    /// Job is queued or executing.
    Running,
    /// Job failed; no results were produced.
    Failed { error: String },
    /// Job completed with one outcome per shot, in shot order.
    Done { results: Vec<String> },
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Done { .. })
    }

    /// Wire name of the status.
    pub fn kind(&self) -> StatusKind {
        match self {
            JobStatus::Running => StatusKind::Running,
            JobStatus::Failed { .. } => StatusKind::Failed,
            JobStatus::Done { .. } => StatusKind::Done,
        }
    }

    pub fn results(&self) -> Option<&[String]> {
        match self {
            JobStatus::Done { results } => Some(results),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Failed { error } => write!(f, "failed: {error}"),
            JobStatus::Done { results } => write!(f, "done ({} results)", results.len()),
        }
    }
}

/// Status discriminant as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Running,
    Failed,
    Done,
}

/// Flat wire representation of a [`JobStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: StatusKind,
    pub results: Option<Vec<String>>,
    pub error: Option<String>,
}

impl From<JobStatus> for JobStatusResponse {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Running => Self {
                status: StatusKind::Running,
                results: None,
                error: None,
            },
            JobStatus::Failed { error } => Self {
                status: StatusKind::Failed,
                results: None,
                error: Some(error),
            },
            JobStatus::Done { results } => Self {
                status: StatusKind::Done,
                results: Some(results),
                error: None,
            },
        }
    }
}

impl TryFrom<JobStatusResponse> for JobStatus {
    type Error = String;

    fn try_from(resp: JobStatusResponse) -> Result<Self, Self::Error> {
        match (resp.status, resp.results, resp.error) {
            (StatusKind::Running, None, None) => Ok(JobStatus::Running),
            (StatusKind::Failed, None, Some(error)) => Ok(JobStatus::Failed { error }),
            (StatusKind::Done, Some(results), None) => Ok(JobStatus::Done { results }),
            (kind, results, error) => Err(format!(
                "inconsistent job status {kind:?}: results present = {}, error present = {}",
                results.is_some(),
                error.is_some()
            )),
        }
    }
}

#[derive(Debug)]
struct Terminal {
    status: JobStatus,
    finished_at: DateTime<Utc>,
}

/// Shared state for one job.
///
/// Written once by the job's runner and read by any number of pollers. The
/// terminal outcome lives in a write-once cell, so the status and its payload
/// become visible to readers together, and reads never wait on the writer.
#[derive(Debug)]
pub struct JobRecord {
    computer: String,
    num_shots: u32,
    submitted_at: DateTime<Utc>,
    terminal: OnceLock<Terminal>,
}

impl JobRecord {
    /// Create a record in the `Running` state.
    pub fn new(computer: impl Into<String>, num_shots: u32) -> Self {
        Self {
            computer: computer.into(),
            num_shots,
            submitted_at: Utc::now(),
            terminal: OnceLock::new(),
        }
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> JobStatus {
        self.terminal
            .get()
            .map_or(JobStatus::Running, |t| t.status.clone())
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.get().is_some()
    }

    /// Publish the terminal status.
    ///
    /// Returns `false` without changing anything if `status` is `Running` or
    /// a terminal status was already published.
    pub fn finish(&self, status: JobStatus) -> bool {
        if !status.is_terminal() {
            tracing::warn!(computer = %self.computer, "Refusing to finish a job as running");
            return false;
        }
        let published = self
            .terminal
            .set(Terminal {
                status,
                finished_at: Utc::now(),
            })
            .is_ok();
        if !published {
            tracing::warn!(
                computer = %self.computer,
                "Job already finished, ignoring second write"
            );
        }
        published
    }

    pub fn computer(&self) -> &str {
        &self.computer
    }

    pub fn num_shots(&self) -> u32 {
        self.num_shots
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// When the terminal status was published, if it has been.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.terminal.get().map(|t| t.finished_at)
    }
}
