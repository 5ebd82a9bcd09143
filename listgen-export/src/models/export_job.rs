//! Export job: request, runtime context and progress record
//!
//! Progress lifecycle: RUNNING (0/0 "Initializing...") → COMPLETED | FAILED.
//! Finished records are left to expire after the configured TTL.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::CompanyProfile;

/// Job request as submitted by the portal
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportRequest {
    pub chain: String,
    pub company: String,
    pub price_memo: String,
    pub sales_code: String,
    /// Client-chosen id so the progress stream can be opened before the
    /// export response arrives
    #[serde(default)]
    pub job_id: Option<Uuid>,
}

impl ExportRequest {
    /// Trim and upper-case every identifying field
    pub fn normalized(&self) -> Self {
        Self {
            chain: normalize_code(&self.chain),
            company: normalize_code(&self.company),
            price_memo: normalize_code(&self.price_memo),
            sales_code: normalize_code(&self.sales_code),
            job_id: self.job_id,
        }
    }
}

/// Codes are compared trimmed and upper-cased everywhere
pub fn normalize_code(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Identity and clock of a running job, handed to every template
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub chain: String,
    pub company: CompanyProfile,
    pub sales_code: String,
    pub price_memo: String,
    /// Local wall-clock time the job started; drives file names and dates
    pub generated_at: NaiveDateTime,
}

/// Result of the cheap existence probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecheckResult {
    pub exists: bool,
    pub count: u64,
}

/// Progress record state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(JobState::Running),
            "COMPLETED" => Some(JobState::Completed),
            "FAILED" => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Externally pollable progress of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub job_id: Uuid,
    pub current: u64,
    pub total: u64,
    pub status: String,
    pub state: JobState,
    pub updated_at: DateTime<Utc>,
}

impl ProgressState {
    /// Fresh record for a job that was just accepted
    pub fn initial(job_id: Uuid) -> Self {
        Self {
            job_id,
            current: 0,
            total: 0,
            status: "Initializing...".to_string(),
            state: JobState::Running,
            updated_at: Utc::now(),
        }
    }

    /// Completion test used by progress streams
    pub fn is_done(&self) -> bool {
        self.state.is_terminal() || (self.total > 0 && self.current >= self.total)
    }

    /// Percentage complete (0.0 - 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current.min(self.total) as f64 / self.total as f64) * 100.0
        }
    }
}
