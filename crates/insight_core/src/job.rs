use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    #[default]
    Review,
    Debug,
    Architecture,
}

/// Remote job status.
///
/// Progress is monotonic: `pending -> processing -> {completed | failed}`.
/// `throttled` is reported by the service while a job is held back and ranks
/// with `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Throttled,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending | JobStatus::Throttled => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Throttled => "throttled",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "throttled" => Ok(JobStatus::Throttled),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

/// Returns true when a snapshot with `next` may replace one with `current`.
///
/// Nothing replaces a terminal status; otherwise a snapshot is accepted unless
/// it reports an earlier stage than the one already observed. Equal ranks are
/// accepted so later payload details win.
pub fn accepts_transition(current: Option<JobStatus>, next: JobStatus) -> bool {
    match current {
        None => true,
        Some(current) if current.is_terminal() => false,
        Some(current) => next.rank() >= current.rank(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LintIssue {
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LintResult {
    #[serde(default)]
    pub issues: Vec<LintIssue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobResults {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub lint_result: Option<LintResult>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    #[serde(default)]
    pub cached: bool,
}

/// Read-only replica of a remote job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    #[serde(default)]
    pub user_id: String,
    #[serde(rename = "type", default)]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub results: Option<JobResults>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<TokenUsage>,
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Job {
    /// Minimal snapshot with only id and status set.
    pub fn new(job_id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            user_id: String::new(),
            kind: JobKind::default(),
            status,
            file_path: None,
            language: None,
            results: None,
            error: None,
            tokens_used: None,
            estimated_cost: 0.0,
            cache_hit: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn result_text(&self) -> Option<&str> {
        self.results
            .as_ref()
            .map(|results| results.content.as_str())
            .filter(|content| !content.is_empty())
    }

    pub fn lint_issues(&self) -> &[LintIssue] {
        self.results
            .as_ref()
            .and_then(|results| results.lint_result.as_ref())
            .map(|lint| lint.issues.as_slice())
            .unwrap_or_default()
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_used.map(|usage| usage.total_tokens).unwrap_or(0)
    }
}
