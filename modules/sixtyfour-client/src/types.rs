use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What we know about the person being researched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EnrichLeadRequest<'a> {
    pub lead_info: &'a LeadInfo,
    /// Requested output fields, keyed by name, valued by a description the
    /// provider's research agent uses as its instruction.
    #[serde(rename = "struct")]
    pub fields: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobStatusResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JobResult {
    #[serde(default)]
    pub structured_data: serde_json::Map<String, serde_json::Value>,
}

/// Provider-side lifecycle of an enrichment task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskState {
    /// Map the provider's status vocabulary. Unknown statuses are treated as
    /// still running so the task reference is kept for the next poll.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => TaskState::Pending,
            "completed" | "complete" | "succeeded" | "success" => TaskState::Completed,
            "failed" | "error" | "cancelled" | "canceled" => TaskState::Failed,
            "processing" | "running" | "in_progress" => TaskState::Processing,
            other => {
                tracing::warn!(status = other, "Unrecognized Sixtyfour task status, treating as processing");
                TaskState::Processing
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Fields a completed task may carry. Each one is independently present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundFields {
    pub github_url: Option<String>,
    pub personal_email: Option<String>,
    pub twitter_url: Option<String>,
    pub website_url: Option<String>,
}

impl FoundFields {
    pub(crate) fn from_structured(data: &serde_json::Map<String, serde_json::Value>) -> Self {
        let pick = |key: &str| data.get(key).and_then(|v| v.as_str()).and_then(clean_value);
        Self {
            github_url: pick("github_url"),
            personal_email: pick("personal_email"),
            twitter_url: pick("twitter_url"),
            website_url: pick("website_url"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.github_url.is_none()
            && self.personal_email.is_none()
            && self.twitter_url.is_none()
            && self.website_url.is_none()
    }
}

/// The research agent fills unknowns with placeholder prose instead of omitting them.
fn clean_value(raw: &str) -> Option<String> {
    let v = raw.trim();
    let lower = v.to_ascii_lowercase();
    let placeholder = matches!(
        lower.as_str(),
        "" | "n/a" | "na" | "none" | "null" | "unknown" | "not found" | "not available"
    );
    if placeholder {
        None
    } else {
        Some(v.to_string())
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: TaskState,
    pub found: FoundFields,
    pub error: Option<String>,
}

impl From<JobStatusResponse> for JobStatus {
    fn from(resp: JobStatusResponse) -> Self {
        let state = TaskState::parse(&resp.status);
        let found = match (state, resp.result.as_ref()) {
            (TaskState::Completed, Some(result)) => FoundFields::from_structured(&result.structured_data),
            _ => FoundFields::default(),
        };
        Self {
            state,
            found,
            error: resp.error,
        }
    }
}
