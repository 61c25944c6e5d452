pub mod error;
pub mod types;

pub use error::{Result, SixtyfourError};
pub use types::{FoundFields, JobStatus, LeadInfo, TaskState};

use std::collections::BTreeMap;
use std::time::Duration;

use types::{EnrichLeadRequest, JobStatusResponse, SubmitResponse};

const BASE_URL: &str = "https://api.sixtyfour.ai";

/// Fields requested on every submission. Descriptions double as the
/// research agent's instructions.
const REQUESTED_FIELDS: &[(&str, &str)] = &[
    ("github_url", "URL of the person's personal GitHub profile (not an organization)"),
    ("personal_email", "Personal (non-work) email address"),
    ("twitter_url", "URL of the person's X/Twitter profile"),
    ("website_url", "Personal website, blog or portfolio URL"),
];

pub struct SixtyfourClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SixtyfourClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SixtyfourError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SixtyfourError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    /// Submit a lead for asynchronous research. Returns immediately with the task id.
    pub async fn submit_lead(&self, lead: &LeadInfo) -> Result<String> {
        let request = EnrichLeadRequest {
            lead_info: lead,
            fields: REQUESTED_FIELDS.iter().copied().collect::<BTreeMap<_, _>>(),
        };

        let resp = self
            .client
            .post(format!("{}/enrich-lead-async", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::check(resp).await?.json().await?;
        tracing::info!(task_id = %submitted.task_id, name = %lead.name, "Sixtyfour task submitted");
        Ok(submitted.task_id)
    }

    /// Poll a task once. Completion typically takes minutes; callers poll on
    /// demand rather than in a loop.
    pub async fn job_status(&self, task_id: &str) -> Result<JobStatus> {
        let resp = self
            .client
            .get(format!("{}/job-status/{}", self.base_url, task_id))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let body: JobStatusResponse = Self::check(resp).await?.json().await?;
        let job = JobStatus::from(body);
        tracing::debug!(task_id, state = ?job.state, "Sixtyfour task polled");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_body_nests_lead_and_requested_fields() {
        let lead = LeadInfo {
            name: "Ada Lovelace".into(),
            company: Some("Analytical Engines".into()),
            ..Default::default()
        };
        let request = EnrichLeadRequest {
            lead_info: &lead,
            fields: REQUESTED_FIELDS.iter().copied().collect(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["lead_info"]["name"], "Ada Lovelace");
        assert!(json["lead_info"].get("email").is_none());
        assert!(json["struct"]["github_url"].is_string());
        assert_eq!(json["struct"].as_object().unwrap().len(), 4);
    }
}
