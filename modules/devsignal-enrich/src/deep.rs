// Sixtyfour as the last-resort asynchronous deep-enrichment provider.

use anyhow::Result;
use async_trait::async_trait;
use sixtyfour_client::{FoundFields, LeadInfo, SixtyfourClient, TaskState};

use devsignal_common::{EnrichedProfile, Identity, TaskStatus};

use crate::links::twitter_handle;
use crate::search::github_owner;
use crate::traits::{DeepEnricher, DeepPoll};

pub struct SixtyfourEnricher {
    client: SixtyfourClient,
}

impl SixtyfourEnricher {
    pub fn new(client: SixtyfourClient) -> Self {
        Self { client }
    }
}

fn task_status(state: TaskState) -> TaskStatus {
    match state {
        TaskState::Pending => TaskStatus::Pending,
        TaskState::Processing => TaskStatus::Processing,
        TaskState::Completed => TaskStatus::Completed,
        TaskState::Failed => TaskStatus::Failed,
    }
}

/// Provider URLs become handles; values that are not recognizable profile
/// URLs are dropped.
fn found_profile(found: FoundFields) -> EnrichedProfile {
    EnrichedProfile {
        github_username: found.github_url.as_deref().and_then(github_owner),
        twitter_username: found.twitter_url.as_deref().and_then(twitter_handle),
        website_url: found.website_url,
        personal_email: found.personal_email,
        ..Default::default()
    }
}

#[async_trait]
impl DeepEnricher for SixtyfourEnricher {
    async fn submit(&self, identity: &Identity) -> Result<String> {
        let lead = LeadInfo {
            name: identity.name.clone(),
            company: identity.company.clone(),
            title: identity.job_title.clone(),
            linkedin: identity.linkedin_url.clone(),
            email: identity.email.clone(),
        };
        Ok(self.client.submit_lead(&lead).await?)
    }

    async fn poll(&self, task_id: &str) -> Result<DeepPoll> {
        let job = self.client.job_status(task_id).await?;
        Ok(DeepPoll {
            status: task_status(job.state),
            profile: found_profile(job.found),
            error: job.error,
        })
    }
}
