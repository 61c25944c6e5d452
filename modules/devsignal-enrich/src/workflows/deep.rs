use tracing::{info, warn};

use devsignal_common::{
    BatchResponse, Column, DeveloperRecord, DiscoverySource, IdentityResult, ResultStatus, TaskStatus,
};

use super::{record_write, validate_batch, BatchError, Enricher};
use crate::reconcile::{reconcile, MergePolicy};
use crate::traits::DeepEnricher;

const DEEP_HANDLES: [Column; 4] = [
    Column::GithubUsername,
    Column::PersonalEmail,
    Column::TwitterUsername,
    Column::WebsiteUrl,
];

impl Enricher {
    /// Submit last-resort deep-enrichment tasks. Only explicit calls submit;
    /// nothing here polls.
    pub async fn submit_deep(&self, ids: &[String]) -> Result<BatchResponse, BatchError> {
        validate_batch(ids)?;
        let deep = self
            .deps
            .deep
            .clone()
            .ok_or(BatchError::Unavailable("deep enrichment"))?;

        let mut results = Vec::with_capacity(ids.len());
        for raw_id in ids {
            let result = match self.load(raw_id).await {
                Ok(record) => self.submit_one(deep.as_ref(), &record).await,
                Err(failed) => failed,
            };
            results.push(result);
        }

        Ok(BatchResponse { results })
    }

    async fn submit_one(&self, deep: &dyn DeepEnricher, record: &DeveloperRecord) -> IdentityResult {
        let identity = record.identity();
        let id = identity.external_id.as_str();

        if let Some(ref task_id) = record.enrichment_task_id {
            let mut result = IdentityResult::new(id, &identity.name, ResultStatus::Pending);
            result.task_id = Some(task_id.clone());
            return result;
        }

        if DEEP_HANDLES.iter().all(|c| !record.is_blank(*c)) {
            return IdentityResult::new(id, &identity.name, ResultStatus::AlreadyHas);
        }

        let task_id = match deep.submit(&identity).await {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!(identity_id = id, error = %e, "Deep enrichment submission failed");
                return IdentityResult::failed(id, &identity.name, format!("submission failed: {e}"));
            }
        };

        if let Err(e) = self.deps.store.set_task(record.id, Some(&task_id)).await {
            warn!(identity_id = id, task_id = task_id.as_str(), error = %e, "Failed to persist task id");
            return IdentityResult::failed(id, &identity.name, format!("failed to persist task: {e}"));
        }

        info!(identity_id = id, task_id = task_id.as_str(), "Deep enrichment submitted");
        let mut result = IdentityResult::new(id, &identity.name, ResultStatus::Pending)
            .with_source(DiscoverySource::Sixtyfour);
        result.task_id = Some(task_id);
        result
    }

    /// Poll every outstanding task once. Terminal tasks are cleared from
    /// their record; running ones are kept for the next collect.
    pub async fn collect_deep(&self) -> Result<BatchResponse, BatchError> {
        let deep = self
            .deps
            .deep
            .clone()
            .ok_or(BatchError::Unavailable("deep enrichment"))?;

        let records = match self.deps.store.with_outstanding_task().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to list outstanding tasks");
                return Err(BatchError::Unavailable("developer store"));
            }
        };

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            results.push(self.collect_one(deep.as_ref(), record).await);
        }
        Ok(BatchResponse { results })
    }

    async fn collect_one(&self, deep: &dyn DeepEnricher, record: &DeveloperRecord) -> IdentityResult {
        let identity = record.identity();
        let id = identity.external_id.as_str();
        let Some(task_id) = record.enrichment_task_id.clone() else {
            return IdentityResult::new(id, &identity.name, ResultStatus::NotFound);
        };

        let poll = match deep.poll(&task_id).await {
            Ok(poll) => poll,
            Err(e) => {
                // Transient: the task reference stays for the next collect.
                warn!(identity_id = id, task_id = task_id.as_str(), error = %e, "Deep enrichment poll failed");
                let mut result = IdentityResult::failed(id, &identity.name, format!("poll failed: {e}"));
                result.task_id = Some(task_id);
                return result;
            }
        };

        match poll.status {
            TaskStatus::Pending | TaskStatus::Processing => {
                let mut result = IdentityResult::new(id, &identity.name, ResultStatus::Pending)
                    .with_source(DiscoverySource::Sixtyfour);
                result.task_id = Some(task_id);
                result
            }
            TaskStatus::Failed => {
                self.clear_task(record, &task_id).await;
                let mut result = IdentityResult::failed(
                    id,
                    &identity.name,
                    poll.error.as_deref().unwrap_or("deep enrichment failed"),
                );
                result.source = Some(DiscoverySource::Sixtyfour);
                result
            }
            TaskStatus::Completed => {
                let reconciled = reconcile(&poll.profile, record, MergePolicy::FillEmpty);
                let status = if reconciled.writes.is_empty() {
                    ResultStatus::NotFound
                } else {
                    ResultStatus::Found
                };
                let mut result =
                    IdentityResult::new(id, &identity.name, status).with_source(DiscoverySource::Sixtyfour);
                result.github_url = reconciled
                    .writes
                    .text(Column::GithubUsername)
                    .map(|u| format!("https://github.com/{u}"));

                match self.writer.write(record, &reconciled.writes).await {
                    Ok(outcome) => record_write(&mut result, &reconciled, outcome.warnings),
                    Err(e) => {
                        // Keep the task so the next collect can retry the write.
                        let mut failed = IdentityResult::failed(id, &identity.name, e);
                        failed.task_id = Some(task_id);
                        return failed;
                    }
                }

                self.clear_task(record, &task_id).await;
                info!(identity_id = id, fields = result.fields_found.len(), "Deep enrichment collected");
                result
            }
        }
    }

    async fn clear_task(&self, record: &DeveloperRecord, task_id: &str) {
        if let Err(e) = self.deps.store.set_task(record.id, None).await {
            warn!(developer_id = %record.id, task_id, error = %e, "Failed to clear finished task");
        }
    }
}
