use tracing::{info, warn};

use devsignal_common::{BatchResponse, Column, DeveloperRecord, IdentityResult, ResultStatus};

use super::{record_write, validate_batch, BatchError, Enricher};
use crate::cascade::CascadeRun;
use crate::reconcile::{reconcile, MergePolicy};

fn github_url(username: &str) -> String {
    format!("https://github.com/{username}")
}

impl Enricher {
    /// Find GitHub accounts for a batch through the discovery cascade.
    /// Extras found along the way fill empty fields only.
    pub async fn discover_github(&self, ids: &[String]) -> Result<BatchResponse, BatchError> {
        validate_batch(ids)?;

        let mut results = Vec::with_capacity(ids.len());
        for raw_id in ids {
            let result = match self.load(raw_id).await {
                Ok(record) => self.discover_one(&record).await.0,
                Err(failed) => failed,
            };
            results.push(result);
        }

        Ok(BatchResponse { results })
    }

    /// Discovery for one loaded record, with the cascade trace when the
    /// cascade ran.
    pub async fn discover_one(&self, record: &DeveloperRecord) -> (IdentityResult, Option<CascadeRun>) {
        let identity = record.identity();

        if !record.is_blank(Column::GithubUsername) {
            let mut result = IdentityResult::new(&identity.external_id, &identity.name, ResultStatus::AlreadyHas);
            result.github_url = record.github_username.as_deref().map(github_url);
            return (result, None);
        }

        let run = self.cascade.run(&identity).await;
        let reconciled = reconcile(&run.profile(), record, MergePolicy::FillEmpty);

        let mut result = match &run.found {
            Some((username, source)) => {
                let mut r = IdentityResult::new(&identity.external_id, &identity.name, ResultStatus::Found)
                    .with_source(*source);
                r.github_url = Some(github_url(username));
                r
            }
            None => IdentityResult::new(&identity.external_id, &identity.name, ResultStatus::NotFound),
        };

        match self.writer.write(record, &reconciled.writes).await {
            Ok(outcome) => record_write(&mut result, &reconciled, outcome.warnings),
            Err(e) => {
                warn!(identity_id = identity.external_id.as_str(), error = %e, "Discovery write failed");
                result.status = ResultStatus::Failed;
                result.error = Some(e.to_string());
            }
        }

        info!(
            identity_id = identity.external_id.as_str(),
            status = ?result.status,
            source = ?result.source,
            stages = run.trace.len(),
            "Discovery complete"
        );
        (result, Some(run))
    }
}
