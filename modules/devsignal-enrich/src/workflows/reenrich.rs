use tracing::{info, warn};

use devsignal_common::{BatchResponse, DeveloperRecord, IdentityResult, ResultStatus};

use super::{record_write, validate_batch, BatchError, Enricher};
use crate::reconcile::{reconcile, MergePolicy};
use crate::search::search_identity;

impl Enricher {
    /// Refresh descriptive fields from a fresh web search. Existing
    /// descriptive values are overwritten; contact handles only fill blanks.
    pub async fn reenrich(&self, ids: &[String]) -> Result<BatchResponse, BatchError> {
        validate_batch(ids)?;

        let mut results = Vec::with_capacity(ids.len());
        for raw_id in ids {
            let result = match self.load(raw_id).await {
                Ok(record) => self.reenrich_one(&record).await,
                Err(failed) => failed,
            };
            results.push(result);
        }

        Ok(BatchResponse { results })
    }

    async fn reenrich_one(&self, record: &DeveloperRecord) -> IdentityResult {
        let identity = record.identity();
        let id = identity.external_id.as_str();
        let not_found = || IdentityResult::new(id, &identity.name, ResultStatus::NotFound);

        let blob = match tokio::time::timeout(
            self.deps.search_timeout,
            search_identity(self.deps.searcher.as_ref(), &identity),
        )
        .await
        {
            Ok(Ok(blob)) => blob,
            Ok(Err(e)) => {
                warn!(identity_id = id, error = %e, "Identity search failed");
                return not_found();
            }
            Err(_) => {
                warn!(identity_id = id, "Identity search timed out");
                return not_found();
            }
        };
        if blob.trim().is_empty() {
            return not_found();
        }

        let profile = match tokio::time::timeout(
            self.deps.extraction_timeout,
            self.deps.extractor.extract(&blob, &identity),
        )
        .await
        {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                warn!(identity_id = id, error = %e, "Extraction failed");
                return IdentityResult::failed(id, &identity.name, format!("extraction failed: {e}"));
            }
            Err(_) => {
                warn!(identity_id = id, "Extraction timed out");
                return IdentityResult::failed(id, &identity.name, "extraction timed out");
            }
        };

        let reconciled = reconcile(&profile, record, MergePolicy::AlwaysOverwrite);
        if reconciled.writes.is_empty() {
            let mut result = not_found();
            result.unclassified_skills = reconciled.unclassified_skills;
            return result;
        }

        let mut result = IdentityResult::new(id, &identity.name, ResultStatus::Enriched);
        match self.writer.write(record, &reconciled.writes).await {
            Ok(outcome) => record_write(&mut result, &reconciled, outcome.warnings),
            Err(e) => return IdentityResult::failed(id, &identity.name, e),
        }

        info!(identity_id = id, fields = result.fields_found.len(), "Re-enrichment complete");
        result
    }
}
