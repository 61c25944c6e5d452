use tracing::{error, info, warn};

use devsignal_common::{non_blank, BatchResponse, DeveloperRecord, DiscoverySource, IdentityResult, ResultStatus};

use super::{record_write, validate_batch, BatchError, Enricher};
use crate::reconcile::{reconcile, MergePolicy};
use crate::scraper::ScrapeError;
use crate::traits::ProfileScraper;

impl Enricher {
    /// Augment records from their professional-network profile pages.
    /// Scrapes are serialized through the shared session credential; once
    /// that credential is rejected, the rest of the batch fails without
    /// further attempts.
    pub async fn enrich_from_linkedin(&self, ids: &[String]) -> Result<BatchResponse, BatchError> {
        validate_batch(ids)?;
        let scraper = self
            .deps
            .scraper
            .clone()
            .ok_or(BatchError::Unavailable("profile scraper"))?;

        let mut results = Vec::with_capacity(ids.len());
        let mut auth_failure: Option<String> = None;

        for raw_id in ids {
            let record = match self.load(raw_id).await {
                Ok(record) => record,
                Err(failed) => {
                    results.push(failed);
                    continue;
                }
            };

            if let Some(ref message) = auth_failure {
                results.push(IdentityResult::failed(raw_id, &record.name, message));
                continue;
            }

            let (result, auth) = self.linkedin_one(scraper.as_ref(), &record).await;
            if auth {
                auth_failure = result.error.clone();
            }
            results.push(result);
        }

        Ok(BatchResponse { results })
    }

    /// Returns the result and whether the session credential was rejected.
    async fn linkedin_one(&self, scraper: &dyn ProfileScraper, record: &DeveloperRecord) -> (IdentityResult, bool) {
        let identity = record.identity();
        let id = identity.external_id.as_str();

        let Some(profile_url) = non_blank(identity.linkedin_url.as_deref()) else {
            return (IdentityResult::failed(id, &identity.name, "no LinkedIn URL on record"), false);
        };

        let page = match scraper.scrape(profile_url).await {
            Ok(page) => page,
            Err(e @ ScrapeError::Authentication { .. }) => {
                error!(identity_id = id, error = %e, "LinkedIn session rejected, stopping batch");
                return (IdentityResult::failed(id, &identity.name, e), true);
            }
            Err(e) => {
                warn!(identity_id = id, error = %e, "LinkedIn scrape failed");
                return (IdentityResult::failed(id, &identity.name, e), false);
            }
        };

        let profile = match tokio::time::timeout(
            self.deps.extraction_timeout,
            self.deps.extractor.extract(&page.text, &identity),
        )
        .await
        {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                return (
                    IdentityResult::failed(id, &identity.name, format!("extraction failed: {e}")),
                    false,
                )
            }
            Err(_) => return (IdentityResult::failed(id, &identity.name, "extraction timed out"), false),
        };

        let reconciled = reconcile(&profile, record, MergePolicy::FillEmpty);
        let status = if reconciled.writes.is_empty() {
            ResultStatus::NotFound
        } else {
            ResultStatus::Enriched
        };
        let mut result =
            IdentityResult::new(id, &identity.name, status).with_source(DiscoverySource::AgentqlLinkedin);

        match self.writer.write(record, &reconciled.writes).await {
            Ok(outcome) => record_write(&mut result, &reconciled, outcome.warnings),
            Err(e) => return (IdentityResult::failed(id, &identity.name, e), false),
        }

        info!(identity_id = id, status = ?result.status, fields = result.fields_found.len(), "LinkedIn enrichment complete");
        (result, false)
    }
}
