//! Named enrichment workflows over one shared set of dependencies.
//!
//! Every batch entry point validates its input before touching anything,
//! then processes identities sequentially. A failure for one identity is
//! captured in that identity's result and never affects its siblings.

pub mod deep;
pub mod deps;
pub mod discovery;
pub mod linkedin;
pub mod reenrich;

pub use deps::EnrichDeps;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use devsignal_common::{DeveloperRecord, IdentityResult};

use crate::cascade::Cascade;
use crate::reconcile::Reconciled;
use crate::sink::MultiSinkWriter;

pub const MAX_BATCH: usize = 10;

/// Batch input rejected before any processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("identityIds must not be empty")]
    Empty,

    #[error("at most {max} identityIds per batch, got {requested}")]
    TooLarge { requested: usize, max: usize },

    #[error("{0} is not configured")]
    Unavailable(&'static str),
}

impl BatchError {
    /// HTTP status a route layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::Empty | BatchError::TooLarge { .. } => 400,
            BatchError::Unavailable(_) => 503,
        }
    }
}

pub fn validate_batch(ids: &[String]) -> Result<(), BatchError> {
    if ids.is_empty() {
        return Err(BatchError::Empty);
    }
    if ids.len() > MAX_BATCH {
        return Err(BatchError::TooLarge {
            requested: ids.len(),
            max: MAX_BATCH,
        });
    }
    Ok(())
}

pub struct Enricher {
    deps: EnrichDeps,
    cascade: Cascade,
    writer: MultiSinkWriter,
}

impl Enricher {
    pub fn new(deps: EnrichDeps) -> Self {
        let cascade = deps.build_cascade();
        Self::with_cascade(deps, cascade)
    }

    /// Use a custom resolver order instead of the standard cascade.
    pub fn with_cascade(deps: EnrichDeps, cascade: Cascade) -> Self {
        let writer = MultiSinkWriter::new(deps.store.clone(), deps.crm.clone());
        Self { deps, cascade, writer }
    }

    /// Oldest-enriched developers first, never-enriched before all others.
    pub async fn stale_ids(&self, limit: usize) -> anyhow::Result<Vec<String>> {
        let ids = self.deps.store.stale_ids(limit as i64).await?;
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    /// Resolve an id to its current record, or the failed result to report.
    async fn load(&self, raw_id: &str) -> Result<DeveloperRecord, IdentityResult> {
        let id = Uuid::parse_str(raw_id.trim())
            .map_err(|_| IdentityResult::failed(raw_id, "", "invalid developer id"))?;
        match self.deps.store.get(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(IdentityResult::failed(raw_id, "", "developer not found")),
            Err(e) => {
                warn!(developer_id = raw_id, error = %e, "Failed to load developer");
                Err(IdentityResult::failed(raw_id, "", format!("failed to load developer: {e}")))
            }
        }
    }
}

/// Fold a reconciliation and its write outcome into a result.
fn record_write(result: &mut IdentityResult, reconciled: &Reconciled, warnings: Vec<String>) {
    result.fields_found = reconciled.writes.column_names();
    result.unclassified_skills = reconciled.unclassified_skills.clone();
    result.warnings.extend(warnings);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("id-{i}")).collect()
    }

    #[test]
    fn batch_limits_are_enforced() {
        assert_eq!(validate_batch(&[]), Err(BatchError::Empty));
        assert!(validate_batch(&ids(10)).is_ok());
        assert_eq!(
            validate_batch(&ids(11)),
            Err(BatchError::TooLarge { requested: 11, max: 10 })
        );
    }

    #[test]
    fn batch_errors_carry_status_codes() {
        assert_eq!(BatchError::Empty.status_code(), 400);
        assert_eq!(BatchError::TooLarge { requested: 11, max: 10 }.status_code(), 400);
        assert_eq!(BatchError::Unavailable("deep enrichment").status_code(), 503);
    }
}
