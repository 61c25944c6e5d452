//! Discovery cascade: an ordered list of resolvers tried per identity,
//! stopping at the first that finds a GitHub account.
//!
//! A stage that errors, times out or returns garbage is a miss. Nothing a
//! single stage does can abort the run for its identity or its batch.

pub mod resolvers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use devsignal_common::{DiscoverySource, EnrichedProfile, Identity};

pub use resolvers::{GithubApiResolver, WebSearchResolver, WebsiteCrawlResolver, WebsiteSearchResolver};

/// What one stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A GitHub account, plus anything else picked up on the way.
    Found { github_username: String, extras: EnrichedProfile },
    /// Nothing conclusive. Extras may still carry opportunistic finds.
    Miss { extras: EnrichedProfile },
    Error(String),
}

impl Outcome {
    pub fn miss() -> Self {
        Outcome::Miss {
            extras: EnrichedProfile::default(),
        }
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    fn source(&self) -> DiscoverySource;

    /// Hard limit for one attempt; exceeding it is a miss.
    fn timeout(&self) -> Duration;

    async fn attempt(&self, identity: &Identity) -> Outcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageResult {
    Found,
    Miss,
    Error,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageAttempt {
    pub source: DiscoverySource,
    pub result: StageResult,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one cascade run learned about one identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeRun {
    pub found: Option<(String, DiscoverySource)>,
    /// Extras merged across stages; earlier stages win.
    pub extras: EnrichedProfile,
    pub trace: Vec<StageAttempt>,
}

impl CascadeRun {
    /// Extras plus the discovered handle, ready for reconciliation.
    pub fn profile(&self) -> EnrichedProfile {
        let mut profile = self.extras.clone();
        if let Some((username, _)) = &self.found {
            profile.github_username = Some(username.clone());
        }
        profile
    }
}

/// Fill fields `target` lacks from `extra`.
pub fn merge_extras(target: &mut EnrichedProfile, extra: EnrichedProfile) {
    fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
        if slot.is_none() {
            *slot = value;
        }
    }
    fill(&mut target.github_username, extra.github_username);
    fill(&mut target.twitter_username, extra.twitter_username);
    fill(&mut target.website_url, extra.website_url);
    fill(&mut target.personal_email, extra.personal_email);
    fill(&mut target.linkedin_url, extra.linkedin_url);
    fill(&mut target.city, extra.city);
    fill(&mut target.state_region, extra.state_region);
    fill(&mut target.country, extra.country);
    fill(&mut target.location, extra.location);
}

pub struct Cascade {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl Cascade {
    pub fn new(resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    pub async fn run(&self, identity: &Identity) -> CascadeRun {
        let mut run = CascadeRun::default();

        for resolver in &self.resolvers {
            let source = resolver.source();
            let started = Instant::now();
            let attempt = tokio::time::timeout(resolver.timeout(), resolver.attempt(identity)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let (result, error) = match attempt {
                Ok(Outcome::Found { github_username, extras }) => {
                    merge_extras(&mut run.extras, extras);
                    info!(
                        identity_id = identity.external_id.as_str(),
                        source = %source,
                        github = github_username.as_str(),
                        "Cascade hit"
                    );
                    run.found = Some((github_username, source));
                    (StageResult::Found, None)
                }
                Ok(Outcome::Miss { extras }) => {
                    merge_extras(&mut run.extras, extras);
                    (StageResult::Miss, None)
                }
                Ok(Outcome::Error(e)) => {
                    warn!(identity_id = identity.external_id.as_str(), source = %source, error = e.as_str(), "Cascade stage failed");
                    (StageResult::Error, Some(e))
                }
                Err(_) => {
                    warn!(
                        identity_id = identity.external_id.as_str(),
                        source = %source,
                        timeout_secs = resolver.timeout().as_secs(),
                        "Cascade stage timed out"
                    );
                    (StageResult::TimedOut, None)
                }
            };

            debug!(identity_id = identity.external_id.as_str(), source = %source, ?result, elapsed_ms, "Cascade stage done");
            run.trace.push(StageAttempt {
                source,
                result,
                elapsed_ms,
                error,
            });

            if run.found.is_some() {
                break;
            }
        }

        run
    }
}
