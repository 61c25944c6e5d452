// Trait seams for every external collaborator of the enrichment pipeline.
//
// Each provider sits behind one trait so the cascade and the workflows can
// be exercised with the mocks in `testing` instead of live APIs.

use anyhow::Result;
use async_trait::async_trait;
use browserless_client::{BrowserSession, SessionOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use devsignal_common::{DeveloperRecord, EnrichedProfile, FieldWrites, Identity, TaskStatus};

use crate::scraper::ScrapeError;
use crate::sink::{CrmLists, CrmUpdate, CrmWriteError};

// ---------------------------------------------------------------------------
// Web search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Ranked organic results for a query.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw HTML of a page.
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Structured developer directory (GitHub)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[async_trait]
pub trait GithubDirectory: Send + Sync {
    /// Logins matching a user-search query, best match first.
    async fn search_users(&self, query: &str) -> Result<Vec<String>>;

    /// Public profile for a login. `None` if the account does not exist.
    async fn user(&self, login: &str) -> Result<Option<GithubUser>>;
}

// ---------------------------------------------------------------------------
// Structured extraction
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    /// Turn free text plus the identity's known fields into a sparse profile.
    /// Malformed model output yields an empty profile, not an error; `Err`
    /// is reserved for transport failures.
    async fn extract(&self, free_text: &str, known: &Identity) -> Result<EnrichedProfile>;
}

// ---------------------------------------------------------------------------
// Profile-page scraping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedProfile {
    /// Visible page text with navigation boilerplate removed.
    pub text: String,
    /// Final URL after redirects.
    pub url: String,
    pub scraped_at: DateTime<Utc>,
}

#[async_trait]
pub trait ProfileScraper: Send + Sync {
    async fn scrape(&self, profile_url: &str) -> std::result::Result<ScrapedProfile, ScrapeError>;
}

/// Remote browser sessions. Every created session must be closed by the caller.
#[async_trait]
pub trait BrowserSessions: Send + Sync {
    async fn create_session(&self, options: &SessionOptions) -> browserless_client::Result<BrowserSession>;

    async fn run_function(
        &self,
        session: &BrowserSession,
        code: &str,
        context: &serde_json::Value,
    ) -> browserless_client::Result<serde_json::Value>;

    async fn close_session(&self, session: &BrowserSession) -> browserless_client::Result<()>;
}

// ---------------------------------------------------------------------------
// Async deep enrichment
// ---------------------------------------------------------------------------

/// One poll of a deep-enrichment task. `profile` only carries values once
/// the task has completed.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepPoll {
    pub status: TaskStatus,
    pub profile: EnrichedProfile,
    pub error: Option<String>,
}

#[async_trait]
pub trait DeepEnricher: Send + Sync {
    async fn submit(&self, identity: &Identity) -> Result<String>;
    async fn poll(&self, task_id: &str) -> Result<DeepPoll>;
}

// ---------------------------------------------------------------------------
// Destination stores
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DeveloperStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<DeveloperRecord>>;

    /// Apply validated column writes and stamp `last_enriched_at`.
    async fn apply(&self, id: Uuid, writes: &FieldWrites) -> Result<()>;

    /// Persist (or clear, with `None`) the outstanding deep-enrichment task.
    async fn set_task(&self, id: Uuid, task_id: Option<&str>) -> Result<()>;

    /// Developers with an outstanding deep-enrichment task.
    async fn with_outstanding_task(&self) -> Result<Vec<DeveloperRecord>>;

    /// Ids ordered by `last_enriched_at`, never-enriched first.
    async fn stale_ids(&self, limit: i64) -> Result<Vec<Uuid>>;
}

#[async_trait]
pub trait CrmSink: Send + Sync {
    /// Current list fields for a contact.
    async fn lists(&self, contact_id: &str) -> std::result::Result<CrmLists, CrmWriteError>;

    /// Apply an update. List fields replace the stored lists wholesale.
    async fn update(&self, contact_id: &str, update: &CrmUpdate) -> std::result::Result<(), CrmWriteError>;
}
