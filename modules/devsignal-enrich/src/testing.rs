// Test mocks for the enrichment pipeline.
//
// One mock per trait seam, each in the builder style (`.on_x()`), each
// counting or logging the calls it receives so tests can assert on which
// providers were touched:
// - MockSearcher (WebSearcher), MockPageFetcher (PageFetcher)
// - MockGithubDirectory (GithubDirectory), MockExtractor (ProfileExtractor)
// - MockScraper (ProfileScraper), MockBrowserSessions (BrowserSessions)
// - MockDeepEnricher (DeepEnricher)
// - MockStore (DeveloperStore), MockCrm (CrmSink)
// - ScriptedResolver (cascade Resolver)
//
// Plus `Mocks`, a bundle that assembles `EnrichDeps` from all of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use browserless_client::{BrowserSession, BrowserlessError, SessionOptions};
use chrono::Utc;
use uuid::Uuid;

use devsignal_common::{
    Column, DeveloperRecord, DiscoverySource, EnrichedProfile, FieldValue, FieldWrites, Identity, TaskStatus,
};

use crate::cascade::{Outcome, Resolver};
use crate::scraper::ScrapeError;
use crate::sink::{CrmLists, CrmUpdate, CrmWriteError};
use crate::traits::{
    BrowserSessions, CrmSink, DeepEnricher, DeepPoll, DeveloperStore, GithubDirectory, GithubUser, PageFetcher, ProfileExtractor,
    ProfileScraper, ScrapedProfile, SearchHit, WebSearcher,
};
use crate::workflows::EnrichDeps;

// ---------------------------------------------------------------------------
// Record helpers
// ---------------------------------------------------------------------------

/// A developer with only a name and a fresh id.
pub fn developer(name: &str) -> DeveloperRecord {
    DeveloperRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn hit(url: &str) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: String::new(),
        snippet: String::new(),
    }
}

pub fn scraped(url: &str, text: &str) -> ScrapedProfile {
    ScrapedProfile {
        text: text.to_string(),
        url: url.to_string(),
        scraped_at: Utc::now(),
    }
}

/// Apply column writes to a record the way the Postgres store does.
pub fn apply_writes(record: &mut DeveloperRecord, writes: &FieldWrites) {
    for (column, value) in writes.iter() {
        match value {
            FieldValue::Text(text) => {
                let slot = match column {
                    Column::JobTitle => &mut record.job_title,
                    Column::Seniority => &mut record.seniority,
                    Column::City => &mut record.city,
                    Column::StateRegion => &mut record.state_region,
                    Column::Country => &mut record.country,
                    Column::Location => &mut record.location,
                    Column::GithubUsername => &mut record.github_username,
                    Column::TwitterUsername => &mut record.twitter_username,
                    Column::WebsiteUrl => &mut record.website_url,
                    Column::PersonalEmail => &mut record.personal_email,
                    Column::LinkedinUrl => &mut record.linkedin_url,
                    Column::BuyingInfluence => &mut record.buying_influence,
                    Column::CompanySize => &mut record.company_size,
                    Column::OpenSourceActivity => &mut record.open_source_activity,
                    other => panic!("apply_writes: {other} is not a text column"),
                };
                *slot = Some(text.clone());
            }
            FieldValue::List(items) => {
                let slot = match column {
                    Column::RoleTypes => &mut record.role_types,
                    Column::Languages => &mut record.languages,
                    Column::Frameworks => &mut record.frameworks,
                    Column::Databases => &mut record.databases,
                    Column::CloudPlatforms => &mut record.cloud_platforms,
                    Column::DevopsTools => &mut record.devops_tools,
                    other => panic!("apply_writes: {other} is not a list column"),
                };
                *slot = items.clone();
            }
            FieldValue::Number(n) => {
                assert_eq!(column, Column::YearsExperience, "apply_writes: {column} is not numeric");
                record.years_experience = Some(*n);
            }
        }
    }
    record.last_enriched_at = Some(Utc::now());
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Query → hits. Unregistered queries return no hits; `.failing()` makes
/// every query an error.
#[derive(Default)]
pub struct MockSearcher {
    results: HashMap<String, Vec<SearchHit>>,
    failing: bool,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.failing {
            bail!("MockSearcher: search provider unavailable");
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockPageFetcher
// ---------------------------------------------------------------------------

/// URL → HTML. Returns `Err` for unregistered URLs.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("MockPageFetcher: no page registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// MockGithubDirectory
// ---------------------------------------------------------------------------

/// Search query → logins, login → user. Unregistered searches match nobody.
#[derive(Default)]
pub struct MockGithubDirectory {
    searches: HashMap<String, Vec<String>>,
    users: HashMap<String, GithubUser>,
    calls: AtomicUsize,
}

impl MockGithubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, logins: &[&str]) -> Self {
        self.searches
            .insert(query.to_string(), logins.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn on_user(mut self, user: GithubUser) -> Self {
        self.users.insert(user.login.clone(), user);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GithubDirectory for MockGithubDirectory {
    async fn search_users(&self, query: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }

    async fn user(&self, login: &str) -> Result<Option<GithubUser>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.get(login).cloned())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Returns one fixed profile for every input, or fails every call.
#[derive(Default)]
pub struct MockExtractor {
    profile: EnrichedProfile,
    failing: bool,
    inputs: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, profile: EnrichedProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileExtractor for MockExtractor {
    async fn extract(&self, free_text: &str, _known: &Identity) -> Result<EnrichedProfile> {
        self.inputs.lock().unwrap().push(free_text.to_string());
        if self.failing {
            bail!("MockExtractor: model unavailable");
        }
        Ok(self.profile.clone())
    }
}

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

/// Profile URL → scripted result. Unregistered URLs are a browser error.
/// Records when each call arrived (tokio clock) for throttle assertions.
#[derive(Default)]
pub struct MockScraper {
    results: HashMap<String, std::result::Result<ScrapedProfile, ScrapeError>>,
    calls: Mutex<Vec<(String, tokio::time::Instant)>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_profile(mut self, url: &str, text: &str) -> Self {
        self.results.insert(url.to_string(), Ok(scraped(url, text)));
        self
    }

    pub fn on_error(mut self, url: &str, error: ScrapeError) -> Self {
        self.results.insert(url.to_string(), Err(error));
        self
    }

    pub fn scraped_urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileScraper for MockScraper {
    async fn scrape(&self, profile_url: &str) -> std::result::Result<ScrapedProfile, ScrapeError> {
        self.calls
            .lock()
            .unwrap()
            .push((profile_url.to_string(), tokio::time::Instant::now()));
        self.results
            .get(profile_url)
            .cloned()
            .unwrap_or_else(|| Err(ScrapeError::Browser(format!("MockScraper: nothing registered for {profile_url}"))))
    }
}

// ---------------------------------------------------------------------------
// MockBrowserSessions
// ---------------------------------------------------------------------------

enum FunctionScript {
    Returns(serde_json::Value),
    Fails,
    Hangs(Duration),
}

/// Hands out sessions `session-1`, `session-2`, … and records which ones
/// were closed. The scripted function either returns a page, fails, or
/// sleeps past any reasonable timeout.
pub struct MockBrowserSessions {
    script: FunctionScript,
    created: AtomicUsize,
    runs: AtomicUsize,
    closed: Mutex<Vec<String>>,
}

impl MockBrowserSessions {
    fn with_script(script: FunctionScript) -> Self {
        Self {
            script,
            created: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            closed: Mutex::new(Vec::new()),
        }
    }

    pub fn returning_page(url: &str, text: &str) -> Self {
        Self::with_script(FunctionScript::Returns(serde_json::json!({
            "data": { "url": url, "text": text }
        })))
    }

    pub fn failing_run() -> Self {
        Self::with_script(FunctionScript::Fails)
    }

    pub fn hanging_run(for_how_long: Duration) -> Self {
        Self::with_script(FunctionScript::Hangs(for_how_long))
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserSessions for MockBrowserSessions {
    async fn create_session(&self, _options: &SessionOptions) -> browserless_client::Result<BrowserSession> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BrowserSession {
            id: format!("session-{n}"),
            connect: format!("wss://browser.test/session-{n}"),
            stop: format!("https://browser.test/session-{n}/stop"),
        })
    }

    async fn run_function(
        &self,
        _session: &BrowserSession,
        _code: &str,
        _context: &serde_json::Value,
    ) -> browserless_client::Result<serde_json::Value> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            FunctionScript::Returns(value) => Ok(value.clone()),
            FunctionScript::Fails => Err(BrowserlessError::Api {
                status: 500,
                message: "page crashed".into(),
            }),
            FunctionScript::Hangs(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(serde_json::Value::Null)
            }
        }
    }

    async fn close_session(&self, session: &BrowserSession) -> browserless_client::Result<()> {
        self.closed.lock().unwrap().push(session.id.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDeepEnricher
// ---------------------------------------------------------------------------

/// Submissions get sequential task ids (`task-1`, `task-2`, …). Polls answer
/// from the registered task table; unknown tasks are an error.
#[derive(Default)]
pub struct MockDeepEnricher {
    polls: HashMap<String, DeepPoll>,
    failing_submit: bool,
    submitted: Mutex<Vec<String>>,
    polled: Mutex<Vec<String>>,
}

impl MockDeepEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_poll(mut self, task_id: &str, status: TaskStatus, profile: EnrichedProfile) -> Self {
        let error = (status == TaskStatus::Failed).then(|| "provider gave up".to_string());
        self.polls.insert(
            task_id.to_string(),
            DeepPoll {
                status,
                profile,
                error,
            },
        );
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.failing_submit = true;
        self
    }

    /// Names of the identities submitted, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeepEnricher for MockDeepEnricher {
    async fn submit(&self, identity: &Identity) -> Result<String> {
        if self.failing_submit {
            bail!("MockDeepEnricher: submission rejected");
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(identity.name.clone());
        Ok(format!("task-{}", submitted.len()))
    }

    async fn poll(&self, task_id: &str) -> Result<DeepPoll> {
        self.polled.lock().unwrap().push(task_id.to_string());
        self.polls
            .get(task_id)
            .cloned()
            .ok_or_else(|| anyhow!("MockDeepEnricher: no task registered for {task_id}"))
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory developer table. Applied writes are kept for assertions.
#[derive(Default)]
pub struct MockStore {
    records: Mutex<HashMap<Uuid, DeveloperRecord>>,
    applied: Mutex<Vec<(Uuid, FieldWrites)>>,
    failing_writes: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, record: DeveloperRecord) -> Self {
        self.records.lock().unwrap().insert(record.id, record);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    pub fn record(&self, id: Uuid) -> Option<DeveloperRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn applied(&self) -> Vec<(Uuid, FieldWrites)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn writes_for(&self, id: Uuid) -> Vec<FieldWrites> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter(|(applied_id, _)| *applied_id == id)
            .map(|(_, writes)| writes.clone())
            .collect()
    }
}

#[async_trait]
impl DeveloperStore for MockStore {
    async fn get(&self, id: Uuid) -> Result<Option<DeveloperRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn apply(&self, id: Uuid, writes: &FieldWrites) -> Result<()> {
        if self.failing_writes {
            bail!("MockStore: write rejected");
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| anyhow!("MockStore: no developer {id}"))?;
        apply_writes(record, writes);
        self.applied.lock().unwrap().push((id, writes.clone()));
        Ok(())
    }

    async fn set_task(&self, id: Uuid, task_id: Option<&str>) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| anyhow!("MockStore: no developer {id}"))?;
        record.enrichment_task_id = task_id.map(String::from);
        Ok(())
    }

    async fn with_outstanding_task(&self) -> Result<Vec<DeveloperRecord>> {
        let mut pending: Vec<DeveloperRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.enrichment_task_id.is_some())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pending)
    }

    async fn stale_ids(&self, limit: i64) -> Result<Vec<Uuid>> {
        let mut records: Vec<DeveloperRecord> = self.records.lock().unwrap().values().cloned().collect();
        // `None` sorts before `Some`, matching NULLS FIRST.
        records.sort_by_key(|r| r.last_enriched_at);
        Ok(records
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|r| r.id)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockCrm
// ---------------------------------------------------------------------------

/// Contact id → current list fields. `.missing_custom_fields()` makes any
/// update that carries custom fields fail with a schema mismatch.
#[derive(Default)]
pub struct MockCrm {
    contacts: Mutex<HashMap<String, CrmLists>>,
    missing_custom_fields: bool,
    updates: Mutex<Vec<(String, CrmUpdate)>>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(self, contact_id: &str, lists: CrmLists) -> Self {
        self.contacts.lock().unwrap().insert(contact_id.to_string(), lists);
        self
    }

    pub fn missing_custom_fields(mut self) -> Self {
        self.missing_custom_fields = true;
        self
    }

    /// Updates that were accepted, in order.
    pub fn updates(&self) -> Vec<(String, CrmUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn contact(&self, contact_id: &str) -> Option<CrmLists> {
        self.contacts.lock().unwrap().get(contact_id).cloned()
    }
}

#[async_trait]
impl CrmSink for MockCrm {
    async fn lists(&self, contact_id: &str) -> std::result::Result<CrmLists, CrmWriteError> {
        self.contacts
            .lock()
            .unwrap()
            .get(contact_id)
            .cloned()
            .ok_or_else(|| CrmWriteError::Rejected {
                status: 404,
                message: format!("no contact {contact_id}"),
            })
    }

    async fn update(&self, contact_id: &str, update: &CrmUpdate) -> std::result::Result<(), CrmWriteError> {
        if self.missing_custom_fields && !update.custom_fields.is_empty() {
            let labels: Vec<&str> = update.custom_fields.keys().map(String::as_str).collect();
            return Err(CrmWriteError::SchemaMismatch(format!("unknown custom fields: {}", labels.join(", "))));
        }
        let mut contacts = self.contacts.lock().unwrap();
        let lists = contacts.entry(contact_id.to_string()).or_default();
        if let Some(ref emails) = update.emails {
            lists.emails = emails.clone();
        }
        if let Some(ref urls) = update.urls {
            lists.urls = urls.clone();
        }
        self.updates
            .lock()
            .unwrap()
            .push((contact_id.to_string(), update.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedResolver
// ---------------------------------------------------------------------------

/// A resolver that always produces the same outcome, optionally after a
/// delay, and counts its invocations.
pub struct ScriptedResolver {
    source: DiscoverySource,
    outcome: Outcome,
    delay: Option<Duration>,
    timeout: Duration,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new(source: DiscoverySource, outcome: Outcome) -> Self {
        Self {
            source,
            outcome,
            delay: None,
            timeout: Duration::from_secs(30),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn found(source: DiscoverySource, github_username: &str) -> Self {
        Self::new(
            source,
            Outcome::Found {
                github_username: github_username.to_string(),
                extras: EnrichedProfile::default(),
            },
        )
    }

    pub fn miss(source: DiscoverySource) -> Self {
        Self::new(source, Outcome::miss())
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    fn source(&self) -> DiscoverySource {
        self.source
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, _identity: &Identity) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// Mocks bundle
// ---------------------------------------------------------------------------

/// Every mock, shared so tests can keep handles for assertions after the
/// deps are built. Replace individual fields with struct-update syntax.
pub struct Mocks {
    pub store: Arc<MockStore>,
    pub searcher: Arc<MockSearcher>,
    pub fetcher: Arc<MockPageFetcher>,
    pub github: Arc<MockGithubDirectory>,
    pub extractor: Arc<MockExtractor>,
    pub scraper: Arc<MockScraper>,
    pub deep: Arc<MockDeepEnricher>,
    pub crm: Arc<MockCrm>,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            store: Arc::new(MockStore::new()),
            searcher: Arc::new(MockSearcher::new()),
            fetcher: Arc::new(MockPageFetcher::new()),
            github: Arc::new(MockGithubDirectory::new()),
            extractor: Arc::new(MockExtractor::new()),
            scraper: Arc::new(MockScraper::new()),
            deep: Arc::new(MockDeepEnricher::new()),
            crm: Arc::new(MockCrm::new()),
        }
    }
}

impl Mocks {
    pub fn deps(&self) -> EnrichDeps {
        EnrichDeps::builder()
            .store(self.store.clone())
            .searcher(self.searcher.clone())
            .fetcher(self.fetcher.clone())
            .github(self.github.clone())
            .extractor(self.extractor.clone())
            .scraper(Some(self.scraper.clone() as Arc<dyn ProfileScraper>))
            .deep(Some(self.deep.clone() as Arc<dyn DeepEnricher>))
            .crm(Some(self.crm.clone() as Arc<dyn CrmSink>))
            .build()
    }

    /// External calls made by every provider mock combined.
    pub fn external_calls(&self) -> usize {
        self.searcher.calls()
            + self.fetcher.calls()
            + self.github.calls()
            + self.extractor.calls()
            + self.scraper.calls()
            + self.deep.submitted().len()
            + self.deep.polled().len()
    }
}
