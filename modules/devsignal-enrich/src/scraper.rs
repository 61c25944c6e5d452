// Authenticated profile-page scraping through an isolated remote browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserSession, BrowserlessClient, SessionOptions};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::traits::{BrowserSessions, ProfileScraper, ScrapedProfile};

/// Pages shorter than this are treated as blocked or empty.
pub const MIN_CONTENT_CHARS: usize = 100;
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(120);

const AUTH_REMEDIATION: &str =
    "refresh LINKEDIN_SESSION_COOKIE with a fresh li_at value from a logged-in browser";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeError {
    #[error("Authentication failed, redirected to {url}")]
    Authentication { url: String },

    #[error("Page content too short ({chars} chars)")]
    EmptyContent { chars: usize },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Scrape timed out after {0}s")]
    Timeout(u64),
}

impl From<browserless_client::BrowserlessError> for ScrapeError {
    fn from(err: browserless_client::BrowserlessError) -> Self {
        ScrapeError::Browser(err.to_string())
    }
}

/// Runs inside the remote browser with `{ page, context }`.
const SCRAPE_FUNCTION: &str = r#"
export default async function ({ page, context }) {
  await page.setCookie({
    name: "li_at",
    value: context.cookie,
    domain: ".linkedin.com",
    path: "/",
    httpOnly: true,
    secure: true,
  });
  await page.goto(context.url, { waitUntil: "domcontentloaded", timeout: 60000 });
  await new Promise((r) => setTimeout(r, 3000));
  for (let i = 0; i < 6; i++) {
    await page.evaluate(() => window.scrollBy(0, window.innerHeight));
    await new Promise((r) => setTimeout(r, 1200));
  }
  const text = await page.evaluate(() => {
    document
      .querySelectorAll("nav, header, footer, aside, script, style, noscript")
      .forEach((el) => el.remove());
    return document.body ? document.body.innerText : "";
  });
  return { data: { url: page.url(), text }, type: "application/json" };
}
"#;

#[derive(Debug, Deserialize)]
struct FunctionOutput {
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: String,
}

/// Some deployments wrap the function's return value in `data`.
fn parse_output(value: serde_json::Value) -> Result<FunctionOutput, ScrapeError> {
    let inner = match value.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => value,
    };
    serde_json::from_value(inner).map_err(|e| ScrapeError::Browser(format!("Unexpected function output: {e}")))
}

/// Redirect targets that mean the session credential was not accepted.
pub fn is_auth_wall(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["/login", "/authwall", "/checkpoint", "/uas/login", "/signup"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Classify a finished scrape.
pub fn check_scrape(url: String, text: String) -> Result<ScrapedProfile, ScrapeError> {
    if is_auth_wall(&url) {
        return Err(ScrapeError::Authentication { url });
    }
    let text = text.trim().to_string();
    let chars = text.chars().count();
    if chars < MIN_CONTENT_CHARS {
        return Err(ScrapeError::EmptyContent { chars });
    }
    Ok(ScrapedProfile {
        text,
        url,
        scraped_at: Utc::now(),
    })
}

#[async_trait]
impl BrowserSessions for BrowserlessClient {
    async fn create_session(&self, options: &SessionOptions) -> browserless_client::Result<BrowserSession> {
        BrowserlessClient::create_session(self, options).await
    }

    async fn run_function(
        &self,
        session: &BrowserSession,
        code: &str,
        context: &serde_json::Value,
    ) -> browserless_client::Result<serde_json::Value> {
        BrowserlessClient::run_function(self, session, code, context).await
    }

    async fn close_session(&self, session: &BrowserSession) -> browserless_client::Result<()> {
        BrowserlessClient::close_session(self, session).await
    }
}

pub struct BrowserlessProfileScraper {
    sessions: Arc<dyn BrowserSessions>,
    session_cookie: String,
    proxy_country: String,
    timeout: Duration,
}

impl BrowserlessProfileScraper {
    pub fn new(client: BrowserlessClient, session_cookie: String, proxy_country: String) -> Self {
        Self::with_sessions(Arc::new(client), session_cookie, proxy_country)
    }

    pub fn with_sessions(sessions: Arc<dyn BrowserSessions>, session_cookie: String, proxy_country: String) -> Self {
        Self {
            sessions,
            session_cookie,
            proxy_country,
            timeout: DEFAULT_SCRAPE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, session: &BrowserSession, profile_url: &str) -> Result<FunctionOutput, ScrapeError> {
        let context = serde_json::json!({
            "url": profile_url,
            "cookie": self.session_cookie,
        });
        let value = self.sessions.run_function(session, SCRAPE_FUNCTION, &context).await?;
        parse_output(value)
    }
}

#[async_trait]
impl ProfileScraper for BrowserlessProfileScraper {
    async fn scrape(&self, profile_url: &str) -> Result<ScrapedProfile, ScrapeError> {
        let options = SessionOptions::builder()
            .proxy_country(self.proxy_country.clone())
            .build();
        let session = self.sessions.create_session(&options).await?;

        let outcome = tokio::time::timeout(self.timeout, self.run(&session, profile_url)).await;

        // The session is released on every path, including timeouts and errors.
        if let Err(e) = self.sessions.close_session(&session).await {
            warn!(session_id = session.id.as_str(), error = %e, "Failed to release browser session");
        }

        let output = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(ScrapeError::Timeout(self.timeout.as_secs())),
        };

        let result = check_scrape(output.url, output.text);
        match &result {
            Ok(page) => debug!(url = page.url.as_str(), chars = page.text.len(), "Profile scraped"),
            Err(ScrapeError::Authentication { url }) => {
                error!(url = url.as_str(), remediation = AUTH_REMEDIATION, "Profile scrape hit an auth wall")
            }
            Err(e) => warn!(url = profile_url, error = %e, "Profile scrape returned no usable content"),
        }
        result
    }
}

/// Serializes scrapes through a single session credential, spacing calls
/// at least `delay` apart.
pub struct ThrottledScraper {
    inner: Arc<dyn ProfileScraper>,
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl ThrottledScraper {
    pub fn new(inner: Arc<dyn ProfileScraper>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            last_call: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ProfileScraper for ThrottledScraper {
    async fn scrape(&self, profile_url: &str) -> Result<ScrapedProfile, ScrapeError> {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                info!(wait_ms = wait.as_millis() as u64, "Waiting before next profile scrape");
                tokio::time::sleep(wait).await;
            }
        }
        let result = self.inner.scrape(profile_url).await;
        *last_call = Some(Instant::now());
        result
    }
}
