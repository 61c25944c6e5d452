pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Options for an isolated remote browser session.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SessionOptions {
    /// How long the provider keeps the session alive if we never release it.
    #[builder(default = Duration::from_secs(180))]
    pub ttl: Duration,
    /// Randomized fingerprint and automation-flag masking.
    #[builder(default = true)]
    pub stealth: bool,
    /// Two-letter egress country for the residential proxy. `None` = datacenter egress.
    #[builder(default, setter(strip_option, into))]
    pub proxy_country: Option<String>,
}

/// A live remote browser session. Must be handed back to
/// [`BrowserlessClient::close_session`] once the caller is done with it.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSession {
    pub id: String,
    /// WebSocket endpoint for CDP clients.
    pub connect: String,
    /// URL that terminates the session.
    pub stop: String,
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    ttl: u64,
    stealth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<ProxyBody<'a>>,
}

#[derive(Serialize)]
struct ProxyBody<'a> {
    #[serde(rename = "type")]
    proxy_type: &'static str,
    country: &'a str,
}

#[derive(Serialize)]
struct FunctionBody<'a> {
    code: &'a str,
    context: &'a serde_json::Value,
}

#[derive(Clone)]
pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    /// Build a client whose per-request timeout differs from the default.
    /// Scripted sessions that scroll long pages need well over 30 seconds.
    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserlessError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    fn endpoint(&self, path: &str, extra: &[(&str, &str)]) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(ref token) = self.token {
            params.push(format!("token={token}"));
        }
        for (k, v) in extra {
            params.push(format!("{k}={v}"));
        }
        if params.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, params.join("&"))
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({ "url": url });

        let resp = self
            .client
            .post(self.endpoint("/content", &[]))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        Ok(Self::check(resp).await?.text().await?)
    }

    /// Reserve an isolated browser session.
    pub async fn create_session(&self, options: &SessionOptions) -> Result<BrowserSession> {
        let body = CreateSessionBody {
            ttl: options.ttl.as_millis() as u64,
            stealth: options.stealth,
            proxy: options.proxy_country.as_deref().map(|country| ProxyBody {
                proxy_type: "residential",
                country,
            }),
        };

        let resp = self
            .client
            .post(self.endpoint("/session", &[]))
            .json(&body)
            .send()
            .await?;

        let session: BrowserSession = Self::check(resp).await?.json().await?;
        tracing::debug!(session_id = %session.id, "Browserless session created");
        Ok(session)
    }

    /// Run a puppeteer function inside an existing session. The function
    /// receives `{ page, context }` and its return value is passed back as JSON.
    pub async fn run_function(
        &self,
        session: &BrowserSession,
        code: &str,
        context: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = FunctionBody { code, context };

        let resp = self
            .client
            .post(self.endpoint("/function", &[("sessionId", session.id.as_str())]))
            .json(&body)
            .send()
            .await?;

        Ok(Self::check(resp).await?.json().await?)
    }

    /// Terminate a session. Releasing an already-expired session is not an error.
    pub async fn close_session(&self, session: &BrowserSession) -> Result<()> {
        let mut stop_url = session.stop.clone();
        if let Some(ref token) = self.token {
            if !stop_url.contains("token=") {
                let sep = if stop_url.contains('?') { '&' } else { '?' };
                stop_url.push(sep);
                stop_url.push_str(&format!("token={token}"));
            }
        }

        let resp = self.client.delete(&stop_url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(session_id = %session.id, "Session already gone");
            return Ok(());
        }
        Self::check(resp).await?;
        tracing::debug!(session_id = %session.id, "Browserless session released");
        Ok(())
    }
}
