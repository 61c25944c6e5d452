// GitHub REST API as a free structured directory of developers.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use devsignal_common::{non_blank, Identity};

use crate::traits::{GithubDirectory, GithubUser};

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "devsignal-enrich";
const SEARCH_PAGE_SIZE: usize = 5;

#[derive(Debug, serde::Deserialize)]
struct UserSearchResponse {
    #[serde(default)]
    items: Vec<UserSearchItem>,
}

#[derive(Debug, serde::Deserialize)]
struct UserSearchItem {
    login: String,
}

pub struct GithubClient {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            token,
            base_url: GITHUB_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl GithubDirectory for GithubClient {
    async fn search_users(&self, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/search/users", self.base_url);
        let per_page = SEARCH_PAGE_SIZE.to_string();
        let resp = self
            .get(url)
            .query(&[("q", query), ("per_page", per_page.as_str())])
            .send()
            .await
            .context("GitHub user search request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub user search returned {status}: {message}");
        }

        let body: UserSearchResponse = resp
            .json()
            .await
            .context("Failed to parse GitHub user search response")?;
        debug!(query, count = body.items.len(), "GitHub user search complete");
        Ok(body.items.into_iter().map(|i| i.login).collect())
    }

    async fn user(&self, login: &str) -> Result<Option<GithubUser>> {
        let url = format!("{}/users/{}", self.base_url, login);
        let resp = self
            .get(url)
            .send()
            .await
            .context("GitHub user request failed")?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub user lookup returned {status}: {message}");
        }

        let user: GithubUser = resp
            .json()
            .await
            .context("Failed to parse GitHub user response")?;
        Ok(Some(user))
    }
}

// ---------------------------------------------------------------------------
// Lookup strategies
// ---------------------------------------------------------------------------

fn normalize_company(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

fn same_company(a: Option<&str>, b: Option<&str>) -> bool {
    match (non_blank(a), non_blank(b)) {
        (Some(a), Some(b)) => normalize_company(a) == normalize_company(b),
        _ => false,
    }
}

fn same_name(a: Option<&str>, b: &str) -> bool {
    non_blank(a).is_some_and(|a| a.eq_ignore_ascii_case(b.trim()))
}

/// Look an identity up by email, LinkedIn slug, then name. Each strategy
/// only accepts an unambiguous match.
pub async fn lookup(directory: &dyn GithubDirectory, identity: &Identity) -> Result<Option<GithubUser>> {
    if let Some(email) = non_blank(identity.email.as_deref()) {
        let logins = directory.search_users(&format!("{email} in:email")).await?;
        if let [login] = logins.as_slice() {
            if let Some(user) = directory.user(login).await? {
                debug!(login = login.as_str(), "GitHub match by email");
                return Ok(Some(user));
            }
        }
    }

    if let Some(slug) = identity.linkedin_slug() {
        let logins = directory.search_users(&format!("{slug} in:login")).await?;
        if let Some(login) = logins.iter().find(|l| l.eq_ignore_ascii_case(&slug)) {
            if let Some(user) = directory.user(login).await? {
                debug!(login = login.as_str(), "GitHub match by LinkedIn slug");
                return Ok(Some(user));
            }
        }
    }

    let name = identity.name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    let logins = directory.search_users(&format!("\"{name}\" in:name")).await?;
    let mut users = Vec::with_capacity(logins.len());
    for login in &logins {
        if let Some(user) = directory.user(login).await? {
            users.push(user);
        }
    }

    if let Some(user) = users
        .iter()
        .find(|u| same_company(u.company.as_deref(), identity.company.as_deref()))
    {
        debug!(login = user.login.as_str(), "GitHub match by name and company");
        return Ok(Some(user.clone()));
    }

    let exact: Vec<&GithubUser> = users
        .iter()
        .filter(|u| same_name(u.name.as_deref(), name))
        .collect();
    if let [user] = exact.as_slice() {
        if logins.len() == 1 {
            debug!(login = user.login.as_str(), "GitHub match by unique name");
            return Ok(Some((*user).clone()));
        }
    }

    Ok(None)
}
