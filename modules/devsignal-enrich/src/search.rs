// Web search (Serper / Google Search) and the GitHub-profile query strategies
// that run on top of it.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use devsignal_common::{linkedin_slug, non_blank, Identity};

use crate::traits::{SearchHit, WebSearcher};

const SERPER_URL: &str = "https://google.serper.dev/search";
const GITHUB_RESULTS_PER_QUERY: usize = 5;
const IDENTITY_RESULTS_PER_QUERY: usize = 8;

/// GitHub top-level routes that look like accounts but are not.
pub const RESERVED_GITHUB_PATHS: &[&str] = &[
    "about", "features", "pricing", "login", "logout", "signup", "join", "explore",
    "marketplace", "topics", "trending", "collections", "sponsors", "settings", "orgs",
    "organizations", "enterprise", "team", "customer-stories", "security", "site", "readme",
    "events", "search", "notifications", "issues", "pulls", "new", "contact", "apps",
    "codespaces", "copilot", "home", "dashboard", "blog", "solutions", "resources", "partners",
    "premium-support", "nonprofit", "education", "mobile", "git-guides", "github-copilot",
    "stars", "watching", "users",
];

static GITHUB_LOGIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9]|-[A-Za-z0-9]){0,38}$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Serper
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.to_string(),
            client,
            base_url: SERPER_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        debug!(query, max_results, "search: querying serper");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post(&self.base_url)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            anyhow::bail!("Serper returned {status}: {message}");
        }

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let hits: Vec<SearchHit> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(max_results)
            .map(|r| SearchHit {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            })
            .collect();

        debug!(query, count = hits.len(), "search: complete");
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// GitHub profile search
// ---------------------------------------------------------------------------

/// Account owner of a `github.com/<owner>[/<repo>...]` URL, unless the
/// first segment is a reserved GitHub route or not a valid login.
pub fn github_owner(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host != "github.com" && host != "www.github.com" {
        return None;
    }
    let owner = parsed.path_segments()?.next()?.trim();
    if owner.is_empty() || RESERVED_GITHUB_PATHS.contains(&owner.to_ascii_lowercase().as_str()) {
        return None;
    }
    GITHUB_LOGIN_RE.is_match(owner).then(|| owner.to_string())
}

/// Query strategies in the order they are tried.
pub fn github_queries(name: &str, company: Option<&str>, linkedin_url: Option<&str>) -> Vec<String> {
    let name = name.trim();
    let company = non_blank(company);
    let slug = linkedin_url.and_then(linkedin_slug);

    let mut queries = Vec::with_capacity(4);
    if let Some(company) = company {
        queries.push(format!("site:github.com \"{name}\" \"{company}\""));
    }
    queries.push(format!("site:github.com \"{name}\""));
    if let Some(slug) = slug {
        queries.push(format!("site:github.com \"{slug}\""));
    }
    if let Some(company) = company {
        queries.push(format!("site:github.com {name} {company}"));
    }
    queries
}

/// Try each query strategy in order and return the first accepted username.
/// A provider failure ends the search with no result.
pub async fn search_github_profile(
    searcher: &dyn WebSearcher,
    name: &str,
    company: Option<&str>,
    linkedin_url: Option<&str>,
) -> Option<String> {
    for query in github_queries(name, company, linkedin_url) {
        let hits = match searcher.search(&query, GITHUB_RESULTS_PER_QUERY).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query = query.as_str(), error = %e, "GitHub profile search failed");
                return None;
            }
        };

        if let Some(owner) = hits.iter().find_map(|hit| github_owner(&hit.url)) {
            info!(query = query.as_str(), owner = owner.as_str(), "GitHub profile found via search");
            return Some(owner);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Identity search
// ---------------------------------------------------------------------------

fn identity_queries(identity: &Identity) -> Vec<String> {
    let name = identity.name.trim();
    let mut queries = Vec::new();
    match non_blank(identity.company.as_deref()) {
        Some(company) => queries.push(format!("\"{name}\" \"{company}\"")),
        None => queries.push(format!("\"{name}\"")),
    }
    if let Some(title) = non_blank(identity.job_title.as_deref()) {
        queries.push(format!("\"{name}\" {title}"));
    }
    queries.push(format!("\"{name}\" developer github OR linkedin"));
    queries
}

/// Ranked text blob about a person, assembled from several queries.
/// Results are deduplicated by URL and numbered in rank order.
pub async fn search_identity(searcher: &dyn WebSearcher, identity: &Identity) -> Result<String> {
    let mut seen = std::collections::HashSet::new();
    let mut sections = Vec::new();
    let mut last_error = None;

    for query in identity_queries(identity) {
        match searcher.search(&query, IDENTITY_RESULTS_PER_QUERY).await {
            Ok(hits) => {
                for hit in hits {
                    if seen.insert(hit.url.clone()) {
                        sections.push(format!(
                            "[{}] {}\n{}\n{}",
                            sections.len() + 1,
                            hit.title,
                            hit.url,
                            hit.snippet
                        ));
                    }
                }
            }
            Err(e) => {
                warn!(query = query.as_str(), error = %e, "Identity search query failed");
                last_error = Some(e);
            }
        }
    }

    // Every query failing is a provider failure, not an empty result.
    if sections.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }
    Ok(sections.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_accepted_from_profile_url() {
        assert_eq!(github_owner("https://github.com/octocat").as_deref(), Some("octocat"));
    }

    #[test]
    fn owner_extracted_from_repo_url() {
        assert_eq!(
            github_owner("https://github.com/octocat/Hello-World").as_deref(),
            Some("octocat")
        );
    }

    #[test]
    fn reserved_routes_are_rejected() {
        assert_eq!(github_owner("https://github.com/about"), None);
        assert_eq!(github_owner("https://github.com/Features/actions"), None);
        assert_eq!(github_owner("https://github.com/topics/rust"), None);
        assert_eq!(github_owner("https://github.com/"), None);
    }

    #[test]
    fn non_github_hosts_are_rejected() {
        assert_eq!(github_owner("https://gist.github.com/octocat"), None);
        assert_eq!(github_owner("https://gitlab.com/octocat"), None);
    }

    #[test]
    fn invalid_logins_are_rejected() {
        assert_eq!(github_owner("https://github.com/-octo"), None);
        assert_eq!(github_owner("https://github.com/octo_cat"), None);
    }

    #[test]
    fn queries_follow_strategy_order() {
        let queries = github_queries(
            "Ada Lovelace",
            Some("Analytical"),
            Some("https://www.linkedin.com/in/ada-l/"),
        );
        assert_eq!(
            queries,
            vec![
                "site:github.com \"Ada Lovelace\" \"Analytical\"",
                "site:github.com \"Ada Lovelace\"",
                "site:github.com \"ada-l\"",
                "site:github.com Ada Lovelace Analytical",
            ]
        );
    }

    #[test]
    fn queries_without_company_or_linkedin() {
        assert_eq!(
            github_queries("Ada", Some("  "), None),
            vec!["site:github.com \"Ada\""]
        );
    }
}
