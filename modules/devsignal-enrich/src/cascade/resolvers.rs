use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use devsignal_common::{non_blank, DiscoverySource, EnrichedProfile, Identity};

use super::{Outcome, Resolver};
use crate::github;
use crate::links::SocialLinks;
use crate::search::search_github_profile;
use crate::traits::{GithubDirectory, PageFetcher, WebSearcher};
use crate::website::{crawl_for_links, normalize_site_url};

pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const WEBSITE_TIMEOUT: Duration = Duration::from_secs(45);

/// Hosts that are never someone's personal website.
const NOT_PERSONAL_SITES: &[&str] = &[
    "linkedin.com", "github.com", "twitter.com", "x.com", "facebook.com", "instagram.com",
    "youtube.com", "medium.com", "crunchbase.com", "zoominfo.com", "rocketreach.co",
    "apollo.io", "wikipedia.org", "stackoverflow.com", "reddit.com", "glassdoor.com",
    "indeed.com", "angel.co", "wellfound.com", "theorg.com", "signalhire.com", "contactout.com",
];

fn links_profile(links: SocialLinks, website: Option<String>) -> EnrichedProfile {
    EnrichedProfile {
        twitter_username: links.twitter_username,
        linkedin_url: links.linkedin_url,
        personal_email: links.personal_email,
        website_url: website,
        ..Default::default()
    }
}

fn crawl_outcome(links: SocialLinks, website: Option<String>) -> Outcome {
    let github = links.github_username.clone();
    let extras = links_profile(links, website);
    match github {
        Some(github_username) => Outcome::Found {
            github_username,
            extras,
        },
        None => Outcome::Miss { extras },
    }
}

// ---------------------------------------------------------------------------
// Stage 2: structured directory lookup
// ---------------------------------------------------------------------------

pub struct GithubApiResolver {
    directory: Arc<dyn GithubDirectory>,
    timeout: Duration,
}

impl GithubApiResolver {
    pub fn new(directory: Arc<dyn GithubDirectory>) -> Self {
        Self {
            directory,
            timeout: LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Resolver for GithubApiResolver {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::GithubApi
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, identity: &Identity) -> Outcome {
        match github::lookup(self.directory.as_ref(), identity).await {
            Ok(Some(user)) => {
                let personal_email = non_blank(user.email.as_deref())
                    .filter(|e| {
                        identity
                            .email
                            .as_deref()
                            .map_or(true, |known| !known.eq_ignore_ascii_case(e))
                    })
                    .map(String::from);
                Outcome::Found {
                    github_username: user.login,
                    extras: EnrichedProfile {
                        twitter_username: user.twitter_username,
                        website_url: user.blog.as_deref().and_then(normalize_site_url),
                        personal_email,
                        ..Default::default()
                    },
                }
            }
            Ok(None) => Outcome::miss(),
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 3: web search
// ---------------------------------------------------------------------------

pub struct WebSearchResolver {
    searcher: Arc<dyn WebSearcher>,
    timeout: Duration,
}

impl WebSearchResolver {
    pub fn new(searcher: Arc<dyn WebSearcher>) -> Self {
        Self {
            searcher,
            timeout: SEARCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Resolver for WebSearchResolver {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Serper
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, identity: &Identity) -> Outcome {
        match search_github_profile(
            self.searcher.as_ref(),
            &identity.name,
            identity.company.as_deref(),
            identity.linkedin_url.as_deref(),
        )
        .await
        {
            Some(github_username) => Outcome::Found {
                github_username,
                extras: EnrichedProfile::default(),
            },
            None => Outcome::miss(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 4: crawl the known personal website
// ---------------------------------------------------------------------------

pub struct WebsiteCrawlResolver {
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl WebsiteCrawlResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            timeout: WEBSITE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Resolver for WebsiteCrawlResolver {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::WebsiteCrawl
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, identity: &Identity) -> Outcome {
        let Some(site) = non_blank(identity.website_url.as_deref()) else {
            return Outcome::miss();
        };
        match crawl_for_links(self.fetcher.as_ref(), site).await {
            Ok(links) => crawl_outcome(links, None),
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 5: search for a personal website, then crawl it
// ---------------------------------------------------------------------------

pub struct WebsiteSearchResolver {
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl WebsiteSearchResolver {
    pub fn new(searcher: Arc<dyn WebSearcher>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            searcher,
            fetcher,
            timeout: WEBSITE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A search hit that plausibly is the person's own site.
pub fn personal_site_candidate(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").to_ascii_lowercase();
    let excluded = NOT_PERSONAL_SITES
        .iter()
        .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")));
    if excluded {
        return None;
    }
    Some(format!("{}://{}/", parsed.scheme(), parsed.host_str()?))
}

#[async_trait]
impl Resolver for WebsiteSearchResolver {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::WebsiteGoogle
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, identity: &Identity) -> Outcome {
        let name = identity.name.trim();
        let query = match non_blank(identity.company.as_deref()) {
            Some(company) => format!("\"{name}\" {company} personal website OR blog OR portfolio"),
            None => format!("\"{name}\" developer personal website OR blog OR portfolio"),
        };

        let hits = match self.searcher.search(&query, 10).await {
            Ok(hits) => hits,
            Err(e) => return Outcome::Error(e.to_string()),
        };

        let known = identity.website_url.as_deref().and_then(normalize_site_url);
        let Some(site) = hits
            .iter()
            .filter_map(|h| personal_site_candidate(&h.url))
            .find(|candidate| Some(candidate) != known.as_ref())
        else {
            return Outcome::miss();
        };

        debug!(identity_id = identity.external_id.as_str(), site = site.as_str(), "Crawling candidate website");
        match crawl_for_links(self.fetcher.as_ref(), &site).await {
            Ok(links) if links.github_username.is_some() => crawl_outcome(links, Some(site)),
            // Without a GitHub link the site is not confirmed as theirs.
            Ok(_) => Outcome::miss(),
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_and_directory_hosts_are_not_personal_sites() {
        assert_eq!(personal_site_candidate("https://www.linkedin.com/in/ada"), None);
        assert_eq!(personal_site_candidate("https://ada.medium.com/post"), None);
        assert_eq!(
            personal_site_candidate("https://ada.dev/posts/hello").as_deref(),
            Some("https://ada.dev/")
        );
    }
}
