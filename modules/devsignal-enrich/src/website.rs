// Personal-website fetching and crawling for contact handles.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use tracing::{debug, warn};

use crate::links::{contact_page_links, extract_social_links, SocialLinks};
use crate::traits::PageFetcher;

/// Follow-up pages fetched when the homepage carries no GitHub link.
const MAX_CONTACT_PAGES: usize = 2;

/// Plain HTTP fetcher for static sites.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; devsignal/0.1)")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        Ok(resp.text().await?)
    }
}

/// Rendered-HTML fetcher for sites that build their links client-side.
pub struct BrowserlessPageFetcher {
    client: BrowserlessClient,
}

impl BrowserlessPageFetcher {
    pub fn new(client: BrowserlessClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for BrowserlessPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        Ok(self.client.content(url).await?)
    }
}

/// Add a scheme to bare domains like `octo.dev`.
pub fn normalize_site_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = url::Url::parse(&candidate).ok()?;
    parsed.host_str()?;
    Some(parsed.to_string())
}

/// Crawl a personal site: the homepage first, then up to two same-site
/// about/contact pages if no GitHub link turned up.
pub async fn crawl_for_links(fetcher: &dyn PageFetcher, site_url: &str) -> Result<SocialLinks> {
    let url = normalize_site_url(site_url).with_context(|| format!("Not a website URL: {site_url}"))?;
    let html = fetcher.fetch_html(&url).await?;
    let mut found = extract_social_links(&html, &url);
    debug!(url = url.as_str(), ?found, "Crawled homepage");

    if found.github_username.is_some() {
        return Ok(found);
    }

    for page in contact_page_links(&html, &url).into_iter().take(MAX_CONTACT_PAGES) {
        match fetcher.fetch_html(&page).await {
            Ok(html) => {
                found.absorb(extract_social_links(&html, &page));
                if found.github_username.is_some() {
                    break;
                }
            }
            Err(e) => warn!(url = page.as_str(), error = %e, "Contact page fetch failed"),
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domains_get_a_scheme() {
        assert_eq!(normalize_site_url("octo.dev").as_deref(), Some("https://octo.dev/"));
        assert_eq!(
            normalize_site_url("http://octo.dev/blog").as_deref(),
            Some("http://octo.dev/blog")
        );
        assert_eq!(normalize_site_url("   "), None);
    }
}
