use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::search::github_owner;

/// Matches `href` attributes. Covers `<a href>`, `<link href>`, `<area href>`.
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid regex")
});

static TWITTER_HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("valid regex"));

/// First path segments on x.com / twitter.com that are not accounts.
const RESERVED_TWITTER_PATHS: &[&str] = &[
    "home", "intent", "share", "search", "hashtag", "i", "explore", "settings", "login",
    "signup", "tos", "privacy", "messages", "notifications",
];

/// Resolve a raw href against a base URL, returning an absolute URL with fragment stripped.
fn resolve_href(raw: &str, base: Option<&url::Url>) -> Option<String> {
    let mut parsed = if raw.starts_with("http://") || raw.starts_with("https://") {
        url::Url::parse(raw).ok()?
    } else {
        base?.join(raw).ok()?
    };
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// All `href` targets in a document, resolved and deduplicated, in document order.
pub fn extract_all_links(html: &str, base_url: &str) -> Vec<String> {
    let base = url::Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in HREF_RE.captures_iter(html) {
        if let Some(resolved) = resolve_href(&cap[1], base.as_ref()) {
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }

    links
}

/// Contact handles found on a personal page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    pub github_username: Option<String>,
    pub twitter_username: Option<String>,
    pub linkedin_url: Option<String>,
    pub personal_email: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Keep existing values, take the other side's where ours are missing.
    pub fn absorb(&mut self, other: SocialLinks) {
        self.github_username = self.github_username.take().or(other.github_username);
        self.twitter_username = self.twitter_username.take().or(other.twitter_username);
        self.linkedin_url = self.linkedin_url.take().or(other.linkedin_url);
        self.personal_email = self.personal_email.take().or(other.personal_email);
    }
}

/// Pull the first GitHub account, X/Twitter account, LinkedIn profile and
/// `mailto:` address out of a page's links.
pub fn extract_social_links(html: &str, base_url: &str) -> SocialLinks {
    let mut found = SocialLinks::default();

    for cap in HREF_RE.captures_iter(html) {
        let raw = cap[1].trim();
        if let Some(addr) = raw.strip_prefix("mailto:") {
            let addr = addr.split('?').next().unwrap_or_default().trim();
            if found.personal_email.is_none() && EMAIL_RE.is_match(addr) {
                found.personal_email = Some(addr.to_ascii_lowercase());
            }
        }
    }

    for link in extract_all_links(html, base_url) {
        if found.github_username.is_none() {
            found.github_username = github_owner(&link);
        }
        if found.twitter_username.is_none() {
            found.twitter_username = twitter_handle(&link);
        }
        if found.linkedin_url.is_none() && is_linkedin_profile(&link) {
            found.linkedin_url = Some(link.trim_end_matches('/').to_string());
        }
    }

    found
}

/// Same-site links that commonly list contact details.
pub fn contact_page_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };
    extract_all_links(html, base_url)
        .into_iter()
        .filter(|link| {
            let Ok(parsed) = url::Url::parse(link) else {
                return false;
            };
            let path = parsed.path().to_ascii_lowercase();
            parsed.host_str() == base.host_str()
                && (path.contains("about") || path.contains("contact"))
        })
        .collect()
}

/// Account handle from an x.com / twitter.com profile URL.
pub fn twitter_handle(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("mobile.");
    if host != "twitter.com" && host != "x.com" {
        return None;
    }
    let handle = parsed.path_segments()?.next()?.trim_start_matches('@');
    if RESERVED_TWITTER_PATHS.contains(&handle.to_ascii_lowercase().as_str()) {
        return None;
    }
    TWITTER_HANDLE_RE
        .is_match(handle)
        .then(|| handle.to_string())
}

fn is_linkedin_profile(link: &str) -> bool {
    url::Url::parse(link)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(host.ends_with("linkedin.com") && u.path().starts_with("/in/") && u.path().len() > 4)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_links_are_resolved_and_deduplicated() {
        let html = r#"
            <a href="/about">About</a>
            <a href="https://example.com/about#team">About again</a>
            <img src="https://cdn.example.com/me.png">
        "#;
        let links = extract_all_links(html, "https://example.com");
        assert_eq!(links, vec!["https://example.com/about"]);
    }

    #[test]
    fn social_links_are_picked_from_a_personal_page() {
        let html = r#"
            <a href="https://github.com/about">GitHub About</a>
            <a href="https://github.com/octocat/Hello-World">Repo</a>
            <a href='https://x.com/intent/follow'>Follow</a>
            <a href="https://twitter.com/@octo_cat">Twitter</a>
            <a href="https://www.linkedin.com/in/octocat/">LinkedIn</a>
            <a href="mailto:Octo@Example.dev?subject=hi">Mail</a>
        "#;
        let links = extract_social_links(html, "https://octo.dev");
        assert_eq!(links.github_username.as_deref(), Some("octocat"));
        assert_eq!(links.twitter_username.as_deref(), Some("octo_cat"));
        assert_eq!(links.linkedin_url.as_deref(), Some("https://www.linkedin.com/in/octocat"));
        assert_eq!(links.personal_email.as_deref(), Some("octo@example.dev"));
    }

    #[test]
    fn company_pages_are_not_profiles() {
        let html = r#"<a href="https://www.linkedin.com/company/acme">Acme</a>"#;
        assert!(extract_social_links(html, "https://octo.dev").is_empty());
    }

    #[test]
    fn contact_pages_stay_on_site() {
        let html = r#"
            <a href="/about-me">About</a>
            <a href="https://other.dev/contact">Elsewhere</a>
            <a href="/blog">Blog</a>
        "#;
        assert_eq!(
            contact_page_links(html, "https://octo.dev"),
            vec!["https://octo.dev/about-me"]
        );
    }

    #[test]
    fn absorb_keeps_existing_values() {
        let mut links = SocialLinks {
            github_username: Some("first".into()),
            ..Default::default()
        };
        links.absorb(SocialLinks {
            github_username: Some("second".into()),
            twitter_username: Some("tw".into()),
            ..Default::default()
        });
        assert_eq!(links.github_username.as_deref(), Some("first"));
        assert_eq!(links.twitter_username.as_deref(), Some("tw"));
    }
}
