use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::Column;

// =============================================================================
// Identity
// =============================================================================

/// Minimal description of one person to enrich. Owned by the caller and
/// never mutated during an enrichment attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Reference into the originating system.
    pub external_id: String,
    pub name: String,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    /// Personal website already on file, if any.
    pub website_url: Option<String>,
}

impl Identity {
    pub fn linkedin_slug(&self) -> Option<String> {
        self.linkedin_url.as_deref().and_then(linkedin_slug)
    }
}

/// Extract the `/in/<slug>` segment of a LinkedIn profile URL.
pub fn linkedin_slug(url: &str) -> Option<String> {
    let idx = url.find("/in/")?;
    let rest = &url[idx + 4..];
    let slug = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

/// Trimmed, non-empty string or nothing.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// EnrichedProfile
// =============================================================================

/// Sparse provider output. Every field is independently absent; absence
/// never means "false" or "not applicable", only "not found". Enum-like
/// fields are carried as raw strings here and validated during
/// reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedProfile {
    pub job_title: Option<String>,
    pub seniority: Option<String>,
    pub role_types: Vec<String>,
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub databases: Vec<String>,
    pub cloud_platforms: Vec<String>,
    pub devops_tools: Vec<String>,
    /// Free-text skills not yet bucketed into the taxonomy.
    pub skills: Vec<String>,
    pub years_experience: Option<f64>,
    pub city: Option<String>,
    pub state_region: Option<String>,
    pub country: Option<String>,
    /// Composite "city, state, country".
    pub location: Option<String>,
    pub github_username: Option<String>,
    pub twitter_username: Option<String>,
    pub website_url: Option<String>,
    pub personal_email: Option<String>,
    pub linkedin_url: Option<String>,
    pub buying_influence: Option<String>,
    pub company_size: Option<String>,
    pub open_source_activity: Option<String>,
}

impl EnrichedProfile {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// =============================================================================
// DeveloperRecord
// =============================================================================

/// Current state of a developer row in the internal store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeveloperRecord {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub seniority: Option<String>,
    pub role_types: Vec<String>,
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub databases: Vec<String>,
    pub cloud_platforms: Vec<String>,
    pub devops_tools: Vec<String>,
    pub years_experience: Option<f64>,
    pub city: Option<String>,
    pub state_region: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,
    pub github_username: Option<String>,
    pub twitter_username: Option<String>,
    pub website_url: Option<String>,
    pub personal_email: Option<String>,
    pub buying_influence: Option<String>,
    pub company_size: Option<String>,
    pub open_source_activity: Option<String>,
    /// Contact id in the CRM, when the developer is mirrored there.
    pub crm_contact_id: Option<String>,
    /// Outstanding deep-enrichment task.
    pub enrichment_task_id: Option<String>,
    pub last_enriched_at: Option<DateTime<Utc>>,
}

impl DeveloperRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            external_id: self.id.to_string(),
            name: self.name.clone(),
            email: self.email.clone(),
            linkedin_url: self.linkedin_url.clone(),
            job_title: self.job_title.clone(),
            company: self.company.clone(),
            website_url: self.website_url.clone(),
        }
    }

    /// Whether the destination currently holds no value for `column`.
    /// Whitespace-only strings and empty lists count as blank.
    pub fn is_blank(&self, column: Column) -> bool {
        let text = |v: &Option<String>| non_blank(v.as_deref()).is_none();
        let list = |v: &Vec<String>| v.iter().all(|s| s.trim().is_empty());
        match column {
            Column::JobTitle => text(&self.job_title),
            Column::Seniority => text(&self.seniority),
            Column::RoleTypes => list(&self.role_types),
            Column::Languages => list(&self.languages),
            Column::Frameworks => list(&self.frameworks),
            Column::Databases => list(&self.databases),
            Column::CloudPlatforms => list(&self.cloud_platforms),
            Column::DevopsTools => list(&self.devops_tools),
            Column::YearsExperience => self.years_experience.is_none(),
            Column::City => text(&self.city),
            Column::StateRegion => text(&self.state_region),
            Column::Country => text(&self.country),
            Column::Location => text(&self.location),
            Column::GithubUsername => text(&self.github_username),
            Column::TwitterUsername => text(&self.twitter_username),
            Column::WebsiteUrl => text(&self.website_url),
            Column::PersonalEmail => text(&self.personal_email),
            Column::LinkedinUrl => text(&self.linkedin_url),
            Column::BuyingInfluence => text(&self.buying_influence),
            Column::CompanySize => text(&self.company_size),
            Column::OpenSourceActivity => text(&self.open_source_activity),
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Which resolver produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    GithubApi,
    Serper,
    WebsiteCrawl,
    WebsiteGoogle,
    Sixtyfour,
    AgentqlLinkedin,
}

impl DiscoverySource {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscoverySource::GithubApi => "github_api",
            DiscoverySource::Serper => "serper",
            DiscoverySource::WebsiteCrawl => "website_crawl",
            DiscoverySource::WebsiteGoogle => "website_google",
            DiscoverySource::Sixtyfour => "sixtyfour",
            DiscoverySource::AgentqlLinkedin => "agentql_linkedin",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Found,
    NotFound,
    AlreadyHas,
    Pending,
    Failed,
    /// Re-enrichment wrote fresh fields.
    Enriched,
}

/// Per-identity outcome, one per requested id, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResult {
    pub identity_id: String,
    pub name: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DiscoverySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_found: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unclassified_skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl IdentityResult {
    pub fn new(identity_id: impl Into<String>, name: impl Into<String>, status: ResultStatus) -> Self {
        Self {
            identity_id: identity_id.into(),
            name: name.into(),
            status,
            source: None,
            github_url: None,
            error: None,
            task_id: None,
            fields_found: Vec::new(),
            unclassified_skills: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn failed(identity_id: impl Into<String>, name: impl Into<String>, error: impl fmt::Display) -> Self {
        let mut result = Self::new(identity_id, name, ResultStatus::Failed);
        result.error = Some(error.to_string());
        result
    }

    pub fn with_source(mut self, source: DiscoverySource) -> Self {
        self.source = Some(source);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<IdentityResult>,
}

// =============================================================================
// Deep-enrichment tasks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkedin_slug_is_extracted_from_profile_urls() {
        assert_eq!(
            linkedin_slug("https://www.linkedin.com/in/ada-lovelace-42/").as_deref(),
            Some("ada-lovelace-42")
        );
        assert_eq!(
            linkedin_slug("linkedin.com/in/octo?trk=public").as_deref(),
            Some("octo")
        );
        assert_eq!(linkedin_slug("https://www.linkedin.com/company/acme"), None);
        assert_eq!(linkedin_slug("https://www.linkedin.com/in/"), None);
    }

    #[test]
    fn blank_detection_treats_whitespace_and_empty_lists_as_blank() {
        let record = DeveloperRecord {
            job_title: Some("   ".into()),
            languages: vec!["".into()],
            frameworks: vec!["axum".into()],
            years_experience: Some(0.0),
            ..Default::default()
        };
        assert!(record.is_blank(Column::JobTitle));
        assert!(record.is_blank(Column::Languages));
        assert!(!record.is_blank(Column::Frameworks));
        assert!(!record.is_blank(Column::YearsExperience));
        assert!(record.is_blank(Column::City));
    }

    #[test]
    fn result_serializes_camel_case_and_skips_empty() {
        let result = IdentityResult::new("abc", "Ada", ResultStatus::NotFound);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["identityId"], "abc");
        assert_eq!(json["status"], "not_found");
        assert!(json.get("fieldsFound").is_none());
        assert!(json.get("source").is_none());
    }

    #[test]
    fn empty_profile_is_empty() {
        assert!(EnrichedProfile::default().is_empty());
        let p = EnrichedProfile {
            city: Some("Berlin".into()),
            ..Default::default()
        };
        assert!(!p.is_empty());
    }
}
