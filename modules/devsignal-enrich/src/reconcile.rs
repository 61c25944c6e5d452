//! Field reconciliation: provider output → validated column writes.
//!
//! Two policies exist. `AlwaysOverwrite` backs the re-enrich flow and
//! replaces descriptive fields outright. `FillEmpty` backs augmentation
//! (discovery, profile scrapes, deep enrichment) and only ever fills blanks.
//! Contact handles are fill-if-empty under both, and every enum-constrained
//! field must pass its allow-list under both.

use devsignal_common::{
    BuyingInfluence, Column, CompanySize, DeveloperRecord, EnrichedProfile, FieldValue, FieldWrites,
    OpenSourceActivity, Seniority,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    AlwaysOverwrite,
    FillEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Enum value outside the allow-list.
    NotAllowed(String),
    /// Destination already holds a value and the policy keeps it.
    DestinationSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub column: Column,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub writes: FieldWrites,
    pub skipped: Vec<SkippedField>,
    /// Skills that fit no taxonomy bucket. Not written, only reported.
    pub unclassified_skills: Vec<String>,
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

const LANGUAGES: &[&str] = &[
    "rust", "go", "golang", "python", "javascript", "typescript", "java", "kotlin", "scala",
    "c", "c++", "c#", "f#", "ruby", "php", "swift", "objective-c", "elixir", "erlang",
    "haskell", "ocaml", "clojure", "dart", "lua", "perl", "r", "julia", "zig", "nim",
    "crystal", "sql", "bash", "shell", "solidity", "groovy", "fortran", "cobol", "matlab",
];

const FRAMEWORKS: &[&str] = &[
    "react", "next.js", "nextjs", "vue", "vue.js", "nuxt", "angular", "svelte", "sveltekit",
    "solid", "remix", "astro", "ember", "jquery", "express", "nestjs", "fastify", "django",
    "flask", "fastapi", "rails", "ruby on rails", "laravel", "symfony", "spring",
    "spring boot", ".net", "asp.net", "phoenix", "actix", "axum", "rocket", "tokio", "gin",
    "echo", "fiber", "flutter", "react native", "electron", "tauri", "pytorch", "tensorflow",
    "keras", "scikit-learn", "pandas", "numpy", "htmx", "tailwind", "graphql",
];

const DATABASES: &[&str] = &[
    "postgres", "postgresql", "mysql", "mariadb", "sqlite", "mongodb", "redis", "cassandra",
    "dynamodb", "elasticsearch", "opensearch", "clickhouse", "snowflake", "bigquery",
    "redshift", "cockroachdb", "neo4j", "couchdb", "couchbase", "firestore", "supabase",
    "oracle", "sql server", "mssql", "timescaledb", "influxdb", "duckdb", "planetscale",
];

const CLOUD_PLATFORMS: &[&str] = &[
    "aws", "amazon web services", "gcp", "google cloud", "google cloud platform", "azure",
    "microsoft azure", "digitalocean", "heroku", "vercel", "netlify", "cloudflare", "fly.io",
    "render", "linode", "oracle cloud", "ibm cloud", "firebase",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillBucket {
    Language,
    Framework,
    Database,
    CloudPlatform,
}

pub fn classify_skill(skill: &str) -> Option<SkillBucket> {
    let s = skill.trim().to_lowercase();
    let s = s.as_str();
    if LANGUAGES.contains(&s) {
        Some(SkillBucket::Language)
    } else if FRAMEWORKS.contains(&s) {
        Some(SkillBucket::Framework)
    } else if DATABASES.contains(&s) {
        Some(SkillBucket::Database)
    } else if CLOUD_PLATFORMS.contains(&s) {
        Some(SkillBucket::CloudPlatform)
    } else {
        None
    }
}

/// Split comma-separated entries, trim, lowercase, drop empties and duplicates.
pub fn split_taxonomy<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        for part in value.as_ref().split(',') {
            let part = part.trim().to_lowercase();
            if !part.is_empty() && !out.contains(&part) {
                out.push(part);
            }
        }
    }
    out
}

fn push_unique(target: &mut Vec<String>, value: String) {
    if !target.contains(&value) {
        target.push(value);
    }
}

// ---------------------------------------------------------------------------
// Handle cleanup
// ---------------------------------------------------------------------------

fn clean_handle(raw: &str) -> Option<String> {
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    let handle = raw.trim().trim_start_matches('@').trim_end_matches('/');
    let handle = handle.rsplit('/').next().unwrap_or(handle);
    (!handle.is_empty() && !handle.contains(char::is_whitespace)).then(|| handle.to_string())
}

fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

struct Merger<'a> {
    existing: &'a DeveloperRecord,
    policy: MergePolicy,
    out: Reconciled,
}

impl Merger<'_> {
    fn offer(&mut self, column: Column, value: Option<FieldValue>) {
        let Some(value) = value else {
            return;
        };
        let fill_only = column.is_contact_handle() || self.policy == MergePolicy::FillEmpty;
        if fill_only && !self.existing.is_blank(column) {
            self.out.skipped.push(SkippedField {
                column,
                reason: SkipReason::DestinationSet,
            });
            return;
        }
        self.out.writes.set(column, value);
    }

    fn offer_text(&mut self, column: Column, value: Option<String>) {
        self.offer(column, value.map(FieldValue::Text));
    }

    fn offer_list(&mut self, column: Column, values: Vec<String>) {
        self.offer(column, (!values.is_empty()).then_some(FieldValue::List(values)));
    }

    fn offer_enum(&mut self, column: Column, raw: Option<&str>, parse: impl Fn(&str) -> Option<&'static str>) {
        let Some(raw) = clean_text(raw) else {
            return;
        };
        match parse(&raw) {
            Some(valid) => self.offer_text(column, Some(valid.to_string())),
            None => {
                debug!(column = %column, value = raw.as_str(), "Dropping value outside allow-list");
                self.out.skipped.push(SkippedField {
                    column,
                    reason: SkipReason::NotAllowed(raw),
                });
            }
        }
    }
}

/// Decide which of a profile's values may be written over `existing`.
pub fn reconcile(profile: &EnrichedProfile, existing: &DeveloperRecord, policy: MergePolicy) -> Reconciled {
    let mut languages = split_taxonomy(&profile.languages);
    let mut frameworks = split_taxonomy(&profile.frameworks);
    let mut databases = split_taxonomy(&profile.databases);
    let mut cloud_platforms = split_taxonomy(&profile.cloud_platforms);
    let mut unclassified = Vec::new();

    for skill in split_taxonomy(&profile.skills) {
        match classify_skill(&skill) {
            Some(SkillBucket::Language) => push_unique(&mut languages, skill),
            Some(SkillBucket::Framework) => push_unique(&mut frameworks, skill),
            Some(SkillBucket::Database) => push_unique(&mut databases, skill),
            Some(SkillBucket::CloudPlatform) => push_unique(&mut cloud_platforms, skill),
            None => unclassified.push(skill),
        }
    }

    let mut m = Merger {
        existing,
        policy,
        out: Reconciled::default(),
    };

    m.offer_text(Column::JobTitle, clean_text(profile.job_title.as_deref()));
    m.offer_enum(Column::Seniority, profile.seniority.as_deref(), |v| {
        Seniority::parse(v).map(Seniority::as_str)
    });
    m.offer_list(Column::RoleTypes, split_taxonomy(&profile.role_types));
    m.offer_list(Column::Languages, languages);
    m.offer_list(Column::Frameworks, frameworks);
    m.offer_list(Column::Databases, databases);
    m.offer_list(Column::CloudPlatforms, cloud_platforms);
    m.offer_list(Column::DevopsTools, split_taxonomy(&profile.devops_tools));
    m.offer(
        Column::YearsExperience,
        profile
            .years_experience
            .filter(|y| y.is_finite() && (0.0..=70.0).contains(y))
            .map(FieldValue::Number),
    );
    m.offer_text(Column::City, clean_text(profile.city.as_deref()));
    m.offer_text(Column::StateRegion, clean_text(profile.state_region.as_deref()));
    m.offer_text(Column::Country, clean_text(profile.country.as_deref()));
    m.offer_text(Column::Location, clean_text(profile.location.as_deref()));
    m.offer_text(
        Column::GithubUsername,
        profile.github_username.as_deref().and_then(clean_handle),
    );
    m.offer_text(
        Column::TwitterUsername,
        profile.twitter_username.as_deref().and_then(clean_handle),
    );
    m.offer_text(Column::WebsiteUrl, clean_text(profile.website_url.as_deref()));
    m.offer_text(
        Column::PersonalEmail,
        clean_text(profile.personal_email.as_deref()).map(|e| e.to_lowercase()),
    );
    m.offer_text(Column::LinkedinUrl, clean_text(profile.linkedin_url.as_deref()));
    m.offer_enum(Column::BuyingInfluence, profile.buying_influence.as_deref(), |v| {
        BuyingInfluence::parse(v).map(BuyingInfluence::as_str)
    });
    m.offer_enum(Column::CompanySize, profile.company_size.as_deref(), |v| {
        CompanySize::parse(v).map(CompanySize::as_str)
    });
    m.offer_enum(Column::OpenSourceActivity, profile.open_source_activity.as_deref(), |v| {
        OpenSourceActivity::parse(v).map(OpenSourceActivity::as_str)
    });

    m.out.unclassified_skills = unclassified;
    m.out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engineer() -> DeveloperRecord {
        DeveloperRecord {
            name: "Ada".into(),
            job_title: Some("Engineer".into()),
            ..Default::default()
        }
    }

    fn staff_profile() -> EnrichedProfile {
        EnrichedProfile {
            job_title: Some("Staff Engineer".into()),
            ..Default::default()
        }
    }

    #[test]
    fn fill_empty_keeps_existing_job_title() {
        let r = reconcile(&staff_profile(), &engineer(), MergePolicy::FillEmpty);
        assert!(!r.writes.contains(Column::JobTitle));
        assert_eq!(
            r.skipped,
            vec![SkippedField {
                column: Column::JobTitle,
                reason: SkipReason::DestinationSet
            }]
        );
    }

    #[test]
    fn always_overwrite_replaces_job_title() {
        let r = reconcile(&staff_profile(), &engineer(), MergePolicy::AlwaysOverwrite);
        assert_eq!(r.writes.text(Column::JobTitle), Some("Staff Engineer"));
    }

    #[test]
    fn out_of_enum_values_never_reach_writes() {
        let profile = EnrichedProfile {
            seniority: Some("mid".into()),
            company_size: Some("10-50".into()),
            buying_influence: Some("Decision Maker".into()),
            ..Default::default()
        };
        let r = reconcile(&profile, &DeveloperRecord::default(), MergePolicy::AlwaysOverwrite);
        assert!(!r.writes.contains(Column::Seniority));
        assert!(!r.writes.contains(Column::CompanySize));
        assert_eq!(r.writes.text(Column::BuyingInfluence), Some("decision_maker"));
        assert!(r
            .skipped
            .iter()
            .any(|s| s.column == Column::Seniority && s.reason == SkipReason::NotAllowed("mid".into())));
    }

    #[test]
    fn contact_handles_are_never_overwritten() {
        let existing = DeveloperRecord {
            github_username: Some("old".into()),
            ..Default::default()
        };
        let profile = EnrichedProfile {
            github_username: Some("new".into()),
            twitter_username: Some("@tw".into()),
            ..Default::default()
        };
        let r = reconcile(&profile, &existing, MergePolicy::AlwaysOverwrite);
        assert!(!r.writes.contains(Column::GithubUsername));
        assert_eq!(r.writes.text(Column::TwitterUsername), Some("tw"));
    }

    #[test]
    fn taxonomy_strings_are_split_and_normalized() {
        assert_eq!(
            split_taxonomy(&["Rust, Go ,, TypeScript", "rust"]),
            vec!["rust", "go", "typescript"]
        );
    }

    #[test]
    fn skills_are_bucketed_and_unknowns_reported() {
        let profile = EnrichedProfile {
            languages: vec!["Rust".into()],
            skills: vec!["Python, Django, PostgreSQL, AWS, rust, Leadership".into()],
            ..Default::default()
        };
        let r = reconcile(&profile, &DeveloperRecord::default(), MergePolicy::FillEmpty);
        assert_eq!(
            r.writes.get(Column::Languages),
            Some(&FieldValue::List(vec!["rust".into(), "python".into()]))
        );
        assert_eq!(r.writes.get(Column::Frameworks), Some(&FieldValue::List(vec!["django".into()])));
        assert_eq!(r.writes.get(Column::Databases), Some(&FieldValue::List(vec!["postgresql".into()])));
        assert_eq!(r.writes.get(Column::CloudPlatforms), Some(&FieldValue::List(vec!["aws".into()])));
        assert_eq!(r.unclassified_skills, vec!["leadership"]);
    }

    #[test]
    fn github_urls_are_reduced_to_handles() {
        let profile = EnrichedProfile {
            github_username: Some("https://github.com/octocat/".into()),
            ..Default::default()
        };
        let r = reconcile(&profile, &DeveloperRecord::default(), MergePolicy::FillEmpty);
        assert_eq!(r.writes.text(Column::GithubUsername), Some("octocat"));
    }

    #[test]
    fn handle_urls_lose_query_and_fragment() {
        let profile = EnrichedProfile {
            github_username: Some("https://github.com/octocat#repositories".into()),
            twitter_username: Some("https://x.com/octo?ref=bio".into()),
            ..Default::default()
        };
        let r = reconcile(&profile, &DeveloperRecord::default(), MergePolicy::FillEmpty);
        assert_eq!(r.writes.text(Column::GithubUsername), Some("octocat"));
        assert_eq!(r.writes.text(Column::TwitterUsername), Some("octo"));
    }

    #[test]
    fn empty_profile_writes_nothing() {
        let r = reconcile(&EnrichedProfile::default(), &engineer(), MergePolicy::AlwaysOverwrite);
        assert!(r.writes.is_empty());
        assert!(r.skipped.is_empty());
    }
}
