// Structured extraction: free text plus known fields → sparse developer profile.
//
// The model is held to a fixed JSON contract generated from `ExtractionPayload`.
// Anything that does not deserialize into that contract is discarded whole;
// a half-parsed profile is never trusted.

use ai_client::{strip_code_blocks, truncate_to_char_boundary, Claude};
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use devsignal_common::{non_blank, EnrichedProfile, Identity, Seniority};

use crate::traits::ProfileExtractor;

const MAX_INPUT_CHARS: usize = 30_000;
const RAW_LOG_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Output contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

/// Developer profile extracted from text about one person. Use null for
/// anything the text does not state.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExtractionPayload {
    /// Current job title exactly as written
    pub job_title: Option<String>,
    /// One of "early_career", "senior", "leadership"
    pub seniority: Option<String>,
    /// Role categories, e.g. "backend", "frontend", "devops", "data"
    pub role_types: Option<StringOrList>,
    /// Programming languages
    pub languages: Option<StringOrList>,
    /// Frameworks and libraries
    pub frameworks: Option<StringOrList>,
    /// Databases and data stores
    pub databases: Option<StringOrList>,
    /// Cloud platforms
    pub cloud_platforms: Option<StringOrList>,
    /// CI/CD, containers, infrastructure-as-code and similar tooling
    pub devops_tools: Option<StringOrList>,
    /// Any other technical skills mentioned
    pub skills: Option<StringOrList>,
    /// Total years of professional software experience
    pub years_experience: Option<f64>,
    /// Location as written, e.g. "Austin, TX, USA"
    pub location: Option<String>,
    pub city: Option<String>,
    pub state_region: Option<String>,
    pub country: Option<String>,
    /// GitHub username (not a URL)
    pub github_username: Option<String>,
    /// X/Twitter handle without "@"
    pub twitter_username: Option<String>,
    /// Personal website, blog or portfolio URL
    pub website_url: Option<String>,
    /// Personal (non-work) email address
    pub personal_email: Option<String>,
    /// LinkedIn profile URL
    pub linkedin_url: Option<String>,
    /// One of "decision_maker", "influencer", "evaluator", "none"
    pub buying_influence: Option<String>,
    /// Employer size band: "1-10", "11-50", "51-200", "201-1000", "1001-5000", "5000+"
    pub company_size: Option<String>,
    /// Public open-source activity: "none", "low", "medium", "high"
    pub open_source_activity: Option<String>,
}

fn system_prompt() -> String {
    let schema = schemars::schema_for!(ExtractionPayload);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        r#"You extract structured developer profiles from text about one person.

Rules:
- Only state what the text supports. Use null for anything not stated; never guess.
- The KNOWN FIELDS are reliable. Use them to pick the right person when the text mentions several people.
- Enum-like fields must use exactly one of the listed values or null.
- Reply with a single JSON object matching this JSON Schema and nothing else:

{schema_json}"#
    )
}

fn user_prompt(free_text: &str, known: &Identity) -> String {
    let mut known_lines = vec![format!("name: {}", known.name)];
    for (label, value) in [
        ("email", known.email.as_deref()),
        ("linkedin_url", known.linkedin_url.as_deref()),
        ("job_title", known.job_title.as_deref()),
        ("company", known.company.as_deref()),
        ("website_url", known.website_url.as_deref()),
    ] {
        if let Some(v) = non_blank(value) {
            known_lines.push(format!("{label}: {v}"));
        }
    }

    format!(
        "KNOWN FIELDS:\n{}\n\nTEXT:\n{}",
        known_lines.join("\n"),
        truncate_to_char_boundary(free_text, MAX_INPUT_CHARS)
    )
}

// ---------------------------------------------------------------------------
// Pure post-processing
// ---------------------------------------------------------------------------

const LEADERSHIP_WORDS: &[&str] = &[
    "vp", "svp", "evp", "director", "cto", "ceo", "cio", "cpo", "coo", "chief", "founder",
    "cofounder", "co-founder", "president",
];
const LEADERSHIP_PHRASES: &[&str] = &["head of", "vice president"];
const SENIOR_WORDS: &[&str] = &["senior", "sr", "staff", "principal", "lead", "architect", "distinguished"];
const EARLY_WORDS: &[&str] = &[
    "junior", "jr", "intern", "internship", "associate", "graduate", "trainee", "apprentice",
];
const EARLY_PHRASES: &[&str] = &["entry-level", "entry level", "new grad"];

fn title_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Seniority from a title keyword, else a valid model value, else years of experience.
pub fn map_seniority(title: Option<&str>, model_value: Option<&str>, years: Option<f64>) -> Option<Seniority> {
    if let Some(title) = non_blank(title) {
        let lower = title.to_lowercase();
        let words = title_words(title);
        let has = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

        if has(LEADERSHIP_WORDS) || LEADERSHIP_PHRASES.iter().any(|p| lower.contains(p)) {
            return Some(Seniority::Leadership);
        }
        if has(SENIOR_WORDS) {
            return Some(Seniority::Senior);
        }
        if EARLY_PHRASES.iter().any(|p| lower.contains(p)) || has(EARLY_WORDS) {
            return Some(Seniority::EarlyCareer);
        }
    }

    if let Some(value) = model_value.and_then(Seniority::parse) {
        return Some(value);
    }

    match years {
        Some(y) if y.is_finite() && y >= 5.0 => Some(Seniority::Senior),
        Some(y) if y.is_finite() && y >= 0.0 => Some(Seniority::EarlyCareer),
        _ => None,
    }
}

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"), ("AK", "Alaska"), ("AZ", "Arizona"), ("AR", "Arkansas"),
    ("CA", "California"), ("CO", "Colorado"), ("CT", "Connecticut"), ("DE", "Delaware"),
    ("DC", "District of Columbia"), ("FL", "Florida"), ("GA", "Georgia"), ("HI", "Hawaii"),
    ("ID", "Idaho"), ("IL", "Illinois"), ("IN", "Indiana"), ("IA", "Iowa"),
    ("KS", "Kansas"), ("KY", "Kentucky"), ("LA", "Louisiana"), ("ME", "Maine"),
    ("MD", "Maryland"), ("MA", "Massachusetts"), ("MI", "Michigan"), ("MN", "Minnesota"),
    ("MS", "Mississippi"), ("MO", "Missouri"), ("MT", "Montana"), ("NE", "Nebraska"),
    ("NV", "Nevada"), ("NH", "New Hampshire"), ("NJ", "New Jersey"), ("NM", "New Mexico"),
    ("NY", "New York"), ("NC", "North Carolina"), ("ND", "North Dakota"), ("OH", "Ohio"),
    ("OK", "Oklahoma"), ("OR", "Oregon"), ("PA", "Pennsylvania"), ("RI", "Rhode Island"),
    ("SC", "South Carolina"), ("SD", "South Dakota"), ("TN", "Tennessee"), ("TX", "Texas"),
    ("UT", "Utah"), ("VT", "Vermont"), ("VA", "Virginia"), ("WA", "Washington"),
    ("WV", "West Virginia"), ("WI", "Wisconsin"), ("WY", "Wyoming"),
];

const UNITED_STATES: &str = "United States";

/// Full state name for a US state abbreviation or name, if it is one.
pub fn us_state(raw: &str) -> Option<&'static str> {
    let raw = raw.trim().trim_end_matches('.');
    US_STATES
        .iter()
        .find(|(abbr, full)| abbr.eq_ignore_ascii_case(raw) || full.eq_ignore_ascii_case(raw))
        .map(|(_, full)| *full)
}

/// State names that are also countries.
const COUNTRY_NAMED_STATES: &[&str] = &["Georgia"];

/// Like [`us_state`], but a full name that also names a country only counts
/// when the country is known to be the US.
fn us_state_outside_country(raw: &str) -> Option<&'static str> {
    let state = us_state(raw)?;
    let abbreviated = raw.trim().trim_end_matches('.').len() == 2;
    (abbreviated || !COUNTRY_NAMED_STATES.contains(&state)).then_some(state)
}

fn normalize_country(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !matches!(c, '.' | ' ')).collect();
    match compact.to_ascii_lowercase().as_str() {
        "us" | "usa" | "unitedstates" | "unitedstatesofamerica" => UNITED_STATES.to_string(),
        "uk" | "gb" => "United Kingdom".to_string(),
        _ => raw.trim().to_string(),
    }
}

fn is_united_states(raw: &str) -> bool {
    normalize_country(raw) == UNITED_STATES
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationParts {
    pub city: Option<String>,
    pub state_region: Option<String>,
    pub country: Option<String>,
    /// "city, state, country" with missing parts left out.
    pub composite: Option<String>,
}

impl LocationParts {
    fn from_parts(city: Option<String>, state_region: Option<String>, country: Option<String>) -> Self {
        let composite = [&city, &state_region, &country]
            .iter()
            .filter_map(|p| p.as_deref())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            city,
            state_region,
            country,
            composite: (!composite.is_empty()).then_some(composite),
        }
    }
}

/// Split a free-form location into city / state-or-region / country.
/// US states are expanded to their full names.
pub fn decompose_location(raw: &str) -> LocationParts {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let owned = |s: &str| Some(s.to_string());

    match parts.as_slice() {
        [] => LocationParts::default(),
        [only] => {
            if let Some(state) = us_state_outside_country(only) {
                LocationParts::from_parts(None, owned(state), owned(UNITED_STATES))
            } else if is_united_states(only) {
                LocationParts::from_parts(None, None, owned(UNITED_STATES))
            } else if us_state(only).is_some() {
                LocationParts::from_parts(None, None, owned(only))
            } else {
                LocationParts::from_parts(owned(only), None, None)
            }
        }
        [city, second] => {
            if let Some(state) = us_state_outside_country(second) {
                LocationParts::from_parts(owned(city), owned(state), owned(UNITED_STATES))
            } else {
                LocationParts::from_parts(owned(city), None, Some(normalize_country(second)))
            }
        }
        [city, region, .., country] => {
            let country = normalize_country(country);
            let region = if country == UNITED_STATES {
                us_state(region).map(String::from).unwrap_or_else(|| region.to_string())
            } else {
                region.to_string()
            };
            LocationParts::from_parts(owned(city), Some(region), Some(country))
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn list(value: Option<StringOrList>) -> Vec<String> {
    value
        .map(StringOrList::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Turn a validated payload into a profile, backfilling from known fields.
pub fn finalize(payload: ExtractionPayload, known: &Identity) -> EnrichedProfile {
    let job_title = clean(payload.job_title).or_else(|| clean(known.job_title.clone()));
    let years_experience = payload.years_experience.filter(|y| y.is_finite() && *y >= 0.0);
    let seniority = map_seniority(
        job_title.as_deref(),
        payload.seniority.as_deref(),
        years_experience,
    );

    let city = clean(payload.city);
    let state_region = clean(payload.state_region);
    let country = clean(payload.country);
    let location = if city.is_some() || state_region.is_some() || country.is_some() {
        let country = country.map(|c| normalize_country(&c));
        let state_name = state_region.as_deref().and_then(us_state);
        let in_us = country
            .as_deref()
            .map_or(state_name.is_some(), |c| c == UNITED_STATES);
        let state_region = match state_name {
            Some(full) if in_us => Some(full.to_string()),
            _ => state_region,
        };
        let country = country.or_else(|| in_us.then(|| UNITED_STATES.to_string()));
        LocationParts::from_parts(city, state_region, country)
    } else {
        clean(payload.location)
            .map(|l| decompose_location(&l))
            .unwrap_or_default()
    };

    EnrichedProfile {
        job_title,
        seniority: seniority.map(|s| s.as_str().to_string()),
        role_types: list(payload.role_types),
        languages: list(payload.languages),
        frameworks: list(payload.frameworks),
        databases: list(payload.databases),
        cloud_platforms: list(payload.cloud_platforms),
        devops_tools: list(payload.devops_tools),
        skills: list(payload.skills),
        years_experience,
        city: location.city,
        state_region: location.state_region,
        country: location.country,
        location: location.composite,
        github_username: clean(payload.github_username),
        twitter_username: clean(payload.twitter_username),
        website_url: clean(payload.website_url),
        personal_email: clean(payload.personal_email),
        linkedin_url: clean(payload.linkedin_url).or_else(|| clean(known.linkedin_url.clone())),
        buying_influence: clean(payload.buying_influence),
        company_size: clean(payload.company_size),
        open_source_activity: clean(payload.open_source_activity),
    }
}

/// Parse a raw model reply. A reply that does not match the contract yields
/// an empty profile.
pub fn parse_extraction(raw: &str, known: &Identity) -> EnrichedProfile {
    let json = strip_code_blocks(raw);
    match serde_json::from_str::<ExtractionPayload>(json) {
        Ok(payload) => finalize(payload, known),
        Err(e) => {
            warn!(
                identity_id = known.external_id.as_str(),
                error = %e,
                raw = truncate_to_char_boundary(raw, RAW_LOG_CHARS),
                "Malformed extraction output, discarding profile"
            );
            EnrichedProfile::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Claude-backed extractor
// ---------------------------------------------------------------------------

pub struct ClaudeExtractor {
    claude: Claude,
    system_prompt: String,
}

impl ClaudeExtractor {
    pub fn new(claude: Claude) -> Self {
        Self {
            claude,
            system_prompt: system_prompt(),
        }
    }
}

#[async_trait]
impl ProfileExtractor for ClaudeExtractor {
    async fn extract(&self, free_text: &str, known: &Identity) -> Result<EnrichedProfile> {
        if free_text.trim().is_empty() {
            return Ok(EnrichedProfile::default());
        }
        let reply = self
            .claude
            .complete(&self.system_prompt, &user_prompt(free_text, known))
            .await?;
        debug!(
            identity_id = known.external_id.as_str(),
            model = self.claude.model(),
            chars = reply.len(),
            "Extraction reply received"
        );
        Ok(parse_extraction(&reply, known))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Identity {
        Identity {
            external_id: "dev-1".into(),
            name: "Ada Lovelace".into(),
            ..Default::default()
        }
    }

    #[test]
    fn three_part_location_is_split() {
        let parts = decompose_location("Nashville, Tennessee, United States");
        assert_eq!(parts.city.as_deref(), Some("Nashville"));
        assert_eq!(parts.state_region.as_deref(), Some("Tennessee"));
        assert_eq!(parts.country.as_deref(), Some("United States"));
        assert_eq!(parts.composite.as_deref(), Some("Nashville, Tennessee, United States"));
    }

    #[test]
    fn two_part_location_has_no_state() {
        let parts = decompose_location("Berlin, Germany");
        assert_eq!(parts.city.as_deref(), Some("Berlin"));
        assert_eq!(parts.state_region, None);
        assert_eq!(parts.country.as_deref(), Some("Germany"));
        assert_eq!(parts.composite.as_deref(), Some("Berlin, Germany"));
    }

    #[test]
    fn us_abbreviations_are_expanded() {
        let parts = decompose_location("Austin, TX");
        assert_eq!(parts.state_region.as_deref(), Some("Texas"));
        assert_eq!(parts.country.as_deref(), Some("United States"));

        let parts = decompose_location("Portland, OR, USA");
        assert_eq!(parts.state_region.as_deref(), Some("Oregon"));
        assert_eq!(parts.country.as_deref(), Some("United States"));
    }

    #[test]
    fn state_names_that_are_countries_stay_countries() {
        let parts = decompose_location("Tbilisi, Georgia");
        assert_eq!(parts.city.as_deref(), Some("Tbilisi"));
        assert_eq!(parts.state_region, None);
        assert_eq!(parts.country.as_deref(), Some("Georgia"));

        let parts = decompose_location("Georgia");
        assert_eq!(parts.city, None);
        assert_eq!(parts.country.as_deref(), Some("Georgia"));

        let parts = decompose_location("Atlanta, GA");
        assert_eq!(parts.state_region.as_deref(), Some("Georgia"));
        assert_eq!(parts.country.as_deref(), Some("United States"));

        let parts = decompose_location("Atlanta, Georgia, USA");
        assert_eq!(parts.state_region.as_deref(), Some("Georgia"));

        let parts = decompose_location("Nashville, Tennessee");
        assert_eq!(parts.state_region.as_deref(), Some("Tennessee"));
        assert_eq!(parts.country.as_deref(), Some("United States"));
    }

    #[test]
    fn senior_keywords_outrank_early_career_keywords() {
        assert_eq!(map_seniority(Some("Senior Associate"), None, None), Some(Seniority::Senior));
        assert_eq!(
            map_seniority(Some("Associate Principal Engineer"), None, None),
            Some(Seniority::Senior)
        );
        assert_eq!(map_seniority(Some("Lead Intern Mentor"), None, None), Some(Seniority::Senior));
        assert_eq!(map_seniority(Some("Associate Engineer"), None, Some(9.0)), Some(Seniority::EarlyCareer));
    }

    #[test]
    fn title_keywords_decide_seniority() {
        assert_eq!(map_seniority(Some("VP of Engineering"), None, None), Some(Seniority::Leadership));
        assert_eq!(map_seniority(Some("Head of Platform"), None, None), Some(Seniority::Leadership));
        assert_eq!(map_seniority(Some("Co-Founder & CTO"), None, None), Some(Seniority::Leadership));
        assert_eq!(map_seniority(Some("Staff Engineer"), None, Some(1.0)), Some(Seniority::Senior));
        assert_eq!(map_seniority(Some("Tech Lead"), None, None), Some(Seniority::Senior));
        assert_eq!(map_seniority(Some("Junior Developer"), Some("senior"), None), Some(Seniority::EarlyCareer));
        assert_eq!(map_seniority(Some("Entry-level Engineer"), None, None), Some(Seniority::EarlyCareer));
    }

    #[test]
    fn years_decide_when_title_is_silent() {
        assert_eq!(map_seniority(Some("Software Engineer"), None, Some(7.0)), Some(Seniority::Senior));
        assert_eq!(map_seniority(Some("Software Engineer"), None, Some(2.0)), Some(Seniority::EarlyCareer));
        assert_eq!(map_seniority(None, None, None), None);
    }

    #[test]
    fn out_of_enum_model_value_is_not_kept() {
        assert_eq!(map_seniority(Some("Software Engineer"), Some("mid-level"), None), None);
        assert_eq!(map_seniority(None, Some("senior"), None), Some(Seniority::Senior));
    }

    #[test]
    fn well_formed_reply_is_parsed_and_backfilled() {
        let raw = r#"```json
        {"job_title": "Senior Backend Engineer", "languages": "Rust, Go",
         "location": "Nashville, TN", "github_username": "ada"}
        ```"#;
        let mut identity = known();
        identity.linkedin_url = Some("https://www.linkedin.com/in/ada".into());
        let profile = parse_extraction(raw, &identity);
        assert_eq!(profile.seniority.as_deref(), Some("senior"));
        assert_eq!(profile.languages, vec!["Rust, Go"]);
        assert_eq!(profile.state_region.as_deref(), Some("Tennessee"));
        assert_eq!(profile.location.as_deref(), Some("Nashville, Tennessee, United States"));
        assert_eq!(profile.github_username.as_deref(), Some("ada"));
        assert_eq!(profile.linkedin_url.as_deref(), Some("https://www.linkedin.com/in/ada"));
    }

    #[test]
    fn explicit_location_parts_are_kept() {
        let raw = r#"{"city": "Munich", "country": "Germany"}"#;
        let profile = parse_extraction(raw, &known());
        assert_eq!(profile.city.as_deref(), Some("Munich"));
        assert_eq!(profile.state_region, None);
        assert_eq!(profile.location.as_deref(), Some("Munich, Germany"));

        let raw = r#"{"city": "Denver", "state_region": "CO"}"#;
        let profile = parse_extraction(raw, &known());
        assert_eq!(profile.state_region.as_deref(), Some("Colorado"));
        assert_eq!(profile.country.as_deref(), Some("United States"));
    }

    #[test]
    fn malformed_reply_yields_empty_profile() {
        assert!(parse_extraction("I could not find anything.", &known()).is_empty());
        assert!(parse_extraction(r#"{"job_title": 42}"#, &known()).is_empty());
        assert!(parse_extraction(r#"{"job_title": "CTO", "hobbies": "chess"}"#, &known()).is_empty());
    }

    #[test]
    fn schema_names_every_field() {
        let prompt = system_prompt();
        assert!(prompt.contains("open_source_activity"));
        assert!(prompt.contains("years_experience"));
    }
}
