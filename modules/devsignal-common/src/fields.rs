//! Canonical destination columns, the values written into them, and the
//! closed vocabularies of the enum-constrained columns.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// A writable column on the `developers` table. Writers only ever address
/// columns through this enum, never through provider field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    JobTitle,
    Seniority,
    RoleTypes,
    Languages,
    Frameworks,
    Databases,
    CloudPlatforms,
    DevopsTools,
    YearsExperience,
    City,
    StateRegion,
    Country,
    Location,
    GithubUsername,
    TwitterUsername,
    WebsiteUrl,
    PersonalEmail,
    LinkedinUrl,
    BuyingInfluence,
    CompanySize,
    OpenSourceActivity,
}

impl Column {
    pub const ALL: [Column; 21] = [
        Column::JobTitle,
        Column::Seniority,
        Column::RoleTypes,
        Column::Languages,
        Column::Frameworks,
        Column::Databases,
        Column::CloudPlatforms,
        Column::DevopsTools,
        Column::YearsExperience,
        Column::City,
        Column::StateRegion,
        Column::Country,
        Column::Location,
        Column::GithubUsername,
        Column::TwitterUsername,
        Column::WebsiteUrl,
        Column::PersonalEmail,
        Column::LinkedinUrl,
        Column::BuyingInfluence,
        Column::CompanySize,
        Column::OpenSourceActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::JobTitle => "job_title",
            Column::Seniority => "seniority",
            Column::RoleTypes => "role_types",
            Column::Languages => "languages",
            Column::Frameworks => "frameworks",
            Column::Databases => "databases",
            Column::CloudPlatforms => "cloud_platforms",
            Column::DevopsTools => "devops_tools",
            Column::YearsExperience => "years_experience",
            Column::City => "city",
            Column::StateRegion => "state_region",
            Column::Country => "country",
            Column::Location => "location",
            Column::GithubUsername => "github_username",
            Column::TwitterUsername => "twitter_username",
            Column::WebsiteUrl => "website_url",
            Column::PersonalEmail => "personal_email",
            Column::LinkedinUrl => "linkedin_url",
            Column::BuyingInfluence => "buying_influence",
            Column::CompanySize => "company_size",
            Column::OpenSourceActivity => "open_source_activity",
        }
    }

    /// Contact handles are never overwritten once set, whatever the policy.
    pub fn is_contact_handle(self) -> bool {
        matches!(
            self,
            Column::GithubUsername
                | Column::TwitterUsername
                | Column::WebsiteUrl
                | Column::PersonalEmail
                | Column::LinkedinUrl
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Validated column writes for one developer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldWrites {
    values: BTreeMap<Column, FieldValue>,
}

impl FieldWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: Column, value: FieldValue) {
        self.values.insert(column, value);
    }

    pub fn get(&self, column: Column) -> Option<&FieldValue> {
        self.values.get(&column)
    }

    pub fn text(&self, column: Column) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_text)
    }

    pub fn contains(&self, column: Column) -> bool {
        self.values.contains_key(&column)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column, &FieldValue)> {
        self.values.iter().map(|(c, v)| (*c, v))
    }

    /// Column names as written, for result reporting.
    pub fn column_names(&self) -> Vec<String> {
        self.values.keys().map(|c| c.as_str().to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// Allow-listed vocabularies
// ---------------------------------------------------------------------------

macro_rules! allow_listed {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Accept a provider value only if it names one of the allowed
            /// values. Case and space/hyphen-vs-underscore differences are
            /// tolerated; anything else is rejected.
            pub fn parse(raw: &str) -> Option<Self> {
                let lower = raw.trim().to_ascii_lowercase();
                let snake = lower.replace([' ', '-'], "_");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lower || v.as_str() == snake)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

allow_listed!(
    /// Career stage. Exactly three values.
    Seniority {
        EarlyCareer => "early_career",
        Senior => "senior",
        Leadership => "leadership",
    }
);

allow_listed!(
    /// Role in purchasing decisions at their company.
    BuyingInfluence {
        DecisionMaker => "decision_maker",
        Influencer => "influencer",
        Evaluator => "evaluator",
        NoInfluence => "none",
    }
);

allow_listed!(
    /// Employee-count band of the current employer.
    CompanySize {
        Micro => "1-10",
        Small => "11-50",
        Medium => "51-200",
        Large => "201-1000",
        XLarge => "1001-5000",
        Enterprise => "5000+",
    }
);

allow_listed!(
    /// Visible public open-source contribution level.
    OpenSourceActivity {
        NoActivity => "none",
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seniority_accepts_exact_and_cosmetic_variants() {
        assert_eq!(Seniority::parse("senior"), Some(Seniority::Senior));
        assert_eq!(Seniority::parse(" Early Career "), Some(Seniority::EarlyCareer));
        assert_eq!(Seniority::parse("early-career"), Some(Seniority::EarlyCareer));
        assert_eq!(Seniority::parse("LEADERSHIP"), Some(Seniority::Leadership));
    }

    #[test]
    fn seniority_rejects_everything_else() {
        assert_eq!(Seniority::parse("mid"), None);
        assert_eq!(Seniority::parse("Staff Engineer"), None);
        assert_eq!(Seniority::parse(""), None);
    }

    #[test]
    fn company_size_bands_match_literally() {
        assert_eq!(CompanySize::parse("11-50"), Some(CompanySize::Small));
        assert_eq!(CompanySize::parse("5000+"), Some(CompanySize::Enterprise));
        assert_eq!(CompanySize::parse("10-50"), None);
        assert_eq!(CompanySize::parse("large"), None);
    }

    #[test]
    fn column_names_are_snake_case() {
        assert_eq!(Column::StateRegion.as_str(), "state_region");
        assert_eq!(Column::OpenSourceActivity.to_string(), "open_source_activity");
        assert_eq!(Column::ALL.len(), 21);
    }

    #[test]
    fn only_handles_are_contact_handles() {
        assert!(Column::GithubUsername.is_contact_handle());
        assert!(Column::PersonalEmail.is_contact_handle());
        assert!(!Column::JobTitle.is_contact_handle());
        assert!(!Column::Seniority.is_contact_handle());
    }
}
