use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

/// Custom field values keyed by custom-field-group id, then by field name.
pub type CustomFieldValues = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub custom_field_values: CustomFieldValues,
}

/// Partial update. List fields replace the stored list wholesale, so callers
/// must send the full merged list, not just new entries.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePerson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_field_values: Option<CustomFieldValues>,
}

impl UpdatePerson {
    pub fn is_empty(&self) -> bool {
        self.emails.is_none() && self.urls.is_none() && self.custom_field_values.is_none()
    }

    /// The same update with the custom-field portion removed.
    pub fn without_custom_fields(&self) -> Self {
        Self {
            emails: self.emails.clone(),
            urls: self.urls.clone(),
            custom_field_values: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_serializes_camel_case_and_skips_unset() {
        let mut group = BTreeMap::new();
        group.insert("Seniority".to_string(), serde_json::json!("senior"));
        let mut custom = CustomFieldValues::new();
        custom.insert("grp_123".to_string(), group);

        let update = UpdatePerson {
            urls: Some(vec!["https://github.com/octocat".into()]),
            custom_field_values: Some(custom),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("emails").is_none());
        assert_eq!(json["urls"][0], "https://github.com/octocat");
        assert_eq!(json["customFieldValues"]["grp_123"]["Seniority"], "senior");
    }

    #[test]
    fn person_tolerates_missing_lists() {
        let person: Person = serde_json::from_str(r#"{"id":"per_1","firstName":"Ada"}"#).unwrap();
        assert!(person.emails.is_empty());
        assert!(person.urls.is_empty());
        assert!(person.custom_field_values.is_empty());
    }
}
