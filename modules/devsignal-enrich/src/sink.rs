// Multi-sink writer: the internal store is authoritative, the CRM mirror is
// best effort.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use folk_client::{CustomFieldValues, FolkClient, FolkError, UpdatePerson};
use thiserror::Error;
use tracing::{debug, info, warn};

use devsignal_common::{Column, DeveloperRecord, FieldValue, FieldWrites};

use crate::traits::{CrmSink, DeveloperStore};

// ---------------------------------------------------------------------------
// CRM contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrmWriteError {
    /// The CRM lacks custom fields the update referenced.
    #[error("CRM schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("CRM network error: {0}")]
    Network(String),

    #[error("CRM rejected update (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrmLists {
    pub emails: Vec<String>,
    pub urls: Vec<String>,
}

/// A contact update. List fields, when present, replace the stored lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrmUpdate {
    pub emails: Option<Vec<String>>,
    pub urls: Option<Vec<String>>,
    /// Custom-field label → value.
    pub custom_fields: BTreeMap<String, serde_json::Value>,
}

impl CrmUpdate {
    pub fn is_empty(&self) -> bool {
        self.emails.is_none() && self.urls.is_none() && self.custom_fields.is_empty()
    }

    pub fn without_custom_fields(&self) -> Self {
        Self {
            emails: self.emails.clone(),
            urls: self.urls.clone(),
            custom_fields: BTreeMap::new(),
        }
    }
}

fn custom_field_label(column: Column) -> Option<&'static str> {
    Some(match column {
        Column::JobTitle => "Job Title",
        Column::Seniority => "Seniority",
        Column::RoleTypes => "Role Types",
        Column::Languages => "Languages",
        Column::Frameworks => "Frameworks",
        Column::Databases => "Databases",
        Column::CloudPlatforms => "Cloud Platforms",
        Column::DevopsTools => "DevOps Tools",
        Column::YearsExperience => "Years of Experience",
        Column::Location => "Location",
        Column::BuyingInfluence => "Buying Influence",
        Column::CompanySize => "Company Size",
        Column::OpenSourceActivity => "Open Source Activity",
        _ => return None,
    })
}

fn field_json(value: &FieldValue) -> serde_json::Value {
    match value {
        FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        FieldValue::List(v) => serde_json::Value::String(v.join(", ")),
        FieldValue::Number(n) => serde_json::json!(n),
    }
}

/// New list entries and custom fields implied by a set of column writes.
fn crm_additions(writes: &FieldWrites) -> (Vec<String>, Vec<String>, BTreeMap<String, serde_json::Value>) {
    let mut emails = Vec::new();
    let mut urls = Vec::new();
    let mut custom = BTreeMap::new();

    for (column, value) in writes.iter() {
        match column {
            Column::PersonalEmail => emails.extend(value.as_text().map(String::from)),
            Column::GithubUsername => urls.extend(value.as_text().map(|u| format!("https://github.com/{u}"))),
            Column::TwitterUsername => urls.extend(value.as_text().map(|u| format!("https://x.com/{u}"))),
            Column::WebsiteUrl | Column::LinkedinUrl => urls.extend(value.as_text().map(String::from)),
            other => {
                if let Some(label) = custom_field_label(other) {
                    custom.insert(label.to_string(), field_json(value));
                }
            }
        }
    }

    (emails, urls, custom)
}

/// Existing entries first, then new ones not already present (case-insensitive).
pub fn union_list(existing: &[String], additions: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = existing.to_vec();
    for item in additions {
        let normalized = item.trim().trim_end_matches('/').to_lowercase();
        let present = merged
            .iter()
            .any(|m| m.trim().trim_end_matches('/').to_lowercase() == normalized);
        if !present {
            merged.push(item.clone());
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Folk
// ---------------------------------------------------------------------------

pub struct FolkCrm {
    client: FolkClient,
    custom_field_group: Option<String>,
}

impl FolkCrm {
    pub fn new(client: FolkClient, custom_field_group: Option<String>) -> Self {
        Self {
            client,
            custom_field_group,
        }
    }
}

impl From<FolkError> for CrmWriteError {
    fn from(err: FolkError) -> Self {
        match err {
            FolkError::SchemaMismatch(detail) => CrmWriteError::SchemaMismatch(detail),
            FolkError::Network(detail) => CrmWriteError::Network(detail),
            FolkError::Parse(detail) => CrmWriteError::Network(format!("unreadable response: {detail}")),
            FolkError::Api { status, message } => CrmWriteError::Rejected { status, message },
        }
    }
}

#[async_trait]
impl CrmSink for FolkCrm {
    async fn lists(&self, contact_id: &str) -> std::result::Result<CrmLists, CrmWriteError> {
        let person = self.client.get_person(contact_id).await?;
        Ok(CrmLists {
            emails: person.emails,
            urls: person.urls,
        })
    }

    async fn update(&self, contact_id: &str, update: &CrmUpdate) -> std::result::Result<(), CrmWriteError> {
        let custom_field_values = match (&self.custom_field_group, update.custom_fields.is_empty()) {
            (_, true) => None,
            (Some(group), false) => {
                let mut values = CustomFieldValues::new();
                values.insert(group.clone(), update.custom_fields.clone());
                Some(values)
            }
            (None, false) => {
                debug!(contact_id, "No custom field group configured, skipping custom fields");
                None
            }
        };

        let person_update = UpdatePerson {
            emails: update.emails.clone(),
            urls: update.urls.clone(),
            custom_field_values,
        };
        if person_update.is_empty() {
            return Ok(());
        }
        self.client.update_person(contact_id, &person_update).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Multi-sink writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmOutcome {
    /// No CRM configured, no contact id, or nothing to mirror.
    Skipped,
    Applied,
    /// Standard fields applied, custom fields dropped.
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub crm: CrmOutcome,
    pub warnings: Vec<String>,
}

pub struct MultiSinkWriter {
    store: Arc<dyn DeveloperStore>,
    crm: Option<Arc<dyn CrmSink>>,
}

impl MultiSinkWriter {
    pub fn new(store: Arc<dyn DeveloperStore>, crm: Option<Arc<dyn CrmSink>>) -> Self {
        Self { store, crm }
    }

    /// Write to the internal store, then mirror to the CRM. Only an internal
    /// store failure is an error.
    pub async fn write(&self, record: &DeveloperRecord, writes: &FieldWrites) -> Result<WriteOutcome> {
        if writes.is_empty() {
            return Ok(WriteOutcome {
                crm: CrmOutcome::Skipped,
                warnings: Vec::new(),
            });
        }

        self.store
            .apply(record.id, writes)
            .await
            .with_context(|| format!("Internal store write failed for developer {}", record.id))?;
        info!(developer_id = %record.id, fields = ?writes.column_names(), "Developer fields written");

        let (Some(crm), Some(contact_id)) = (&self.crm, record.crm_contact_id.as_deref()) else {
            return Ok(WriteOutcome {
                crm: CrmOutcome::Skipped,
                warnings: Vec::new(),
            });
        };

        Ok(mirror(crm.as_ref(), contact_id, writes).await)
    }
}

async fn mirror(crm: &dyn CrmSink, contact_id: &str, writes: &FieldWrites) -> WriteOutcome {
    let mut warnings = Vec::new();
    let (new_emails, new_urls, custom_fields) = crm_additions(writes);

    let mut update = CrmUpdate {
        custom_fields,
        ..Default::default()
    };

    if !new_emails.is_empty() || !new_urls.is_empty() {
        let current = match crm.lists(contact_id).await {
            Ok(lists) => lists,
            Err(e) => {
                warn!(contact_id, error = %e, "CRM contact fetch failed, skipping mirror");
                warnings.push(format!("CRM mirror skipped: {e}"));
                return WriteOutcome {
                    crm: CrmOutcome::Failed,
                    warnings,
                };
            }
        };
        if !new_emails.is_empty() {
            update.emails = Some(union_list(&current.emails, &new_emails));
        }
        if !new_urls.is_empty() {
            update.urls = Some(union_list(&current.urls, &new_urls));
        }
    }

    if update.is_empty() {
        return WriteOutcome {
            crm: CrmOutcome::Skipped,
            warnings,
        };
    }

    let outcome = match crm.update(contact_id, &update).await {
        Ok(()) => CrmOutcome::Applied,
        Err(CrmWriteError::SchemaMismatch(detail)) => {
            warn!(contact_id, detail = detail.as_str(), "CRM custom fields missing, applying standard fields only");
            warnings.push(format!("CRM custom fields skipped: {detail}"));
            let standard = update.without_custom_fields();
            if standard.is_empty() {
                CrmOutcome::Partial
            } else {
                match crm.update(contact_id, &standard).await {
                    Ok(()) => CrmOutcome::Partial,
                    Err(e) => {
                        warn!(contact_id, error = %e, "CRM standard-field update failed");
                        warnings.push(format!("CRM mirror failed: {e}"));
                        CrmOutcome::Failed
                    }
                }
            }
        }
        Err(e) => {
            warn!(contact_id, error = %e, "CRM mirror failed");
            warnings.push(format!("CRM mirror failed: {e}"));
            CrmOutcome::Failed
        }
    };

    WriteOutcome { crm: outcome, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_keeps_order_and_skips_duplicates() {
        let existing = vec!["https://github.com/octocat/".to_string(), "https://a.dev".to_string()];
        let additions = vec!["https://GitHub.com/octocat".to_string(), "https://x.com/octo".to_string()];
        assert_eq!(
            union_list(&existing, &additions),
            vec!["https://github.com/octocat/", "https://a.dev", "https://x.com/octo"]
        );
    }

    #[test]
    fn writes_split_into_lists_and_custom_fields() {
        let mut writes = FieldWrites::new();
        writes.set(Column::GithubUsername, FieldValue::Text("octocat".into()));
        writes.set(Column::PersonalEmail, FieldValue::Text("octo@example.dev".into()));
        writes.set(Column::Seniority, FieldValue::Text("senior".into()));
        writes.set(Column::Languages, FieldValue::List(vec!["rust".into(), "go".into()]));
        writes.set(Column::City, FieldValue::Text("Berlin".into()));

        let (emails, urls, custom) = crm_additions(&writes);
        assert_eq!(emails, vec!["octo@example.dev"]);
        assert_eq!(urls, vec!["https://github.com/octocat"]);
        assert_eq!(custom["Seniority"], "senior");
        assert_eq!(custom["Languages"], "rust, go");
        assert!(!custom.contains_key("City"));
    }

    #[test]
    fn folk_errors_map_to_crm_variants() {
        assert!(matches!(
            CrmWriteError::from(FolkError::SchemaMismatch("x".into())),
            CrmWriteError::SchemaMismatch(_)
        ));
        assert!(matches!(
            CrmWriteError::from(FolkError::Api { status: 500, message: "boom".into() }),
            CrmWriteError::Rejected { status: 500, .. }
        ));
    }
}
