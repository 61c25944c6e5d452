// Postgres persistence for developer records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use devsignal_common::{DevSignalError, DeveloperRecord, FieldValue, FieldWrites};

use crate::traits::DeveloperStore;

const DEVELOPER_COLUMNS: &str = r#"
    id, name, email, linkedin_url, job_title, company, seniority,
    role_types, languages, frameworks, databases, cloud_platforms, devops_tools,
    years_experience, city, state_region, country, location,
    github_username, twitter_username, website_url, personal_email,
    buying_influence, company_size, open_source_activity,
    crm_contact_id, enrichment_task_id, last_enriched_at
"#;

/// A row from the developers table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct DeveloperRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    linkedin_url: Option<String>,
    job_title: Option<String>,
    company: Option<String>,
    seniority: Option<String>,
    role_types: Vec<String>,
    languages: Vec<String>,
    frameworks: Vec<String>,
    databases: Vec<String>,
    cloud_platforms: Vec<String>,
    devops_tools: Vec<String>,
    years_experience: Option<f64>,
    city: Option<String>,
    state_region: Option<String>,
    country: Option<String>,
    location: Option<String>,
    github_username: Option<String>,
    twitter_username: Option<String>,
    website_url: Option<String>,
    personal_email: Option<String>,
    buying_influence: Option<String>,
    company_size: Option<String>,
    open_source_activity: Option<String>,
    crm_contact_id: Option<String>,
    enrichment_task_id: Option<String>,
    last_enriched_at: Option<DateTime<Utc>>,
}

impl From<DeveloperRow> for DeveloperRecord {
    fn from(r: DeveloperRow) -> Self {
        DeveloperRecord {
            id: r.id,
            name: r.name,
            email: r.email,
            linkedin_url: r.linkedin_url,
            job_title: r.job_title,
            company: r.company,
            seniority: r.seniority,
            role_types: r.role_types,
            languages: r.languages,
            frameworks: r.frameworks,
            databases: r.databases,
            cloud_platforms: r.cloud_platforms,
            devops_tools: r.devops_tools,
            years_experience: r.years_experience,
            city: r.city,
            state_region: r.state_region,
            country: r.country,
            location: r.location,
            github_username: r.github_username,
            twitter_username: r.twitter_username,
            website_url: r.website_url,
            personal_email: r.personal_email,
            buying_influence: r.buying_influence,
            company_size: r.company_size,
            open_source_activity: r.open_source_activity,
            crm_contact_id: r.crm_contact_id,
            enrichment_task_id: r.enrichment_task_id,
            last_enriched_at: r.last_enriched_at,
        }
    }
}

pub struct PgDeveloperStore {
    pool: PgPool,
}

impl PgDeveloperStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }
}

/// `UPDATE developers SET <col> = <value>, ..., last_enriched_at = now() WHERE id = <id>`.
/// Column names come from `Column::as_str`, never from provider output.
fn update_query(id: Uuid, writes: &FieldWrites) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new("UPDATE developers SET ");
    {
        let mut set = qb.separated(", ");
        for (column, value) in writes.iter() {
            set.push(format!("{} = ", column.as_str()));
            match value {
                FieldValue::Text(s) => set.push_bind_unseparated(s.clone()),
                FieldValue::List(v) => set.push_bind_unseparated(v.clone()),
                FieldValue::Number(n) => set.push_bind_unseparated(*n),
            };
        }
        set.push("last_enriched_at = now()");
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb
}

#[async_trait]
impl DeveloperStore for PgDeveloperStore {
    async fn get(&self, id: Uuid) -> Result<Option<DeveloperRecord>> {
        let row = sqlx::query_as::<_, DeveloperRow>(&format!(
            "SELECT {DEVELOPER_COLUMNS} FROM developers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DeveloperRecord::from))
    }

    async fn apply(&self, id: Uuid, writes: &FieldWrites) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let result = update_query(id, writes).build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DevSignalError::NotFound(id.to_string()).into());
        }
        Ok(())
    }

    async fn set_task(&self, id: Uuid, task_id: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE developers SET enrichment_task_id = $2 WHERE id = $1")
            .bind(id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn with_outstanding_task(&self) -> Result<Vec<DeveloperRecord>> {
        let rows = sqlx::query_as::<_, DeveloperRow>(&format!(
            "SELECT {DEVELOPER_COLUMNS} FROM developers
             WHERE enrichment_task_id IS NOT NULL
             ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DeveloperRecord::from).collect())
    }

    async fn stale_ids(&self, limit: i64) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM developers ORDER BY last_enriched_at ASC NULLS FIRST, created_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use devsignal_common::Column;

    use super::*;

    #[test]
    fn update_sql_sets_columns_and_stamps_time() {
        let mut writes = FieldWrites::new();
        writes.set(Column::JobTitle, FieldValue::Text("Staff Engineer".into()));
        writes.set(Column::Languages, FieldValue::List(vec!["rust".into()]));
        writes.set(Column::YearsExperience, FieldValue::Number(9.0));

        let qb = update_query(Uuid::nil(), &writes);
        assert_eq!(
            qb.sql(),
            "UPDATE developers SET job_title = $1, languages = $2, years_experience = $3, \
             last_enriched_at = now() WHERE id = $4"
        );
    }
}
