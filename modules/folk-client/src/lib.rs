pub mod error;
pub mod types;

pub use error::{FolkError, Result};
pub use types::{CustomFieldValues, Person, UpdatePerson};

use std::time::Duration;

use types::ApiResponse;

const BASE_URL: &str = "https://api.folk.app/v1";

pub struct FolkClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FolkClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FolkError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error::classify_error(status.as_u16(), body));
        }
        Ok(resp)
    }

    /// Fetch a person with their current list fields.
    pub async fn get_person(&self, person_id: &str) -> Result<Person> {
        let resp = self
            .client
            .get(format!("{}/people/{}", self.base_url, person_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body: ApiResponse<Person> = Self::check(resp).await?.json().await?;
        Ok(body.data)
    }

    /// Apply a partial update.
    pub async fn update_person(&self, person_id: &str, update: &UpdatePerson) -> Result<Person> {
        let resp = self
            .client
            .patch(format!("{}/people/{}", self.base_url, person_id))
            .bearer_auth(&self.api_key)
            .json(update)
            .send()
            .await?;

        let body: ApiResponse<Person> = Self::check(resp).await?.json().await?;
        tracing::debug!(person_id, "Folk person updated");
        Ok(body.data)
    }
}
