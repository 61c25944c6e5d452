use anyhow::{Context, Result};

pub const DEFAULT_EXTRACTION_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_SCRAPE_DELAY_SECS: u64 = 8;
pub const DEFAULT_PROXY_COUNTRY: &str = "us";

/// Application configuration loaded from environment variables.
/// Only `main` reads this; everything below it receives explicit values.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // AI / LLM
    pub anthropic_api_key: String,
    pub extraction_model: String,

    // Search / lookup
    pub serper_api_key: String,
    pub github_token: Option<String>,

    // Browser
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub linkedin_session_cookie: Option<String>,
    pub proxy_country: String,
    pub scrape_delay_secs: u64,

    // Deep enrichment
    pub sixtyfour_api_key: Option<String>,

    // CRM
    pub folk_api_key: Option<String>,
    pub folk_custom_field_group: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required("DATABASE_URL")?,
            anthropic_api_key: required("ANTHROPIC_API_KEY")?,
            extraction_model: optional("EXTRACTION_MODEL")
                .unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
            serper_api_key: required("SERPER_API_KEY")?,
            github_token: optional("GITHUB_TOKEN"),
            browserless_url: optional("BROWSERLESS_URL"),
            browserless_token: optional("BROWSERLESS_TOKEN"),
            linkedin_session_cookie: optional("LINKEDIN_SESSION_COOKIE"),
            proxy_country: optional("PROXY_COUNTRY")
                .unwrap_or_else(|| DEFAULT_PROXY_COUNTRY.to_string()),
            scrape_delay_secs: optional("SCRAPE_DELAY_SECS")
                .map(|v| v.parse().context("SCRAPE_DELAY_SECS must be a whole number of seconds"))
                .transpose()?
                .unwrap_or(DEFAULT_SCRAPE_DELAY_SECS),
            sixtyfour_api_key: optional("SIXTYFOUR_API_KEY"),
            folk_api_key: optional("FOLK_API_KEY"),
            folk_custom_field_group: optional("FOLK_CUSTOM_FIELD_GROUP"),
        };

        config.log_keys();
        Ok(config)
    }

    pub fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview(&self.anthropic_api_key));
        tracing::info!("  EXTRACTION_MODEL: {}", self.extraction_model);
        tracing::info!("  SERPER_API_KEY: {}", preview(&self.serper_api_key));
        tracing::info!("  GITHUB_TOKEN: {}", preview_opt(&self.github_token));
        tracing::info!("  BROWSERLESS_URL: {}", preview_opt(&self.browserless_url));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!(
            "  LINKEDIN_SESSION_COOKIE: {}",
            preview_opt(&self.linkedin_session_cookie)
        );
        tracing::info!("  PROXY_COUNTRY: {}", self.proxy_country);
        tracing::info!("  SCRAPE_DELAY_SECS: {}", self.scrape_delay_secs);
        tracing::info!("  SIXTYFOUR_API_KEY: {}", preview_opt(&self.sixtyfour_api_key));
        tracing::info!("  FOLK_API_KEY: {}", preview_opt(&self.folk_api_key));
        tracing::info!(
            "  FOLK_CUSTOM_FIELD_GROUP: {}",
            preview_opt(&self.folk_custom_field_group)
        );
    }
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn preview(val: &str) -> String {
    let n = val
        .char_indices()
        .nth(5)
        .map(|(i, _)| i)
        .unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.len())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => preview(v),
        _ => "<not set>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_prefix_and_length_only() {
        assert_eq!(preview("sk-ant-secret"), "sk-an...(13 chars)");
        assert_eq!(preview("abc"), "abc...(3 chars)");
        assert_eq!(preview_opt(&None), "<not set>");
        assert_eq!(preview_opt(&Some(String::new())), "<not set>");
    }
}
