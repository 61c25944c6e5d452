use std::sync::Arc;
use std::time::Duration;

use ai_client::Claude;
use anyhow::{bail, Context, Result};
use browserless_client::BrowserlessClient;
use clap::{Parser, Subcommand};
use folk_client::FolkClient;
use sixtyfour_client::SixtyfourClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

use devsignal_common::{BatchResponse, Config};
use devsignal_enrich::deep::SixtyfourEnricher;
use devsignal_enrich::extractor::ClaudeExtractor;
use devsignal_enrich::github::GithubClient;
use devsignal_enrich::scraper::{BrowserlessProfileScraper, ThrottledScraper, DEFAULT_SCRAPE_TIMEOUT};
use devsignal_enrich::search::SerperSearcher;
use devsignal_enrich::sink::FolkCrm;
use devsignal_enrich::store::PgDeveloperStore;
use devsignal_enrich::traits::{CrmSink, DeepEnricher, PageFetcher, ProfileScraper};
use devsignal_enrich::website::{BrowserlessPageFetcher, HttpPageFetcher};
use devsignal_enrich::workflows::{BatchError, EnrichDeps, Enricher, MAX_BATCH};

#[derive(Parser)]
#[command(name = "devsignal", about = "Developer enrichment and GitHub discovery")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find GitHub accounts through the discovery cascade
    Discover { ids: Vec<String> },
    /// Refresh descriptive fields from a fresh web search
    Reenrich {
        #[arg(conflicts_with = "stale")]
        ids: Vec<String>,
        /// Re-enrich the N least recently enriched developers
        #[arg(long)]
        stale: Option<usize>,
    },
    /// Enrich from LinkedIn profile pages
    Linkedin { ids: Vec<String> },
    /// Submit deep-enrichment tasks
    Submit { ids: Vec<String> },
    /// Poll every outstanding deep-enrichment task once
    Collect,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = PgDeveloperStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let enricher = Enricher::new(build_deps(&config, store)?);

    let response = match cli.command {
        Command::Discover { ids } => enricher.discover_github(&ids).await,
        Command::Reenrich { stale: Some(limit), .. } => {
            let ids = enricher.stale_ids(limit).await?;
            info!(count = ids.len(), "Re-enriching stale developers");
            let mut all = BatchResponse::default();
            for chunk in ids.chunks(MAX_BATCH) {
                all.results.extend(batch(enricher.reenrich(chunk).await)?.results);
            }
            Ok(all)
        }
        Command::Reenrich { ids, stale: None } => enricher.reenrich(&ids).await,
        Command::Linkedin { ids } => enricher.enrich_from_linkedin(&ids).await,
        Command::Submit { ids } => enricher.submit_deep(&ids).await,
        Command::Collect => enricher.collect_deep().await,
    };

    let response = batch(response)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn batch(response: Result<BatchResponse, BatchError>) -> Result<BatchResponse> {
    match response {
        Ok(response) => Ok(response),
        Err(e) => bail!("Batch rejected (status {}): {e}", e.status_code()),
    }
}

fn build_deps(config: &Config, store: PgDeveloperStore) -> Result<EnrichDeps> {
    let claude = Claude::new(&config.anthropic_api_key, &config.extraction_model)?;

    let browserless = config
        .browserless_url
        .as_deref()
        .map(|url| BrowserlessClient::with_timeout(url, config.browserless_token.as_deref(), DEFAULT_SCRAPE_TIMEOUT))
        .transpose()
        .context("Failed to build Browserless client")?;

    let fetcher: Arc<dyn PageFetcher> = match &browserless {
        Some(client) => Arc::new(BrowserlessPageFetcher::new(client.clone())),
        None => Arc::new(HttpPageFetcher::new()?),
    };

    let scraper: Option<Arc<dyn ProfileScraper>> = match (&browserless, &config.linkedin_session_cookie) {
        (Some(client), Some(cookie)) => {
            let inner = BrowserlessProfileScraper::new(client.clone(), cookie.clone(), config.proxy_country.clone());
            Some(Arc::new(ThrottledScraper::new(
                Arc::new(inner),
                Duration::from_secs(config.scrape_delay_secs),
            )))
        }
        _ => None,
    };

    let deep: Option<Arc<dyn DeepEnricher>> = match &config.sixtyfour_api_key {
        Some(key) => Some(Arc::new(SixtyfourEnricher::new(SixtyfourClient::new(key.clone())?))),
        None => None,
    };

    let crm: Option<Arc<dyn CrmSink>> = match &config.folk_api_key {
        Some(key) => Some(Arc::new(FolkCrm::new(
            FolkClient::new(key.clone())?,
            config.folk_custom_field_group.clone(),
        ))),
        None => None,
    };

    Ok(EnrichDeps::builder()
        .store(Arc::new(store))
        .searcher(Arc::new(SerperSearcher::new(&config.serper_api_key)?))
        .fetcher(fetcher)
        .github(Arc::new(GithubClient::new(config.github_token.clone())?))
        .extractor(Arc::new(ClaudeExtractor::new(claude)))
        .scraper(scraper)
        .deep(deep)
        .crm(crm)
        .build())
}
