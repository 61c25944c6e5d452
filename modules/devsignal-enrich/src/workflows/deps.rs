use std::sync::Arc;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::cascade::{
    Cascade, GithubApiResolver, Resolver, WebSearchResolver, WebsiteCrawlResolver, WebsiteSearchResolver,
};
use crate::traits::{
    CrmSink, DeepEnricher, DeveloperStore, GithubDirectory, PageFetcher, ProfileExtractor, ProfileScraper,
    WebSearcher,
};

/// Shared dependency container for all enrichment workflows. Every
/// collaborator is a trait object so tests can swap in mocks.
#[derive(Clone, TypedBuilder)]
pub struct EnrichDeps {
    pub store: Arc<dyn DeveloperStore>,
    pub searcher: Arc<dyn WebSearcher>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub github: Arc<dyn GithubDirectory>,
    pub extractor: Arc<dyn ProfileExtractor>,
    /// Already throttled; workflows call it directly.
    #[builder(default)]
    pub scraper: Option<Arc<dyn ProfileScraper>>,
    #[builder(default)]
    pub deep: Option<Arc<dyn DeepEnricher>>,
    #[builder(default)]
    pub crm: Option<Arc<dyn CrmSink>>,
    #[builder(default = Duration::from_secs(30))]
    pub search_timeout: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub extraction_timeout: Duration,
}

impl EnrichDeps {
    /// The standard discovery cascade: directory lookup, web search, known
    /// website, searched website.
    pub fn build_cascade(&self) -> Cascade {
        let resolvers: Vec<Arc<dyn Resolver>> = vec![
            Arc::new(GithubApiResolver::new(self.github.clone())),
            Arc::new(WebSearchResolver::new(self.searcher.clone())),
            Arc::new(WebsiteCrawlResolver::new(self.fetcher.clone())),
            Arc::new(WebsiteSearchResolver::new(self.searcher.clone(), self.fetcher.clone())),
        ];
        Cascade::new(resolvers)
    }
}
