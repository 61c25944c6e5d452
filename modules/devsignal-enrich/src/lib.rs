pub mod cascade;
pub mod deep;
pub mod extractor;
pub mod github;
pub mod links;
pub mod reconcile;
pub mod scraper;
pub mod search;
pub mod sink;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod website;
pub mod workflows;
