//! Discovery cascade end to end: `Enricher::discover_github` against mocks
//! for every provider.

use std::sync::Arc;
use std::time::Duration;

use devsignal_common::{Column, DeveloperRecord, DiscoverySource, ResultStatus};
use devsignal_enrich::cascade::{Cascade, Outcome, Resolver, StageResult};
use devsignal_enrich::testing::*;
use devsignal_enrich::traits::GithubUser;
use devsignal_enrich::workflows::{BatchError, Enricher};

fn ada() -> DeveloperRecord {
    developer("Ada Lovelace")
}

fn with_store(record: &DeveloperRecord) -> Mocks {
    Mocks {
        store: Arc::new(MockStore::new().with(record.clone())),
        ..Default::default()
    }
}

#[tokio::test]
async fn existing_github_username_is_already_has_without_external_calls() {
    let mut dev = ada();
    dev.github_username = Some("ada".into());
    let mocks = with_store(&dev);
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::AlreadyHas);
    assert_eq!(result.github_url.as_deref(), Some("https://github.com/ada"));
    assert_eq!(mocks.external_calls(), 0);
    assert!(mocks.store.applied().is_empty());
}

#[tokio::test]
async fn directory_hit_short_circuits_search_and_crawl() {
    let mut dev = ada();
    dev.email = Some("ada@example.com".into());
    let mocks = Mocks {
        github: Arc::new(
            MockGithubDirectory::new()
                .on_search("ada@example.com in:email", &["ada"])
                .on_user(GithubUser {
                    login: "ada".into(),
                    blog: Some("ada.dev".into()),
                    twitter_username: Some("ada_l".into()),
                    ..Default::default()
                }),
        ),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::Found);
    assert_eq!(result.source, Some(DiscoverySource::GithubApi));
    assert_eq!(result.github_url.as_deref(), Some("https://github.com/ada"));
    assert_eq!(mocks.searcher.calls(), 0, "web search must not run after a directory hit");
    assert_eq!(mocks.fetcher.calls(), 0, "no website may be crawled after a directory hit");

    let stored = mocks.store.record(dev.id).unwrap();
    assert_eq!(stored.github_username.as_deref(), Some("ada"));
    assert_eq!(stored.twitter_username.as_deref(), Some("ada_l"));
    assert_eq!(stored.website_url.as_deref(), Some("https://ada.dev/"));
    assert!(stored.last_enriched_at.is_some());
}

#[tokio::test]
async fn web_search_skips_reserved_routes_and_takes_repo_owner() {
    let dev = ada();
    let mocks = Mocks {
        searcher: Arc::new(MockSearcher::new().on_query(
            "site:github.com \"Ada Lovelace\"",
            vec![
                hit("https://github.com/about"),
                hit("https://github.com/adalove/analytical-engine"),
            ],
        )),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::Found);
    assert_eq!(result.source, Some(DiscoverySource::Serper));
    assert_eq!(result.github_url.as_deref(), Some("https://github.com/adalove"));
    assert_eq!(result.fields_found, vec!["github_username".to_string()]);
    assert_eq!(mocks.fetcher.calls(), 0);
}

#[tokio::test]
async fn known_website_is_crawled_for_links() {
    let mut dev = ada();
    dev.website_url = Some("https://ada.dev".into());
    let mocks = Mocks {
        fetcher: Arc::new(MockPageFetcher::new().on_page(
            "https://ada.dev/",
            r#"<a href="https://github.com/adalove">code</a>
               <a href="https://twitter.com/ada_l">tweets</a>
               <a href="mailto:Ada@Lovelace.dev">mail</a>"#,
        )),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::Found);
    assert_eq!(result.source, Some(DiscoverySource::WebsiteCrawl));

    let stored = mocks.store.record(dev.id).unwrap();
    assert_eq!(stored.github_username.as_deref(), Some("adalove"));
    assert_eq!(stored.twitter_username.as_deref(), Some("ada_l"));
    assert_eq!(stored.personal_email.as_deref(), Some("ada@lovelace.dev"));
    // The known website is left as it was.
    assert_eq!(stored.website_url.as_deref(), Some("https://ada.dev"));
}

const SITE_QUERY: &str = "\"Ada Lovelace\" developer personal website OR blog OR portfolio";

#[tokio::test]
async fn searched_website_is_confirmed_by_its_github_link() {
    let dev = ada();
    let mocks = Mocks {
        searcher: Arc::new(MockSearcher::new().on_query(
            SITE_QUERY,
            vec![
                hit("https://www.linkedin.com/in/adalove"),
                hit("https://adalovelace.net/notes/engines"),
            ],
        )),
        fetcher: Arc::new(MockPageFetcher::new().on_page(
            "https://adalovelace.net/",
            r#"<a href="https://github.com/adalove">projects</a>
               <a href="https://x.com/ada_l">posts</a>"#,
        )),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::Found);
    assert_eq!(result.source, Some(DiscoverySource::WebsiteGoogle));
    assert_eq!(mocks.fetcher.fetched(), vec!["https://adalovelace.net/".to_string()]);

    let stored = mocks.store.record(dev.id).unwrap();
    assert_eq!(stored.github_username.as_deref(), Some("adalove"));
    assert_eq!(stored.twitter_username.as_deref(), Some("ada_l"));
    assert_eq!(stored.website_url.as_deref(), Some("https://adalovelace.net/"));
}

#[tokio::test]
async fn github_link_in_website_search_results_is_not_trusted() {
    let dev = ada();
    let mocks = Mocks {
        searcher: Arc::new(MockSearcher::new().on_query(
            SITE_QUERY,
            vec![hit("https://github.com/random-stranger/portfolio-template")],
        )),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::NotFound);
    assert_eq!(mocks.fetcher.calls(), 0);
    assert!(mocks.store.applied().is_empty());
}

#[tokio::test]
async fn searched_website_without_github_link_is_not_recorded() {
    let dev = ada();
    let mocks = Mocks {
        searcher: Arc::new(MockSearcher::new().on_query(SITE_QUERY, vec![hit("https://someones-blog.net/")])),
        fetcher: Arc::new(MockPageFetcher::new().on_page(
            "https://someones-blog.net/",
            r#"<a href="https://x.com/someone">posts</a>"#,
        )),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::NotFound);
    let stored = mocks.store.record(dev.id).unwrap();
    assert_eq!(stored.website_url, None);
    assert_eq!(stored.twitter_username, None);
}

#[tokio::test]
async fn provider_failures_are_misses_not_identity_failures() {
    let dev = ada();
    let mocks = Mocks {
        searcher: Arc::new(MockSearcher::new().failing()),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::NotFound);
    assert_eq!(result.error, None);
    assert!(mocks.store.applied().is_empty());
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_any_work() {
    let devs: Vec<DeveloperRecord> = (0..11).map(|i| developer(&format!("Dev {i}"))).collect();
    let store = devs.iter().fold(MockStore::new(), |store, d| store.with(d.clone()));
    let mocks = Mocks {
        store: Arc::new(store),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());
    let ids: Vec<String> = devs.iter().map(|d| d.id.to_string()).collect();

    let err = enricher.discover_github(&ids).await.unwrap_err();

    assert_eq!(err, BatchError::TooLarge { requested: 11, max: 10 });
    assert_eq!(err.status_code(), 400);
    assert_eq!(mocks.external_calls(), 0);
    assert!(mocks.store.applied().is_empty());
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let mocks = Mocks::default();
    let enricher = Enricher::new(mocks.deps());

    assert_eq!(enricher.discover_github(&[]).await.unwrap_err(), BatchError::Empty);
}

#[tokio::test]
async fn bad_ids_fail_alone_and_results_keep_input_order() {
    let mut dev = ada();
    dev.github_username = Some("ada".into());
    let mocks = with_store(&dev);
    let enricher = Enricher::new(mocks.deps());
    let missing = uuid::Uuid::new_v4().to_string();

    let response = enricher
        .discover_github(&["not-a-uuid".to_string(), dev.id.to_string(), missing.clone()])
        .await
        .unwrap();

    let statuses: Vec<ResultStatus> = response.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ResultStatus::Failed, ResultStatus::AlreadyHas, ResultStatus::Failed]
    );
    assert_eq!(response.results[0].identity_id, "not-a-uuid");
    assert_eq!(response.results[2].identity_id, missing);
}

#[tokio::test]
async fn extras_never_overwrite_existing_handles() {
    let mut dev = ada();
    dev.email = Some("ada@example.com".into());
    dev.twitter_username = Some("countess".into());
    let mocks = Mocks {
        github: Arc::new(
            MockGithubDirectory::new()
                .on_search("ada@example.com in:email", &["ada"])
                .on_user(GithubUser {
                    login: "ada".into(),
                    twitter_username: Some("ada_l".into()),
                    ..Default::default()
                }),
        ),
        ..with_store(&dev)
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::Found);
    let writes = mocks.store.writes_for(dev.id);
    assert_eq!(writes.len(), 1);
    assert!(writes[0].contains(Column::GithubUsername));
    assert!(!writes[0].contains(Column::TwitterUsername));
    assert_eq!(
        mocks.store.record(dev.id).unwrap().twitter_username.as_deref(),
        Some("countess")
    );
}

// ---------------------------------------------------------------------------
// Cascade ordering with scripted resolvers
// ---------------------------------------------------------------------------

fn cascade_of(stages: &[Arc<ScriptedResolver>]) -> Cascade {
    Cascade::new(stages.iter().map(|s| s.clone() as Arc<dyn Resolver>).collect())
}

#[tokio::test]
async fn first_hit_stops_the_cascade() {
    let stages = [
        Arc::new(ScriptedResolver::found(DiscoverySource::GithubApi, "octocat")),
        Arc::new(ScriptedResolver::found(DiscoverySource::Serper, "someone-else")),
        Arc::new(ScriptedResolver::miss(DiscoverySource::WebsiteCrawl)),
        Arc::new(ScriptedResolver::miss(DiscoverySource::WebsiteGoogle)),
    ];
    let dev = ada();
    let mocks = with_store(&dev);
    let enricher = Enricher::with_cascade(mocks.deps(), cascade_of(&stages));

    let response = enricher.discover_github(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].source, Some(DiscoverySource::GithubApi));
    assert_eq!(stages[0].calls(), 1);
    assert!(stages[1..].iter().all(|s| s.calls() == 0));
}

#[tokio::test(start_paused = true)]
async fn timed_out_stage_is_a_miss() {
    let stages = [
        Arc::new(
            ScriptedResolver::found(DiscoverySource::GithubApi, "too-late")
                .delayed(Duration::from_secs(60))
                .with_timeout(Duration::from_secs(30)),
        ),
        Arc::new(ScriptedResolver::new(
            DiscoverySource::Serper,
            Outcome::Error("provider returned 500".into()),
        )),
        Arc::new(ScriptedResolver::found(DiscoverySource::WebsiteCrawl, "octocat")),
    ];
    let cascade = cascade_of(&stages);

    let run = cascade.run(&ada().identity()).await;

    assert_eq!(run.found, Some(("octocat".to_string(), DiscoverySource::WebsiteCrawl)));
    let results: Vec<StageResult> = run.trace.iter().map(|a| a.result).collect();
    assert_eq!(
        results,
        vec![StageResult::TimedOut, StageResult::Error, StageResult::Found]
    );
    assert_eq!(run.trace[1].error.as_deref(), Some("provider returned 500"));
}

#[tokio::test]
async fn all_misses_is_not_found_with_full_trace() {
    let stages = [
        Arc::new(ScriptedResolver::miss(DiscoverySource::GithubApi)),
        Arc::new(ScriptedResolver::miss(DiscoverySource::Serper)),
        Arc::new(ScriptedResolver::miss(DiscoverySource::WebsiteCrawl)),
        Arc::new(ScriptedResolver::miss(DiscoverySource::WebsiteGoogle)),
    ];
    let dev = ada();
    let mocks = with_store(&dev);
    let enricher = Enricher::with_cascade(mocks.deps(), cascade_of(&stages));
    let record = mocks.store.record(dev.id).unwrap();

    let (result, run) = enricher.discover_one(&record).await;

    assert_eq!(result.status, ResultStatus::NotFound);
    assert_eq!(run.unwrap().trace.len(), 4);
    assert!(stages.iter().all(|s| s.calls() == 1));
}
