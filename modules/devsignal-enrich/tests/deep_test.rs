//! Deep enrichment: explicit submission, then collect-driven polling with
//! the task id persisted on the developer row.

use std::sync::Arc;

use devsignal_common::{DeveloperRecord, DiscoverySource, EnrichedProfile, ResultStatus, TaskStatus};
use devsignal_enrich::testing::*;
use devsignal_enrich::workflows::{BatchError, EnrichDeps, Enricher};

fn with_task(name: &str, task_id: &str) -> DeveloperRecord {
    DeveloperRecord {
        enrichment_task_id: Some(task_id.into()),
        ..developer(name)
    }
}

#[tokio::test]
async fn submission_persists_the_task_id() {
    let dev = developer("Ada Lovelace");
    let mocks = Mocks {
        store: Arc::new(MockStore::new().with(dev.clone())),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.submit_deep(&[dev.id.to_string()]).await.unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, ResultStatus::Pending);
    assert_eq!(result.task_id.as_deref(), Some("task-1"));
    assert_eq!(
        mocks.store.record(dev.id).unwrap().enrichment_task_id.as_deref(),
        Some("task-1")
    );
    assert!(mocks.deep.polled().is_empty(), "submission never polls");
}

#[tokio::test]
async fn outstanding_task_is_not_resubmitted() {
    let dev = with_task("Ada Lovelace", "task-9");
    let mocks = Mocks {
        store: Arc::new(MockStore::new().with(dev.clone())),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.submit_deep(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::Pending);
    assert_eq!(response.results[0].task_id.as_deref(), Some("task-9"));
    assert!(mocks.deep.submitted().is_empty());
}

#[tokio::test]
async fn fully_known_developer_is_already_has() {
    let dev = DeveloperRecord {
        github_username: Some("ada".into()),
        personal_email: Some("ada@lovelace.dev".into()),
        twitter_username: Some("ada_l".into()),
        website_url: Some("https://ada.dev".into()),
        ..developer("Ada Lovelace")
    };
    let mocks = Mocks {
        store: Arc::new(MockStore::new().with(dev.clone())),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.submit_deep(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::AlreadyHas);
    assert!(mocks.deep.submitted().is_empty());
}

#[tokio::test]
async fn rejected_submission_fails_without_a_task() {
    let dev = developer("Ada Lovelace");
    let mocks = Mocks {
        store: Arc::new(MockStore::new().with(dev.clone())),
        deep: Arc::new(MockDeepEnricher::new().failing_submit()),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.submit_deep(&[dev.id.to_string()]).await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::Failed);
    assert_eq!(mocks.store.record(dev.id).unwrap().enrichment_task_id, None);
}

#[tokio::test]
async fn collect_follows_each_task_state() {
    let running = with_task("A Running", "t-processing");
    let failed = with_task("B Failed", "t-failed");
    let done = with_task("C Done", "t-completed");
    let unrelated = developer("D Untouched");
    let mocks = Mocks {
        store: Arc::new(
            MockStore::new()
                .with(running.clone())
                .with(failed.clone())
                .with(done.clone())
                .with(unrelated.clone()),
        ),
        deep: Arc::new(
            MockDeepEnricher::new()
                .on_poll("t-processing", TaskStatus::Processing, EnrichedProfile::default())
                .on_poll("t-failed", TaskStatus::Failed, EnrichedProfile::default())
                .on_poll(
                    "t-completed",
                    TaskStatus::Completed,
                    EnrichedProfile {
                        github_username: Some("cdone".into()),
                        personal_email: Some("C@Done.dev".into()),
                        ..Default::default()
                    },
                ),
        ),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.collect_deep().await.unwrap();

    assert_eq!(response.results.len(), 3);
    assert_eq!(mocks.deep.polled().len(), 3);

    let processing = &response.results[0];
    assert_eq!(processing.status, ResultStatus::Pending);
    assert_eq!(processing.task_id.as_deref(), Some("t-processing"));
    assert_eq!(
        mocks.store.record(running.id).unwrap().enrichment_task_id.as_deref(),
        Some("t-processing")
    );

    assert_eq!(response.results[1].status, ResultStatus::Failed);
    assert_eq!(mocks.store.record(failed.id).unwrap().enrichment_task_id, None);

    let completed = &response.results[2];
    assert_eq!(completed.status, ResultStatus::Found);
    assert_eq!(completed.source, Some(DiscoverySource::Sixtyfour));
    assert_eq!(completed.github_url.as_deref(), Some("https://github.com/cdone"));
    assert_eq!(
        completed.fields_found,
        vec!["github_username".to_string(), "personal_email".to_string()]
    );
    let stored = mocks.store.record(done.id).unwrap();
    assert_eq!(stored.enrichment_task_id, None);
    assert_eq!(stored.personal_email.as_deref(), Some("c@done.dev"));
}

#[tokio::test]
async fn poll_errors_keep_the_task_for_the_next_collect() {
    let dev = with_task("Ada Lovelace", "t-unknown");
    let mocks = Mocks {
        store: Arc::new(MockStore::new().with(dev.clone())),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.collect_deep().await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::Failed);
    assert_eq!(
        mocks.store.record(dev.id).unwrap().enrichment_task_id.as_deref(),
        Some("t-unknown")
    );
}

#[tokio::test]
async fn completed_task_never_overwrites_known_handles() {
    let dev = DeveloperRecord {
        github_username: Some("ada".into()),
        ..with_task("Ada Lovelace", "t-completed")
    };
    let mocks = Mocks {
        store: Arc::new(MockStore::new().with(dev.clone())),
        deep: Arc::new(MockDeepEnricher::new().on_poll(
            "t-completed",
            TaskStatus::Completed,
            EnrichedProfile {
                github_username: Some("someone-else".into()),
                ..Default::default()
            },
        )),
        ..Default::default()
    };
    let enricher = Enricher::new(mocks.deps());

    let response = enricher.collect_deep().await.unwrap();

    assert_eq!(response.results[0].status, ResultStatus::NotFound);
    let stored = mocks.store.record(dev.id).unwrap();
    assert_eq!(stored.github_username.as_deref(), Some("ada"));
    assert_eq!(stored.enrichment_task_id, None);
}

#[tokio::test]
async fn deep_enrichment_needs_a_provider() {
    let mocks = Mocks::default();
    let deps = EnrichDeps {
        deep: None,
        ..mocks.deps()
    };
    let enricher = Enricher::new(deps);

    assert_eq!(
        enricher.collect_deep().await.unwrap_err(),
        BatchError::Unavailable("deep enrichment")
    );
    assert_eq!(
        enricher.submit_deep(&["x".to_string()]).await.unwrap_err(),
        BatchError::Unavailable("deep enrichment")
    );
}
