//! Driver tests against scripted in-memory collaborators.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Collaborators, PipelineDriver};
use crate::config::{BackoffKind, Config};
use crate::error::{Error, Result};
use crate::pacing::{NoOpPacer, Pacer};
use crate::profile::{ProfileSettings, StaticProfileProvider};
use crate::providers::{ArtifactResolver, ArtifactStore, SearchProvider};
use crate::types::{
    CandidateItem, DownloadReference, Event, ItemId, ItemStatus, SearchFilters, StoredArtifact,
};

fn item(id: &str) -> CandidateItem {
    CandidateItem {
        id: ItemId::from(id),
        title: format!("clip {id}"),
        description: String::new(),
        author: "someone".into(),
        duration_secs: 30,
        tags: vec![],
        source_url: format!("https://clips.example/v/{id}"),
    }
}

fn reference(id: &str) -> DownloadReference {
    DownloadReference {
        url: format!("https://cdn.clips.example/{id}.mp4"),
        file_name: format!("{id}.mp4"),
    }
}

fn artifact(id: &str) -> StoredArtifact {
    StoredArtifact {
        page_url: format!("https://filehost.example/f/{id}"),
        direct_link: None,
        file_id: id.to_string(),
    }
}

/// Fast test config: tiny retry delays, default policy otherwise
fn test_config() -> Config {
    let mut config = Config::default();
    config.retry.base_delay = Duration::from_millis(5);
    config
}

/// Search fake returning a fixed item list
struct FixedSearch {
    items: Vec<CandidateItem>,
    calls: AtomicU32,
}

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(
        &self,
        _keyword: &str,
        count: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<CandidateItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .items
            .iter()
            .filter(|item| filters.allows(item))
            .take(count)
            .cloned()
            .collect())
    }
}

/// Resolver fake that fails a scripted number of times per item before
/// succeeding; `u32::MAX` means always fail
#[derive(Default)]
struct ScriptedResolver {
    fail_first: HashMap<String, u32>,
    validation_failure: bool,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedResolver {
    fn failing_first(fail_first: &[(&str, u32)]) -> Self {
        Self {
            fail_first: fail_first
                .iter()
                .map(|(id, n)| (id.to_string(), *n))
                .collect(),
            ..Self::default()
        }
    }

    fn calls_for(&self, id: &str) -> u32 {
        *self.calls.lock().unwrap().get(id).unwrap_or(&0)
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ArtifactResolver for ScriptedResolver {
    async fn resolve(&self, item: &CandidateItem) -> Result<DownloadReference> {
        let id = item.id.to_string();
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if self.validation_failure {
            return Err(Error::Validation("source URL off-pattern".into()));
        }
        let failures = self.fail_first.get(&id).copied().unwrap_or(0);
        if call <= failures {
            return Err(Error::upstream(503, "resolve backend flaked"));
        }
        Ok(reference(&id))
    }
}

/// Store fake with the same scripting scheme as [`ScriptedResolver`]
#[derive(Default)]
struct ScriptedStore {
    fail_first: HashMap<String, u32>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedStore {
    fn failing_first(fail_first: &[(&str, u32)]) -> Self {
        Self {
            fail_first: fail_first
                .iter()
                .map(|(id, n)| (id.to_string(), *n))
                .collect(),
            ..Self::default()
        }
    }

    fn calls_for(&self, id: &str) -> u32 {
        *self.calls.lock().unwrap().get(id).unwrap_or(&0)
    }
}

#[async_trait]
impl ArtifactStore for ScriptedStore {
    async fn store(
        &self,
        _reference: &DownloadReference,
        file_name: &str,
    ) -> Result<StoredArtifact> {
        let id = file_name.trim_end_matches(".mp4").to_string();
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let entry = calls.entry(id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let failures = self.fail_first.get(&id).copied().unwrap_or(0);
        if call <= failures {
            return Err(Error::upstream(500, "upload backend flaked"));
        }
        Ok(artifact(&id))
    }
}

/// Pacer fake recording every requested wait without sleeping
#[derive(Default)]
struct RecordingPacer {
    waits: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

struct Fakes {
    search: Arc<FixedSearch>,
    resolver: Arc<ScriptedResolver>,
    store: Arc<ScriptedStore>,
}

fn driver_with(
    config: Config,
    resolver: ScriptedResolver,
    store: ScriptedStore,
    pacer: Arc<dyn Pacer>,
) -> (PipelineDriver, Fakes) {
    let search = Arc::new(FixedSearch {
        items: vec![item("a"), item("b"), item("c")],
        calls: AtomicU32::new(0),
    });
    let resolver = Arc::new(resolver);
    let store = Arc::new(store);
    let driver = PipelineDriver::with_collaborators(
        config,
        Collaborators {
            search: search.clone(),
            resolver: resolver.clone(),
            store: store.clone(),
            pacer: Some(pacer),
        },
    )
    .unwrap();
    (
        driver,
        Fakes {
            search,
            resolver,
            store,
        },
    )
}

/// Drain events until (and including) the first terminal batch event
async fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match rx.recv().await {
            Ok(event) => {
                let terminal = matches!(
                    event,
                    Event::BatchCompleted { .. } | Event::BatchCancelled
                );
                events.push(event);
                if terminal {
                    return events;
                }
            }
            Err(_) => return events,
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario: flaky resolve recovers within the budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn flaky_resolve_recovers_and_batch_fully_succeeds() {
    let (driver, fakes) = driver_with(
        test_config(),
        ScriptedResolver::failing_first(&[("b", 2)]),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );

    let report = driver.run_batch(vec![item("a"), item("b"), item("c")]).await;

    assert_eq!(report.success_count, 3);
    assert_eq!(report.failure_count, 0);
    assert_eq!(
        report.succeeded,
        vec![ItemId::from("a"), ItemId::from("b"), ItemId::from("c")]
    );

    let b = driver.get_state(&ItemId::from("b")).unwrap();
    assert_eq!(b.status, ItemStatus::Completed);
    assert_eq!(b.progress, 100);
    assert_eq!(b.attempt, 2, "two failed attempts before success");
    assert!(b.result.is_some());
    assert!(b.error.is_none());

    assert_eq!(fakes.resolver.calls_for("b"), 3);
    assert_eq!(fakes.store.calls_for("b"), 1);
}

// ---------------------------------------------------------------------------
// Scenario: store exhausts the budget; the batch continues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_exhaustion_fails_item_but_batch_continues() {
    let (driver, fakes) = driver_with(
        test_config(),
        ScriptedResolver::default(),
        ScriptedStore::failing_first(&[("a", u32::MAX)]),
        Arc::new(NoOpPacer),
    );

    let report = driver.run_batch(vec![item("a"), item("b")]).await;

    assert_eq!(report.success_count, 1);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.succeeded, vec![ItemId::from("b")]);

    let a = driver.get_state(&ItemId::from("a")).unwrap();
    assert_eq!(a.status, ItemStatus::Failed);
    assert!(a.error.is_some());
    assert_eq!(a.attempt, 3, "budget fully consumed");
    assert!(a.result.is_none());
    assert_ne!(a.progress, 100);

    // One resolve plus max_retries store calls; the budget is shared, so the
    // store gets all three calls only because resolve spent none
    assert_eq!(fakes.resolver.calls_for("a"), 1);
    assert_eq!(fakes.store.calls_for("a"), 3);

    let b = driver.get_state(&ItemId::from("b")).unwrap();
    assert_eq!(b.status, ItemStatus::Completed);
}

// ---------------------------------------------------------------------------
// Scenario: empty batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_batch_reports_zero_without_stage_calls() {
    let (driver, fakes) = driver_with(
        test_config(),
        ScriptedResolver::default(),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );
    let mut rx = driver.subscribe();

    let report = driver.run_batch(vec![]).await;

    assert_eq!(report.success_count, 0);
    assert_eq!(report.failure_count, 0);
    assert!(report.succeeded.is_empty());
    assert_eq!(fakes.resolver.total_calls(), 0);
    assert_eq!(driver.overall_progress(), 0);

    let events = drain_events(&mut rx).await;
    assert!(matches!(events.first(), Some(Event::BatchStarted { total: 0 })));
    assert!(matches!(
        events.last(),
        Some(Event::BatchCompleted {
            success_count: 0,
            failure_count: 0
        })
    ));
}

// ---------------------------------------------------------------------------
// Terminal statuses and aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_item_is_terminal_after_a_batch() {
    let (driver, _fakes) = driver_with(
        test_config(),
        ScriptedResolver::failing_first(&[("b", u32::MAX)]),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );

    driver.run_batch(vec![item("a"), item("b"), item("c")]).await;

    for state in driver.snapshot() {
        assert!(
            state.status.is_terminal(),
            "item {} ended in non-terminal status {:?}",
            state.item_id,
            state.status
        );
        match state.status {
            ItemStatus::Completed => {
                assert_eq!(state.progress, 100);
                assert!(state.result.is_some());
                assert!(state.error.is_none());
            }
            ItemStatus::Failed => {
                assert!(state.error.is_some());
                assert_ne!(state.progress, 100);
            }
            _ => unreachable!(),
        }
    }

    let counts = driver.status_counts();
    assert_eq!(counts.completed, 2);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.pending + counts.processing + counts.waiting, 0);
}

#[tokio::test]
async fn fully_successful_batch_reaches_one_hundred_percent() {
    let (driver, _fakes) = driver_with(
        test_config(),
        ScriptedResolver::default(),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );

    driver.run_batch(vec![item("a"), item("b")]).await;
    assert_eq!(driver.overall_progress(), 100);
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_failure_is_never_retried() {
    let resolver = ScriptedResolver {
        validation_failure: true,
        ..ScriptedResolver::default()
    };
    let (driver, fakes) = driver_with(
        test_config(),
        resolver,
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );

    let report = driver.run_batch(vec![item("a")]).await;

    assert_eq!(report.failure_count, 1);
    assert_eq!(fakes.resolver.calls_for("a"), 1, "no retry on validation");
    let a = driver.get_state(&ItemId::from("a")).unwrap();
    assert_eq!(a.status, ItemStatus::Failed);
    assert_eq!(a.attempt, 0, "validation consumes no retry budget");
}

#[tokio::test]
async fn retry_events_narrate_the_linear_schedule() {
    let mut config = test_config();
    config.retry.base_delay = Duration::from_millis(10);
    config.retry.backoff = BackoffKind::Linear;

    let (driver, _fakes) = driver_with(
        config,
        ScriptedResolver::failing_first(&[("a", 2)]),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );
    let mut rx = driver.subscribe();

    driver.run_batch(vec![item("a")]).await;
    let events = drain_events(&mut rx).await;

    let retries: Vec<(u32, u64)> = events
        .iter()
        .filter_map(|e| match e {
            Event::RetryScheduled {
                attempt, delay_ms, ..
            } => Some((*attempt, *delay_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![(1, 10), (2, 20)]);

    // The failed attempts flip the item through Waiting before re-entering
    // Downloading; completion still lands afterwards
    assert!(events.iter().any(|e| matches!(e, Event::ItemCompleted { .. })));
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pacing_runs_between_items_and_before_each_resolve() {
    let mut config = test_config();
    config.pacing.inter_item_delay = Duration::from_millis(123);
    config.pacing.pre_resolve_delay = Duration::from_millis(45);

    let pacer = Arc::new(RecordingPacer::default());
    let (driver, _fakes) = driver_with(
        config,
        ScriptedResolver::default(),
        ScriptedStore::default(),
        pacer.clone(),
    );

    driver.run_batch(vec![item("a"), item("b"), item("c")]).await;

    let waits = pacer.waits.lock().unwrap().clone();
    assert_eq!(
        waits,
        vec![
            Duration::from_millis(45),  // pre-resolve, item a (no inter-item wait first)
            Duration::from_millis(123), // between a and b
            Duration::from_millis(45),
            Duration::from_millis(123), // between b and c
            Duration::from_millis(45),
        ]
    );
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_batch_leaves_unstarted_items_pending() {
    let (driver, fakes) = driver_with(
        test_config(),
        ScriptedResolver::default(),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );
    let mut rx = driver.subscribe();

    driver.cancel();
    let report = driver.run_batch(vec![item("a"), item("b")]).await;

    assert_eq!(report.success_count, 0);
    assert_eq!(report.failure_count, 0);
    assert_eq!(fakes.resolver.total_calls(), 0);
    for state in driver.snapshot() {
        assert_eq!(state.status, ItemStatus::Pending);
    }

    let events = drain_events(&mut rx).await;
    assert!(events.iter().any(|e| matches!(e, Event::BatchCancelled)));
    assert!(!driver.is_running());
}

// ---------------------------------------------------------------------------
// Collect and profile resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collect_delegates_to_the_search_collaborator() {
    let (driver, fakes) = driver_with(
        test_config(),
        ScriptedResolver::default(),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );

    let items = driver
        .collect("cats", 2, &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(fakes.search.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn profile_overrides_shrink_the_retry_budget() {
    let (mut driver, fakes) = driver_with(
        test_config(),
        ScriptedResolver::failing_first(&[("a", u32::MAX)]),
        ScriptedStore::default(),
        Arc::new(NoOpPacer),
    );

    let provider = StaticProfileProvider::new().with_profile(
        "alice",
        ProfileSettings {
            max_retries: Some(1),
            ..ProfileSettings::default()
        },
    );
    driver.configure_for(&provider, "alice").await.unwrap();

    driver.run_batch(vec![item("a")]).await;

    assert_eq!(
        fakes.resolver.calls_for("a"),
        1,
        "profile capped the budget at a single call"
    );
    let a = driver.get_state(&ItemId::from("a")).unwrap();
    assert_eq!(a.status, ItemStatus::Failed);
    assert_eq!(a.attempt, 1);
}
