//! Integration tests for the sync pass
//!
//! These tests drive [`SyncCoordinator`] against a temporary run directory:
//! - First pass enriches everything and raises the rebuild flag
//! - Rerun without upstream change is idempotent and fetches nothing
//! - Removed and changed records are detected
//! - Failed enrichment is retried on the next pass, and a retry that fails
//!   again over unchanged source fields is not a change
//! - Upstream keys that collide with enrichment fields do not corrupt state
//! - Missing snapshot and corrupt state abort without touching artifacts

use async_trait::async_trait;
use core_library::{EditionEnrichment, SyncState};
use core_metadata::{EditionMetadataSource, MetadataError};
use core_runtime::config::{FetchSettings, RunLayout};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_sync::{
    BoundedFetcher, EditionEnricher, FileSnapshotSource, JsonStateStore, StateStore,
    SyncCoordinator, SyncError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex as AsyncMutex;

// ============================================================================
// Fakes
// ============================================================================

/// Edition source that records every lookup and fails the configured ids.
struct FakeEditionSource {
    calls: AsyncMutex<Vec<String>>,
    failing: AsyncMutex<HashSet<String>>,
}

impl FakeEditionSource {
    fn new() -> Self {
        Self {
            calls: AsyncMutex::new(Vec::new()),
            failing: AsyncMutex::new(HashSet::new()),
        }
    }

    async fn fail(&self, edition_id: &str) {
        self.failing.lock().await.insert(edition_id.to_string());
    }

    async fn recover(&self) {
        self.failing.lock().await.clear();
    }

    async fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().await)
    }
}

#[async_trait]
impl EditionMetadataSource for FakeEditionSource {
    async fn fetch_edition(&self, edition_id: &str) -> core_metadata::Result<EditionEnrichment> {
        self.calls.lock().await.push(edition_id.to_string());

        if self.failing.lock().await.contains(edition_id) {
            return Err(MetadataError::TransientNetwork(format!(
                "{} unavailable",
                edition_id
            )));
        }

        Ok(EditionEnrichment {
            subjects: Some(format!("Subjects for {}", edition_id)),
            summary: Some(format!("Summary for {}", edition_id)),
            contributors: vec!["Editor".to_string()],
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    _dir: TempDir,
    layout: RunLayout,
    source: Arc<FakeEditionSource>,
    coordinator: SyncCoordinator,
    store: JsonStateStore,
}

impl Harness {
    fn new() -> Self {
        Self::with_event_bus(None)
    }

    fn with_event_bus(event_bus: Option<EventBus>) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        let source = Arc::new(FakeEditionSource::new());
        let store = JsonStateStore::new(layout.state_path());

        let fetcher = BoundedFetcher::new(
            FetchSettings::enrichment()
                .with_max_attempts(2)
                .with_base_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2)),
        );

        let mut coordinator = SyncCoordinator::new(
            Arc::new(FileSnapshotSource::new(layout.snapshot_path())),
            Arc::new(store.clone()),
            EditionEnricher::new(source.clone(), fetcher),
            layout.clean_catalog_path(),
        );
        if let Some(bus) = event_bus {
            coordinator = coordinator.with_event_bus(bus);
        }

        Self {
            _dir: dir,
            layout,
            source,
            coordinator,
            store,
        }
    }

    fn write_snapshot(&self, records: Value) {
        fs::write(
            self.layout.snapshot_path(),
            serde_json::to_vec(&records).unwrap(),
        )
        .unwrap();
    }

    fn state(&self) -> SyncState {
        self.store.load().unwrap()
    }

    fn clean_catalog(&self) -> Vec<Value> {
        serde_json::from_slice(&fs::read(self.layout.clean_catalog_path()).unwrap()).unwrap()
    }
}

fn book(id: &str, title: &str, edition: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": "Herbert, Frank",
        "publicationDate": "1965",
        "materials": [{
            "name": "Book",
            "type": "PHYSICAL",
            "callNumber": "SF HER",
            "editions": [{"id": edition, "publicationDate": "1965"}]
        }]
    })
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_first_pass_enriches_everything() {
    let h = Harness::new();
    h.write_snapshot(json!([book("b", "Dune Messiah", "e-b"), book("a", "Dune", "e-a")]));

    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.new, 2);
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.enrichment_failed, 0);
    assert!(summary.needs_index_rebuild);

    let state = h.state();
    let ids: Vec<_> = state.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(state.needs_index_rebuild);
    assert!(state.last_sync_at.is_some());
    assert_eq!(state.records[0].summary.as_deref(), Some("Summary for e-a"));
    assert!(state.records.iter().all(|r| r.content_fingerprint.is_some()));

    let clean = h.clean_catalog();
    assert_eq!(clean.len(), 2);
    assert_eq!(clean[0]["id"], "a");
    assert_eq!(clean[0]["subjects"], "Subjects for e-a");
    assert!(clean[0].get("embedded").is_none());
    assert!(clean[0].get("embedding").is_none());
    assert!(clean[0].get("contentFingerprint").is_none());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let h = Harness::new();
    h.write_snapshot(json!([book("a", "Dune", "e-a"), book("b", "Dune Messiah", "e-b")]));

    h.coordinator.run_pass().await.unwrap();
    let first = h.state();
    h.source.take_calls().await;

    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.new, 0);
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.unchanged, 2);
    assert!(h.source.take_calls().await.is_empty());

    let second = h.state();
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn test_rebuild_flag_not_cleared_by_quiet_pass() {
    let h = Harness::new();
    h.write_snapshot(json!([book("a", "Dune", "e-a")]));
    h.coordinator.run_pass().await.unwrap();

    let summary = h.coordinator.run_pass().await.unwrap();
    assert!(summary.needs_index_rebuild);
    assert!(h.state().needs_index_rebuild);
}

#[tokio::test]
async fn test_quiet_pass_after_rebuild_keeps_flag_clear() {
    let h = Harness::new();
    h.write_snapshot(json!([book("a", "Dune", "e-a")]));
    h.coordinator.run_pass().await.unwrap();

    let mut state = h.state();
    state.needs_index_rebuild = false;
    h.store.save(&state).unwrap();

    let summary = h.coordinator.run_pass().await.unwrap();
    assert!(!summary.needs_index_rebuild);
}

#[tokio::test]
async fn test_changed_and_removed_records() {
    let h = Harness::new();
    h.write_snapshot(json!([
        book("1", "A", "e-1"),
        book("2", "Two", "e-2"),
        book("3", "Three", "e-3")
    ]));
    h.coordinator.run_pass().await.unwrap();

    let mut state = h.state();
    state.needs_index_rebuild = false;
    h.store.save(&state).unwrap();
    h.source.take_calls().await;

    h.write_snapshot(json!([book("1", "B", "e-1"), book("2", "Two", "e-2")]));
    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.changed, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.removed, 1);
    assert!(summary.needs_index_rebuild);
    assert_eq!(h.source.take_calls().await, vec!["e-1".to_string()]);

    let state = h.state();
    let titles: HashMap<_, _> = state
        .records
        .iter()
        .map(|r| (r.id.as_str(), r.title.as_deref()))
        .collect();
    assert_eq!(titles.len(), 2);
    assert_eq!(titles["1"], Some("B"));
    assert!(!titles.contains_key("3"));

    let clean_ids: Vec<_> = h
        .clean_catalog()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(clean_ids, vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn test_failed_enrichment_retried_next_pass() {
    let h = Harness::new();
    h.source.fail("e-b").await;
    h.write_snapshot(json!([book("a", "Dune", "e-a"), book("b", "Dune Messiah", "e-b")]));

    let summary = h.coordinator.run_pass().await.unwrap();
    assert_eq!(summary.enrichment_failed, 1);

    let state = h.state();
    let failed = state.records.iter().find(|r| r.id == "b").unwrap();
    assert_eq!(failed.title.as_deref(), Some("Dune Messiah"));
    assert!(failed.content_fingerprint.is_none());
    assert!(failed.summary.is_none());

    let calls = h.source.take_calls().await;
    assert_eq!(calls.iter().filter(|c| *c == "e-b").count(), 2);

    h.source.recover().await;
    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.changed, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.retried, 1);
    assert_eq!(summary.enrichment_failed, 0);
    assert_eq!(h.source.take_calls().await, vec!["e-b".to_string()]);

    let state = h.state();
    let recovered = state.records.iter().find(|r| r.id == "b").unwrap();
    assert_eq!(recovered.summary.as_deref(), Some("Summary for e-b"));
    assert!(recovered.content_fingerprint.is_some());
}

#[tokio::test]
async fn test_repeated_enrichment_failure_is_not_a_change() {
    let h = Harness::new();
    h.source.fail("e-b").await;
    h.write_snapshot(json!([book("a", "Dune", "e-a"), book("b", "Dune Messiah", "e-b")]));
    h.coordinator.run_pass().await.unwrap();

    // Embedded and rebuilt since the first pass
    let mut state = h.state();
    for record in &mut state.records {
        record.set_embedding(vec![1.0, 0.0]);
    }
    state.needs_index_rebuild = false;
    h.store.save(&state).unwrap();
    h.source.take_calls().await;

    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.new, 0);
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.removed, 0);
    assert_eq!(summary.unchanged, 2);
    assert_eq!(summary.retried, 1);
    assert_eq!(summary.enrichment_failed, 1);
    assert!(!summary.needs_index_rebuild);

    // Still looked up, but the stored copy is kept as it was
    let calls = h.source.take_calls().await;
    assert!(calls.iter().all(|c| c == "e-b"));
    assert!(!calls.is_empty());

    let after = h.state();
    assert!(!after.needs_index_rebuild);
    assert_eq!(after.records, state.records);
}

#[tokio::test]
async fn test_upstream_summary_key_survives_reload() {
    let h = Harness::new();
    let mut record = book("a", "Dune", "e-a");
    record["summary"] = json!("Upstream blurb");
    h.write_snapshot(json!([record]));

    h.coordinator.run_pass().await.unwrap();
    let text = fs::read_to_string(h.layout.state_path()).unwrap();
    assert_eq!(text.matches("\"summary\"").count(), 1);

    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.unchanged, 1);
    assert_eq!(h.state().records[0].summary.as_deref(), Some("Summary for e-a"));
    assert_eq!(h.clean_catalog()[0]["summary"], "Summary for e-a");
}

#[tokio::test]
async fn test_records_without_id_are_dropped() {
    let h = Harness::new();
    h.write_snapshot(json!([{"title": "Orphan"}, book("a", "Dune", "e-a")]));

    let summary = h.coordinator.run_pass().await.unwrap();

    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.total_records, 1);
}

#[tokio::test]
async fn test_missing_snapshot_leaves_state_untouched() {
    let h = Harness::new();
    h.write_snapshot(json!([book("a", "Dune", "e-a")]));
    h.coordinator.run_pass().await.unwrap();
    let before = fs::read(h.layout.state_path()).unwrap();

    fs::remove_file(h.layout.snapshot_path()).unwrap();
    let result = h.coordinator.run_pass().await;

    assert!(matches!(result, Err(SyncError::MissingSnapshot { .. })));
    assert_eq!(fs::read(h.layout.state_path()).unwrap(), before);
}

#[tokio::test]
async fn test_corrupt_state_is_fatal() {
    let h = Harness::new();
    h.write_snapshot(json!([book("a", "Dune", "e-a")]));
    fs::write(h.layout.state_path(), "not json").unwrap();

    let result = h.coordinator.run_pass().await;

    assert!(matches!(result, Err(SyncError::StateCorruption { .. })));
    assert_eq!(fs::read_to_string(h.layout.state_path()).unwrap(), "not json");
    assert!(!h.layout.clean_catalog_path().exists());
    assert!(h.source.take_calls().await.is_empty());
}

#[tokio::test]
async fn test_pass_events() {
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let h = Harness::with_event_bus(Some(bus));
    h.write_snapshot(json!([book("a", "Dune", "e-a")]));

    h.coordinator.run_pass().await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert!(matches!(
        received.first(),
        Some(CoreEvent::Sync(SyncEvent::Started { .. }))
    ));
    assert!(matches!(
        received.last(),
        Some(CoreEvent::Sync(SyncEvent::Completed { new: 1, .. }))
    ));
}
