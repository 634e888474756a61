//! End-to-end assignment flow tests
//!
//! Drives AssignmentService against in-memory fakes: a version-guarded
//! schedule store, a call-counting collector directory, and a recording
//! escalation notifier.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use hakot_backend::assignment::ports::{
    AssignmentChange, CollectorDirectory, DirectoryError, EscalationNotifier, NotifierError,
    ScheduleStore, StoreError, UnstaffedEvent,
};
use hakot_backend::assignment::{AssignmentError, AssignmentService, DeclineOutcome};
use hakot_backend::models::{
    CollectionSchedule, CollectorCandidate, DeclineEntry, DeclineReasonCode, ScheduleStatus,
    ScheduleType,
};

// ---------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------

/// Single-schedule store with the same compare-and-swap contract as the
/// production RPC: the commit succeeds only against the expected version.
struct MemoryStore {
    schedule: Mutex<Option<CollectionSchedule>>,
    history: Mutex<Vec<DeclineEntry>>,
}

impl MemoryStore {
    fn seeded(schedule: CollectionSchedule) -> Arc<Self> {
        Arc::new(Self {
            schedule: Mutex::new(Some(schedule)),
            history: Mutex::new(Vec::new()),
        })
    }

    fn empty() -> Arc<Self> {
        Arc::new(Self {
            schedule: Mutex::new(None),
            history: Mutex::new(Vec::new()),
        })
    }

    fn snapshot(&self) -> CollectionSchedule {
        self.schedule.lock().unwrap().clone().unwrap()
    }

    fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn fetch_schedule(
        &self,
        schedule_id: &str,
    ) -> Result<Option<CollectionSchedule>, StoreError> {
        let snapshot = self.schedule.lock().unwrap().clone();
        // Snapshot first, then yield, so two in-flight calls can both
        // observe the same version before either commits.
        tokio::task::yield_now().await;
        Ok(snapshot.filter(|s| s.id == schedule_id))
    }

    async fn fetch_decline_history(
        &self,
        schedule_id: &str,
    ) -> Result<Vec<DeclineEntry>, StoreError> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    async fn commit_assignment(
        &self,
        schedule_id: &str,
        expected_version: i64,
        change: AssignmentChange,
    ) -> Result<CollectionSchedule, StoreError> {
        let mut slot = self.schedule.lock().unwrap();
        let schedule = match slot.as_mut() {
            Some(s) if s.id == schedule_id => s,
            _ => return Err(StoreError::RowMissing),
        };
        if schedule.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        schedule.status = change.status;
        schedule.primary_collector_id = change.primary_collector_id;
        schedule.backup_collector_id = change.backup_collector_id;
        schedule.confirmed_by_collector = change.confirmed_by_collector;
        schedule.confirmed_at = change.confirmed_at;
        schedule.version += 1;
        schedule.updated_at = Utc::now();
        let updated = schedule.clone();
        drop(slot);
        if let Some(entry) = change.decline {
            self.history.lock().unwrap().push(entry);
        }
        Ok(updated)
    }
}

/// Fixed candidate pool; counts lookups so tests can assert the backup
/// path never touches the directory.
struct StaticDirectory {
    candidates: Vec<CollectorCandidate>,
    calls: AtomicUsize,
}

impl StaticDirectory {
    fn new(candidates: Vec<CollectorCandidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectorDirectory for StaticDirectory {
    async fn list_available_collectors(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Vec<CollectorCandidate>, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .candidates
            .iter()
            .filter(|c| c.is_on_duty && !exclude.contains(&c.id))
            .cloned()
            .collect())
    }
}

struct FailingDirectory;

#[async_trait]
impl CollectorDirectory for FailingDirectory {
    async fn list_available_collectors(
        &self,
        _exclude: &HashSet<String>,
    ) -> Result<Vec<CollectorCandidate>, DirectoryError> {
        Err(DirectoryError("availability view timed out".to_string()))
    }
}

struct RecordingNotifier {
    events: Mutex<Vec<UnstaffedEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    fn events(&self) -> Vec<UnstaffedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EscalationNotifier for RecordingNotifier {
    async fn notify_unstaffed(&self, event: &UnstaffedEvent) -> Result<(), NotifierError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            Err(NotifierError("staff webhook returned 502".to_string()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------

fn schedule_with(primary: Option<&str>, backup: Option<&str>) -> CollectionSchedule {
    let now = Utc::now();
    CollectionSchedule {
        id: "sched-1".to_string(),
        name: "Poblacion morning route".to_string(),
        description: Some("Residential pickup, zones 1-3".to_string()),
        start_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        start_time: "06:00:00".parse().unwrap(),
        end_time: "10:00:00".parse().unwrap(),
        end_date: None,
        schedule_type: ScheduleType::Weekly,
        status: ScheduleStatus::Active,
        primary_collector_id: primary.map(str::to_string),
        backup_collector_id: backup.map(str::to_string),
        confirmed_by_collector: false,
        confirmed_at: None,
        stops: vec![],
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn candidate(id: &str, load: u32, rating: f64) -> CollectorCandidate {
    CollectorCandidate {
        id: id.to_string(),
        is_on_duty: true,
        active_assignment_count: load,
        completed_today: 0,
        average_rating: rating,
    }
}

fn service(
    store: Arc<MemoryStore>,
    directory: Arc<StaticDirectory>,
    notifier: Arc<RecordingNotifier>,
) -> AssignmentService {
    AssignmentService::new(store, directory, notifier)
}

// ---------------------------------------------------------------------
// Accept
// ---------------------------------------------------------------------

#[tokio::test]
async fn accept_confirms_schedule_and_promotes_draft() {
    let mut seed = schedule_with(Some("c-1"), None);
    seed.status = ScheduleStatus::Draft;
    let store = MemoryStore::seeded(seed);
    let svc = service(
        store.clone(),
        StaticDirectory::new(vec![]),
        RecordingNotifier::new(),
    );

    let updated = svc.accept("sched-1", "c-1").await.unwrap();
    assert_eq!(updated.status, ScheduleStatus::Active);
    assert!(updated.confirmed_by_collector);
    assert!(updated.confirmed_at.is_some());

    let stored = store.snapshot();
    assert!(stored.confirmed_by_collector);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn accept_by_non_holder_fails_not_eligible() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), Some("c-2")));
    let svc = service(
        store.clone(),
        StaticDirectory::new(vec![]),
        RecordingNotifier::new(),
    );

    // The backup does not hold the proposal while a primary is bound
    let err = svc.accept("sched-1", "c-2").await.unwrap_err();
    assert!(matches!(err, AssignmentError::NotEligible));
    // A stranger does not either
    let err = svc.accept("sched-1", "c-9").await.unwrap_err();
    assert!(matches!(err, AssignmentError::NotEligible));
    assert!(!store.snapshot().confirmed_by_collector);
}

#[tokio::test]
async fn double_accept_fails_already_resolved() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let svc = service(
        store.clone(),
        StaticDirectory::new(vec![]),
        RecordingNotifier::new(),
    );

    svc.accept("sched-1", "c-1").await.unwrap();
    let err = svc.accept("sched-1", "c-1").await.unwrap_err();
    assert!(matches!(err, AssignmentError::AlreadyResolved));
}

#[tokio::test]
async fn responses_fail_after_staff_forced_terminal_status() {
    // Staff force-set short-circuits any in-flight collector response
    for status in [ScheduleStatus::Completed, ScheduleStatus::Cancelled] {
        let mut seed = schedule_with(Some("c-1"), None);
        seed.status = status;
        let store = MemoryStore::seeded(seed);
        let svc = service(
            store,
            StaticDirectory::new(vec![]),
            RecordingNotifier::new(),
        );

        let err = svc.accept("sched-1", "c-1").await.unwrap_err();
        assert!(matches!(err, AssignmentError::InvalidState));
        let err = svc
            .decline("sched-1", "c-1", DeclineReasonCode::Sick, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentError::InvalidState));
    }
}

#[tokio::test]
async fn unknown_schedule_fails_not_found() {
    let svc = service(
        MemoryStore::empty(),
        StaticDirectory::new(vec![]),
        RecordingNotifier::new(),
    );
    let err = svc.accept("missing", "c-1").await.unwrap_err();
    assert!(matches!(err, AssignmentError::NotFound));
}

// ---------------------------------------------------------------------
// Decline cascade
// ---------------------------------------------------------------------

// Scenario: primary declines, no backup, directory has candidates with
// different loads. The least-loaded candidate becomes the new primary.
#[tokio::test]
async fn decline_reassigns_to_least_loaded_candidate() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let directory = StaticDirectory::new(vec![candidate("c-2", 3, 5.0), candidate("c-3", 1, 3.0)]);
    let notifier = RecordingNotifier::new();
    let svc = service(store.clone(), directory.clone(), notifier.clone());

    let outcome = svc
        .decline("sched-1", "c-1", DeclineReasonCode::Capacity, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeclineOutcome::Reassigned {
            new_collector_id: "c-3".to_string()
        }
    );

    let stored = store.snapshot();
    assert_eq!(stored.status, ScheduleStatus::Active);
    assert_eq!(stored.primary_collector_id.as_deref(), Some("c-3"));
    assert_eq!(stored.backup_collector_id, None);
    assert!(!stored.confirmed_by_collector);
    assert_eq!(store.history_len(), 1);
    assert!(notifier.events().is_empty());
}

// Scenario: primary declines and a backup exists. The backup is promoted
// without a single directory lookup.
#[tokio::test]
async fn decline_promotes_backup_without_directory_scan() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), Some("c-2")));
    let directory = StaticDirectory::new(vec![candidate("c-9", 0, 5.0)]);
    let svc = service(store.clone(), directory.clone(), RecordingNotifier::new());

    let outcome = svc
        .decline("sched-1", "c-1", DeclineReasonCode::Sick, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeclineOutcome::Reassigned {
            new_collector_id: "c-2".to_string()
        }
    );
    assert_eq!(directory.call_count(), 0);

    let stored = store.snapshot();
    assert_eq!(stored.status, ScheduleStatus::Active);
    assert_eq!(stored.primary_collector_id.as_deref(), Some("c-2"));
    assert_eq!(stored.backup_collector_id, None);
}

// Scenario: primary declines, no backup, directory comes back empty. The
// schedule goes unstaffed and staff are escalated exactly once.
#[tokio::test]
async fn decline_with_no_candidates_escalates_once() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let directory = StaticDirectory::new(vec![]);
    let notifier = RecordingNotifier::new();
    let svc = service(store.clone(), directory.clone(), notifier.clone());

    let outcome = svc
        .decline("sched-1", "c-1", DeclineReasonCode::VehicleBreakdown, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeclineOutcome::Escalated {
            notifier_warning: None
        }
    );

    let stored = store.snapshot();
    assert_eq!(stored.status, ScheduleStatus::Unstaffed);
    assert_eq!(stored.primary_collector_id, None);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].schedule_id, "sched-1");
    assert_eq!(events[0].last_declined_collector_id, "c-1");
    assert_eq!(events[0].reason, "vehicle_breakdown");
}

#[tokio::test]
async fn former_collector_cannot_accept_after_declining() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let svc = service(
        store.clone(),
        StaticDirectory::new(vec![candidate("c-2", 0, 4.0)]),
        RecordingNotifier::new(),
    );

    svc.decline("sched-1", "c-1", DeclineReasonCode::Capacity, None)
        .await
        .unwrap();
    let err = svc.accept("sched-1", "c-1").await.unwrap_err();
    assert!(matches!(err, AssignmentError::NotEligible));

    // The new holder can still accept
    svc.accept("sched-1", "c-2").await.unwrap();
    assert!(store.snapshot().confirmed_by_collector);
}

#[tokio::test]
async fn decline_history_grows_by_one_per_successful_decline() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let directory = StaticDirectory::new(vec![
        candidate("c-2", 0, 4.0),
        candidate("c-3", 1, 4.0),
        candidate("c-4", 2, 4.0),
    ]);
    let svc = service(store.clone(), directory, RecordingNotifier::new());

    svc.decline("sched-1", "c-1", DeclineReasonCode::Sick, None)
        .await
        .unwrap();
    assert_eq!(store.history_len(), 1);

    // The cascade bound c-2; they decline too
    svc.decline("sched-1", "c-2", DeclineReasonCode::Capacity, None)
        .await
        .unwrap();
    assert_eq!(store.history_len(), 2);

    // A rejected decline appends nothing
    let err = svc
        .decline("sched-1", "c-1", DeclineReasonCode::Sick, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AssignmentError::NotEligible));
    assert_eq!(store.history_len(), 2);
}

#[tokio::test]
async fn declined_collectors_are_never_reselected() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    // c-1 ranks best on paper; the decline history must exclude them anyway
    let directory = StaticDirectory::new(vec![
        candidate("c-1", 0, 5.0),
        candidate("c-2", 0, 4.0),
        candidate("c-3", 5, 2.0),
    ]);
    let svc = service(store.clone(), directory, RecordingNotifier::new());

    svc.decline("sched-1", "c-1", DeclineReasonCode::Capacity, None)
        .await
        .unwrap();
    assert_eq!(store.snapshot().primary_collector_id.as_deref(), Some("c-2"));

    svc.decline("sched-1", "c-2", DeclineReasonCode::Capacity, None)
        .await
        .unwrap();
    assert_eq!(store.snapshot().primary_collector_id.as_deref(), Some("c-3"));
}

#[tokio::test]
async fn backup_who_already_declined_is_not_promoted_again() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), Some("c-2")));
    let directory = StaticDirectory::new(vec![candidate("c-3", 2, 3.0)]);
    let svc = service(store.clone(), directory.clone(), RecordingNotifier::new());

    // c-1 declines, c-2 promoted off the backup slot
    svc.decline("sched-1", "c-1", DeclineReasonCode::Sick, None)
        .await
        .unwrap();
    // c-2 declines; re-promoting them would thrash, so the directory runs
    let outcome = svc
        .decline("sched-1", "c-2", DeclineReasonCode::Sick, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeclineOutcome::Reassigned {
            new_collector_id: "c-3".to_string()
        }
    );
    assert_eq!(directory.call_count(), 1);
}

#[tokio::test]
async fn ranking_ties_resolve_to_smallest_id_repeatably() {
    for _ in 0..5 {
        let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
        let directory =
            StaticDirectory::new(vec![candidate("c-7", 2, 4.0), candidate("c-2", 2, 4.0)]);
        let svc = service(store.clone(), directory, RecordingNotifier::new());

        svc.decline("sched-1", "c-1", DeclineReasonCode::Capacity, None)
            .await
            .unwrap();
        assert_eq!(store.snapshot().primary_collector_id.as_deref(), Some("c-2"));
    }
}

// ---------------------------------------------------------------------
// Failure semantics
// ---------------------------------------------------------------------

#[tokio::test]
async fn notifier_failure_is_a_warning_and_unstaffed_sticks() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let notifier = RecordingNotifier::failing();
    let svc = service(store.clone(), StaticDirectory::new(vec![]), notifier.clone());

    let outcome = svc
        .decline("sched-1", "c-1", DeclineReasonCode::Sick, None)
        .await
        .unwrap();
    match outcome {
        DeclineOutcome::Escalated { notifier_warning } => {
            assert!(notifier_warning.unwrap().contains("staff notification failed"));
        }
        other => panic!("expected escalation, got {other:?}"),
    }

    // The unstaffed status is durable regardless of delivery
    assert_eq!(store.snapshot().status, ScheduleStatus::Unstaffed);
    assert_eq!(notifier.events().len(), 1);
}

#[tokio::test]
async fn directory_failure_degrades_to_escalation() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let notifier = RecordingNotifier::new();
    let svc = AssignmentService::new(store.clone(), Arc::new(FailingDirectory), notifier.clone());

    let outcome = svc
        .decline("sched-1", "c-1", DeclineReasonCode::Capacity, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DeclineOutcome::Escalated {
            notifier_warning: None
        }
    );
    assert_eq!(store.snapshot().status, ScheduleStatus::Unstaffed);
    assert_eq!(store.history_len(), 1);
    assert_eq!(notifier.events().len(), 1);
}

#[tokio::test]
async fn other_reason_without_text_is_rejected_before_any_write() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let svc = service(
        store.clone(),
        StaticDirectory::new(vec![candidate("c-2", 0, 4.0)]),
        RecordingNotifier::new(),
    );

    let err = svc
        .decline("sched-1", "c-1", DeclineReasonCode::Other, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AssignmentError::InvalidReason));

    let stored = store.snapshot();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.primary_collector_id.as_deref(), Some("c-1"));
    assert_eq!(store.history_len(), 0);
}

#[tokio::test]
async fn escalation_reason_carries_other_free_text() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let notifier = RecordingNotifier::new();
    let svc = service(store, StaticDirectory::new(vec![]), notifier.clone());

    svc.decline(
        "sched-1",
        "c-1",
        DeclineReasonCode::Other,
        Some("truck impounded".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(notifier.events()[0].reason, "other: truck impounded");
}

// ---------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------

// Scenario: two near-simultaneous declines by the same holder. The store
// fake yields between read and commit, so both observe version 1; the
// version guard lets exactly one through.
#[tokio::test]
async fn concurrent_declines_resolve_exactly_once() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let directory = StaticDirectory::new(vec![candidate("c-2", 0, 4.0)]);
    let notifier = RecordingNotifier::new();
    let svc = service(store.clone(), directory, notifier.clone());

    let (first, second) = tokio::join!(
        svc.decline("sched-1", "c-1", DeclineReasonCode::Sick, None),
        svc.decline("sched-1", "c-1", DeclineReasonCode::Sick, None),
    );

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one of the two declines may commit");
    let loss = outcomes.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loss.as_ref().unwrap_err(),
        AssignmentError::Conflict | AssignmentError::AlreadyResolved
    ));

    // One decline entry, one rebinding, no escalation
    assert_eq!(store.history_len(), 1);
    assert_eq!(store.snapshot().primary_collector_id.as_deref(), Some("c-2"));
    assert!(notifier.events().is_empty());
}

#[tokio::test]
async fn accept_racing_a_decline_cannot_double_resolve() {
    let store = MemoryStore::seeded(schedule_with(Some("c-1"), None));
    let directory = StaticDirectory::new(vec![candidate("c-2", 0, 4.0)]);
    let svc = service(store.clone(), directory, RecordingNotifier::new());

    let (accepted, declined) = tokio::join!(
        svc.accept("sched-1", "c-1"),
        svc.decline("sched-1", "c-1", DeclineReasonCode::Sick, None),
    );

    // Whichever call committed second lost its version check
    assert!(
        accepted.is_ok() ^ declined.is_ok(),
        "acceptance and reassignment must not both succeed"
    );
    let stored = store.snapshot();
    if accepted.is_ok() {
        assert!(stored.confirmed_by_collector);
        assert_eq!(stored.primary_collector_id.as_deref(), Some("c-1"));
        assert_eq!(store.history_len(), 0);
    } else {
        assert!(!stored.confirmed_by_collector);
        assert_eq!(stored.primary_collector_id.as_deref(), Some("c-2"));
        assert_eq!(store.history_len(), 1);
    }
}
