// Capability ports consumed by the assignment core.
// The production implementations live in services/; tests inject fakes.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CollectionSchedule, CollectorCandidate, DeclineEntry, ScheduleStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row's version no longer matches the expected one
    #[error("schedule row version changed")]
    VersionConflict,
    /// The row disappeared between read and write
    #[error("schedule row missing")]
    RowMissing,
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
#[error("collector directory error: {0}")]
pub struct DirectoryError(pub String);

#[derive(Debug, Error)]
#[error("escalation notifier error: {0}")]
pub struct NotifierError(pub String);

/// The single write the core performs: new assignment fields plus an
/// optional decline-history append, committed atomically against the
/// schedule's last-observed version.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentChange {
    pub status: ScheduleStatus,
    pub primary_collector_id: Option<String>,
    pub backup_collector_id: Option<String>,
    pub confirmed_by_collector: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Appended to the decline history in the same transaction when present
    pub decline: Option<DeclineEntry>,
}

/// Persisted schedule record access. Reads are point-in-time; the commit is
/// a compare-and-swap on the schedule's version.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn fetch_schedule(&self, schedule_id: &str)
        -> Result<Option<CollectionSchedule>, StoreError>;

    /// Decline history for one schedule, oldest first
    async fn fetch_decline_history(&self, schedule_id: &str)
        -> Result<Vec<DeclineEntry>, StoreError>;

    /// Apply `change` iff the row still carries `expected_version`.
    /// Returns the updated record; `VersionConflict` when the row moved.
    async fn commit_assignment(
        &self,
        schedule_id: &str,
        expected_version: i64,
        change: AssignmentChange,
    ) -> Result<CollectionSchedule, StoreError>;
}

/// Read-only availability snapshot, owned by the profile subsystem
#[async_trait]
pub trait CollectorDirectory: Send + Sync {
    /// On-duty collectors excluding the given ids, as of call time
    async fn list_available_collectors(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Vec<CollectorCandidate>, DirectoryError>;
}

/// Payload handed to staff when automatic reassignment exhausted all
/// candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstaffedEvent {
    pub schedule_id: String,
    pub last_declined_collector_id: String,
    pub reason: String,
}

/// Fire-and-forget staff escalation sink. Invoked at most once per decline
/// cascade; a failure is surfaced as a warning and never rolls back the
/// schedule's unstaffed status.
#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    async fn notify_unstaffed(&self, event: &UnstaffedEvent) -> Result<(), NotifierError>;
}
