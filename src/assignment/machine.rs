// Assignment state machine
// Pure precondition checks and commit builders for the two collector
// responses. All I/O stays in the service; these functions are the testable
// transition rules.

use chrono::{DateTime, Utc};

use crate::models::{CollectionSchedule, DeclineEntry, HolderSlot, ScheduleStatus};

use super::error::AssignmentError;
use super::ports::AssignmentChange;

/// A schedule accepts a collector response only while draft/active and
/// unconfirmed. Terminal statuses (completed/cancelled/unstaffed) fail with
/// InvalidState even when staff forced them mid-flight.
pub fn ensure_can_respond(schedule: &CollectionSchedule) -> Result<(), AssignmentError> {
    if !schedule.status.awaits_response() {
        return Err(AssignmentError::InvalidState);
    }
    if schedule.confirmed_by_collector {
        return Err(AssignmentError::AlreadyResolved);
    }
    Ok(())
}

/// The acting collector must be the current proposed holder: the primary
/// when bound, otherwise the backup. Occupying the backup slot while a
/// primary holds the proposal is not enough.
pub fn ensure_holder(
    schedule: &CollectionSchedule,
    acting_collector_id: &str,
) -> Result<HolderSlot, AssignmentError> {
    if schedule.current_holder() != Some(acting_collector_id) {
        return Err(AssignmentError::NotEligible);
    }
    schedule
        .slot_of(acting_collector_id)
        .ok_or(AssignmentError::NotEligible)
}

/// Commit for a successful accept: confirmation flags set, draft promoted to
/// active, assignment slots untouched.
pub fn accept_change(schedule: &CollectionSchedule, now: DateTime<Utc>) -> AssignmentChange {
    AssignmentChange {
        status: ScheduleStatus::Active,
        primary_collector_id: schedule.primary_collector_id.clone(),
        backup_collector_id: schedule.backup_collector_id.clone(),
        confirmed_by_collector: true,
        confirmed_at: Some(now),
        decline: None,
    }
}

/// Where the decline cascade landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Backup promoted or directory candidate bound; schedule stays proposed
    Reassigned { new_primary_id: String },
    /// No candidate left; schedule goes unstaffed
    Escalated,
}

/// Commit for a decline: the acting collector's slot is cleared, the decline
/// entry rides in the same transaction, and the resolver's outcome is bound.
pub fn decline_change(
    schedule: &CollectionSchedule,
    acting_slot: HolderSlot,
    entry: DeclineEntry,
    resolution: &Resolution,
) -> AssignmentChange {
    // Clear whichever slot the decliner occupied before rebinding
    let mut primary = schedule.primary_collector_id.clone();
    let mut backup = schedule.backup_collector_id.clone();
    match acting_slot {
        HolderSlot::Primary => primary = None,
        HolderSlot::Backup => backup = None,
    }

    match resolution {
        Resolution::Reassigned { new_primary_id } => AssignmentChange {
            status: schedule.status,
            primary_collector_id: Some(new_primary_id.clone()),
            // The new primary holds the proposal alone
            backup_collector_id: if backup.as_deref() == Some(new_primary_id.as_str()) {
                None
            } else {
                backup
            },
            confirmed_by_collector: false,
            confirmed_at: None,
            decline: Some(entry),
        },
        Resolution::Escalated => AssignmentChange {
            status: ScheduleStatus::Unstaffed,
            primary_collector_id: primary,
            backup_collector_id: backup,
            confirmed_by_collector: false,
            confirmed_at: None,
            decline: Some(entry),
        },
    }
}
