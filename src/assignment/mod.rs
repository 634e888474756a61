// Schedule assignment core
// Governs the collector-response lifecycle of a schedule: proposed →
// accepted, or declined → reassigned / escalated. Runs request-scoped and
// synchronous; every write is a version-guarded commit against the store.

pub mod error;
pub mod machine;
pub mod ports;
pub mod resolver;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::models::{CollectionSchedule, DeclineEntry, DeclineReasonCode};

pub use error::AssignmentError;
use machine::Resolution;
use ports::{CollectorDirectory, EscalationNotifier, ScheduleStore, UnstaffedEvent};

/// Outcome of a successful decline, as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineOutcome {
    /// A replacement collector now holds the proposal
    Reassigned { new_collector_id: String },
    /// No candidate was left; the schedule is unstaffed and staff were
    /// notified (or notification failed, carried as a warning)
    Escalated { notifier_warning: Option<String> },
}

/// Orchestrates accept/decline against the injected capability ports
pub struct AssignmentService {
    store: Arc<dyn ScheduleStore>,
    directory: Arc<dyn CollectorDirectory>,
    notifier: Arc<dyn EscalationNotifier>,
}

impl AssignmentService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        directory: Arc<dyn CollectorDirectory>,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    /// Collector accepts the proposed schedule. Promotes draft → active and
    /// stamps the confirmation; fails if the caller is not the current
    /// holder or the schedule moved on.
    pub async fn accept(
        &self,
        schedule_id: &str,
        collector_id: &str,
    ) -> Result<CollectionSchedule, AssignmentError> {
        let schedule = self
            .store
            .fetch_schedule(schedule_id)
            .await?
            .ok_or(AssignmentError::NotFound)?;

        machine::ensure_can_respond(&schedule)?;
        machine::ensure_holder(&schedule, collector_id)?;

        let change = machine::accept_change(&schedule, Utc::now());
        let updated = self
            .store
            .commit_assignment(schedule_id, schedule.version, change)
            .await?;

        tracing::info!(
            "Collector {} accepted schedule {} (version {} -> {})",
            collector_id,
            schedule_id,
            schedule.version,
            updated.version
        );
        Ok(updated)
    }

    /// Collector declines the proposed schedule. Appends the decline entry,
    /// clears the caller's slot, and resolves a replacement synchronously:
    /// backup first, else the best-ranked on-duty candidate, else the
    /// schedule goes unstaffed and staff are escalated exactly once.
    pub async fn decline(
        &self,
        schedule_id: &str,
        collector_id: &str,
        reason_code: DeclineReasonCode,
        reason_text: Option<String>,
    ) -> Result<DeclineOutcome, AssignmentError> {
        let reason_text = validate_reason(reason_code, reason_text)?;

        let schedule = self
            .store
            .fetch_schedule(schedule_id)
            .await?
            .ok_or(AssignmentError::NotFound)?;

        machine::ensure_can_respond(&schedule)?;
        let slot = machine::ensure_holder(&schedule, collector_id)?;

        let mut history = self.store.fetch_decline_history(schedule_id).await?;
        let entry = DeclineEntry {
            schedule_id: schedule_id.to_string(),
            collector_id: collector_id.to_string(),
            reason_code,
            reason_text,
            declined_at: Utc::now(),
        };
        // The in-flight decline counts as history for every resolver rule:
        // the decliner can be neither promoted nor reselected.
        history.push(entry.clone());

        let resolution = self.resolve(&schedule, &history).await;
        let change = machine::decline_change(&schedule, slot, entry.clone(), &resolution);
        let committed = self
            .store
            .commit_assignment(schedule_id, schedule.version, change)
            .await?;

        match resolution {
            Resolution::Reassigned { new_primary_id } => {
                tracing::info!(
                    "Schedule {} declined by {} ({}), reassigned to {}",
                    schedule_id,
                    collector_id,
                    entry.reason(),
                    new_primary_id
                );
                Ok(DeclineOutcome::Reassigned {
                    new_collector_id: new_primary_id,
                })
            }
            Resolution::Escalated => {
                debug_assert!(committed.status == crate::models::ScheduleStatus::Unstaffed);
                tracing::warn!(
                    "Schedule {} declined by {} ({}) with no replacement, escalating",
                    schedule_id,
                    collector_id,
                    entry.reason()
                );
                // The unstaffed status is already durable; the notifier is
                // fire-and-forget and never retried.
                let event = UnstaffedEvent {
                    schedule_id: schedule_id.to_string(),
                    last_declined_collector_id: collector_id.to_string(),
                    reason: entry.reason(),
                };
                let notifier_warning = match self.notifier.notify_unstaffed(&event).await {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(
                            "Escalation notification for schedule {} failed: {}",
                            schedule_id,
                            e
                        );
                        Some(format!("staff notification failed: {e}"))
                    }
                };
                Ok(DeclineOutcome::Escalated { notifier_warning })
            }
        }
    }

    /// Pick the next holder. The directory read is advisory ranking input
    /// only; a failed lookup degrades to "no candidates" so the decline
    /// itself is never blocked on the directory.
    async fn resolve(
        &self,
        schedule: &CollectionSchedule,
        history: &[DeclineEntry],
    ) -> Resolution {
        if let Some(backup) = resolver::promotable_backup(schedule, history) {
            return Resolution::Reassigned {
                new_primary_id: backup,
            };
        }

        let exclude: HashSet<String> =
            history.iter().map(|d| d.collector_id.clone()).collect();
        let candidates = match self.directory.list_available_collectors(&exclude).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    "Collector directory lookup failed for schedule {}: {} - treating as no candidates",
                    schedule.id,
                    e
                );
                Vec::new()
            }
        };

        match resolver::rank_candidates(history, candidates).into_iter().next() {
            Some(candidate) => Resolution::Reassigned {
                new_primary_id: candidate.id,
            },
            None => Resolution::Escalated,
        }
    }
}

/// Reason codes are fixed; "other" requires free text. Whitespace-only text
/// is rejected the same as missing text.
fn validate_reason(
    code: DeclineReasonCode,
    text: Option<String>,
) -> Result<Option<String>, AssignmentError> {
    let trimmed = text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if code == DeclineReasonCode::Other && trimmed.is_none() {
        return Err(AssignmentError::InvalidReason);
    }
    Ok(trimmed.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_reason_requires_text() {
        assert!(matches!(
            validate_reason(DeclineReasonCode::Other, None),
            Err(AssignmentError::InvalidReason)
        ));
        assert!(matches!(
            validate_reason(DeclineReasonCode::Other, Some("   ".into())),
            Err(AssignmentError::InvalidReason)
        ));
        assert_eq!(
            validate_reason(DeclineReasonCode::Other, Some(" truck seized ".into())).unwrap(),
            Some("truck seized".to_string())
        );
    }

    #[test]
    fn coded_reasons_stand_alone() {
        assert_eq!(validate_reason(DeclineReasonCode::Sick, None).unwrap(), None);
        assert_eq!(
            validate_reason(DeclineReasonCode::Capacity, Some("route too long".into())).unwrap(),
            Some("route too long".to_string())
        );
    }
}
