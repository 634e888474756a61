// Reassignment resolver
// Candidate exclusion and ranking are pure so the determinism rules can be
// checked without a live directory; the service owns the surrounding I/O.

use std::collections::HashSet;

use crate::models::{CollectionSchedule, CollectorCandidate, DeclineEntry};

/// If a backup is bound and has not declined this schedule yet, it is
/// promoted before any directory scan happens.
pub fn promotable_backup(
    schedule: &CollectionSchedule,
    history: &[DeclineEntry],
) -> Option<String> {
    let backup = schedule.backup_collector_id.as_deref()?;
    let declined_before = history.iter().any(|d| d.collector_id == backup);
    if declined_before {
        None
    } else {
        Some(backup.to_string())
    }
}

/// Rank directory candidates for a schedule whose history is `history`.
///
/// Anyone present in the decline history is excluded, preventing a decline
/// loop where the same collector is cascaded the schedule again. Remaining
/// candidates are ordered by ascending active load, then descending rating,
/// then ascending id so resolution is reproducible.
pub fn rank_candidates(
    history: &[DeclineEntry],
    mut candidates: Vec<CollectorCandidate>,
) -> Vec<CollectorCandidate> {
    let declined: HashSet<&str> = history.iter().map(|d| d.collector_id.as_str()).collect();
    candidates.retain(|c| c.is_on_duty && !declined.contains(c.id.as_str()));
    candidates.sort_by(|a, b| {
        a.active_assignment_count
            .cmp(&b.active_assignment_count)
            .then_with(|| b.average_rating.total_cmp(&a.average_rating))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeclineReasonCode;
    use chrono::Utc;

    fn candidate(id: &str, load: u32, rating: f64) -> CollectorCandidate {
        CollectorCandidate {
            id: id.into(),
            is_on_duty: true,
            active_assignment_count: load,
            completed_today: 0,
            average_rating: rating,
        }
    }

    fn declined(collector: &str) -> DeclineEntry {
        DeclineEntry {
            schedule_id: "sched-1".into(),
            collector_id: collector.into(),
            reason_code: DeclineReasonCode::Sick,
            reason_text: None,
            declined_at: Utc::now(),
        }
    }

    #[test]
    fn load_is_the_primary_sort_key() {
        let ranked = rank_candidates(
            &[],
            vec![candidate("c-2", 3, 5.0), candidate("c-3", 1, 3.0)],
        );
        assert_eq!(ranked[0].id, "c-3");
    }

    #[test]
    fn rating_breaks_load_ties_descending() {
        let ranked = rank_candidates(
            &[],
            vec![candidate("c-2", 2, 3.5), candidate("c-3", 2, 4.8)],
        );
        assert_eq!(ranked[0].id, "c-3");
    }

    #[test]
    fn id_is_the_deterministic_final_tie_break() {
        for _ in 0..10 {
            let ranked = rank_candidates(
                &[],
                vec![candidate("c-9", 2, 4.0), candidate("c-2", 2, 4.0)],
            );
            assert_eq!(ranked[0].id, "c-2");
        }
    }

    #[test]
    fn declined_collectors_are_never_reselected() {
        let history = vec![declined("c-1"), declined("c-2")];
        let ranked = rank_candidates(
            &history,
            vec![
                candidate("c-1", 0, 5.0),
                candidate("c-2", 0, 5.0),
                candidate("c-3", 4, 2.0),
            ],
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "c-3");
    }

    #[test]
    fn off_duty_collectors_are_filtered() {
        let mut off = candidate("c-4", 0, 5.0);
        off.is_on_duty = false;
        let ranked = rank_candidates(&[], vec![off, candidate("c-5", 6, 1.0)]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "c-5");
    }

    #[test]
    fn backup_promotion_skipped_when_backup_already_declined() {
        use crate::models::{ScheduleStatus, ScheduleType};
        let now = Utc::now();
        let schedule = CollectionSchedule {
            id: "sched-1".into(),
            name: "Market loop".into(),
            description: None,
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start_time: "05:30:00".parse().unwrap(),
            end_time: "09:30:00".parse().unwrap(),
            end_date: None,
            schedule_type: ScheduleType::OneTime,
            status: ScheduleStatus::Active,
            primary_collector_id: Some("c-1".into()),
            backup_collector_id: Some("c-2".into()),
            confirmed_by_collector: false,
            confirmed_at: None,
            stops: vec![],
            version: 1,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(promotable_backup(&schedule, &[]).as_deref(), Some("c-2"));
        assert_eq!(promotable_backup(&schedule, &[declined("c-2")]), None);
    }
}
