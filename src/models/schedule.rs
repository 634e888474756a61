// Collection schedule models
// Stored in Postgres: collection_schedules + schedule_declines (append-only)

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Recurrence of a collection schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    OneTime,
    Weekly,
    BiWeekly,
    Monthly,
}

/// Lifecycle status of a schedule
/// Only draft/active schedules are eligible for a collector response.
/// completed/cancelled are terminal (staff action); unstaffed is terminal for
/// the assignment core and recoverable only through manual staff rebinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    Active,
    Unstaffed,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Unstaffed | ScheduleStatus::Completed | ScheduleStatus::Cancelled
        )
    }

    /// Statuses in which a collector accept/decline is allowed
    pub fn awaits_response(&self) -> bool {
        !self.is_terminal()
    }
}

/// One stop on a collection route. Stop order is immutable once the schedule
/// is confirmed by a collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStop {
    pub location_name: String,
    /// "residential", "commercial", "public_market", ...
    pub stop_type: String,
    pub address: String,
    pub barangay: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub stop_order: i32,
}

/// Fixed decline reason codes; Other carries free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReasonCode {
    Sick,
    VehicleBreakdown,
    Capacity,
    PersonalEmergency,
    Other,
}

impl DeclineReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineReasonCode::Sick => "sick",
            DeclineReasonCode::VehicleBreakdown => "vehicle_breakdown",
            DeclineReasonCode::Capacity => "capacity",
            DeclineReasonCode::PersonalEmergency => "personal_emergency",
            DeclineReasonCode::Other => "other",
        }
    }
}

/// Append-only decline history entry. Rows are never updated or deleted;
/// each entry references the collector who held the proposal at decline time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclineEntry {
    pub schedule_id: String,
    pub collector_id: String,
    pub reason_code: DeclineReasonCode,
    #[serde(default)]
    pub reason_text: Option<String>,
    pub declined_at: DateTime<Utc>,
}

impl DeclineEntry {
    /// Human-readable reason for logs and the escalation payload
    pub fn reason(&self) -> String {
        match &self.reason_text {
            Some(text) if !text.trim().is_empty() => {
                format!("{}: {}", self.reason_code.as_str(), text.trim())
            }
            _ => self.reason_code.as_str().to_string(),
        }
    }
}

/// A planned collection route with a date/time window and ordered stops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchedule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Only set for recurring schedules
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub schedule_type: ScheduleType,
    pub status: ScheduleStatus,
    /// Currently responsible collector (the proposed holder while unconfirmed)
    #[serde(default)]
    pub primary_collector_id: Option<String>,
    /// Designated fallback; promoted first on decline
    #[serde(default)]
    pub backup_collector_id: Option<String>,
    #[serde(default)]
    pub confirmed_by_collector: bool,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stops: Vec<ScheduleStop>,
    /// Optimistic-concurrency token; every assignment write is conditioned
    /// on the version observed at read time
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which assignment slot a collector occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderSlot {
    Primary,
    Backup,
}

impl CollectionSchedule {
    /// The collector who currently owes an accept/decline response.
    /// The primary holds the proposal when bound; the backup only holds it
    /// when the primary slot is empty. Never both.
    pub fn current_holder(&self) -> Option<&str> {
        self.primary_collector_id
            .as_deref()
            .or(self.backup_collector_id.as_deref())
    }

    /// The slot occupied by `collector_id`, if any
    pub fn slot_of(&self, collector_id: &str) -> Option<HolderSlot> {
        if self.primary_collector_id.as_deref() == Some(collector_id) {
            Some(HolderSlot::Primary)
        } else if self.backup_collector_id.as_deref() == Some(collector_id) {
            Some(HolderSlot::Backup)
        } else {
            None
        }
    }
}
