// Collector directory models
// The directory is owned by the profile/identity subsystem; this service
// only reads availability snapshots to rank reassignment candidates.

use serde::{Deserialize, Serialize};

/// Availability snapshot for one collector, computed by the backend view at
/// query time. Never cached across requests: on-duty status and load change
/// continuously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorCandidate {
    pub id: String,
    pub is_on_duty: bool,
    /// Schedules currently bound to this collector and not yet completed
    pub active_assignment_count: u32,
    pub completed_today: u32,
    #[serde(default)]
    pub average_rating: f64,
}
