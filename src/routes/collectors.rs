// Collector routes - staff view over the directory snapshot
// Endpoint: GET /v1/collectors/availability

use axum::{extract::State, routing::get, Json, Router};

use crate::assignment::AssignmentError;
use crate::auth::StaffAuth;
use crate::models::CollectorCandidate;
use crate::AppState;

/// GET /v1/collectors/availability - On-duty status and load per collector
/// Computed by the backend view at call time; never cached here.
async fn get_collector_availability(
    State(state): State<AppState>,
    staff: StaffAuth,
) -> Result<Json<Vec<CollectorCandidate>>, AssignmentError> {
    tracing::info!("Staff {} fetching collector availability", staff.staff_id);

    match state.db.list_collector_overview().await {
        Ok(collectors) => Ok(Json(collectors)),
        Err(e) => {
            tracing::error!("Collector directory read failed: {}", e);
            Err(AssignmentError::DirectoryUnavailable)
        }
    }
}

pub fn collectors_routes() -> Router<AppState> {
    Router::new().route("/v1/collectors/availability", get(get_collector_availability))
}
