// Schedule routes - staff schedule management
// Endpoints: GET/POST /v1/schedules, GET /v1/schedules/:id,
// PATCH /v1/schedules/:id/status, POST /v1/schedules/:id/duplicate,
// DELETE /v1/schedules/:id, GET /v1/schedules/:id/declines

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::StaffAuth;
use crate::models::{
    CollectionSchedule, DeclineEntry, ScheduleStatus, ScheduleStop, ScheduleType,
};
use crate::services::ScheduleListFilter;
use crate::AppState;

#[derive(Deserialize)]
pub struct GetSchedulesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    /// Filter by lifecycle status
    pub status: Option<ScheduleStatus>,
    /// Filter by bound collector (primary or backup)
    pub collector_id: Option<String>,
    /// Filter by start date (inclusive, ISO 8601 date)
    pub start_date: Option<NaiveDate>,
    /// Filter by end date (inclusive, ISO 8601 date)
    pub end_date: Option<NaiveDate>,
}

fn default_limit() -> usize {
    100
}

/// GET /v1/schedules - List schedules for the staff console
async fn get_schedules(
    State(state): State<AppState>,
    staff: StaffAuth,
    Query(query): Query<GetSchedulesQuery>,
) -> Result<Json<Vec<CollectionSchedule>>, (StatusCode, String)> {
    tracing::info!(
        "Staff {} listing schedules with limit={}, offset={}, status={:?}, collector_id={:?}",
        staff.staff_id,
        query.limit,
        query.offset,
        query.status,
        query.collector_id
    );

    let filter = ScheduleListFilter {
        status: query.status,
        collector_id: query.collector_id,
        start_date_from: query.start_date,
        start_date_to: query.end_date,
        limit: query.limit,
        offset: query.offset,
    };

    match state.db.list_schedules(&filter).await {
        Ok(schedules) => Ok(Json(schedules)),
        Err(e) => {
            tracing::error!("Failed to list schedules: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list schedules: {e}"),
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct CreateStopRequest {
    pub location_name: String,
    pub stop_type: String,
    pub address: String,
    pub barangay: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub schedule_type: ScheduleType,
    /// Initial proposed holder; required so the schedule never starts
    /// unstaffed
    pub primary_collector_id: String,
    #[serde(default)]
    pub backup_collector_id: Option<String>,
    /// draft (default) or active
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    pub stops: Vec<CreateStopRequest>,
}

/// POST /v1/schedules - Create a schedule with a primary collector bound
async fn create_schedule(
    State(state): State<AppState>,
    staff: StaffAuth,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<CollectionSchedule>), (StatusCode, String)> {
    let status = request.status.unwrap_or(ScheduleStatus::Draft);
    if !status.awaits_response() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "New schedules must be draft or active".to_string(),
        ));
    }
    if request.primary_collector_id.trim().is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "A primary collector is required".to_string(),
        ));
    }
    if request.stops.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "At least one stop is required".to_string(),
        ));
    }

    tracing::info!(
        "Staff {} creating schedule '{}' with {} stops, primary collector {}",
        staff.staff_id,
        request.name,
        request.stops.len(),
        request.primary_collector_id
    );

    let now = Utc::now();
    let stops = request
        .stops
        .into_iter()
        .enumerate()
        .map(|(i, stop)| ScheduleStop {
            location_name: stop.location_name,
            stop_type: stop.stop_type,
            address: stop.address,
            barangay: stop.barangay,
            latitude: stop.latitude,
            longitude: stop.longitude,
            stop_order: i as i32 + 1,
        })
        .collect();

    let schedule = CollectionSchedule {
        id: uuid::Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        start_date: request.start_date,
        start_time: request.start_time,
        end_time: request.end_time,
        end_date: request.end_date,
        schedule_type: request.schedule_type,
        status,
        primary_collector_id: Some(request.primary_collector_id),
        backup_collector_id: request.backup_collector_id,
        confirmed_by_collector: false,
        confirmed_at: None,
        stops,
        version: 1,
        created_at: now,
        updated_at: now,
    };

    match state.db.insert_schedule(&schedule).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(e) => {
            tracing::error!("Failed to create schedule: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create schedule: {e}"),
            ))
        }
    }
}

#[derive(Serialize)]
pub struct ScheduleDetailResponse {
    #[serde(flatten)]
    pub schedule: CollectionSchedule,
    pub decline_history: Vec<DeclineEntry>,
}

/// GET /v1/schedules/:id - Fetch one schedule with its decline audit trail
async fn get_schedule(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(schedule_id): Path<String>,
) -> Result<Json<ScheduleDetailResponse>, (StatusCode, String)> {
    let schedule = match state.db.get_schedule(&schedule_id).await {
        Ok(Some(schedule)) => schedule,
        Ok(None) => {
            return Err((StatusCode::NOT_FOUND, "Schedule not found".to_string()));
        }
        Err(e) => {
            tracing::error!("Failed to get schedule {}: {}", schedule_id, e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get schedule: {e}"),
            ));
        }
    };

    let decline_history = match state.db.get_decline_history(&schedule_id).await {
        Ok(history) => history,
        Err(e) => {
            tracing::error!("Failed to get decline history for {}: {}", schedule_id, e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get decline history: {e}"),
            ));
        }
    };

    Ok(Json(ScheduleDetailResponse {
        schedule,
        decline_history,
    }))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ScheduleStatus,
}

/// PATCH /v1/schedules/:id/status - Staff force-set lifecycle status
/// Bumps the row version, so any in-flight collector response lands on a
/// conflict instead of resurrecting the schedule.
async fn update_schedule_status(
    State(state): State<AppState>,
    staff: StaffAuth,
    Path(schedule_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<CollectionSchedule>, (StatusCode, String)> {
    if !matches!(
        request.status,
        ScheduleStatus::Active | ScheduleStatus::Completed | ScheduleStatus::Cancelled
    ) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Staff may only set active, completed or cancelled".to_string(),
        ));
    }

    tracing::info!(
        "Staff {} setting schedule {} status to {:?}",
        staff.staff_id,
        schedule_id,
        request.status
    );

    match state
        .db
        .set_schedule_status(&schedule_id, request.status)
        .await
    {
        Ok(updated) => Ok(Json(updated)),
        Err(crate::assignment::ports::StoreError::RowMissing) => {
            Err((StatusCode::NOT_FOUND, "Schedule not found".to_string()))
        }
        Err(e) => {
            tracing::error!("Failed to update schedule status: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to update status: {e}"),
            ))
        }
    }
}

/// POST /v1/schedules/:id/duplicate - Copy a schedule for the next period
/// Assignment confirmation is reset; the decline history stays with the
/// original.
async fn duplicate_schedule(
    State(state): State<AppState>,
    staff: StaffAuth,
    Path(schedule_id): Path<String>,
) -> Result<(StatusCode, Json<CollectionSchedule>), (StatusCode, String)> {
    let original = match state.db.get_schedule(&schedule_id).await {
        Ok(Some(schedule)) => schedule,
        Ok(None) => {
            return Err((StatusCode::NOT_FOUND, "Schedule not found".to_string()));
        }
        Err(e) => {
            tracing::error!("Failed to get schedule {}: {}", schedule_id, e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get schedule: {e}"),
            ));
        }
    };

    tracing::info!(
        "Staff {} duplicating schedule {} ('{}')",
        staff.staff_id,
        schedule_id,
        original.name
    );

    let now = Utc::now();
    let copy = CollectionSchedule {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("{} (copy)", original.name),
        status: ScheduleStatus::Draft,
        confirmed_by_collector: false,
        confirmed_at: None,
        version: 1,
        created_at: now,
        updated_at: now,
        ..original
    };

    match state.db.insert_schedule(&copy).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(e) => {
            tracing::error!("Failed to duplicate schedule: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to duplicate schedule: {e}"),
            ))
        }
    }
}

/// DELETE /v1/schedules/:id - Remove a schedule
async fn delete_schedule(
    State(state): State<AppState>,
    staff: StaffAuth,
    Path(schedule_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    tracing::info!("Staff {} deleting schedule {}", staff.staff_id, schedule_id);

    match state.db.delete_schedule(&schedule_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, "Schedule not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to delete schedule: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to delete schedule: {e}"),
            ))
        }
    }
}

/// GET /v1/schedules/:id/declines - Decline history audit view
async fn get_schedule_declines(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(schedule_id): Path<String>,
) -> Result<Json<Vec<DeclineEntry>>, (StatusCode, String)> {
    match state.db.get_decline_history(&schedule_id).await {
        Ok(history) => Ok(Json(history)),
        Err(e) => {
            tracing::error!("Failed to get decline history for {}: {}", schedule_id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get decline history: {e}"),
            ))
        }
    }
}

pub fn schedules_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules", get(get_schedules).post(create_schedule))
        .route("/v1/schedules/:id", get(get_schedule).delete(delete_schedule))
        .route("/v1/schedules/:id/status", patch(update_schedule_status))
        .route("/v1/schedules/:id/duplicate", post(duplicate_schedule))
        .route("/v1/schedules/:id/declines", get(get_schedule_declines))
}
