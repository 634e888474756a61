// Assignment routes - collector-facing surface
// Endpoints: GET /v1/assignments, POST /v1/assignments/:id/accept,
// POST /v1/assignments/:id/decline

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::assignment::{AssignmentError, DeclineOutcome};
use crate::auth::CollectorAuth;
use crate::models::{CollectionSchedule, DeclineReasonCode};
use crate::services::ScheduleListFilter;
use crate::AppState;

#[derive(Deserialize)]
pub struct GetAssignmentsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub schedule: CollectionSchedule,
    /// True while this collector owes an accept/decline response
    pub awaiting_response: bool,
}

/// GET /v1/assignments - Schedules currently bound to the calling collector
async fn get_assignments(
    State(state): State<AppState>,
    collector: CollectorAuth,
    Query(query): Query<GetAssignmentsQuery>,
) -> Result<Json<Vec<AssignmentView>>, (StatusCode, String)> {
    tracing::info!(
        "Getting assignments for collector {} with limit={}, offset={}",
        collector.collector_id,
        query.limit,
        query.offset
    );

    let filter = ScheduleListFilter {
        collector_id: Some(collector.collector_id.clone()),
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };

    match state.db.list_schedules(&filter).await {
        Ok(schedules) => {
            let views = schedules
                .into_iter()
                .map(|schedule| {
                    let awaiting = schedule.status.awaits_response()
                        && !schedule.confirmed_by_collector
                        && schedule.current_holder() == Some(collector.collector_id.as_str());
                    AssignmentView {
                        schedule,
                        awaiting_response: awaiting,
                    }
                })
                .collect();
            Ok(Json(views))
        }
        Err(e) => {
            tracing::error!("Failed to get assignments: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get assignments: {e}"),
            ))
        }
    }
}

#[derive(Serialize)]
pub struct AcceptResponse {
    pub status: String,
    pub schedule_status: crate::models::ScheduleStatus,
}

/// POST /v1/assignments/:schedule_id/accept - Confirm the proposed schedule
async fn accept_schedule(
    State(state): State<AppState>,
    collector: CollectorAuth,
    Path(schedule_id): Path<String>,
) -> Result<Json<AcceptResponse>, AssignmentError> {
    tracing::info!(
        "Collector {} accepting schedule {}",
        collector.collector_id,
        schedule_id
    );

    let updated = state
        .assignments
        .accept(&schedule_id, &collector.collector_id)
        .await?;

    Ok(Json(AcceptResponse {
        status: "confirmed".to_string(),
        schedule_status: updated.status,
    }))
}

#[derive(Deserialize)]
pub struct DeclineRequest {
    pub reason_code: DeclineReasonCode,
    #[serde(default)]
    pub reason_text: Option<String>,
}

#[derive(Serialize)]
pub struct DeclineResponse {
    /// True when no replacement collector could be found
    pub reassignment_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_collector_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /v1/assignments/:schedule_id/decline - Decline and cascade
async fn decline_schedule(
    State(state): State<AppState>,
    collector: CollectorAuth,
    Path(schedule_id): Path<String>,
    Json(request): Json<DeclineRequest>,
) -> Result<Json<DeclineResponse>, AssignmentError> {
    tracing::info!(
        "Collector {} declining schedule {} (reason={})",
        collector.collector_id,
        schedule_id,
        request.reason_code.as_str()
    );

    let outcome = state
        .assignments
        .decline(
            &schedule_id,
            &collector.collector_id,
            request.reason_code,
            request.reason_text,
        )
        .await?;

    let response = match outcome {
        DeclineOutcome::Reassigned { new_collector_id } => DeclineResponse {
            reassignment_failed: false,
            new_collector_id: Some(new_collector_id),
            message: None,
        },
        DeclineOutcome::Escalated { notifier_warning } => DeclineResponse {
            reassignment_failed: true,
            new_collector_id: None,
            message: Some(match notifier_warning {
                Some(warning) => {
                    format!("No available collectors - escalation pending ({warning})")
                }
                None => "No available collectors - staff have been notified".to_string(),
            }),
        },
    };
    Ok(Json(response))
}

pub fn assignments_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/assignments", get(get_assignments))
        .route("/v1/assignments/:schedule_id/accept", post(accept_schedule))
        .route("/v1/assignments/:schedule_id/decline", post(decline_schedule))
}
