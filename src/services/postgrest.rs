// PostgREST service - generic query interface to the hosted relational store
// Schedule CRUD goes through the REST endpoints; the assignment commit and
// staff status changes go through SQL RPCs so each is one transaction
// (see db/schema.sql).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};

use crate::assignment::ports::{
    AssignmentChange, CollectorDirectory, DirectoryError, ScheduleStore, StoreError,
};
use crate::models::{CollectionSchedule, CollectorCandidate, DeclineEntry, ScheduleStatus};

/// Store tables and views
pub const SCHEDULES_TABLE: &str = "collection_schedules";
pub const DECLINES_TABLE: &str = "schedule_declines";
pub const AVAILABILITY_VIEW: &str = "collector_availability";

/// Filters for the staff schedule listing
#[derive(Debug, Default, Clone)]
pub struct ScheduleListFilter {
    pub status: Option<ScheduleStatus>,
    pub collector_id: Option<String>,
    pub start_date_from: Option<NaiveDate>,
    pub start_date_to: Option<NaiveDate>,
    pub limit: usize,
    pub offset: usize,
}

/// PostgREST client over the hosted Postgres backend
pub struct PostgrestService {
    client: Client,
    base_url: String,
    service_key: String,
}

impl PostgrestService {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Send and surface non-2xx bodies as backend errors
    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        // RPC guard failures surface as PostgREST error payloads
        if let Ok(parsed) = serde_json::from_str::<Value>(&body) {
            if let Some(message) = parsed.get("message").and_then(Value::as_str) {
                if message.contains("version_conflict") {
                    return Err(StoreError::VersionConflict);
                }
                if message.contains("row_missing") {
                    return Err(StoreError::RowMissing);
                }
            }
        }
        Err(StoreError::Backend(format!("{status}: {body}")))
    }

    // ------------------------------------------------------------------
    // SCHEDULES - staff CRUD
    // ------------------------------------------------------------------

    pub async fn list_schedules(
        &self,
        filter: &ScheduleListFilter,
    ) -> Result<Vec<CollectionSchedule>, StoreError> {
        let mut query: Vec<(String, String)> = vec![
            ("select".into(), "*".into()),
            ("order".into(), "start_date.asc,start_time.asc".into()),
            ("limit".into(), filter.limit.max(1).to_string()),
            ("offset".into(), filter.offset.to_string()),
        ];
        if let Some(status) = filter.status {
            let status = serde_json::to_value(status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            query.push(("status".into(), format!("eq.{status}")));
        }
        if let Some(collector_id) = &filter.collector_id {
            query.push((
                "or".into(),
                format!(
                    "(primary_collector_id.eq.{collector_id},backup_collector_id.eq.{collector_id})"
                ),
            ));
        }
        if let Some(from) = filter.start_date_from {
            query.push(("start_date".into(), format!("gte.{from}")));
        }
        if let Some(to) = filter.start_date_to {
            query.push(("start_date".into(), format!("lte.{to}")));
        }

        let response = self
            .send(self.client.get(self.table_url(SCHEDULES_TABLE)).query(&query))
            .await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub async fn get_schedule(
        &self,
        schedule_id: &str,
    ) -> Result<Option<CollectionSchedule>, StoreError> {
        let id_filter = format!("eq.{schedule_id}");
        let response = self
            .send(
                self.client
                    .get(self.table_url(SCHEDULES_TABLE))
                    .query(&[("select", "*"), ("id", id_filter.as_str()), ("limit", "1")]),
            )
            .await?;
        let mut rows: Vec<CollectionSchedule> = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.pop())
    }

    pub async fn insert_schedule(
        &self,
        schedule: &CollectionSchedule,
    ) -> Result<CollectionSchedule, StoreError> {
        let response = self
            .send(
                self.client
                    .post(self.table_url(SCHEDULES_TABLE))
                    .header("Prefer", "return=representation")
                    .json(schedule),
            )
            .await?;
        let mut rows: Vec<CollectionSchedule> = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.pop().ok_or(StoreError::RowMissing)
    }

    /// Staff force-status. Goes through an RPC that also bumps the version
    /// so any in-flight accept/decline CAS fails with a conflict instead of
    /// writing over the new status.
    pub async fn set_schedule_status(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
    ) -> Result<CollectionSchedule, StoreError> {
        let response = self
            .send(self.client.post(self.rpc_url("set_schedule_status")).json(&json!({
                "p_schedule_id": schedule_id,
                "p_status": status,
            })))
            .await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub async fn delete_schedule(&self, schedule_id: &str) -> Result<bool, StoreError> {
        let id_filter = format!("eq.{schedule_id}");
        let response = self
            .send(
                self.client
                    .delete(self.table_url(SCHEDULES_TABLE))
                    .header("Prefer", "return=representation")
                    .query(&[("id", id_filter.as_str())]),
            )
            .await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    // ------------------------------------------------------------------
    // DECLINE HISTORY - append-only audit collection
    // ------------------------------------------------------------------

    pub async fn get_decline_history(
        &self,
        schedule_id: &str,
    ) -> Result<Vec<DeclineEntry>, StoreError> {
        let schedule_filter = format!("eq.{schedule_id}");
        let response = self
            .send(
                self.client.get(self.table_url(DECLINES_TABLE)).query(&[
                    ("select", "*"),
                    ("schedule_id", schedule_filter.as_str()),
                    ("order", "declined_at.asc"),
                ]),
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    // ------------------------------------------------------------------
    // COLLECTOR AVAILABILITY - staff snapshot
    // ------------------------------------------------------------------

    pub async fn list_collector_overview(&self) -> Result<Vec<CollectorCandidate>, StoreError> {
        let response = self
            .send(
                self.client
                    .get(self.table_url(AVAILABILITY_VIEW))
                    .query(&[("select", "*"), ("order", "id.asc")]),
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl ScheduleStore for PostgrestService {
    async fn fetch_schedule(
        &self,
        schedule_id: &str,
    ) -> Result<Option<CollectionSchedule>, StoreError> {
        self.get_schedule(schedule_id).await
    }

    async fn fetch_decline_history(
        &self,
        schedule_id: &str,
    ) -> Result<Vec<DeclineEntry>, StoreError> {
        self.get_decline_history(schedule_id).await
    }

    async fn commit_assignment(
        &self,
        schedule_id: &str,
        expected_version: i64,
        change: AssignmentChange,
    ) -> Result<CollectionSchedule, StoreError> {
        let response = self
            .send(
                self.client
                    .post(self.rpc_url("apply_assignment_change"))
                    .json(&json!({
                        "p_schedule_id": schedule_id,
                        "p_expected_version": expected_version,
                        "p_status": change.status,
                        "p_primary_collector_id": change.primary_collector_id,
                        "p_backup_collector_id": change.backup_collector_id,
                        "p_confirmed_by_collector": change.confirmed_by_collector,
                        "p_confirmed_at": change.confirmed_at,
                        "p_decline": change.decline,
                    })),
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl CollectorDirectory for PostgrestService {
    async fn list_available_collectors(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Vec<CollectorCandidate>, DirectoryError> {
        let mut query: Vec<(String, String)> = vec![
            ("select".into(), "*".into()),
            ("is_on_duty".into(), "eq.true".into()),
            (
                "order".into(),
                "active_assignment_count.asc,average_rating.desc,id.asc".into(),
            ),
        ];
        if !exclude.is_empty() {
            let mut ids: Vec<&str> = exclude.iter().map(String::as_str).collect();
            ids.sort_unstable();
            query.push(("id".into(), format!("not.in.({})", ids.join(","))));
        }

        let response = self
            .send(self.client.get(self.table_url(AVAILABILITY_VIEW)).query(&query))
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| DirectoryError(e.to_string()))
    }
}
