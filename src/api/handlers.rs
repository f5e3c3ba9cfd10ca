use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delivery::{Channel, DeliveryRecord, DeliveryStatus, NewDelivery};
use crate::error::{AppError, Result};
use crate::server::AppState;

use super::tenant::TenantId;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub submitted: u64,
    pub sent: u64,
    pub failed: u64,
    pub retried: u64,
    pub in_flight: usize,
}

/// Response for submit and retry: the caller observes only "queued"
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub id: Uuid,
    pub status: &'static str,
}

/// Full projection of one delivery record
#[derive(Debug, Serialize)]
pub struct DeliveryStatusResponse {
    pub id: Uuid,
    pub channel: Channel,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl From<DeliveryRecord> for DeliveryStatusResponse {
    fn from(record: DeliveryRecord) -> Self {
        Self {
            id: record.id,
            channel: record.channel,
            status: record.status,
            created_at: record.created_at,
            sent_at: record.sent_at,
            error_message: record.error_message,
            retry_count: record.retry_count,
        }
    }
}

/// Summary projection used by the list endpoint
#[derive(Debug, Serialize)]
pub struct DeliverySummary {
    pub id: Uuid,
    pub recipient: String,
    pub channel: Channel,
    pub subject: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<DeliveryRecord> for DeliverySummary {
    fn from(record: DeliveryRecord) -> Self {
        Self {
            id: record.id,
            recipient: record.recipient,
            channel: record.channel,
            subject: record.subject,
            status: record.status,
            created_at: record.created_at,
            sent_at: record.sent_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot = state.dispatcher.stats();
    Json(StatsResponse {
        submitted: snapshot.submitted,
        sent: snapshot.sent,
        failed: snapshot.failed,
        retried: snapshot.retried,
        in_flight: state.dispatcher.in_flight_count(),
    })
}

/// Accept a delivery request and queue exactly one send attempt.
///
/// Body deserialization failures (malformed JSON, unknown channel name)
/// are reported through the standard validation envelope rather than the
/// extractor's default rejection.
pub async fn submit_notification(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    payload: std::result::Result<Json<NewDelivery>, JsonRejection>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let id = state.dispatcher.submit(tenant_id, request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            id,
            status: "queued",
        }),
    ))
}

/// Fetch the current status of one delivery record.
pub async fn get_notification(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryStatusResponse>> {
    let record = state.query.get(tenant_id, id).await?;
    Ok(Json(record.into()))
}

/// List the tenant's delivery records, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<DeliverySummary>>> {
    let records = state
        .query
        .list(tenant_id, params.page, params.page_size)
        .await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Re-queue a failed delivery record.
pub async fn retry_notification(
    State(state): State<AppState>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    state.dispatcher.retry(tenant_id, id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            id,
            status: "queued",
        }),
    ))
}
