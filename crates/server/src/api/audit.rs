use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use loket_core::audit::{AuditFilter, AuditRecord};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::state::AppState;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    /// Filter by ticket ID
    pub ticket_id: Option<String>,
    /// Filter by event type
    pub event_type: Option<String>,
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 500)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for audit query endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query audit events (admins only)
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::forbidden("Only admins can read the audit log"));
    }

    let mut base_filter = AuditFilter::new();

    if let Some(ref ticket_id) = params.ticket_id {
        base_filter = base_filter.with_ticket_id(ticket_id);
    }

    if let Some(ref event_type) = params.event_type {
        base_filter = base_filter.with_event_type(event_type);
    }

    if let Some(ref user_id) = params.user_id {
        base_filter = base_filter.with_user_id(user_id);
    }

    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = base_filter
        .clone()
        .with_limit(params.limit.unwrap_or(DEFAULT_LIMIT))
        .with_offset(params.offset.unwrap_or(0));

    let events = state
        .audit_store()
        .query(&query_filter)
        .map_err(|e| ApiError::internal(format!("Failed to query audit events: {}", e)))?;

    let total = state
        .audit_store()
        .count(&base_filter)
        .map_err(|e| ApiError::internal(format!("Failed to count audit events: {}", e)))?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit: query_filter.limit,
        offset: query_filter.offset,
    }))
}
