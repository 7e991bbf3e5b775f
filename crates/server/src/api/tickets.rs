//! Ticket API handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use loket_core::{
    queue::{FeedbackInput, ListQuery, NewTicket, TicketList},
    ticket::{Feedback, TicketDetail},
    Ticket,
};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::metrics::{TICKETS_CREATED_TOTAL, TICKET_TRANSITIONS_TOTAL};
use crate::state::{run_blocking, AppState};

/// Query parameters for ticket number search
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub ticket_number: String,
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "validation_error",
        rejection.body_text(),
    )
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "validation_error",
        rejection.body_text(),
    )
}

/// Create a new ticket for the calling visitor
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    body: Result<Json<NewTicket>, JsonRejection>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let Json(request) = body.map_err(bad_json)?;
    let ticket =
        run_blocking(&state, move |s| s.sequencer().create_ticket(&actor, request)).await??;
    TICKETS_CREATED_TOTAL
        .with_label_values(&[ticket.service_type.as_str()])
        .inc();
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// List tickets visible to the caller
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<TicketList>, ApiError> {
    let Query(query) = query.map_err(bad_query)?;
    let list = run_blocking(&state, move |s| s.lifecycle().list_tickets(&actor, query)).await??;
    Ok(Json(list))
}

/// Get a ticket with owner, operator and feedback
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<TicketDetail>, ApiError> {
    let detail = run_blocking(&state, move |s| s.lifecycle().get_ticket(&id, &actor)).await??;
    Ok(Json(detail))
}

/// Look up a ticket by its number (operators)
pub async fn search_ticket(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(params): Query<SearchParams>,
) -> Result<Json<TicketDetail>, ApiError> {
    let detail = run_blocking(&state, move |s| {
        s.lifecycle()
            .find_by_ticket_number(&params.ticket_number, &actor)
    })
    .await??;
    Ok(Json(detail))
}

/// PENDING → ON_PROCESS
pub async fn start_ticket(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = run_blocking(&state, move |s| s.lifecycle().start(&id, &actor)).await??;
    TICKET_TRANSITIONS_TOTAL.with_label_values(&["start"]).inc();
    Ok(Json(ticket))
}

/// ON_PROCESS → DONE
pub async fn complete_ticket(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = run_blocking(&state, move |s| s.lifecycle().complete(&id, &actor)).await??;
    TICKET_TRANSITIONS_TOTAL
        .with_label_values(&["complete"])
        .inc();
    Ok(Json(ticket))
}

/// Cancel a ticket (owner while PENDING, or admin)
pub async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = run_blocking(&state, move |s| s.lifecycle().cancel(&id, &actor)).await??;
    TICKET_TRANSITIONS_TOTAL.with_label_values(&["cancel"]).inc();
    Ok(Json(ticket))
}

/// Rate a completed visit
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    body: Result<Json<FeedbackInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Feedback>), ApiError> {
    let Json(input) = body.map_err(bad_json)?;
    let feedback = run_blocking(&state, move |s| {
        s.lifecycle().submit_feedback(&id, &actor, input)
    })
    .await??;
    Ok((StatusCode::CREATED, Json(feedback)))
}
