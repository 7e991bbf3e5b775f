//! Counter queue and public display board.

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use loket_core::queue::{DisplayBoard, OperatorQueue};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::state::{run_blocking, AppState};

/// The calling operator's queue
pub async fn operator_queue(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
) -> Result<Json<OperatorQueue>, ApiError> {
    let now = Utc::now();
    let queue = run_blocking(&state, move |s| s.board().operator_queue(&actor, now)).await??;
    Ok(Json(queue))
}

/// Waiting-room display. No authentication.
pub async fn display_board(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DisplayBoard>, ApiError> {
    let now = Utc::now();
    let board = run_blocking(&state, move |s| s.board().display_board(now)).await??;
    Ok(Json(board))
}
