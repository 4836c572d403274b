//! Order tracking endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::Debt;
use tally_engine::{OrderSplit, TrackingSummary};
use tally_state::DebtStore;

use super::error_response;
use crate::state::AppState;

/// An order that still has debts.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub debts: usize,
    pub worker_running: bool,
    pub worker_started_at: Option<DateTime<Utc>>,
}

/// Start tracking the debts of an order.
pub async fn track_order(
    State(state): State<AppState>,
    Json(split): Json<OrderSplit>,
) -> Result<(StatusCode, Json<TrackingSummary>), (StatusCode, String)> {
    if split.order_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "order_id is required".to_string()));
    }
    if split.shares.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "shares must not be empty".to_string()));
    }

    let summary = state
        .service
        .track_order(split)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// List orders with outstanding debts.
pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderResponse>>, (StatusCode, String)> {
    let workers = state.service.registry().active_orders().await;
    let order_ids = state.store.orders().await.map_err(error_response)?;

    let mut orders = Vec::with_capacity(order_ids.len());
    for order_id in order_ids {
        let debts = state
            .service
            .ledger()
            .list_debts_for_order(&order_id)
            .await
            .map_err(error_response)?;
        let started_at = workers
            .iter()
            .find(|(id, _)| *id == order_id)
            .map(|(_, started_at)| *started_at);

        orders.push(OrderResponse {
            debts: debts.len(),
            worker_running: started_at.is_some(),
            worker_started_at: started_at,
            order_id,
        });
    }

    Ok(Json(orders))
}

/// Debts of one order, in creation order.
pub async fn get_debts(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<Debt>>, (StatusCode, String)> {
    let debts = state
        .service
        .ledger()
        .list_debts_for_order(&order_id)
        .await
        .map_err(error_response)?;

    Ok(Json(debts))
}
