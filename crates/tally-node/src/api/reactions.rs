//! Reaction ingestion.

use axum::{extract::State, Json};
use tally_core::ReactionEvent;
use tally_engine::ReactionOutcome;

use crate::state::AppState;

/// Handle a reaction event from the chat platform.
///
/// Always answers 200 so the platform never redelivers; the body says what
/// happened.
pub async fn handle_reaction(
    State(state): State<AppState>,
    Json(event): Json<ReactionEvent>,
) -> Json<ReactionOutcome> {
    Json(state.service.handle_reaction(&event).await)
}
