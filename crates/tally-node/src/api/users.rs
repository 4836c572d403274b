//! User profile registration.

use axum::{extract::State, http::StatusCode, Json};
use tally_core::User;

use crate::state::AppState;

/// Register or update a user profile.
pub async fn upsert_user(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<(StatusCode, Json<User>), (StatusCode, String)> {
    if user.id.trim().is_empty() || user.transport_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "id and transport_id are required".to_string(),
        ));
    }

    let status = match state.directory.upsert(user.clone()).await {
        Some(_) => StatusCode::OK,
        None => StatusCode::CREATED,
    };
    Ok((status, Json(user)))
}
