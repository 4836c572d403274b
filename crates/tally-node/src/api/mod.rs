//! HTTP and WebSocket API.

pub mod health;
pub mod orders;
pub mod reactions;
pub mod users;
pub mod ws;

use axum::http::StatusCode;
use tally_core::TallyError;

/// Map an engine error to an HTTP status and message.
pub fn error_response(err: TallyError) -> (StatusCode, String) {
    let status = match err {
        TallyError::InvalidDebt { .. } | TallyError::MalformedInput { .. } => {
            StatusCode::BAD_REQUEST
        }
        TallyError::LenderConflict { .. }
        | TallyError::DuplicateDebt { .. }
        | TallyError::WorkerAlreadyRunning { .. } => StatusCode::CONFLICT,
        TallyError::DirectoryLookup { .. } => StatusCode::NOT_FOUND,
        TallyError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TallyError::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
