use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rush_booking::LedgerError;
use rush_core::StoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    ServiceUnavailable(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Trip is busy, try again".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFoundError(err.to_string()),
            StoreError::Duplicate(field) => AppError::ConflictError(format!("{} already registered", field)),
            StoreError::Conflict { .. } => AppError::ConflictError(err.to_string()),
            StoreError::Serde(_) | StoreError::Backend(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::TripNotFound(_)
            | LedgerError::ReservationNotFound { .. }
            | LedgerError::StopNotFound { .. }
            | LedgerError::CarNotFound(_)
            | LedgerError::UserNotFound(_) => AppError::NotFoundError(err.to_string()),
            LedgerError::NotCarOwner { .. } => AppError::AuthorizationError(err.to_string()),
            LedgerError::CapacityExceeded { .. } | LedgerError::CapacityBelowReserved { .. } => {
                AppError::ConflictError(err.to_string())
            }
            LedgerError::TransientConflict { .. } => AppError::ServiceUnavailable(err.to_string()),
            LedgerError::Validation(msg) => AppError::ValidationError(msg),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_ledger_errors_map_to_http_status() {
        let trip_id = Uuid::new_v4();
        assert_eq!(status_of(LedgerError::TripNotFound(trip_id)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(LedgerError::CapacityExceeded { requested: 2, available: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::TransientConflict { trip_id, attempts: 5 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(LedgerError::NotCarOwner { car_id: Uuid::new_v4(), user_id: Uuid::new_v4() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(LedgerError::Validation("bad".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_failures_are_hidden() {
        assert_eq!(
            status_of(StoreError::Backend("connection reset".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(StoreError::Duplicate("email".into())), StatusCode::CONFLICT);
    }
}
