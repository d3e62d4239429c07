use axum::{http::StatusCode, Json};
use leadline_core::errors::{ApplicationError, DomainError, InterfaceError};
use serde::Serialize;
use tracing::error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn not_found(what: &str, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError { error: format!("{what} not found"), correlation_id: correlation_id.to_string() }),
    )
}

pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError { error: message.into(), correlation_id: correlation_id.to_string() }),
    )
}

/// Domain failures keep their detail; everything else is reduced to the
/// user-safe message.
pub fn from_interface(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = error.correlation_id().to_string();
    match error {
        InterfaceError::BadRequest { message, .. } => {
            (StatusCode::BAD_REQUEST, Json(ApiError { error: message, correlation_id }))
        }
        InterfaceError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError { error: error.user_message().to_string(), correlation_id }),
        ),
    }
}

pub fn from_domain(
    error: impl Into<DomainError>,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    from_application(ApplicationError::from(error.into()), correlation_id)
}

pub fn from_application(
    failure: ApplicationError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    if !matches!(failure, ApplicationError::Domain(_)) {
        error!(
            event_name = "request.failed",
            correlation_id = %correlation_id,
            error = %failure,
            "request failed"
        );
    }
    from_interface(failure.into_interface(correlation_id))
}
