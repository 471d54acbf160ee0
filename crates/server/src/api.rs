//! JSON error bodies shared by the HTTP handlers.

use axum::{http::StatusCode, Json};
use leadsign_core::{ApplicationError, InterfaceError};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

pub fn failure(error: ApplicationError, correlation_id: &str) -> ApiFailure {
    interface_failure(error.into_interface(correlation_id))
}

pub fn interface_failure(error: InterfaceError) -> ApiFailure {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let (InterfaceError::BadRequest { message, correlation_id }
    | InterfaceError::NotFound { message, correlation_id }
    | InterfaceError::ServiceUnavailable { message, correlation_id }
    | InterfaceError::Internal { message, correlation_id }) = &error;

    (
        status,
        Json(ApiError {
            error: message.clone(),
            message: error.user_message().to_string(),
            correlation_id: correlation_id.clone(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use leadsign_core::ApplicationError;

    use super::failure;

    #[test]
    fn maps_application_errors_to_status_and_body() {
        let (status, body) = failure(ApplicationError::NotFound("email 7".to_string()), "req-1");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0.error, "email 7");
        assert_eq!(body.0.correlation_id, "req-1");

        let (status, _) = failure(ApplicationError::Persistence("locked".to_string()), "req-2");
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
