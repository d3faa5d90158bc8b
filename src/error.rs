use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::scheduling::ScheduleError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Email or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn db(e: sqlx::Error) -> Self {
        ApiError::Internal(format!("db error: {e}"))
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

/// Map the scheduling error taxonomy onto transport codes explicitly,
/// instead of sniffing message text the way the JS backend did.
impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::NotFound => {
                ApiError::NotFound("NOT_FOUND", e.to_string())
            }
            ScheduleError::Conflict => {
                ApiError::Conflict("SLOT_UNAVAILABLE", e.to_string())
            }
            ScheduleError::Infrastructure(_) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_shape() {
        let body = ErrorResponse {
            error: ErrorObject {
                code: "SLOT_UNAVAILABLE".into(),
                message: "doctor is not available at the requested date and time".into(),
            },
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "error": {
                    "code": "SLOT_UNAVAILABLE",
                    "message": "doctor is not available at the requested date and time",
                }
            })
        );
    }

    #[test]
    fn schedule_errors_map_to_their_kinds() {
        assert!(matches!(
            ApiError::from(ScheduleError::NotFound),
            ApiError::NotFound(..)
        ));
        assert!(matches!(
            ApiError::from(ScheduleError::Conflict),
            ApiError::Conflict(..)
        ));
        assert!(matches!(
            ApiError::from(ScheduleError::Infrastructure("db error".into())),
            ApiError::Internal(..)
        ));
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}
