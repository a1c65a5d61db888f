use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        match &self {
            AppError::ValidationError { .. }
            | AppError::InvalidInput(_)
            | AppError::InvalidSignature(_)
            | AppError::NotFound => tracing::warn!(error = %self, "Request rejected"),
            _ => tracing::error!(error = ?self, "Request failed"),
        }

        let code = self.code();
        match self {
            AppError::ValidationError { field, message } => {
                let body = serde_json::json!({
                    "code": code.as_str(),
                    "field": field,
                    "message": message,
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::InvalidInput(msg) => error_resp(StatusCode::BAD_REQUEST, code, Some(msg)),
            AppError::InvalidSignature(_) => error_resp(StatusCode::BAD_REQUEST, code, None),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, code, None),
            AppError::PaymentDeclined(msg) => {
                error_resp(StatusCode::PAYMENT_REQUIRED, code, Some(msg))
            }
            AppError::ProcessorRejected {
                code: processor_code,
                message,
            } => {
                let body = serde_json::json!({
                    "code": code.as_str(),
                    "processor_code": processor_code,
                    "message": message,
                });
                (StatusCode::BAD_GATEWAY, Json(body)).into_response()
            }
            AppError::RateLimited => error_resp(StatusCode::TOO_MANY_REQUESTS, code, None),
            AppError::ProcessorUnavailable(_) => {
                error_resp(StatusCode::SERVICE_UNAVAILABLE, code, None)
            }
            AppError::UnexpectedResponse(_) => error_resp(StatusCode::BAD_GATEWAY, code, None),
            AppError::Internal(_) => error_resp(StatusCode::INTERNAL_SERVER_ERROR, code, None),
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
