//! Mapping of lifecycle errors onto HTTP responses.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nftvault_core::lifecycle::LifecycleError;
use nftvault_sdk::objects::ErrorResponse;
use uuid::Uuid;

/// Error type shared by every API handler.
#[derive(Debug)]
pub(crate) enum ApiError {
    Lifecycle(LifecycleError),
    /// The request body or query string could not be decoded.
    BadRequest(String),
    /// Missing or wrong `Vault-Admin-Authorization` header.
    Unauthorized,
    /// `/webhooks/{provider}` with a provider we do not know.
    UnknownProvider(String),
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        ApiError::Lifecycle(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

fn body(
    status: StatusCode,
    error: &str,
    message: String,
    order_id: Option<Uuid>,
    claim_token: Option<String>,
) -> Response {
    let payload = ErrorResponse {
        error: error.to_owned(),
        message,
        order_id,
        claim_token,
    };
    (status, Json(payload)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            ApiError::BadRequest(message) => {
                return body(StatusCode::BAD_REQUEST, "validation", message, None, None);
            }
            ApiError::Unauthorized => {
                return body(
                    StatusCode::UNAUTHORIZED,
                    "authentication",
                    "missing or invalid admin secret".into(),
                    None,
                    None,
                );
            }
            ApiError::UnknownProvider(provider) => {
                return body(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("unknown payment provider: {provider}"),
                    None,
                    None,
                );
            }
            ApiError::Lifecycle(e) => e,
        };

        let message = e.to_string();
        match e {
            LifecycleError::Validation(_) => {
                body(StatusCode::BAD_REQUEST, "validation", message, None, None)
            }
            LifecycleError::Authentication(_) => {
                body(StatusCode::UNAUTHORIZED, "authentication", message, None, None)
            }
            LifecycleError::NotFound(_) => {
                body(StatusCode::NOT_FOUND, "not_found", message, None, None)
            }
            LifecycleError::Conflict(_) => {
                body(StatusCode::CONFLICT, "conflict", message, None, None)
            }
            LifecycleError::InProgress(_) => {
                body(StatusCode::CONFLICT, "in_progress", message, None, None)
            }
            LifecycleError::Gone(_) => body(StatusCode::GONE, "gone", message, None, None),
            LifecycleError::Checkout {
                order_id,
                claim_token,
                ..
            } => {
                tracing::warn!(order_id = %order_id, error = %message, "Checkout failed");
                body(
                    StatusCode::BAD_GATEWAY,
                    "checkout_failed",
                    message,
                    Some(order_id),
                    claim_token,
                )
            }
            LifecycleError::Upstream(_) => {
                tracing::warn!(error = %message, "Payment provider error");
                body(StatusCode::BAD_GATEWAY, "upstream", message, None, None)
            }
            LifecycleError::Configuration(_) => {
                tracing::error!(error = %message, "Configuration error");
                body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration",
                    "server is misconfigured".into(),
                    None,
                    None,
                )
            }
            LifecycleError::Storage(_) => {
                tracing::error!(error = %message, "Storage error");
                body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error".into(),
                    None,
                    None,
                )
            }
        }
    }
}
