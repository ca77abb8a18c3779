use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// Reasons a fetched checkout is refused by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("checkout status `{status}` is not paid")]
    UnpaidStatus { status: String },
    #[error("checkout belongs to flow `{actual}`, expected `{expected}`")]
    FlowMismatch { expected: String, actual: String },
    #[error("checkout metadata carries no user id")]
    MissingIdentity,
    #[error("checkout metadata is missing job fields: {}", missing.join(", "))]
    MissingJobData { missing: Vec<String> },
}

impl Rejection {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnpaidStatus { .. } => "unpaid_status",
            Self::FlowMismatch { .. } => "flow_mismatch",
            Self::MissingIdentity => "missing_identity",
            Self::MissingJobData { .. } => "missing_job_data",
        }
    }

    /// The offending value, where there is one.
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::UnpaidStatus { status } => Some(json!(status)),
            Self::FlowMismatch { actual, .. } => Some(json!(actual)),
            Self::MissingIdentity => None,
            Self::MissingJobData { missing } => Some(json!(missing)),
        }
    }
}

/// Errors produced by checkout creation and reconciliation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("payment provider is not configured; missing {}", missing.join(", "))]
    Configuration { missing: Vec<&'static str> },
    #[error("missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },
    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("payment provider error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider { status: Option<u16>, message: String },
    #[error("checkout rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
            details: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "code": self.code,
            "status": self.status.as_u16()
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        let message = err.to_string();
        match err {
            CheckoutError::Configuration { missing } => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", message)
                    .with_details(json!({ "missing": missing }))
            }
            CheckoutError::Validation { missing } => {
                AppError::new(StatusCode::BAD_REQUEST, "validation_error", message)
                    .with_details(json!({ "missing": missing }))
            }
            CheckoutError::InvalidField { field, .. } => {
                AppError::new(StatusCode::BAD_REQUEST, "validation_error", message)
                    .with_details(json!({ "field": field }))
            }
            CheckoutError::Provider { status, .. } => {
                AppError::new(StatusCode::BAD_GATEWAY, "provider_error", message)
                    .with_details(json!({ "provider_status": status }))
            }
            CheckoutError::Rejected(rejection) => {
                let status = match rejection {
                    Rejection::UnpaidStatus { .. } => StatusCode::PAYMENT_REQUIRED,
                    _ => StatusCode::BAD_REQUEST,
                };
                AppError::new(status, "checkout_rejected", message).with_details(json!({
                    "reason": rejection.reason(),
                    "value": rejection.value(),
                }))
            }
            CheckoutError::NotFound { .. } => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            CheckoutError::Database(_) => AppError::internal(message),
        }
    }
}
