//! Uniform JSON response wrapper
//!
//! Every endpoint answers with the same shape so clients only need one
//! decoder:
//!
//! ```json
//! { "success": true, "message": "Product created", "object": { ... }, "errors": null }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// A single validation failure attached to a field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `items[0].quantity`)
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The `{ success, message, object, errors }` wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub object: Option<T>,
    pub errors: Option<Vec<FieldError>>,
}

impl<T: Serialize> Envelope<T> {
    /// Successful response carrying a payload
    pub fn ok(message: impl Into<String>, object: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            object: Some(object),
            errors: None,
        }
    }

    /// Attach a status code, producing something axum can return
    pub fn with_status(self, status: StatusCode) -> EnvelopeResponse<T> {
        EnvelopeResponse {
            status,
            envelope: self,
        }
    }

    /// `201 Created` response
    pub fn created(message: impl Into<String>, object: T) -> EnvelopeResponse<T> {
        Self::ok(message, object).with_status(StatusCode::CREATED)
    }
}

impl Envelope<serde_json::Value> {
    /// Failure response; `object` carries the machine-readable error code
    pub fn failure(
        message: impl Into<String>,
        object: Option<serde_json::Value>,
        errors: Option<Vec<FieldError>>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            object,
            errors,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// An envelope paired with a non-default status code
#[derive(Debug)]
pub struct EnvelopeResponse<T> {
    pub status: StatusCode,
    pub envelope: Envelope<T>,
}

impl<T: Serialize> IntoResponse for EnvelopeResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
