//! Typed error handling for the storefront API
//!
//! Handlers and stores return [`ApiError`], whose variants wrap one error
//! category each. Every category knows its HTTP status and a stable error
//! code, and [`ApiError`] renders itself as a failure [`Envelope`].
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed bodies, field rule violations, bad query strings
//! - [`AuthError`]: missing/invalid tokens, bad credentials, role checks
//! - [`EntityError`]: not found / already exists
//! - [`OrderError`]: empty orders, stock shortfalls, illegal status changes
//! - [`ImageError`]: upload validation and decoding
//! - [`StorageError`]: backend and transaction failures
//!
//! # Example
//!
//! ```rust,ignore
//! let product = store
//!     .get(&id)
//!     .await?
//!     .ok_or_else(|| EntityError::not_found("product", id))?;
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::core::envelope::{Envelope, FieldError};

/// Convenience alias used across stores and handlers
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// The main error type of the API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Should not happen in normal operation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(e) => e.status_code(),
            ApiError::Auth(e) => e.status_code(),
            ApiError::Entity(e) => e.status_code(),
            ApiError::Order(e) => e.status_code(),
            ApiError::Image(e) => e.status_code(),
            ApiError::Storage(e) => e.status_code(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(e) => e.error_code(),
            ApiError::Auth(e) => e.error_code(),
            ApiError::Entity(e) => e.error_code(),
            ApiError::Order(e) => e.error_code(),
            ApiError::Image(e) => e.error_code(),
            ApiError::Storage(e) => e.error_code(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Field errors, if this is a field validation failure
    pub fn field_errors(&self) -> Option<Vec<FieldError>> {
        match self {
            ApiError::Validation(ValidationError::Fields(errors)) => Some(errors.clone()),
            _ => None,
        }
    }

    /// Extra machine-readable context merged into the envelope's `object`
    fn details(&self) -> serde_json::Value {
        match self {
            ApiError::Entity(EntityError::NotFound { entity_type, id }) => json!({
                "entity_type": entity_type,
                "id": id,
            }),
            ApiError::Order(OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            }) => json!({
                "product_id": product_id,
                "requested": requested,
                "available": available,
            }),
            ApiError::Order(OrderError::ProductUnavailable { product_id }) => json!({
                "product_id": product_id,
            }),
            ApiError::Order(OrderError::InvalidTransition { from, to }) => json!({
                "from": from,
                "to": to,
            }),
            _ => serde_json::Value::Null,
        }
    }

    /// Render as a failure envelope
    pub fn to_envelope(&self) -> Envelope<serde_json::Value> {
        let mut object = json!({ "code": self.error_code() });
        if let (Some(obj), serde_json::Value::Object(details)) =
            (object.as_object_mut(), self.details())
        {
            obj.extend(details);
        }

        // Internal details never reach the client
        let message = match self {
            ApiError::Internal(_) | ApiError::Storage(StorageError::Backend { .. }) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        Envelope::failure(message, Some(object), self.field_errors())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        (status, axum::Json(self.to_envelope())).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// The body could not be parsed as the expected JSON
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// One or more fields violate their rules
    #[error("Validation failed")]
    Fields(Vec<FieldError>),

    /// A query-string parameter is unusable
    #[error("Invalid query parameter '{parameter}': {message}")]
    InvalidQuery { parameter: String, message: String },

    /// A path segment does not parse (e.g. a malformed UUID)
    #[error("Invalid path parameter: {0}")]
    InvalidPath(String),
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::Fields(vec![FieldError::new(field, message)])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ValidationError::Fields(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ValidationError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            ValidationError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::MalformedBody(_) => "MALFORMED_BODY",
            ValidationError::Fields(_) => "VALIDATION_ERROR",
            ValidationError::InvalidQuery { .. } => "INVALID_QUERY",
            ValidationError::InvalidPath(_) => "INVALID_PATH",
        }
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    /// Same message for unknown email and wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Forbidden(_) => "FORBIDDEN",
        }
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum EntityError {
    #[error("{entity_type} with id '{id}' not found")]
    NotFound { entity_type: String, id: Uuid },

    #[error("{entity_type} '{key}' already exists")]
    AlreadyExists { entity_type: String, key: String },
}

impl EntityError {
    pub fn not_found(entity_type: &str, id: Uuid) -> Self {
        EntityError::NotFound {
            entity_type: entity_type.to_string(),
            id,
        }
    }

    pub fn already_exists(entity_type: &str, key: impl Into<String>) -> Self {
        EntityError::AlreadyExists {
            entity_type: entity_type.to_string(),
            key: key.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
            EntityError::AlreadyExists { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ENTITY_NOT_FOUND",
            EntityError::AlreadyExists { .. } => "ENTITY_ALREADY_EXISTS",
        }
    }
}

// =============================================================================
// Order Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Insufficient stock for product '{product_id}': requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Product '{product_id}' is not available")]
    ProductUnavailable { product_id: Uuid },

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl OrderError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::EmptyOrder => StatusCode::UNPROCESSABLE_ENTITY,
            OrderError::InsufficientStock { .. } => StatusCode::CONFLICT,
            OrderError::ProductUnavailable { .. } => StatusCode::NOT_FOUND,
            OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            OrderError::EmptyOrder => "EMPTY_ORDER",
            OrderError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            OrderError::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            OrderError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
        }
    }
}

// =============================================================================
// Image Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("Multipart field '{0}' is missing")]
    MissingFile(String),

    #[error("Unsupported image type '{0}'")]
    UnsupportedType(String),

    #[error("Image exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Image could not be decoded: {0}")]
    Decode(String),
}

impl ImageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ImageError::MissingFile(_) => StatusCode::BAD_REQUEST,
            ImageError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ImageError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ImageError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ImageError::MissingFile(_) => "MISSING_FILE",
            ImageError::UnsupportedType(_) => "UNSUPPORTED_IMAGE_TYPE",
            ImageError::TooLarge { .. } => "IMAGE_TOO_LARGE",
            ImageError::Decode(_) => "IMAGE_DECODE_FAILED",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },

    #[error("Transaction aborted after {attempts} attempts")]
    TransactionAborted { attempts: u32 },
}

impl StorageError {
    pub fn backend(backend: &str, message: impl std::fmt::Display) -> Self {
        StorageError::Backend {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StorageError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            StorageError::TransactionAborted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Backend { .. } => "STORAGE_ERROR",
            StorageError::TransactionAborted { .. } => "TRANSACTION_ABORTED",
        }
    }
}

#[cfg(feature = "mongodb_backend")]
impl From<mongodb::error::Error> for ApiError {
    fn from(err: mongodb::error::Error) -> Self {
        ApiError::Storage(StorageError::backend("MongoDB", err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err: ApiError = EntityError::not_found("product", Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err: ApiError = AuthError::Forbidden("admin only".into()).into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err: ApiError = AuthError::TokenExpired.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err: ApiError = OrderError::InsufficientStock {
            product_id: Uuid::nil(),
            requested: 3,
            available: 1,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = ImageError::TooLarge { limit: 10 }.into();
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let err: ApiError = StorageError::TransactionAborted { attempts: 3 }.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_envelope_carries_code_and_details() {
        let id = Uuid::new_v4();
        let err: ApiError = OrderError::InsufficientStock {
            product_id: id,
            requested: 5,
            available: 2,
        }
        .into();
        let env = err.to_envelope();

        assert!(!env.success);
        let object = env.object.unwrap();
        assert_eq!(object["code"], "INSUFFICIENT_STOCK");
        assert_eq!(object["product_id"], id.to_string());
        assert_eq!(object["requested"], 5);
        assert_eq!(object["available"], 2);
    }

    #[test]
    fn test_field_errors_exposed() {
        let err: ApiError = ValidationError::field("email", "invalid email").into();
        let env = err.to_envelope();

        assert_eq!(env.message, "Validation failed");
        let errors = env.errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn test_internal_messages_are_hidden() {
        let err = ApiError::internal("lock poisoned at tables");
        let env = err.to_envelope();
        assert_eq!(env.message, "Internal server error");

        let err: ApiError = StorageError::backend("MongoDB", "connection refused").into();
        assert_eq!(err.to_envelope().message, "Internal server error");
    }

    #[test]
    fn test_credentials_message_does_not_reveal_cause() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.to_string(), "Invalid email or password");
    }
}
