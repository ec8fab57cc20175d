//! Core building blocks shared by every module: envelope, errors, auth,
//! query parsing, validation and the store traits

pub mod auth;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod extractors;
pub mod query;
pub mod store;
pub mod validation;

pub use auth::{AuthContext, AuthPolicy, Claims, PasswordService, Role, TokenService};
pub use entity::Entity;
pub use envelope::{Envelope, EnvelopeResponse, FieldError};
pub use error::{ApiError, Result};
pub use extractors::{AdminUser, CurrentUser, OptionalUser};
pub use query::{PaginatedResponse, PaginationMeta, ProductQuery};
pub use store::{FavoriteStore, OrderStore, ProductStore, Stores, UserStore};
pub use validation::{PathParams, QueryParams, Validated};
