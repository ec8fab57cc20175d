//! # Storefront API
//!
//! An e-commerce REST API built on axum: accounts, a product catalog,
//! orders with transactional stock handling, favorites and product images.
//!
//! ## Features
//!
//! - **Uniform envelope**: every response is `{ success, message, object, errors }`
//! - **Atomic orders**: stock is checked and decremented for every line, or not at all
//! - **Idempotent placement**: an `Idempotency-Key` header makes retries safe
//! - **Response cache**: TTL cache for catalog reads with tag and kind invalidation
//! - **Image pipeline**: uploads are validated, resized into variants and stored
//! - **Pluggable storage**: in-memory by default, MongoDB behind `mongodb_backend`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storefront::prelude::*;
//!
//! let config = AppConfig::from_yaml_file("storefront.yaml")?;
//! let addr = config.server.addr;
//! ServerBuilder::new(config).serve(addr).await?;
//! ```

pub mod accounts;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod core;
pub mod favorites;
pub mod images;
pub mod orders;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        AdminUser, ApiError, AuthContext, AuthPolicy, CurrentUser, Entity, Envelope,
        EnvelopeResponse, FieldError, OptionalUser, PaginatedResponse, PasswordService,
        ProductQuery, Result, Role, TokenService, Validated,
    };

    // === Stores ===
    pub use crate::core::store::{FavoriteStore, OrderStore, ProductStore, Stores, UserStore};
    pub use crate::storage::InMemoryDatabase;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDatabase;

    // === Domain ===
    pub use crate::accounts::{User, UserProfile};
    pub use crate::catalog::{Product, ProductImage};
    pub use crate::favorites::Favorite;
    pub use crate::orders::{Order, OrderStatus};

    // === Cache and images ===
    pub use crate::cache::{CacheKey, CacheKind, ResponseCache};
    pub use crate::images::{ImagePipeline, ImageStore, LocalImageStore};

    // === Config and server ===
    pub use crate::config::AppConfig;
    pub use crate::server::{AppState, ServerBuilder};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
