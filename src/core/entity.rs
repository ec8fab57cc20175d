//! Entity trait shared by every stored aggregate

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Base trait for all stored entities.
///
/// Every entity has:
/// - id: application-generated unique identifier
/// - created_at / updated_at: timestamps managed by the handlers
///
/// `resource_name()` doubles as the collection name in document stores.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The plural resource name (e.g., "products")
    fn resource_name() -> &'static str;

    /// The singular resource name used in error messages (e.g., "product")
    fn resource_name_singular() -> &'static str;

    fn id(&self) -> Uuid;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;
}

/// Implements [`Entity`] for a struct with `id`, `created_at` and `updated_at` fields
#[macro_export]
macro_rules! impl_entity {
    ($type:ty, $plural:expr, $singular:expr) => {
        impl $crate::core::entity::Entity for $type {
            fn resource_name() -> &'static str {
                $plural
            }

            fn resource_name_singular() -> &'static str {
                $singular
            }

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }
        }
    };
}
