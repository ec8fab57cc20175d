//! Product image upload: validation, resizing and storage

pub mod handlers;
pub mod pipeline;
pub mod store;

pub use pipeline::{ImagePipeline, RenderedVariant, VARIANT_CONTENT_TYPE};
#[cfg(feature = "remote-images")]
pub use store::RemoteImageStore;
pub use store::{ImageStore, LocalImageStore, image_store_from_config};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, post};
use uuid::Uuid;

use crate::server::host::AppState;

/// Storage key of one variant of one product image
pub fn variant_key(product_id: &Uuid, image_id: &Uuid, variant: &str) -> String {
    format!("products/{product_id}/{image_id}/{variant}.jpg")
}

/// Room for multipart boundaries and part headers around the file
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/products/{id}/images", post(handlers::upload_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD))
        .route(
            "/api/products/{id}/images/{image_id}",
            delete(handlers::delete_image),
        )
}
