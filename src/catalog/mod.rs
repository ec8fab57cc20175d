//! Product catalog

pub mod handlers;
pub mod model;

pub use model::{CategorySummary, ImageVariant, Product, ProductImage, ProductSummary};

use axum::Router;
use axum::routing::get;

use crate::server::host::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/api/products/{id}",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/api/categories", get(handlers::list_categories))
}
