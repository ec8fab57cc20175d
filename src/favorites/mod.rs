//! Per-user favorite products

pub mod handlers;
pub mod model;

pub use model::{Favorite, FavoriteView};

use axum::Router;
use axum::routing::{get, post};

use crate::server::host::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/favorites", get(handlers::list_favorites))
        .route(
            "/api/favorites/{product_id}",
            post(handlers::add_favorite).delete(handlers::remove_favorite),
        )
}
