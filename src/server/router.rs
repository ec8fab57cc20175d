//! API route table
//!
//! Every feature module contributes its own `Router<AppState>`; this merges
//! them into the `/api` surface:
//!
//! - `/api/auth/*`, `/api/users*`: accounts
//! - `/api/products*`, `/api/categories`: catalog (images included)
//! - `/api/orders*`, `/api/admin/orders*`: orders
//! - `/api/favorites*`: favorites
//! - `/api/admin/cache`: cache administration

use axum::Router;

use super::admin;
use super::host::AppState;
use crate::config::AppConfig;
use crate::{accounts, catalog, favorites, images, orders};

pub fn api_routes(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .merge(accounts::routes())
        .merge(catalog::routes())
        .merge(images::routes(config.images.max_upload_bytes))
        .merge(orders::routes())
        .merge(favorites::routes())
        .merge(admin::routes())
}
