//! Orders: transactional placement and the status lifecycle

pub mod handlers;
pub mod model;

pub use model::{NewOrder, Order, OrderLine, OrderStatus, PlacedOrder, ShippingAddress};

use axum::Router;
use axum::routing::{get, post, put};

use crate::server::host::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/orders",
            get(handlers::list_my_orders).post(handlers::place_order),
        )
        .route("/api/orders/{id}", get(handlers::get_order))
        .route("/api/orders/{id}/cancel", post(handlers::cancel_order))
        .route("/api/admin/orders", get(handlers::list_all_orders))
        .route(
            "/api/admin/orders/{id}/status",
            put(handlers::update_order_status),
        )
}
