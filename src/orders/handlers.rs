//! Order placement, lookup, cancellation and admin status changes

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use super::model::{
    NewOrder, Order, OrderListQuery, OrderStatus, PlaceOrderRequest, PlacedOrder,
    UpdateStatusRequest,
};
use crate::core::auth::AuthPolicy;
use crate::core::envelope::{Envelope, EnvelopeResponse};
use crate::core::error::{ApiError, EntityError, Result, ValidationError};
use crate::core::extractors::{AdminUser, CurrentUser};
use crate::core::validation::{PathParams, QueryParams, Validated};
use crate::server::host::AppState;

/// Header that makes order placement safe to retry
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map(str::trim)
        .map_err(|_| ValidationError::field("Idempotency-Key", "must be visible ASCII"))?;
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ValidationError::field(
            "Idempotency-Key",
            "must be between 1 and 255 characters",
        )
        .into());
    }
    Ok(Some(key.to_string()))
}

/// An order the caller may see; other users' orders look missing
async fn visible_order(state: &AppState, caller: &CurrentUser, id: Uuid) -> Result<Order> {
    let order = state
        .stores
        .orders
        .get(&id)
        .await?
        .filter(|o| AuthPolicy::owner_or_admin(o.user_id).check(&caller.context()))
        .ok_or_else(|| EntityError::not_found("order", id))?;
    Ok(order)
}

/// POST /api/orders
///
/// 201 for a new order, 200 with `replayed: true` when the idempotency key
/// was already used by this caller.
pub async fn place_order(
    State(state): State<AppState>,
    caller: CurrentUser,
    headers: HeaderMap,
    Validated(payload): Validated<PlaceOrderRequest>,
) -> Result<EnvelopeResponse<PlacedOrder>> {
    let key = idempotency_key(&headers)?;
    let draft = NewOrder::from_request(caller.user_id, payload, key)?;

    let placed = state
        .stores
        .orders
        .place_order(draft)
        .await
        .inspect_err(|e: &ApiError| {
            if !e.status_code().is_server_error() {
                tracing::warn!(user_id = %caller.user_id, code = e.error_code(), "order rejected");
            }
        })?;

    if placed.replayed {
        tracing::info!(order_id = %placed.order.id, "order replayed for idempotency key");
        return Ok(Envelope::ok("Order already placed", placed).with_status(StatusCode::OK));
    }

    state.cache.invalidate_stock(&placed.order.product_ids());
    tracing::info!(
        order_id = %placed.order.id,
        user_id = %caller.user_id,
        total_cents = placed.order.total_cents,
        "order placed"
    );
    Ok(Envelope::created("Order placed", placed))
}

/// GET /api/orders
pub async fn list_my_orders(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Envelope<Vec<Order>>> {
    let orders = state.stores.orders.list_for_user(&caller.user_id).await?;
    Ok(Envelope::ok(format!("{} orders", orders.len()), orders))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    caller: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> Result<Envelope<Order>> {
    let order = visible_order(&state, &caller, id).await?;
    Ok(Envelope::ok("Order fetched", order))
}

/// POST /api/orders/{id}/cancel
///
/// Owners may cancel while the order is pending; admins while it is
/// pending or paid.
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: CurrentUser,
    PathParams(id): PathParams<Uuid>,
) -> Result<Envelope<Order>> {
    visible_order(&state, &caller, id).await?;

    let expected = if caller.is_admin() {
        None
    } else {
        Some(OrderStatus::Pending)
    };
    let order = state
        .stores
        .orders
        .transition(&id, OrderStatus::Cancelled, expected)
        .await?;
    state.cache.invalidate_stock(&order.product_ids());

    tracing::info!(order_id = %id, user_id = %caller.user_id, "order cancelled");
    Ok(Envelope::ok("Order cancelled", order))
}

/// GET /api/admin/orders
pub async fn list_all_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    QueryParams(query): QueryParams<OrderListQuery>,
) -> Result<Envelope<Vec<Order>>> {
    let orders = state.stores.orders.list_all(query.status).await?;
    Ok(Envelope::ok(format!("{} orders", orders.len()), orders))
}

/// PUT /api/admin/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParams(id): PathParams<Uuid>,
    Validated(payload): Validated<UpdateStatusRequest>,
) -> Result<Envelope<Order>> {
    let order = state
        .stores
        .orders
        .transition(&id, payload.status, None)
        .await?;
    if payload.status == OrderStatus::Cancelled {
        state.cache.invalidate_stock(&order.product_ids());
    }

    tracing::info!(
        order_id = %id,
        status = %order.status,
        admin = %admin.user_id,
        "order status changed"
    );
    Ok(Envelope::ok("Order status updated", order))
}
