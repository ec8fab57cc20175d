//! Orders, order lines and the status lifecycle

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::catalog::model::Product;
use crate::core::error::{OrderError, Result, ValidationError};
use crate::core::validation::validators::not_blank;
use crate::impl_entity;

/// Order lifecycle
///
/// ```text
/// Pending ──▶ Paid ──▶ Shipped ──▶ Delivered
///    │          │
///    └──────────┴──▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Shipped)
                | (Paid, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Validate a transition, yielding the typed error on refusal
    pub fn check_transition(&self, next: OrderStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            }
            .into())
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// A line with the product snapshot taken at placement time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
}

impl OrderLine {
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            line_total_cents: product.price_cents * i64::from(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub recipient: String,
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub line1: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Order, "orders", "order");

impl Order {
    /// Build an order from product snapshots
    pub fn new(draft: &NewOrder, lines: Vec<OrderLine>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            total_cents: lines.iter().map(|l| l.line_total_cents).sum(),
            lines,
            status: OrderStatus::Pending,
            shipping_address: draft.shipping_address.clone(),
            idempotency_key: draft.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether moving to `next` puts stock back
    pub fn restocks_on(&self, next: OrderStatus) -> bool {
        next == OrderStatus::Cancelled && self.status.can_transition_to(next)
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.product_id).collect()
    }
}

/// Upper bound for one product's quantity in an order, after merging
pub const MAX_LINE_QUANTITY: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(max = 100), nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(nested)]
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

/// Requested quantity of one product after merging duplicate lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Store input for placing an order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub lines: Vec<RequestedLine>,
    pub shipping_address: ShippingAddress,
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    /// Merge duplicate product lines, keeping first-appearance order
    pub fn from_request(
        user_id: Uuid,
        request: PlaceOrderRequest,
        idempotency_key: Option<String>,
    ) -> Result<Self> {
        let mut merged: IndexMap<Uuid, u32> = IndexMap::new();
        for item in &request.items {
            let qty = merged.entry(item.product_id).or_insert(0);
            *qty = qty.saturating_add(item.quantity);
        }

        if merged.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }
        let over_cap = merged.iter().find(|(_, qty)| **qty > MAX_LINE_QUANTITY);
        if let Some((product_id, _)) = over_cap {
            return Err(ValidationError::field(
                "items",
                format!("total quantity for product {product_id} exceeds {MAX_LINE_QUANTITY}"),
            )
            .into());
        }

        Ok(Self {
            user_id,
            lines: merged
                .into_iter()
                .map(|(product_id, quantity)| RequestedLine {
                    product_id,
                    quantity,
                })
                .collect(),
            shipping_address: request.shipping_address,
            idempotency_key,
        })
    }
}

/// Result of a placement attempt
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    #[serde(flatten)]
    pub order: Order,
    /// True when an earlier order with the same idempotency key was returned
    pub replayed: bool,
}
