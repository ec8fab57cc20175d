//! Shared test harness for store backends
//!
//! Builders for users, products and order drafts, plus the
//! `store_contract_tests!` macro every backend runs.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! use store_harness::*;
//!
//! store_contract_tests!(InMemoryDatabase::new().stores());
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod store_contract_tests;

use uuid::Uuid;

use storefront::accounts::User;
use storefront::catalog::model::{ImageVariant, NewProductRequest, Product, ProductImage};
use storefront::core::Role;
use storefront::orders::model::{NewOrder, RequestedLine, ShippingAddress};

pub fn user(name: &str, email: &str) -> User {
    User::new(name, email, "argon2-hash".to_string(), Role::Customer)
}

pub fn product(name: &str, category: &str, price_cents: i64, stock: u32) -> Product {
    Product::new(NewProductRequest {
        name: name.to_string(),
        description: Some(format!("{name} for testing")),
        price_cents,
        category: category.to_string(),
        stock,
    })
}

pub fn image(product_id: &Uuid) -> ProductImage {
    let id = Uuid::new_v4();
    let key = format!("products/{product_id}/{id}/thumbnail.jpg");
    ProductImage {
        id,
        variants: vec![ImageVariant {
            name: "thumbnail".to_string(),
            url: format!("/uploads/{key}"),
            key,
            width: 150,
            height: 150,
        }],
        uploaded_at: chrono::Utc::now(),
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Grace Hopper".to_string(),
        line1: "1 Compiler Way".to_string(),
        line2: None,
        city: "Arlington".to_string(),
        postal_code: "22201".to_string(),
        country: "US".to_string(),
    }
}

/// An order draft for `(product, quantity)` lines
pub fn draft(user_id: Uuid, lines: &[(Uuid, u32)], key: Option<&str>) -> NewOrder {
    NewOrder {
        user_id,
        lines: lines
            .iter()
            .map(|&(product_id, quantity)| RequestedLine {
                product_id,
                quantity,
            })
            .collect(),
        shipping_address: address(),
        idempotency_key: key.map(str::to_string),
    }
}
