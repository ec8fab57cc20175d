//! Favorite records and the product view returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::model::{Product, ProductSummary};
use crate::impl_entity;

/// A (user, product) pair; unique per pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Favorite, "favorites", "favorite");

impl Favorite {
    pub fn new(user_id: Uuid, product_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A favorite joined with its product
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteView {
    pub id: Uuid,
    pub product: ProductSummary,
    pub created_at: DateTime<Utc>,
}

impl FavoriteView {
    pub fn new(favorite: &Favorite, product: &Product) -> Self {
        Self {
            id: favorite.id,
            product: product.summary(),
            created_at: favorite.created_at,
        }
    }
}
