//! Store traits, one per aggregate
//!
//! Handlers only talk to these traits; the backends live in
//! [`crate::storage`]. Every method returns the typed [`ApiError`] so a
//! uniqueness clash or a stock shortfall reaches the client with the right
//! status no matter which backend produced it.
//!
//! [`ApiError`]: crate::core::error::ApiError

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::accounts::model::User;
use crate::catalog::model::{CategorySummary, Product, ProductImage, UpdateProductRequest};
use crate::core::error::Result;
use crate::core::query::ProductQuery;
use crate::favorites::model::Favorite;
use crate::orders::model::{NewOrder, Order, OrderStatus, PlacedOrder};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; the email must not be taken (case-insensitive)
    async fn create(&self, user: User) -> Result<User>;

    async fn get(&self, id: &Uuid) -> Result<Option<User>>;

    /// Lookup by already-normalised email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users, oldest first
    async fn list(&self) -> Result<Vec<User>>;

    /// Replace a stored user; the email must stay unique
    async fn update(&self, user: User) -> Result<User>;

    async fn delete(&self, id: &Uuid) -> Result<()>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, product: Product) -> Result<Product>;

    async fn get(&self, id: &Uuid) -> Result<Option<Product>>;

    /// Products for the given ids; unknown ids are skipped
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Product>>;

    /// One page of matching products and the total match count
    async fn list(&self, query: &ProductQuery) -> Result<(Vec<Product>, usize)>;

    /// Apply a partial update without touching fields it leaves out
    async fn update(&self, id: &Uuid, update: UpdateProductRequest) -> Result<Product>;

    /// Remove a product, returning it so its files can be cleaned up
    async fn delete(&self, id: &Uuid) -> Result<Product>;

    async fn add_image(&self, id: &Uuid, image: ProductImage) -> Result<Product>;

    /// Detach an image, returning the updated product and the removed image
    async fn remove_image(&self, id: &Uuid, image_id: &Uuid) -> Result<(Product, ProductImage)>;

    /// Product counts per category, sorted by name
    async fn categories(&self) -> Result<Vec<CategorySummary>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Check and decrement stock for every line and insert the order, all or nothing
    ///
    /// When the draft carries an idempotency key the user already used, the
    /// earlier order is returned with `replayed = true` and stock is untouched.
    async fn place_order(&self, draft: NewOrder) -> Result<PlacedOrder>;

    async fn get(&self, id: &Uuid) -> Result<Option<Order>>;

    /// A user's orders, newest first
    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Order>>;

    /// Every order, newest first, optionally filtered by status
    async fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>>;

    /// Move an order to `to`, restocking its lines when cancelling
    ///
    /// With `expected` set, the order must currently be in that status.
    async fn transition(
        &self,
        id: &Uuid,
        to: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<Order>;
}

#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Insert a favorite; the (user, product) pair must be new
    async fn add(&self, favorite: Favorite) -> Result<Favorite>;

    async fn remove(&self, user_id: &Uuid, product_id: &Uuid) -> Result<()>;

    /// A user's favorites, newest first
    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Favorite>>;

    /// Drop every favorite pointing at a product; returns how many went
    async fn remove_for_product(&self, product_id: &Uuid) -> Result<usize>;

    async fn remove_for_user(&self, user_id: &Uuid) -> Result<usize>;
}

/// Shared handles to every store
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub orders: Arc<dyn OrderStore>,
    pub favorites: Arc<dyn FavoriteStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
