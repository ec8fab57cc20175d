//! In-memory storage backend for development and tests
//!
//! All tables sit behind a single `RwLock`, so multi-table operations
//! (placing or cancelling an order) take the write lock once and are
//! atomic with respect to every other store call.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::accounts::model::User;
use crate::catalog::model::{CategorySummary, Product, ProductImage, UpdateProductRequest};
use crate::core::entity::Entity;
use crate::core::error::{ApiError, EntityError, OrderError, Result};
use crate::core::query::{ProductQuery, SortField};
use crate::core::store::{FavoriteStore, OrderStore, ProductStore, Stores, UserStore};
use crate::favorites::model::Favorite;
use crate::orders::model::{NewOrder, Order, OrderLine, OrderStatus, PlacedOrder};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    favorites: HashMap<Uuid, Favorite>,
}

/// Every table of the storefront in process memory
///
/// Cloning is cheap and shares the same tables.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store handles backed by this database
    pub fn stores(&self) -> Stores {
        Stores {
            users: Arc::new(self.clone()),
            products: Arc::new(self.clone()),
            orders: Arc::new(self.clone()),
            favorites: Arc::new(self.clone()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| ApiError::internal(format!("Failed to acquire read lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| ApiError::internal(format!("Failed to acquire write lock: {e}")))
    }
}

fn newest_first<T: Entity>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserStore for InMemoryDatabase {
    async fn create(&self, user: User) -> Result<User> {
        let mut tables = self.write()?;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(EntityError::already_exists("user", &user.email).into());
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update(&self, user: User) -> Result<User> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&user.id) {
            return Err(EntityError::not_found("user", user.id).into());
        }
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(EntityError::already_exists("user", &user.email).into());
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: &Uuid) -> Result<()> {
        self.write()?
            .users
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EntityError::not_found("user", *id).into())
    }
}

// =============================================================================
// Products
// =============================================================================

fn matches(product: &Product, query: &ProductQuery) -> bool {
    if let Some(category) = query.category()
        && product.category.to_lowercase() != category
    {
        return false;
    }
    if let Some(search) = query.search()
        && !product.name.to_lowercase().contains(&search)
        && !product.description.to_lowercase().contains(&search)
    {
        return false;
    }
    if query.min_price.is_some_and(|min| product.price_cents < min) {
        return false;
    }
    if query.max_price.is_some_and(|max| product.price_cents > max) {
        return false;
    }
    match query.in_stock {
        Some(true) => product.stock > 0,
        Some(false) => product.stock == 0,
        None => true,
    }
}

fn compare(a: &Product, b: &Product, field: SortField) -> Ordering {
    match field {
        SortField::Price => a.price_cents.cmp(&b.price_cents),
        SortField::Name => a.name.cmp(&b.name),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Stock => a.stock.cmp(&b.stock),
    }
}

#[async_trait]
impl ProductStore for InMemoryDatabase {
    async fn create(&self, product: Product) -> Result<Product> {
        self.write()?.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Product>> {
        Ok(self.read()?.products.get(id).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn list(&self, query: &ProductQuery) -> Result<(Vec<Product>, usize)> {
        let sort = query.sort_spec()?;
        let mut matched: Vec<Product> = self
            .read()?
            .products
            .values()
            .filter(|p| matches(p, query))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            sort.directed(compare(a, b, sort.field))
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matched.len();
        let page = matched
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();
        Ok((page, total))
    }

    async fn update(&self, id: &Uuid, update: UpdateProductRequest) -> Result<Product> {
        let mut tables = self.write()?;
        let product = tables
            .products
            .get_mut(id)
            .ok_or_else(|| EntityError::not_found("product", *id))?;
        product.apply(update);
        Ok(product.clone())
    }

    async fn delete(&self, id: &Uuid) -> Result<Product> {
        self.write()?
            .products
            .remove(id)
            .ok_or_else(|| EntityError::not_found("product", *id).into())
    }

    async fn add_image(&self, id: &Uuid, image: ProductImage) -> Result<Product> {
        let mut tables = self.write()?;
        let product = tables
            .products
            .get_mut(id)
            .ok_or_else(|| EntityError::not_found("product", *id))?;
        product.images.push(image);
        product.touch();
        Ok(product.clone())
    }

    async fn remove_image(&self, id: &Uuid, image_id: &Uuid) -> Result<(Product, ProductImage)> {
        let mut tables = self.write()?;
        let product = tables
            .products
            .get_mut(id)
            .ok_or_else(|| EntityError::not_found("product", *id))?;
        let position = product
            .images
            .iter()
            .position(|img| img.id == *image_id)
            .ok_or_else(|| EntityError::not_found("image", *image_id))?;
        let removed = product.images.remove(position);
        product.touch();
        Ok((product.clone(), removed))
    }

    async fn categories(&self) -> Result<Vec<CategorySummary>> {
        let tables = self.read()?;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for product in tables.products.values() {
            *counts.entry(product.category.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, count)| CategorySummary {
                name: name.to_string(),
                count,
            })
            .collect())
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderStore for InMemoryDatabase {
    async fn place_order(&self, draft: NewOrder) -> Result<PlacedOrder> {
        let mut tables = self.write()?;

        if let Some(key) = draft.idempotency_key.as_deref()
            && let Some(existing) = tables
                .orders
                .values()
                .find(|o| o.user_id == draft.user_id && o.idempotency_key.as_deref() == Some(key))
        {
            return Ok(PlacedOrder {
                order: existing.clone(),
                replayed: true,
            });
        }

        if draft.lines.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }

        // Check every line before touching anything
        let mut lines = Vec::with_capacity(draft.lines.len());
        for requested in &draft.lines {
            let product = tables.products.get(&requested.product_id).ok_or(
                OrderError::ProductUnavailable {
                    product_id: requested.product_id,
                },
            )?;
            if product.stock < requested.quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: requested.quantity,
                    available: product.stock,
                }
                .into());
            }
            lines.push(OrderLine::snapshot(product, requested.quantity));
        }

        for requested in &draft.lines {
            if let Some(product) = tables.products.get_mut(&requested.product_id) {
                product.stock -= requested.quantity;
                product.touch();
            }
        }

        let order = Order::new(&draft, lines);
        tables.orders.insert(order.id, order.clone());
        Ok(PlacedOrder {
            order,
            replayed: false,
        })
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Order>> {
        Ok(self.read()?.orders.get(id).cloned())
    }

    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| o.user_id == *user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn transition(
        &self,
        id: &Uuid,
        to: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<Order> {
        let mut tables = self.write()?;
        let current = tables
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| EntityError::not_found("order", *id))?;

        if expected.is_some_and(|s| s != current.status) {
            return Err(OrderError::InvalidTransition {
                from: current.status.to_string(),
                to: to.to_string(),
            }
            .into());
        }
        current.status.check_transition(to)?;

        if current.restocks_on(to) {
            for line in &current.lines {
                // Products deleted since the order was placed are skipped
                if let Some(product) = tables.products.get_mut(&line.product_id) {
                    product.stock = product.stock.saturating_add(line.quantity);
                    product.touch();
                }
            }
        }

        let order = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| EntityError::not_found("order", *id))?;
        order.status = to;
        order.updated_at = chrono::Utc::now();
        Ok(order.clone())
    }
}

// =============================================================================
// Favorites
// =============================================================================

#[async_trait]
impl FavoriteStore for InMemoryDatabase {
    async fn add(&self, favorite: Favorite) -> Result<Favorite> {
        let mut tables = self.write()?;
        if tables
            .favorites
            .values()
            .any(|f| f.user_id == favorite.user_id && f.product_id == favorite.product_id)
        {
            return Err(EntityError::already_exists("favorite", favorite.product_id.to_string()).into());
        }
        tables.favorites.insert(favorite.id, favorite.clone());
        Ok(favorite)
    }

    async fn remove(&self, user_id: &Uuid, product_id: &Uuid) -> Result<()> {
        let mut tables = self.write()?;
        let id = tables
            .favorites
            .values()
            .find(|f| f.user_id == *user_id && f.product_id == *product_id)
            .map(|f| f.id)
            .ok_or_else(|| EntityError::not_found("favorite", *product_id))?;
        tables.favorites.remove(&id);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Favorite>> {
        let mut favorites: Vec<Favorite> = self
            .read()?
            .favorites
            .values()
            .filter(|f| f.user_id == *user_id)
            .cloned()
            .collect();
        newest_first(&mut favorites);
        Ok(favorites)
    }

    async fn remove_for_product(&self, product_id: &Uuid) -> Result<usize> {
        let mut tables = self.write()?;
        let before = tables.favorites.len();
        tables.favorites.retain(|_, f| f.product_id != *product_id);
        Ok(before - tables.favorites.len())
    }

    async fn remove_for_user(&self, user_id: &Uuid) -> Result<usize> {
        let mut tables = self.write()?;
        let before = tables.favorites.len();
        tables.favorites.retain(|_, f| f.user_id != *user_id);
        Ok(before - tables.favorites.len())
    }
}
