//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! Gated behind `mongodb_backend`:
//! ```toml
//! storefront-api = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! One collection per entity type, named by `Entity::resource_name()`
//! (`users`, `products`, `orders`, `favorites`).
//!
//! # Serialization strategy
//!
//! Entities are serialized via `serde_json::Value` as an intermediate format,
//! then converted to BSON documents. UUIDs and timestamps are therefore
//! stored as strings, and the `id` field is mapped to MongoDB's `_id`.
//!
//! # Transactions
//!
//! Order placement and status changes run inside a client session
//! transaction, which requires a replica set. Transient transaction errors
//! are retried a bounded number of times.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{
    ErrorKind, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure,
};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, Cursor, Database, IndexModel};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::accounts::model::User;
use crate::catalog::model::{CategorySummary, Product, ProductImage, UpdateProductRequest};
use crate::core::entity::Entity;
use crate::core::error::{ApiError, EntityError, OrderError, Result, StorageError};
use crate::core::query::ProductQuery;
use crate::core::store::{FavoriteStore, OrderStore, ProductStore, Stores, UserStore};
use crate::favorites::model::Favorite;
use crate::orders::model::{NewOrder, Order, OrderLine, OrderStatus, PlacedOrder};

const BACKEND: &str = "MongoDB";

/// Attempts for one transaction before giving up
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn backend_error(message: impl std::fmt::Display) -> ApiError {
    StorageError::backend(BACKEND, message).into()
}

/// Convert a serde_json::Value (expected to be an Object) into a BSON Document,
/// renaming `id` → `_id` for MongoDB convention.
fn json_to_document(json: serde_json::Value) -> Result<Document> {
    let bson_val = mongodb::bson::to_bson(&json)
        .map_err(|e| backend_error(format!("Failed to convert JSON to BSON: {e}")))?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => return Err(backend_error("Expected BSON document, got non-object")),
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }

    Ok(doc)
}

/// Convert a BSON Document back into a serde_json::Value,
/// renaming `_id` → `id` for domain entity convention.
fn document_to_json(mut doc: Document) -> serde_json::Value {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }

    Bson::Document(doc).into_relaxed_extjson()
}

/// Top-level fields that are sorted on and must compare as text in time order
const TIMESTAMP_FIELDS: [&str; 2] = ["created_at", "updated_at"];

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    let mut doc = json_to_document(serde_json::to_value(value)?)?;
    for field in TIMESTAMP_FIELDS {
        let parsed = match doc.get(field) {
            Some(Bson::String(text)) => DateTime::parse_from_rfc3339(text).ok(),
            _ => None,
        };
        if let Some(at) = parsed {
            doc.insert(field, timestamp_bson(at.with_timezone(&Utc)));
        }
    }
    Ok(doc)
}

fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(document_to_json(doc))
        .map_err(|e| backend_error(format!("Failed to deserialize document: {e}")))
}

/// Nested values go through JSON like whole entities
fn to_bson_value<T: Serialize>(value: &T) -> Result<Bson> {
    mongodb::bson::to_bson(&serde_json::to_value(value)?)
        .map_err(|e| backend_error(format!("Failed to convert JSON to BSON: {e}")))
}

/// RFC 3339 with a fixed nine-digit fraction
fn timestamp_bson(at: DateTime<Utc>) -> Bson {
    Bson::String(at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Convert a UUID to its BSON string representation for queries.
fn uuid_bson(id: &Uuid) -> Bson {
    Bson::String(id.to_string())
}

async fn collect<T: DeserializeOwned>(cursor: Cursor<Document>) -> Result<Vec<T>> {
    let docs: Vec<Document> = cursor.try_collect().await?;
    docs.into_iter().map(from_document).collect()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

/// Decide what to do with a failed transaction attempt: `None` means retry
fn settle_failure(err: mongodb::error::Error, attempt: u32) -> Option<ApiError> {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        if attempt < MAX_TRANSACTION_ATTEMPTS {
            tracing::warn!(attempt, error = %err, "transient transaction error, retrying");
            return None;
        }
        return Some(StorageError::TransactionAborted { attempts: attempt }.into());
    }
    Some(err.into())
}

/// Whether a commit that failed after `attempt` tries should be sent again
fn retry_commit(outcome_unknown: bool, attempt: u32) -> bool {
    outcome_unknown && attempt < MAX_TRANSACTION_ATTEMPTS
}

async fn commit(session: &mut ClientSession) -> mongodb::error::Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if retry_commit(e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT), attempt) => {
                tracing::warn!(attempt, error = %e, "commit outcome unknown, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Abort and hand a domain error back to the caller
async fn abort_with<T>(
    session: &mut ClientSession,
    err: impl Into<ApiError>,
) -> mongodb::error::Result<Result<T>> {
    session.abort_transaction().await?;
    Ok(Err(err.into()))
}

// ---------------------------------------------------------------------------
// MongoDatabase
// ---------------------------------------------------------------------------

/// Every store of the storefront backed by one MongoDB database
///
/// # Example
///
/// ```rust,ignore
/// let db = MongoDatabase::connect("mongodb://localhost:27017/?replicaSet=rs0", "shop").await?;
/// db.ensure_indexes().await?;
/// let stores = db.stores();
/// ```
#[derive(Clone, Debug)]
pub struct MongoDatabase {
    client: Client,
    database: Database,
}

impl MongoDatabase {
    pub fn new(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::new(client, database))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn stores(&self) -> Stores {
        Stores {
            users: Arc::new(self.clone()),
            products: Arc::new(self.clone()),
            orders: Arc::new(self.clone()),
            favorites: Arc::new(self.clone()),
        }
    }

    fn collection<T: Entity>(&self) -> Collection<Document> {
        self.database.collection(T::resource_name())
    }

    /// Create the indexes the stores rely on
    ///
    /// - `users.email` unique
    /// - `favorites.(user_id, product_id)` unique
    /// - `orders.(user_id, idempotency_key)` unique where a key is present
    /// - `orders.(user_id, created_at)` and `orders.status`
    /// - `products.category` and `products.price_cents`
    ///
    /// Idempotent, safe to call on every startup.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.collection::<User>()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.collection::<Favorite>()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "product_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        self.collection::<Order>()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "idempotency_key": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .partial_filter_expression(
                                doc! { "idempotency_key": { "$exists": true } },
                            )
                            .build(),
                    )
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": -1 })
                    .build(),
                IndexModel::builder().keys(doc! { "status": 1 }).build(),
            ])
            .await?;

        self.collection::<Product>()
            .create_indexes(vec![
                IndexModel::builder().keys(doc! { "category": 1 }).build(),
                IndexModel::builder().keys(doc! { "price_cents": 1 }).build(),
            ])
            .await?;

        Ok(())
    }

    async fn find_by_id<T: Entity + DeserializeOwned>(&self, id: &Uuid) -> Result<Option<T>> {
        self.collection::<T>()
            .find_one(doc! { "_id": uuid_bson(id) })
            .await?
            .map(from_document)
            .transpose()
    }

    async fn find_by_idempotency_key(&self, user_id: &Uuid, key: &str) -> Result<Option<Order>> {
        self.collection::<Order>()
            .find_one(doc! { "user_id": uuid_bson(user_id), "idempotency_key": key })
            .await?
            .map(from_document)
            .transpose()
    }

    async fn try_place_order(
        &self,
        session: &mut ClientSession,
        draft: &NewOrder,
    ) -> mongodb::error::Result<Result<PlacedOrder>> {
        session.start_transaction().await?;

        let products = self.collection::<Product>();
        let mut lines = Vec::with_capacity(draft.lines.len());

        for requested in &draft.lines {
            let id = uuid_bson(&requested.product_id);
            let Some(found) = products
                .find_one(doc! { "_id": id.clone() })
                .session(&mut *session)
                .await?
            else {
                return abort_with(
                    session,
                    OrderError::ProductUnavailable {
                        product_id: requested.product_id,
                    },
                )
                .await;
            };
            let product: Product = match from_document(found) {
                Ok(p) => p,
                Err(e) => return abort_with(session, e).await,
            };

            let quantity = i64::from(requested.quantity);
            let updated = products
                .update_one(
                    doc! { "_id": id, "stock": { "$gte": quantity } },
                    doc! {
                        "$inc": { "stock": -quantity },
                        "$set": { "updated_at": timestamp_bson(Utc::now()) },
                    },
                )
                .session(&mut *session)
                .await?;

            if updated.modified_count == 0 {
                return abort_with(
                    session,
                    OrderError::InsufficientStock {
                        product_id: product.id,
                        requested: requested.quantity,
                        available: product.stock,
                    },
                )
                .await;
            }

            lines.push(OrderLine::snapshot(&product, requested.quantity));
        }

        let order = Order::new(draft, lines);
        let document = match to_document(&order) {
            Ok(d) => d,
            Err(e) => return abort_with(session, e).await,
        };
        self.collection::<Order>()
            .insert_one(document)
            .session(&mut *session)
            .await?;

        commit(session).await?;
        Ok(Ok(PlacedOrder {
            order,
            replayed: false,
        }))
    }

    async fn try_transition(
        &self,
        session: &mut ClientSession,
        id: &Uuid,
        to: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> mongodb::error::Result<Result<Order>> {
        session.start_transaction().await?;

        let orders = self.collection::<Order>();
        let Some(found) = orders
            .find_one(doc! { "_id": uuid_bson(id) })
            .session(&mut *session)
            .await?
        else {
            return abort_with(session, EntityError::not_found("order", *id)).await;
        };
        let mut order: Order = match from_document(found) {
            Ok(o) => o,
            Err(e) => return abort_with(session, e).await,
        };

        let refused = || OrderError::InvalidTransition {
            from: order.status.to_string(),
            to: to.to_string(),
        };
        if expected.is_some_and(|s| s != order.status) || !order.status.can_transition_to(to) {
            let err = refused();
            return abort_with(session, err).await;
        }

        let now = Utc::now();
        let stamp = timestamp_bson(now);
        let updated = orders
            .update_one(
                doc! { "_id": uuid_bson(id), "status": order.status.as_str() },
                doc! { "$set": { "status": to.as_str(), "updated_at": stamp.clone() } },
            )
            .session(&mut *session)
            .await?;
        if updated.modified_count == 0 {
            // Someone else moved the order in between
            let err = refused();
            return abort_with(session, err).await;
        }

        if order.restocks_on(to) {
            let products = self.collection::<Product>();
            for line in &order.lines {
                products
                    .update_one(
                        doc! { "_id": uuid_bson(&line.product_id) },
                        doc! {
                            "$inc": { "stock": i64::from(line.quantity) },
                            "$set": { "updated_at": stamp.clone() },
                        },
                    )
                    .session(&mut *session)
                    .await?;
            }
        }

        commit(session).await?;
        order.status = to;
        order.updated_at = now;
        Ok(Ok(order))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[async_trait]
impl UserStore for MongoDatabase {
    async fn create(&self, user: User) -> Result<User> {
        match self.collection::<User>().insert_one(to_document(&user)?).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => {
                Err(EntityError::already_exists("user", &user.email).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &Uuid) -> Result<Option<User>> {
        self.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.collection::<User>()
            .find_one(doc! { "email": email })
            .await?
            .map(from_document)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<User>> {
        let cursor = self
            .collection::<User>()
            .find(doc! {})
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?;
        collect(cursor).await
    }

    async fn update(&self, user: User) -> Result<User> {
        let result = self
            .collection::<User>()
            .replace_one(doc! { "_id": uuid_bson(&user.id) }, to_document(&user)?)
            .await;

        match result {
            Ok(r) if r.matched_count == 0 => Err(EntityError::not_found("user", user.id).into()),
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => {
                Err(EntityError::already_exists("user", &user.email).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &Uuid) -> Result<()> {
        let result = self
            .collection::<User>()
            .delete_one(doc! { "_id": uuid_bson(id) })
            .await?;
        if result.deleted_count == 0 {
            return Err(EntityError::not_found("user", *id).into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

fn product_filter(query: &ProductQuery) -> Document {
    let mut filter = Document::new();

    if let Some(category) = query.category() {
        filter.insert("category", category);
    }
    if let Some(search) = query.search() {
        let pattern = regex::escape(&search);
        filter.insert(
            "$or",
            vec![
                doc! { "name": { "$regex": pattern.clone(), "$options": "i" } },
                doc! { "description": { "$regex": pattern, "$options": "i" } },
            ],
        );
    }

    let mut price = Document::new();
    if let Some(min) = query.min_price {
        price.insert("$gte", min);
    }
    if let Some(max) = query.max_price {
        price.insert("$lte", max);
    }
    if !price.is_empty() {
        filter.insert("price_cents", price);
    }

    match query.in_stock {
        Some(true) => {
            filter.insert("stock", doc! { "$gt": 0 });
        }
        Some(false) => {
            filter.insert("stock", 0);
        }
        None => {}
    }

    filter
}

#[async_trait]
impl ProductStore for MongoDatabase {
    async fn create(&self, product: Product) -> Result<Product> {
        self.collection::<Product>()
            .insert_one(to_document(&product)?)
            .await?;
        Ok(product)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Product>> {
        self.find_by_id(id).await
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<Bson> = ids.iter().map(uuid_bson).collect();
        let cursor = self
            .collection::<Product>()
            .find(doc! { "_id": { "$in": keys } })
            .await?;
        let mut found: HashMap<Uuid, Product> = collect::<Product>(cursor)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        // Keep the caller's order
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn list(&self, query: &ProductQuery) -> Result<(Vec<Product>, usize)> {
        let sort = query.sort_spec()?;
        let filter = product_filter(query);
        let collection = self.collection::<Product>();

        let mut order = Document::new();
        order.insert(sort.field.as_str(), if sort.descending { -1 } else { 1 });
        order.insert("_id", 1);

        let total = collection.count_documents(filter.clone()).await?;
        let cursor = collection
            .find(filter)
            .sort(order)
            .skip(query.offset().min(i64::MAX as usize) as u64)
            .limit(query.limit() as i64)
            .await?;

        Ok((collect(cursor).await?, total as usize))
    }

    async fn update(&self, id: &Uuid, update: UpdateProductRequest) -> Result<Product> {
        let mut product: Product = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| EntityError::not_found("product", *id))?;

        let touched: Vec<&str> = [
            ("name", update.name.is_some()),
            ("description", update.description.is_some()),
            ("price_cents", update.price_cents.is_some()),
            ("category", update.category.is_some()),
            ("stock", update.stock.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, present)| present.then_some(field))
        .collect();

        if !product.apply(update) {
            return Ok(product);
        }

        // Only the provided fields are written so concurrent stock changes survive
        let full = to_document(&product)?;
        let mut set = Document::new();
        for field in touched.into_iter().chain(["updated_at"]) {
            if let Some(value) = full.get(field) {
                set.insert(field, value.clone());
            }
        }

        self.collection::<Product>()
            .find_one_and_update(doc! { "_id": uuid_bson(id) }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .map(from_document)
            .transpose()?
            .ok_or_else(|| EntityError::not_found("product", *id).into())
    }

    async fn delete(&self, id: &Uuid) -> Result<Product> {
        self.collection::<Product>()
            .find_one_and_delete(doc! { "_id": uuid_bson(id) })
            .await?
            .map(from_document)
            .transpose()?
            .ok_or_else(|| EntityError::not_found("product", *id).into())
    }

    async fn add_image(&self, id: &Uuid, image: ProductImage) -> Result<Product> {
        let update = doc! {
            "$push": { "images": to_bson_value(&image)? },
            "$set": { "updated_at": timestamp_bson(Utc::now()) },
        };

        self.collection::<Product>()
            .find_one_and_update(doc! { "_id": uuid_bson(id) }, update)
            .return_document(ReturnDocument::After)
            .await?
            .map(from_document)
            .transpose()?
            .ok_or_else(|| EntityError::not_found("product", *id).into())
    }

    async fn remove_image(&self, id: &Uuid, image_id: &Uuid) -> Result<(Product, ProductImage)> {
        let product: Product = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| EntityError::not_found("product", *id))?;
        let removed = product
            .images
            .iter()
            .find(|img| img.id == *image_id)
            .cloned()
            .ok_or_else(|| EntityError::not_found("image", *image_id))?;

        let update = doc! {
            "$pull": { "images": { "id": uuid_bson(image_id) } },
            "$set": { "updated_at": timestamp_bson(Utc::now()) },
        };
        let updated = self
            .collection::<Product>()
            .find_one_and_update(doc! { "_id": uuid_bson(id) }, update)
            .return_document(ReturnDocument::After)
            .await?
            .map(from_document::<Product>)
            .transpose()?
            .ok_or_else(|| EntityError::not_found("product", *id))?;

        Ok((updated, removed))
    }

    async fn categories(&self) -> Result<Vec<CategorySummary>> {
        let cursor = self
            .collection::<Product>()
            .aggregate(vec![
                doc! { "$group": { "_id": "$category", "count": { "$sum": 1 } } },
                doc! { "$sort": { "_id": 1 } },
            ])
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;

        docs.into_iter()
            .map(|d| {
                let name = d
                    .get_str("_id")
                    .map_err(|e| backend_error(format!("Bad category group: {e}")))?
                    .to_string();
                let count = match d.get("count") {
                    Some(Bson::Int32(n)) => *n as usize,
                    Some(Bson::Int64(n)) => *n as usize,
                    other => return Err(backend_error(format!("Bad category count: {other:?}"))),
                };
                Ok(CategorySummary { name, count })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[async_trait]
impl OrderStore for MongoDatabase {
    async fn place_order(&self, draft: NewOrder) -> Result<PlacedOrder> {
        if let Some(key) = draft.idempotency_key.as_deref()
            && let Some(order) = self.find_by_idempotency_key(&draft.user_id, key).await?
        {
            return Ok(PlacedOrder {
                order,
                replayed: true,
            });
        }

        if draft.lines.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }

        let mut session = self.client.start_session().await?;
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let err = match self.try_place_order(&mut session, &draft).await {
                Ok(outcome) => return outcome,
                Err(e) => e,
            };
            let _ = session.abort_transaction().await;

            // A concurrent request with the same key won the race
            if is_duplicate_key(&err)
                && let Some(key) = draft.idempotency_key.as_deref()
                && let Some(order) = self.find_by_idempotency_key(&draft.user_id, key).await?
            {
                return Ok(PlacedOrder {
                    order,
                    replayed: true,
                });
            }

            if let Some(failure) = settle_failure(err, attempt) {
                return Err(failure);
            }
        }

        Err(StorageError::TransactionAborted {
            attempts: MAX_TRANSACTION_ATTEMPTS,
        }
        .into())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Order>> {
        self.find_by_id(id).await
    }

    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        let cursor = self
            .collection::<Order>()
            .find(doc! { "user_id": uuid_bson(user_id) })
            .sort(doc! { "created_at": -1, "_id": 1 })
            .await?;
        collect(cursor).await
    }

    async fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let filter = match status {
            Some(s) => doc! { "status": s.as_str() },
            None => doc! {},
        };
        let cursor = self
            .collection::<Order>()
            .find(filter)
            .sort(doc! { "created_at": -1, "_id": 1 })
            .await?;
        collect(cursor).await
    }

    async fn transition(
        &self,
        id: &Uuid,
        to: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<Order> {
        let mut session = self.client.start_session().await?;
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let err = match self.try_transition(&mut session, id, to, expected).await {
                Ok(outcome) => return outcome,
                Err(e) => e,
            };
            let _ = session.abort_transaction().await;

            if let Some(failure) = settle_failure(err, attempt) {
                return Err(failure);
            }
        }

        Err(StorageError::TransactionAborted {
            attempts: MAX_TRANSACTION_ATTEMPTS,
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

#[async_trait]
impl FavoriteStore for MongoDatabase {
    async fn add(&self, favorite: Favorite) -> Result<Favorite> {
        match self
            .collection::<Favorite>()
            .insert_one(to_document(&favorite)?)
            .await
        {
            Ok(_) => Ok(favorite),
            Err(e) if is_duplicate_key(&e) => Err(EntityError::already_exists(
                "favorite",
                favorite.product_id.to_string(),
            )
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, user_id: &Uuid, product_id: &Uuid) -> Result<()> {
        let result = self
            .collection::<Favorite>()
            .delete_one(doc! {
                "user_id": uuid_bson(user_id),
                "product_id": uuid_bson(product_id),
            })
            .await?;
        if result.deleted_count == 0 {
            return Err(EntityError::not_found("favorite", *product_id).into());
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Favorite>> {
        let cursor = self
            .collection::<Favorite>()
            .find(doc! { "user_id": uuid_bson(user_id) })
            .sort(doc! { "created_at": -1, "_id": 1 })
            .await?;
        collect(cursor).await
    }

    async fn remove_for_product(&self, product_id: &Uuid) -> Result<usize> {
        let result = self
            .collection::<Favorite>()
            .delete_many(doc! { "product_id": uuid_bson(product_id) })
            .await?;
        Ok(result.deleted_count as usize)
    }

    async fn remove_for_user(&self, user_id: &Uuid) -> Result<usize> {
        let result = self
            .collection::<Favorite>()
            .delete_many(doc! { "user_id": uuid_bson(user_id) })
            .await?;
        Ok(result.deleted_count as usize)
    }
}
