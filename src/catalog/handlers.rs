//! Product and category endpoints
//!
//! Public reads go through the response cache and report `x-cache: hit|miss`.
//! Admin writes invalidate the affected entries once the store has accepted
//! them.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use uuid::Uuid;

use super::model::{CategorySummary, NewProductRequest, Product, UpdateProductRequest};
use crate::cache::{CacheKey, CacheKind, CacheStatus, Loaded, product_tag};
use crate::core::envelope::{Envelope, EnvelopeResponse};
use crate::core::error::{ApiError, EntityError, Result};
use crate::core::extractors::AdminUser;
use crate::core::query::{PaginatedResponse, ProductQuery};
use crate::core::validation::{PathParams, QueryParams, Validated};
use crate::images::handlers::discard_files;
use crate::server::host::AppState;

/// Header telling clients whether the body came from the cache
pub const CACHE_HEADER: &str = "x-cache";

/// An envelope already serialized for the cache
pub struct CachedResponse {
    pub body: Value,
    pub status: CacheStatus,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        response
            .headers_mut()
            .insert(CACHE_HEADER, HeaderValue::from_static(self.status.as_str()));
        response
    }
}

impl From<(Value, CacheStatus)> for CachedResponse {
    fn from((body, status): (Value, CacheStatus)) -> Self {
        Self { body, status }
    }
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<CachedResponse> {
    query.validate()?;
    let key = CacheKey::product_list(&query);
    let products = state.stores.products.clone();

    let cached = state
        .cache
        .get_or_load(key, CacheKind::ProductList, || async {
            let (items, total) = products.list(&query).await?;
            let tags = items.iter().map(|p| product_tag(&p.id)).collect();
            let page = PaginatedResponse::new(items, query.page(), query.limit(), total);
            let body = serde_json::to_value(Envelope::ok("Products fetched", page))?;
            Ok::<_, ApiError>(Loaded::new(body, tags))
        })
        .await?;

    tracing::debug!(status = cached.1.as_str(), "product list served");
    Ok(cached.into())
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<CachedResponse> {
    let products = state.stores.products.clone();

    let cached = state
        .cache
        .get_or_load(CacheKey::product_detail(&id), CacheKind::ProductDetail, || async {
            let product = products
                .get(&id)
                .await?
                .ok_or_else(|| EntityError::not_found("product", id))?;
            let body = serde_json::to_value(Envelope::ok("Product fetched", product))?;
            Ok::<_, ApiError>(Loaded::new(body, vec![product_tag(&id)]))
        })
        .await?;

    tracing::debug!(product_id = %id, status = cached.1.as_str(), "product served");
    Ok(cached.into())
}

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<CachedResponse> {
    let products = state.stores.products.clone();

    let cached = state
        .cache
        .get_or_load(CacheKey::categories(), CacheKind::Categories, || async {
            let categories: Vec<CategorySummary> = products.categories().await?;
            let body = serde_json::to_value(Envelope::ok("Categories fetched", categories))?;
            Ok::<_, ApiError>(Loaded::new(body, Vec::new()))
        })
        .await?;

    Ok(cached.into())
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Validated(payload): Validated<NewProductRequest>,
) -> Result<EnvelopeResponse<Product>> {
    let product = state.stores.products.create(Product::new(payload)).await?;
    state.cache.invalidate_product(&product.id);

    tracing::info!(product_id = %product.id, admin = %admin.user_id, "product created");
    Ok(Envelope::created("Product created", product))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParams(id): PathParams<Uuid>,
    Validated(payload): Validated<UpdateProductRequest>,
) -> Result<Envelope<Product>> {
    let product = state.stores.products.update(&id, payload).await?;
    state.cache.invalidate_product(&id);

    tracing::info!(product_id = %id, admin = %admin.user_id, "product updated");
    Ok(Envelope::ok("Product updated", product))
}

/// DELETE /api/products/{id}
///
/// Also drops the product's favorites and its stored image files. Orders
/// keep their line snapshots.
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParams(id): PathParams<Uuid>,
) -> Result<Envelope<Product>> {
    let product = state.stores.products.delete(&id).await?;
    state.cache.invalidate_product(&id);

    let favorites = state.stores.favorites.remove_for_product(&id).await?;
    for image in &product.images {
        discard_files(state.image_store.as_ref(), image).await;
    }

    tracing::info!(
        product_id = %id,
        admin = %admin.user_id,
        favorites,
        images = product.images.len(),
        "product deleted"
    );
    Ok(Envelope::ok("Product deleted", product))
}
