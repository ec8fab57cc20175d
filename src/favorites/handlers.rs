//! Favorite endpoints; each caller only ever sees their own list

use axum::extract::State;
use std::collections::HashMap;
use uuid::Uuid;

use super::model::{Favorite, FavoriteView};
use crate::core::envelope::{Envelope, EnvelopeResponse};
use crate::core::error::{EntityError, Result};
use crate::core::extractors::CurrentUser;
use crate::core::validation::PathParams;
use crate::server::host::AppState;

/// GET /api/favorites
///
/// Favorites whose product has since been deleted are left out.
pub async fn list_favorites(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Envelope<Vec<FavoriteView>>> {
    let favorites = state.stores.favorites.list_for_user(&caller.user_id).await?;
    let ids: Vec<Uuid> = favorites.iter().map(|f| f.product_id).collect();
    let products: HashMap<Uuid, _> = state
        .stores
        .products
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let views: Vec<FavoriteView> = favorites
        .iter()
        .filter_map(|f| products.get(&f.product_id).map(|p| FavoriteView::new(f, p)))
        .collect();
    Ok(Envelope::ok(format!("{} favorites", views.len()), views))
}

/// POST /api/favorites/{product_id}
pub async fn add_favorite(
    State(state): State<AppState>,
    caller: CurrentUser,
    PathParams(product_id): PathParams<Uuid>,
) -> Result<EnvelopeResponse<FavoriteView>> {
    let product = state
        .stores
        .products
        .get(&product_id)
        .await?
        .ok_or_else(|| EntityError::not_found("product", product_id))?;

    let favorite = state
        .stores
        .favorites
        .add(Favorite::new(caller.user_id, product_id))
        .await?;

    tracing::info!(user_id = %caller.user_id, product_id = %product_id, "favorite added");
    Ok(Envelope::created(
        "Added to favorites",
        FavoriteView::new(&favorite, &product),
    ))
}

/// DELETE /api/favorites/{product_id}
pub async fn remove_favorite(
    State(state): State<AppState>,
    caller: CurrentUser,
    PathParams(product_id): PathParams<Uuid>,
) -> Result<Envelope<serde_json::Value>> {
    state
        .stores
        .favorites
        .remove(&caller.user_id, &product_id)
        .await?;

    tracing::info!(user_id = %caller.user_id, product_id = %product_id, "favorite removed");
    Ok(Envelope::ok(
        "Removed from favorites",
        serde_json::json!({ "product_id": product_id }),
    ))
}
