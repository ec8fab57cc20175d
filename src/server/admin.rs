//! Cache administration endpoints

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde_json::{Value, json};

use super::host::AppState;
use crate::cache::CacheStats;
use crate::core::envelope::Envelope;
use crate::core::error::Result;
use crate::core::extractors::AdminUser;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/admin/cache", get(cache_stats).delete(flush_cache))
}

/// GET /api/admin/cache
pub async fn cache_stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Envelope<CacheStats>> {
    Ok(Envelope::ok("Cache statistics", state.cache.stats()))
}

/// DELETE /api/admin/cache
pub async fn flush_cache(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Envelope<Value>> {
    let removed = state.cache.flush();
    tracing::info!(removed, admin = %admin.user_id, "response cache flushed");
    Ok(Envelope::ok("Cache flushed", json!({ "removed": removed })))
}
