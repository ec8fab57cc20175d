//! Shared application state
//!
//! `AppState` holds every service a handler may need. It is cheap to clone
//! (all fields are handles) and axum hands a clone to each request.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::core::auth::{PasswordService, TokenService};
use crate::core::store::Stores;
use crate::images::{ImagePipeline, ImageStore};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub tokens: Arc<TokenService>,
    pub passwords: Arc<PasswordService>,
    pub cache: ResponseCache,
    pub pipeline: Arc<ImagePipeline>,
    pub image_store: Arc<dyn ImageStore>,
}

impl AppState {
    /// Wire services from configuration around existing stores
    pub fn new(
        config: AppConfig,
        stores: Stores,
        image_store: Arc<dyn ImageStore>,
    ) -> crate::core::Result<Self> {
        let tokens = Arc::new(TokenService::new(&config.auth));
        let passwords = Arc::new(PasswordService::new(&config.auth)?);
        let cache = ResponseCache::new(config.cache.clone());
        let pipeline = Arc::new(ImagePipeline::new(config.images.clone()));

        Ok(Self {
            config: Arc::new(config),
            stores,
            tokens,
            passwords,
            cache,
            pipeline,
            image_store,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("stores", &self.stores)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::LocalImageStore;
    use crate::storage::InMemoryDatabase;

    #[test]
    fn test_state_from_defaults() {
        let config = AppConfig::default();
        let state = AppState::new(
            config,
            InMemoryDatabase::new().stores(),
            Arc::new(LocalImageStore::new("uploads", "/uploads")),
        )
        .unwrap();

        assert!(state.cache.is_enabled());
        assert_eq!(state.pipeline.max_upload_bytes(), 5 * 1024 * 1024);

        let tokens = Arc::<TokenService>::from_ref(&state);
        assert!(Arc::ptr_eq(&tokens, &state.tokens));
    }
}
