use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt};

use storefront::accounts::seed_admin;
use storefront::config::{AppConfig, Backend};
use storefront::core::{PasswordService, Stores};
use storefront::server::ServerBuilder;
use storefront::storage::InMemoryDatabase;

const DEFAULT_CONFIG_PATH: &str = "storefront.yaml";
const DEFAULT_LOG_FILTER: &str = "storefront=info,tower_http=info";

fn load_config() -> Result<AppConfig> {
    let mut config = match std::env::var("STOREFRONT_CONFIG") {
        Ok(path) => AppConfig::from_yaml_file(&path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            AppConfig::from_yaml_file(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("failed to load {DEFAULT_CONFIG_PATH}"))?
        }
        Err(_) => AppConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

async fn open_stores(config: &AppConfig) -> Result<Stores> {
    match config.database.backend {
        Backend::InMemory => {
            tracing::warn!("using the in-memory backend; data is lost on restart");
            Ok(InMemoryDatabase::new().stores())
        }

        #[cfg(feature = "mongodb_backend")]
        Backend::Mongodb => {
            let db = storefront::storage::MongoDatabase::connect(
                &config.database.mongodb_uri,
                &config.database.mongodb_database,
            )
            .await?;
            db.ensure_indexes().await?;
            tracing::info!(database = %config.database.mongodb_database, "connected to MongoDB");
            Ok(db.stores())
        }

        #[cfg(not(feature = "mongodb_backend"))]
        Backend::Mongodb => {
            anyhow::bail!("database.backend is mongodb but the 'mongodb_backend' feature is off")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = load_config()?;
    let stores = open_stores(&config).await?;

    if let Some(seed) = &config.auth.seed_admin {
        let passwords = PasswordService::new(&config.auth)?;
        seed_admin(stores.users.as_ref(), &passwords, seed).await?;
    }

    let addr = config.server.addr;
    ServerBuilder::new(config).with_stores(stores).serve(addr).await
}
