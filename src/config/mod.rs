//! Configuration loading and management
//!
//! Configuration is a YAML document in which every field has a default, so
//! an empty file (or no file at all) yields a runnable development setup.
//! A handful of environment variables override the file after loading.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::cache::CacheKind;

/// Secret used when nothing is configured; refused outside development
pub const DEV_JWT_SECRET: &str = "storefront-dev-secret";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub images: ImagesConfig,
    pub database: DatabaseConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,

    /// Upper bound for JSON request bodies
    pub body_limit_bytes: usize,

    /// Name reported by the health endpoint
    pub service_name: String,

    /// Refuse the development JWT secret when true
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cors_origins: Vec::new(),
            body_limit_bytes: 1024 * 1024,
            service_name: "storefront-api".to_string(),
            production: false,
        }
    }
}

/// Token and password settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub token_ttl_secs: u64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,

    /// Admin account created at startup when missing
    pub seed_admin: Option<SeedAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            issuer: "storefront".to_string(),
            token_ttl_secs: 60 * 60 * 24,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            seed_admin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub product_list_ttl_secs: u64,
    pub product_detail_ttl_secs: u64,
    pub categories_ttl_secs: u64,
    pub max_entries: usize,
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            product_list_ttl_secs: 60,
            product_detail_ttl_secs: 300,
            categories_ttl_secs: 600,
            max_entries: 10_000,
            purge_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    /// TTL for a kind of cached response
    pub fn ttl_for(&self, kind: CacheKind) -> std::time::Duration {
        let secs = match kind {
            CacheKind::ProductList => self.product_list_ttl_secs,
            CacheKind::ProductDetail => self.product_detail_ttl_secs,
            CacheKind::Categories => self.categories_ttl_secs,
        };
        std::time::Duration::from_secs(secs)
    }
}

/// How a variant is fitted into its box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Scale and center-crop to exactly the box
    Fill,
    /// Scale down to fit inside the box, keeping the aspect ratio
    Fit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariantConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
}

impl ImageVariantConfig {
    fn new(name: &str, width: u32, height: u32, mode: ResizeMode) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            mode,
        }
    }
}

/// Where processed images go
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageStorageConfig {
    /// Files on disk, served under `/uploads`
    Local {
        dir: PathBuf,
        public_base_url: String,
    },
    /// Authenticated PUT/DELETE against a remote image host
    Remote {
        endpoint: String,
        public_base_url: String,
        api_key: Option<String>,
    },
}

impl Default for ImageStorageConfig {
    fn default() -> Self {
        ImageStorageConfig::Local {
            dir: PathBuf::from("uploads"),
            public_base_url: "/uploads".to_string(),
        }
    }
}

/// Image upload pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub max_upload_bytes: usize,
    pub accepted_types: Vec<String>,
    pub jpeg_quality: u8,
    pub variants: Vec<ImageVariantConfig>,
    pub storage: ImageStorageConfig,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 5 * 1024 * 1024,
            accepted_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            jpeg_quality: 82,
            variants: vec![
                ImageVariantConfig::new("thumbnail", 150, 150, ResizeMode::Fill),
                ImageVariantConfig::new("medium", 600, 600, ResizeMode::Fit),
                ImageVariantConfig::new("large", 1200, 1200, ResizeMode::Fit),
            ],
            storage: ImageStorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    InMemory,
    Mongodb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: Backend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::InMemory,
            mongodb_uri: "mongodb://localhost:27017/?replicaSet=rs0".to_string(),
            mongodb_database: "storefront".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply `STOREFRONT_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(addr) = lookup("STOREFRONT_ADDR") {
            self.server.addr = addr.parse()?;
        }
        if let Some(secret) = lookup("STOREFRONT_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(uri) = lookup("STOREFRONT_MONGODB_URI") {
            self.database.mongodb_uri = uri;
            self.database.backend = Backend::Mongodb;
        }
        if let Some(dir) = lookup("STOREFRONT_UPLOAD_DIR")
            && let ImageStorageConfig::Local { dir: current, .. } = &mut self.images.storage
        {
            *current = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.server.production && self.auth.jwt_secret == DEV_JWT_SECRET {
            bail!("auth.jwt_secret must be set in production");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be positive");
        }
        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            bail!("images.jpeg_quality must be within 1..=100");
        }
        for variant in &self.images.variants {
            if variant.width == 0 || variant.height == 0 {
                bail!("image variant '{}' has a zero dimension", variant.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config.server.addr.port(), 3000);
        assert!(config.cache.enabled);
        assert_eq!(config.images.variants.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
server:
  addr: "0.0.0.0:8080"
cache:
  product_list_ttl_secs: 5
images:
  storage:
    kind: remote
    endpoint: "https://img.example.com/api"
    public_base_url: "https://cdn.example.com"
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.server.addr.port(), 8080);
        assert_eq!(config.cache.product_list_ttl_secs, 5);
        assert_eq!(config.cache.product_detail_ttl_secs, 300);
        assert!(matches!(
            config.images.storage,
            ImageStorageConfig::Remote { api_key: None, .. }
        ));
    }

    #[test]
    fn test_ttl_for_kind() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for(CacheKind::ProductList).as_secs(), 60);
        assert_eq!(config.ttl_for(CacheKind::Categories).as_secs(), 600);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("STOREFRONT_ADDR", "0.0.0.0:9000"),
            ("STOREFRONT_JWT_SECRET", "s3cret"),
            ("STOREFRONT_MONGODB_URI", "mongodb://db:27017"),
            ("STOREFRONT_UPLOAD_DIR", "/var/lib/storefront"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.addr.port(), 9000);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.database.backend, Backend::Mongodb);
        match &config.images.storage {
            ImageStorageConfig::Local { dir, .. } => {
                assert_eq!(dir, &PathBuf::from("/var/lib/storefront"))
            }
            other => panic!("expected local storage, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.production = true;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.token_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.images.variants[0].width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_serialization_roundtrip() {
        let config = AppConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = AppConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.images.variants, config.images.variants);
    }
}
