//! Response cache for public catalog reads
//!
//! Entries are keyed by route and canonical query signature, expire after
//! the TTL of their [`CacheKind`], and carry tags (`product:{id}`) so a
//! single write can drop everything derived from an entity. Catalog and
//! order handlers call the invalidation helpers right after a successful
//! write.

pub mod invalidation;
pub mod key;
pub mod store;

pub use key::{CacheKey, CacheKind, product_tag};
pub use store::{CacheStats, CacheStatus, Loaded, ResponseCache};
