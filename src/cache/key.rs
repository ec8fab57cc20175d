use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::core::query::ProductQuery;

/// Category of a cached response, used for bulk invalidation and TTLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    ProductList,
    ProductDetail,
    Categories,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [
        CacheKind::ProductList,
        CacheKind::ProductDetail,
        CacheKind::Categories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::ProductList => "product_list",
            CacheKind::ProductDetail => "product_detail",
            CacheKind::Categories => "categories",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route plus canonical query signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub route: String,
    pub signature: String,
}

impl CacheKey {
    pub fn new(route: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            signature: signature.into(),
        }
    }

    pub fn product_list(query: &ProductQuery) -> Self {
        Self::new("/api/products", query.signature())
    }

    pub fn product_detail(id: &Uuid) -> Self {
        Self::new(format!("/api/products/{id}"), "")
    }

    pub fn categories() -> Self {
        Self::new("/api/categories", "")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signature.is_empty() {
            f.write_str(&self.route)
        } else {
            write!(f, "{}?{}", self.route, self.signature)
        }
    }
}

/// Tag attached to every entry derived from a product
pub fn product_tag(id: &Uuid) -> String {
    format!("product:{id}")
}
