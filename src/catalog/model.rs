//! Products, categories and the catalog request bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::validation::validators::{category_slug, not_blank};
use crate::impl_entity;

/// A catalog product; prices are integer cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category: String,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Product, "products", "product");

/// One uploaded picture and its resized renditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: Uuid,
    pub variants: Vec<ImageVariant>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub name: String,
    /// Storage key, used to delete the file later
    pub key: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Number of products per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
}

/// Compact product view embedded in favorites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub category: String,
    pub in_stock: bool,
    pub thumbnail_url: Option<String>,
}

impl Product {
    pub fn new(request: NewProductRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            description: request.description.unwrap_or_default(),
            price_cents: request.price_cents,
            category: request.category,
            stock: request.stock,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update; returns whether anything changed
    pub fn apply(&mut self, update: UpdateProductRequest) -> bool {
        let before = self.clone();

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price_cents {
            self.price_cents = price;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }

        let changed = *self != before;
        if changed {
            self.touch();
        }
        changed
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.name.clone(),
            price_cents: self.price_cents,
            category: self.category.clone(),
            in_stock: self.stock > 0,
            thumbnail_url: self
                .images
                .first()
                .and_then(|img| img.variants.first())
                .map(|v| v.url.clone()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewProductRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100_000_000))]
    pub price_cents: i64,
    #[validate(length(max = 64), custom(function = "category_slug"))]
    pub category: String,
    #[validate(range(max = 1_000_000))]
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100_000_000))]
    pub price_cents: Option<i64>,
    #[validate(length(max = 64), custom(function = "category_slug"))]
    pub category: Option<String>,
    #[validate(range(max = 1_000_000))]
    pub stock: Option<u32>,
}
