//! Query parameters and pagination utilities

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::error::{Result, ValidationError};

/// Query parameters accepted by the product listing
///
/// # Example
/// ```text
/// GET /api/products?page=2&limit=10
/// GET /api/products?category=shoes&min_price=1000&sort=price:asc
/// GET /api/products?search=leather&in_stock=true
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProductQuery {
    /// Page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Exact category match (case-insensitive)
    pub category: Option<String>,

    /// Case-insensitive substring of name or description
    pub search: Option<String>,

    /// Inclusive lower price bound, in cents
    pub min_price: Option<i64>,

    /// Inclusive upper price bound, in cents
    pub max_price: Option<i64>,

    /// Only products with stock left
    pub in_stock: Option<bool>,

    /// `field` or `field:asc|desc`
    pub sort: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            category: None,
            search: None,
            min_price: None,
            max_price: None,
            in_stock: None,
            sort: None,
        }
    }
}

/// Sortable product fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Name,
    CreatedAt,
    Stock,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Price => "price_cents",
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::Stock => "stock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub descending: bool,
}

impl SortSpec {
    /// Apply direction to an ascending comparison
    pub fn directed(&self, ordering: Ordering) -> Ordering {
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl ProductQuery {
    /// Page number, ensuring minimum of 1
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Limit, clamped to 1..=100
    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }

    /// Number of items to skip; saturates for absurd page numbers
    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit())
    }

    pub fn category(&self) -> Option<String> {
        normalized(&self.category)
    }

    pub fn search(&self) -> Option<String> {
        normalized(&self.search)
    }

    /// Parse the sort expression
    pub fn sort_spec(&self) -> Result<SortSpec> {
        let Some(raw) = self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(SortSpec::default());
        };

        let (field, direction) = raw.split_once(':').unwrap_or((raw, "asc"));
        let field = match field {
            "price" | "price_cents" => SortField::Price,
            "name" => SortField::Name,
            "created_at" => SortField::CreatedAt,
            "stock" => SortField::Stock,
            other => {
                return Err(invalid("sort", format!("unknown sort field '{other}'")));
            }
        };
        let descending = match direction {
            "asc" => false,
            "desc" => true,
            other => {
                return Err(invalid("sort", format!("unknown direction '{other}'")));
            }
        };

        Ok(SortSpec { field, descending })
    }

    /// Check parameters that cannot be fixed by clamping
    pub fn validate(&self) -> Result<()> {
        self.sort_spec()?;
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(invalid("min_price", "must not exceed max_price".to_string()));
        }
        if self.min_price.is_some_and(|p| p < 0) {
            return Err(invalid("min_price", "must not be negative".to_string()));
        }
        Ok(())
    }

    /// Canonical form of the normalised parameters, used as a cache key
    ///
    /// Parameter order, category casing and surrounding whitespace do not
    /// change the signature; clamped values are used instead of raw ones.
    pub fn signature(&self) -> String {
        let sort = self.sort_spec().unwrap_or_default();
        let mut parts = vec![
            format!("page={}", self.page()),
            format!("limit={}", self.limit()),
            format!(
                "sort={}:{}",
                sort.field.as_str(),
                if sort.descending { "desc" } else { "asc" }
            ),
        ];
        if let Some(category) = self.category() {
            parts.push(format!("category={category}"));
        }
        if let Some(search) = self.search() {
            parts.push(format!("search={search}"));
        }
        if let Some(min) = self.min_price {
            parts.push(format!("min_price={min}"));
        }
        if let Some(max) = self.max_price {
            parts.push(format!("max_price={max}"));
        }
        if let Some(in_stock) = self.in_stock {
            parts.push(format!("in_stock={in_stock}"));
        }
        parts.sort();
        parts.join("&")
    }
}

fn normalized(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn invalid(parameter: &str, message: String) -> crate::core::error::ApiError {
    ValidationError::InvalidQuery {
        parameter: parameter.to_string(),
        message,
    }
    .into()
}

/// Paginated response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// The paginated data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: usize, limit: usize, total: usize) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(page, limit, total),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create pagination metadata from calculation
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1).saturating_mul(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}
