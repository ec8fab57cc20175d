//! Which cached responses a write makes stale

use uuid::Uuid;

use super::key::{CacheKind, product_tag};
use super::store::ResponseCache;

impl ResponseCache {
    /// A product was created, updated, deleted or had its images changed
    pub fn invalidate_product(&self, id: &Uuid) {
        let removed = self.invalidate_tag(&product_tag(id))
            + self.invalidate_kind(CacheKind::ProductList)
            + self.invalidate_kind(CacheKind::Categories);
        tracing::debug!(product_id = %id, removed, "invalidated product responses");
    }

    /// Stock moved for these products (order placed or cancelled)
    ///
    /// Categories only count products, so they stay.
    pub fn invalidate_stock(&self, ids: &[Uuid]) {
        let mut removed = 0;
        for id in ids {
            removed += self.invalidate_tag(&product_tag(id));
        }
        removed += self.invalidate_kind(CacheKind::ProductList);
        tracing::debug!(products = ids.len(), removed, "invalidated stock-dependent responses");
    }
}
