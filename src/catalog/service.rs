// Catalog service
//
// Serves the menu listing as a cached read model with a content-hash ETag
// and owns the invalidation side: any mutation to menu data eagerly clears
// the whole tenant+restaurant cache namespace before the caller is told
// the write is done.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{self, etag, SharedCache};
use crate::catalog::error::CatalogError;
use crate::catalog::models::{MenuItem, UpdateMenuItemRequest};
use crate::catalog::repository::MenuCatalog;

/// TTL for the cached menu listing read model.
const LISTING_TTL: Duration = Duration::from_secs(300);

/// Cached menu listing: serialized body plus its content-hash ETag.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MenuListing {
    pub etag: String,
    pub body: serde_json::Value,
}

/// Service for menu read models and the mutations that invalidate them.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn MenuCatalog>,
    cache: SharedCache,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn MenuCatalog>, cache: SharedCache) -> Self {
        Self { catalog, cache }
    }

    /// The menu listing for a restaurant, computed once and cached with
    /// its ETag so `If-None-Match` hits never recompute or re-serialize.
    pub async fn menu_listing(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<MenuListing, CatalogError> {
        let ns = cache::restaurant_namespace(tenant_id, restaurant_id);
        let key = cache::composite_key(&[&ns, "menu", "listing"]);

        match cache::get_json::<MenuListing>(self.cache.as_ref(), &key).await {
            Ok(Some(listing)) => return Ok(listing),
            Ok(None) => {}
            Err(err) => {
                // A broken cache degrades to recompute, never to failure.
                tracing::warn!("Menu listing cache read failed: {}", err);
            }
        }

        let items = self.catalog.list_items(tenant_id, restaurant_id).await?;
        let body = serde_json::to_value(&items)
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
        let serialized = serde_json::to_vec(&body)
            .map_err(|e| CatalogError::DatabaseError(e.to_string()))?;
        let listing = MenuListing {
            etag: etag::compute(&serialized),
            body,
        };

        if let Err(err) =
            cache::set_json(self.cache.as_ref(), &key, &listing, Some(LISTING_TTL)).await
        {
            tracing::warn!("Menu listing cache write failed: {}", err);
        }

        Ok(listing)
    }

    /// Update a menu item's price/availability and eagerly invalidate every
    /// derived read model under the tenant+restaurant namespace.
    ///
    /// The invalidation completes before this returns so the caller's next
    /// read observes the change; if it fails the write still stands and the
    /// miss is logged for proactive re-invalidation, not surfaced.
    pub async fn update_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
        update: &UpdateMenuItemRequest,
    ) -> Result<MenuItem, CatalogError> {
        let item = self
            .catalog
            .update_item(tenant_id, restaurant_id, item_id, update)
            .await?;

        self.invalidate_namespace(tenant_id, restaurant_id).await;
        Ok(item)
    }

    /// Eagerly clear every cached read model for a tenant+restaurant pair.
    pub async fn invalidate_namespace(&self, tenant_id: Uuid, restaurant_id: Uuid) {
        let ns = cache::restaurant_namespace(tenant_id, restaurant_id);
        let pattern = format!("{}:*", ns);
        match self.cache.invalidate_pattern(&pattern).await {
            Ok(removed) => {
                tracing::debug!("Invalidated {} cache keys under {}", removed, ns);
            }
            Err(err) => {
                tracing::warn!(
                    "Cache invalidation for {} failed and must be retried: {}",
                    ns,
                    err
                );
            }
        }
    }
}
