// Cart storage
//
// Carts live in the cache, not the database: they are mutable, short-lived
// and discardable. One blob per (tenant, user); last write wins across a
// user's devices, which is acceptable because every mutation is
// user-driven and idempotent. Every write refreshes the TTL.

use std::time::Duration;
use uuid::Uuid;

use crate::cache::{self, SharedCache};
use crate::cart::error::CartError;
use crate::cart::models::{Cart, CartResponse};

/// Carts expire after 24 hours of inactivity.
const CART_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Window within which a repeated mutation with the same idempotency key
/// replays the cached prior result instead of re-executing.
const IDEMPOTENCY_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache-backed cart storage.
#[derive(Clone)]
pub struct CartStore {
    cache: SharedCache,
}

impl CartStore {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    fn cart_key(tenant_id: Uuid, user_id: Uuid) -> String {
        format!("tenant:{}:cart:{}", tenant_id, user_id)
    }

    fn op_key(tenant_id: Uuid, user_id: Uuid, idempotency_key: &str) -> String {
        format!("tenant:{}:cart:{}:op:{}", tenant_id, user_id, idempotency_key)
    }

    /// Load the stored cart for a user, if any.
    pub async fn load(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<Cart>, CartError> {
        let cart = cache::get_json::<Cart>(
            self.cache.as_ref(),
            &Self::cart_key(tenant_id, user_id),
        )
        .await?;
        Ok(cart)
    }

    /// Persist the cart and refresh its TTL.
    pub async fn save(&self, cart: &Cart) -> Result<(), CartError> {
        cache::set_json(
            self.cache.as_ref(),
            &Self::cart_key(cart.tenant_id, cart.user_id),
            cart,
            Some(CART_TTL),
        )
        .await?;
        Ok(())
    }

    /// Destroy the stored cart.
    pub async fn clear(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), CartError> {
        self.cache
            .delete(&Self::cart_key(tenant_id, user_id))
            .await?;
        Ok(())
    }

    /// The cached result of a prior mutation with this idempotency key.
    pub async fn replayed_result(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<CartResponse>, CartError> {
        let result = cache::get_json::<CartResponse>(
            self.cache.as_ref(),
            &Self::op_key(tenant_id, user_id, idempotency_key),
        )
        .await?;
        Ok(result)
    }

    /// Remember a mutation's result for replay within the idempotency window.
    pub async fn remember_result(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        idempotency_key: &str,
        response: &CartResponse,
    ) -> Result<(), CartError> {
        cache::set_json(
            self.cache.as_ref(),
            &Self::op_key(tenant_id, user_id, idempotency_key),
            response,
            Some(IDEMPOTENCY_TTL),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::sync::Arc;

    fn store() -> CartStore {
        CartStore::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_load_absent_cart() {
        let store = store();
        let cart = store.load(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert!(cart.is_none());
    }

    #[tokio::test]
    async fn test_save_load_clear_roundtrip() {
        let store = store();
        let cart = Cart::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store.save(&cart).await.unwrap();
        let loaded = store.load(cart.tenant_id, cart.user_id).await.unwrap();
        assert!(loaded.is_some());
        assert_eq!(loaded.unwrap().restaurant_id, cart.restaurant_id);

        store.clear(cart.tenant_id, cart.user_id).await.unwrap();
        assert!(store.load(cart.tenant_id, cart.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_carts_are_isolated_per_user() {
        let store = store();
        let tenant = Uuid::new_v4();
        let cart = Cart::new(tenant, Uuid::new_v4(), Uuid::new_v4());
        store.save(&cart).await.unwrap();

        let other_user = Uuid::new_v4();
        assert!(store.load(tenant, other_user).await.unwrap().is_none());
    }
}
