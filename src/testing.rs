// Test doubles
//
// In-memory implementations of every injected collaborator, plus a wired
// harness. The fakes honor the same atomicity contracts as the production
// implementations: the order store's insert is exactly-once per
// idempotency key and the coupon store's redeem is a compare-and-increment
// under one lock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::cache::{MemoryCache, SharedCache};
use crate::cart::{AddItemRequest, CartService, CartStore};
use crate::catalog::{
    CatalogError, DayHours, MenuCatalog, MenuItem, OperatingHours, RestaurantDirectory,
    RestaurantProfile, UpdateMenuItemRequest,
};
use crate::context::TenantContext;
use crate::coupons::{
    Coupon, CouponError, CouponService, CouponStore, DiscountType, OrderHistory,
};
use crate::integrations::{
    AuditSink, OrderNotifier, PaymentError, PaymentGateway, PaymentIntent, RefundReceipt,
    RefundStatus,
};
use crate::orders::{
    CancellationMetadata, DeliveryMetadata, InsertOutcome, Order, OrderError, OrderService,
    OrderStatus, OrderStore, TimelineEntry,
};

/// A UTC instant at the given time tomorrow (always future, always on a
/// configured opening day).
pub fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
    let date = Utc::now().date_naive() + Duration::days(1);
    date.and_hms_opt(hour, minute, 0)
        .expect("valid wall-clock time")
        .and_utc()
}

// ---------------------------------------------------------------------------
// Order store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OrderStoreInner {
    orders: HashMap<Uuid, Order>,
    // (tenant, user, idempotency key) -> order id
    by_key: HashMap<(Uuid, Uuid, String), Uuid>,
}

/// In-memory order store with the same exactly-once insert contract as the
/// Postgres implementation.
#[derive(Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<OrderStoreInner>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    /// Shift an order's creation time into the past to test time-windowed
    /// policies.
    pub fn backdate(&self, order_id: Uuid, minutes: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.created_at = order.created_at - Duration::minutes(minutes);
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<InsertOutcome, OrderError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (
            order.tenant_id,
            order.user_id,
            order.idempotency_key.clone(),
        );
        if let Some(existing_id) = inner.by_key.get(&key) {
            let existing = inner.orders[existing_id].clone();
            return Ok(InsertOutcome::Existing(existing));
        }
        inner.by_key.insert(key, order.id);
        inner.orders.insert(order.id, order.clone());
        Ok(InsertOutcome::Created(order.clone()))
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, OrderError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .get(&order_id)
            .filter(|o| o.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Order>, OrderError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .by_key
            .get(&(tenant_id, user_id, idempotency_key.to_string()))
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let inner = self.inner.lock().unwrap();
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id && o.user_id == user_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        entry: TimelineEntry,
        actual_delivery_time: Option<DateTime<Utc>>,
    ) -> Result<Order, OrderError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .filter(|o| o.tenant_id == tenant_id)
            .ok_or(OrderError::NotFound)?;
        if order.status != from {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to,
            });
        }
        order.status = to;
        if order.actual_delivery_time.is_none() {
            order.actual_delivery_time = actual_delivery_time;
        }
        order.timeline.push(entry);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn record_cancellation(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        metadata: CancellationMetadata,
        entry: TimelineEntry,
    ) -> Result<Order, OrderError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .filter(|o| o.tenant_id == tenant_id)
            .ok_or(OrderError::NotFound)?;
        if order.status != from {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        order.status = OrderStatus::Cancelled;
        order.cancellation = Some(metadata);
        order.timeline.push(entry);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn merge_delivery_metadata(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        metadata: &DeliveryMetadata,
    ) -> Result<Order, OrderError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .filter(|o| o.tenant_id == tenant_id)
            .ok_or(OrderError::NotFound)?;
        let merged = order.delivery_metadata.get_or_insert_with(Default::default);
        if let Some(person) = &metadata.delivery_person {
            merged.delivery_person = Some(person.clone());
        }
        if let Some(location) = &metadata.location {
            merged.location = Some(location.clone());
        }
        if let Some(eta) = metadata.eta {
            merged.eta = Some(eta);
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn count_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, OrderError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id && o.user_id == user_id)
            .count() as i64)
    }
}

#[async_trait]
impl OrderHistory for InMemoryOrderStore {
    async fn user_order_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, CouponError> {
        self.count_for_user(tenant_id, user_id)
            .await
            .map_err(|e| CouponError::DatabaseError(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Coupon store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CouponStoreInner {
    coupons: HashMap<Uuid, Coupon>,
    redemptions: Vec<(Uuid, Uuid, Uuid)>, // (coupon, user, order)
}

/// In-memory coupon store; redeem is a compare-and-increment under one lock.
#[derive(Default)]
pub struct InMemoryCouponStore {
    inner: Mutex<CouponStoreInner>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, coupon: Coupon) {
        self.inner
            .lock()
            .unwrap()
            .coupons
            .insert(coupon.id, coupon);
    }

    pub fn usage(&self, code: &str) -> i32 {
        self.inner
            .lock()
            .unwrap()
            .coupons
            .values()
            .find(|c| c.code == code)
            .map(|c| c.current_usage)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn find_by_code(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        code: &str,
    ) -> Result<Option<Coupon>, CouponError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .coupons
            .values()
            .find(|c| {
                c.tenant_id == tenant_id && c.restaurant_id == restaurant_id && c.code == code
            })
            .cloned())
    }

    async fn redemptions_for_user(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, CouponError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .redemptions
            .iter()
            .filter(|(c, u, _)| *c == coupon_id && *u == user_id)
            .count() as i64)
    }

    async fn redeem(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<bool, CouponError> {
        let mut inner = self.inner.lock().unwrap();
        let coupon = inner
            .coupons
            .get_mut(&coupon_id)
            .ok_or_else(|| CouponError::NotFound(coupon_id.to_string()))?;
        if coupon.current_usage >= coupon.max_usage {
            return Ok(false);
        }
        coupon.current_usage += 1;
        inner.redemptions.push((coupon_id, user_id, order_id));
        Ok(true)
    }

    async fn release(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), CouponError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.redemptions.len();
        inner
            .redemptions
            .retain(|(c, u, o)| !(*c == coupon_id && *u == user_id && *o == order_id));
        if inner.redemptions.len() != before {
            if let Some(coupon) = inner.coupons.get_mut(&coupon_id) {
                coupon.current_usage = (coupon.current_usage - 1).max(0);
            }
        }
        Ok(())
    }

    async fn create(&self, coupon: &Coupon) -> Result<Coupon, CouponError> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.coupons.values().any(|c| {
            c.tenant_id == coupon.tenant_id
                && c.restaurant_id == coupon.restaurant_id
                && c.code == coupon.code
        });
        if duplicate {
            return Err(CouponError::DuplicateCode(coupon.code.clone()));
        }
        inner.coupons.insert(coupon.id, coupon.clone());
        Ok(coupon.clone())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<Coupon>, CouponError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .coupons
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Static menu catalog + restaurant directory backed by DashMaps; supports
/// several restaurants under one tenant.
pub struct StaticCatalog {
    tenant_id: Uuid,
    default_restaurant: Uuid,
    items: DashMap<Uuid, MenuItem>,
    profiles: DashMap<Uuid, RestaurantProfile>,
}

impl StaticCatalog {
    /// A catalog with one restaurant: 5% tax, delivery fee 30 under a 100
    /// threshold, open 09:00-22:00 every day.
    pub fn new(tenant_id: Uuid, restaurant_id: Uuid) -> Self {
        let catalog = Self {
            tenant_id,
            default_restaurant: restaurant_id,
            items: DashMap::new(),
            profiles: DashMap::new(),
        };
        catalog.add_restaurant(restaurant_id);
        catalog
    }

    /// Register another restaurant with the same default profile.
    pub fn add_restaurant(&self, restaurant_id: Uuid) {
        let mut hours = HashMap::new();
        for day in [
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
        ] {
            hours.insert(
                day.to_string(),
                DayHours {
                    open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    close: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                    is_open: true,
                },
            );
        }
        self.profiles.insert(
            restaurant_id,
            RestaurantProfile {
                tenant_id: self.tenant_id,
                restaurant_id,
                tax_rate: dec!(0.05),
                delivery_fee_threshold: dec!(100),
                delivery_fee_amount: dec!(30),
                operating_hours: OperatingHours(hours),
            },
        );
    }

    pub fn add_item(&self, name: &str, base_price: Decimal) -> Uuid {
        self.add_item_for(self.default_restaurant, name, base_price)
    }

    pub fn add_item_for(&self, restaurant_id: Uuid, name: &str, base_price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.items.insert(
            id,
            MenuItem {
                id,
                tenant_id: self.tenant_id,
                restaurant_id,
                name: name.to_string(),
                category: "mains".to_string(),
                base_price,
                is_available: true,
                modifiers: Vec::new(),
                updated_at: Utc::now(),
            },
        );
        id
    }

    pub fn set_price(&self, item_id: Uuid, base_price: Decimal) {
        if let Some(mut item) = self.items.get_mut(&item_id) {
            item.base_price = base_price;
        }
    }

    pub fn set_available(&self, item_id: Uuid, available: bool) {
        if let Some(mut item) = self.items.get_mut(&item_id) {
            item.is_available = available;
        }
    }
}

#[async_trait]
impl MenuCatalog for StaticCatalog {
    async fn get_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<MenuItem>, CatalogError> {
        Ok(self
            .items
            .get(&item_id)
            .filter(|item| item.tenant_id == tenant_id && item.restaurant_id == restaurant_id)
            .map(|item| item.clone()))
    }

    async fn get_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<MenuItem>, CatalogError> {
        let mut found = Vec::new();
        for id in item_ids {
            if let Some(item) = self.get_item(tenant_id, restaurant_id, *id).await? {
                found.push(item);
            }
        }
        Ok(found)
    }

    async fn list_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<MenuItem>, CatalogError> {
        let mut items: Vec<MenuItem> = self
            .items
            .iter()
            .filter(|item| item.tenant_id == tenant_id && item.restaurant_id == restaurant_id)
            .map(|item| item.clone())
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn update_item(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        item_id: Uuid,
        update: &UpdateMenuItemRequest,
    ) -> Result<MenuItem, CatalogError> {
        let mut item = self
            .items
            .get_mut(&item_id)
            .filter(|item| item.tenant_id == tenant_id && item.restaurant_id == restaurant_id)
            .ok_or(CatalogError::ItemNotFound(item_id))?;
        if let Some(price) = update.base_price {
            item.base_price = price;
        }
        if let Some(available) = update.is_available {
            item.is_available = available;
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }
}

#[async_trait]
impl RestaurantDirectory for StaticCatalog {
    async fn get_profile(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantProfile>, CatalogError> {
        if tenant_id != self.tenant_id {
            return Ok(None);
        }
        Ok(self.profiles.get(&restaurant_id).map(|p| p.clone()))
    }
}

// ---------------------------------------------------------------------------
// Payment gateway, notifier, audit
// ---------------------------------------------------------------------------

/// Gateway double: succeeds unless told to fail, counts refund calls.
#[derive(Default)]
pub struct MockPaymentGateway {
    fail_refunds: AtomicBool,
    refunds: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn refund_calls(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        _amount: Decimal,
        reference: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        Ok(PaymentIntent {
            intent_id: format!("pi_test_{}", reference),
        })
    }

    async fn refund(
        &self,
        payment_reference: &str,
        _amount: Decimal,
        _reason: &str,
    ) -> Result<RefundReceipt, PaymentError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(PaymentError::Declined("card network unavailable".to_string()));
        }
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(RefundReceipt {
            refund_id: format!("re_test_{}", payment_reference),
            status: RefundStatus::Processed,
        })
    }
}

/// Notifier double recording every event it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn notify_new_order(&self, restaurant_id: Uuid, order: &Order) {
        self.events
            .lock()
            .unwrap()
            .push(format!("new_order:{}:{}", restaurant_id, order.id));
    }

    async fn notify_status_change(&self, order_id: Uuid, status: OrderStatus, _actor_id: Uuid) {
        self.events
            .lock()
            .unwrap()
            .push(format!("status:{}:{}", order_id, status));
    }
}

/// Audit double recording action names.
#[derive(Default)]
pub struct RecordingAudit {
    pub actions: Mutex<Vec<String>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(
        &self,
        _tenant_id: Uuid,
        _actor_id: Uuid,
        action: &str,
        _details: serde_json::Value,
    ) {
        self.actions.lock().unwrap().push(action.to_string());
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A fully wired service stack over in-memory collaborators.
pub struct TestHarness {
    pub ctx: TenantContext,
    pub item_id: Uuid,
    pub cache: SharedCache,
    pub catalog: Arc<StaticCatalog>,
    pub order_store: Arc<InMemoryOrderStore>,
    pub coupon_store: Arc<InMemoryCouponStore>,
    pub gateway: Arc<MockPaymentGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub cart_store: CartStore,
    pub carts: CartService,
    pub coupons: CouponService,
    pub orders: OrderService,
}

impl TestHarness {
    pub async fn new() -> Self {
        let ctx = TenantContext {
            tenant_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };

        let cache: SharedCache = Arc::new(MemoryCache::new());
        let catalog = Arc::new(StaticCatalog::new(ctx.tenant_id, ctx.restaurant_id));
        let item_id = catalog.add_item("Paneer Tikka", dec!(100));

        let order_store = Arc::new(InMemoryOrderStore::new());
        let coupon_store = Arc::new(InMemoryCouponStore::new());
        let coupons = CouponService::new(
            coupon_store.clone(),
            order_store.clone(),
            cache.clone(),
        );

        let cart_store = CartStore::new(cache.clone());
        let carts = CartService::new(
            cart_store.clone(),
            catalog.clone(),
            catalog.clone(),
            coupons.clone(),
            cache.clone(),
        );

        let gateway = Arc::new(MockPaymentGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let orders = OrderService::new(
            order_store.clone(),
            cart_store.clone(),
            catalog.clone(),
            catalog.clone(),
            coupons.clone(),
            gateway.clone(),
            notifier.clone(),
            Arc::new(RecordingAudit::new()),
        );

        Self {
            ctx,
            item_id,
            cache,
            catalog,
            order_store,
            coupon_store,
            gateway,
            notifier,
            cart_store,
            carts,
            coupons,
            orders,
        }
    }

    /// Put (item, quantity) pairs into the user's cart at live menu prices.
    pub async fn seed_cart(&self, items: &[(Uuid, u32)]) {
        for (item_id, quantity) in items {
            let item = self
                .catalog
                .get_item(self.ctx.tenant_id, self.ctx.restaurant_id, *item_id)
                .await
                .unwrap()
                .expect("seeded item exists");
            self.carts
                .add_item(
                    &self.ctx,
                    AddItemRequest {
                        item_id: *item_id,
                        unit_base_price: item.base_price,
                        selected_modifiers: Vec::new(),
                        quantity: *quantity,
                        special_instructions: None,
                    },
                    None,
                )
                .await
                .expect("seeding the cart succeeds");
        }
    }

    /// Register a percentage coupon for the harness restaurant.
    pub async fn seed_coupon(&self, code: &str, percent: Decimal, max_usage: i32) {
        let now = Utc::now();
        self.coupon_store.insert(Coupon {
            id: Uuid::new_v4(),
            tenant_id: self.ctx.tenant_id,
            restaurant_id: self.ctx.restaurant_id,
            code: code.to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: percent,
            min_order_value: Decimal::ZERO,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            max_usage,
            current_usage: 0,
            per_user_usage_cap: 10,
            new_users_only: false,
            is_active: true,
            created_at: now,
        });
    }
}
