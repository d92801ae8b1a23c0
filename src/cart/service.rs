// Cart service
//
// Business logic for cart mutations. Every add re-validates the submitted
// prices against the live menu; the stored cart only ever contains
// server-derived prices. Mutations are idempotent within the replay
// window, refresh the cart TTL, and recompute the pricing snapshot, which
// is returned but never persisted as authoritative.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{self, etag, SharedCache};
use crate::cart::error::CartError;
use crate::cart::models::{
    AddItemRequest, AppliedCoupon, CalculatedTotalResponse, Cart, CartLine, CartResponse,
    SelectedModifier, UpdateQuantityRequest,
};
use crate::cart::store::CartStore;
use crate::catalog::{MenuCatalog, MenuItem, RestaurantDirectory};
use crate::context::TenantContext;
use crate::coupons::CouponService;
use crate::pricing::{
    CartTotal, PricedLine, PricingConfig, PricingEngine, TaxSplit, PRICE_TOLERANCE,
};

/// Display-only pricing snapshots stay cached briefly.
const PRICING_SNAPSHOT_TTL: Duration = Duration::from_secs(120);

/// Hard ceiling on a single line's quantity, merged or not.
const MAX_LINE_QUANTITY: u32 = 50;

/// Service for cart business logic
#[derive(Clone)]
pub struct CartService {
    store: CartStore,
    catalog: Arc<dyn MenuCatalog>,
    directory: Arc<dyn RestaurantDirectory>,
    coupons: CouponService,
    cache: SharedCache,
}

impl CartService {
    pub fn new(
        store: CartStore,
        catalog: Arc<dyn MenuCatalog>,
        directory: Arc<dyn RestaurantDirectory>,
        coupons: CouponService,
        cache: SharedCache,
    ) -> Self {
        Self {
            store,
            catalog,
            directory,
            coupons,
            cache,
        }
    }

    /// The user's cart for this restaurant.
    ///
    /// A stored cart tagged with a different restaurant is reported as
    /// empty: it belongs to an abandoned session elsewhere and must not
    /// leak into this one.
    pub async fn get_cart(&self, ctx: &TenantContext) -> Result<CartResponse, CartError> {
        match self.load_for_restaurant(ctx).await? {
            Some(cart) => self.respond(ctx, cart).await,
            None => Ok(Self::empty_response(ctx)),
        }
    }

    /// Add an item to the cart, validating its price against the live menu.
    pub async fn add_item(
        &self,
        ctx: &TenantContext,
        request: AddItemRequest,
        idempotency_key: Option<&str>,
    ) -> Result<CartResponse, CartError> {
        if let Some(replayed) = self.replay(ctx, idempotency_key).await? {
            return Ok(replayed);
        }

        let item = self
            .catalog
            .get_item(ctx.tenant_id, ctx.restaurant_id, request.item_id)
            .await?
            .ok_or(CartError::MenuItemNotFound(request.item_id))?;

        if !item.is_available {
            return Err(CartError::ItemUnavailable(item.id));
        }

        let line = Self::validated_line(&request, &item)?;

        // A cart built against another restaurant is discarded, never merged.
        let mut cart = match self.store.load(ctx.tenant_id, ctx.user_id).await? {
            Some(existing) if existing.restaurant_id == ctx.restaurant_id => existing,
            _ => Cart::new(ctx.tenant_id, ctx.user_id, ctx.restaurant_id),
        };

        let merged_quantity = {
            // Probe without mutating so an over-limit merge leaves the cart intact.
            let existing_quantity = cart
                .items
                .iter()
                .find(|l| l.merges_with(&line))
                .map(|l| l.quantity)
                .unwrap_or(0);
            existing_quantity + line.quantity
        };
        if merged_quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity(format!(
                "Quantity for this item would exceed {}",
                MAX_LINE_QUANTITY
            )));
        }
        cart.merge_or_push(line);
        cart.updated_at = Utc::now();

        self.store.save(&cart).await?;
        let response = self.respond(ctx, cart).await?;
        self.remember(ctx, idempotency_key, &response).await?;
        Ok(response)
    }

    /// Change a line's quantity; zero removes the line.
    pub async fn update_quantity(
        &self,
        ctx: &TenantContext,
        line_id: Uuid,
        request: UpdateQuantityRequest,
        idempotency_key: Option<&str>,
    ) -> Result<CartResponse, CartError> {
        if let Some(replayed) = self.replay(ctx, idempotency_key).await? {
            return Ok(replayed);
        }

        let mut cart = self
            .load_for_restaurant(ctx)
            .await?
            .ok_or(CartError::LineNotFound(line_id))?;

        if request.quantity == 0 {
            if !cart.remove_line(line_id) {
                return Err(CartError::LineNotFound(line_id));
            }
        } else {
            let line = cart
                .find_line_mut(line_id)
                .ok_or(CartError::LineNotFound(line_id))?;
            line.set_quantity(request.quantity);
        }
        cart.updated_at = Utc::now();

        self.store.save(&cart).await?;
        let response = self.respond(ctx, cart).await?;
        self.remember(ctx, idempotency_key, &response).await?;
        Ok(response)
    }

    /// Remove a line from the cart.
    pub async fn remove_item(
        &self,
        ctx: &TenantContext,
        line_id: Uuid,
        idempotency_key: Option<&str>,
    ) -> Result<CartResponse, CartError> {
        if let Some(replayed) = self.replay(ctx, idempotency_key).await? {
            return Ok(replayed);
        }

        let mut cart = self
            .load_for_restaurant(ctx)
            .await?
            .ok_or(CartError::LineNotFound(line_id))?;

        if !cart.remove_line(line_id) {
            return Err(CartError::LineNotFound(line_id));
        }
        cart.updated_at = Utc::now();

        self.store.save(&cart).await?;
        let response = self.respond(ctx, cart).await?;
        self.remember(ctx, idempotency_key, &response).await?;
        Ok(response)
    }

    /// Destroy the cart entirely.
    pub async fn clear(&self, ctx: &TenantContext) -> Result<CartResponse, CartError> {
        self.store.clear(ctx.tenant_id, ctx.user_id).await?;
        Ok(Self::empty_response(ctx))
    }

    /// Display-only total calculation, optionally with a coupon applied.
    ///
    /// The snapshot is cached briefly keyed by cart contents and coupon
    /// code; it is never treated as authoritative. Order creation always
    /// recomputes from scratch.
    pub async fn calculate_total(
        &self,
        ctx: &TenantContext,
        coupon_code: Option<&str>,
    ) -> Result<CalculatedTotalResponse, CartError> {
        let cart = match self.load_for_restaurant(ctx).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => {
                return Ok(CalculatedTotalResponse {
                    totals: CartTotal::empty(),
                    coupon: None,
                })
            }
        };

        let snapshot_key = self.snapshot_key(ctx, &cart, coupon_code)?;
        if let Some(cached) =
            cache::get_json::<CalculatedTotalResponse>(self.cache.as_ref(), &snapshot_key).await?
        {
            return Ok(cached);
        }

        let config = self.pricing_config(ctx).await?;
        let subtotal = crate::pricing::round2(
            cart.items.iter().map(|l| l.computed_total_price).sum(),
        );

        let coupon = match coupon_code {
            Some(code) => {
                let (validation, discount) = self
                    .coupons
                    .validate(ctx.tenant_id, ctx.restaurant_id, ctx.user_id, code, subtotal)
                    .await
                    .map_err(|e| CartError::UpstreamError(e.to_string()))?;
                Some(AppliedCoupon {
                    code: code.to_string(),
                    valid: validation.valid,
                    reason: validation.reason,
                    discount,
                })
            }
            None => None,
        };

        let discount = coupon.as_ref().map(|c| c.discount).unwrap_or(Decimal::ZERO);
        let totals = PricingEngine::compute_total(&Self::priced_lines(&cart), &config, discount);

        let response = CalculatedTotalResponse { totals, coupon };
        if let Err(err) = cache::set_json(
            self.cache.as_ref(),
            &snapshot_key,
            &response,
            Some(PRICING_SNAPSHOT_TTL),
        )
        .await
        {
            tracing::warn!("Pricing snapshot cache write failed: {}", err);
        }

        Ok(response)
    }

    /// Load the cart only if its restaurant affinity matches the request.
    pub(crate) async fn load_for_restaurant(
        &self,
        ctx: &TenantContext,
    ) -> Result<Option<Cart>, CartError> {
        Ok(self
            .store
            .load(ctx.tenant_id, ctx.user_id)
            .await?
            .filter(|cart| cart.restaurant_id == ctx.restaurant_id))
    }

    fn validated_line(request: &AddItemRequest, item: &MenuItem) -> Result<CartLine, CartError> {
        if (request.unit_base_price - item.base_price).abs() > PRICE_TOLERANCE {
            return Err(CartError::PriceMismatch {
                item_id: item.id,
                detail: format!(
                    "base price {} differs from menu price {}",
                    request.unit_base_price, item.base_price
                ),
            });
        }

        let mut modifiers = Vec::with_capacity(request.selected_modifiers.len());
        for selection in &request.selected_modifiers {
            let live_delta = item
                .option_delta(selection.modifier_id, selection.option_id)
                .ok_or_else(|| CartError::PriceMismatch {
                    item_id: item.id,
                    detail: format!(
                        "modifier option {} is not offered on this item",
                        selection.option_id
                    ),
                })?;
            if (selection.price_delta - live_delta).abs() > PRICE_TOLERANCE {
                return Err(CartError::PriceMismatch {
                    item_id: item.id,
                    detail: format!(
                        "modifier delta {} differs from menu delta {}",
                        selection.price_delta, live_delta
                    ),
                });
            }
            // Store the live delta, not the submitted one.
            modifiers.push(SelectedModifier {
                modifier_id: selection.modifier_id,
                option_id: selection.option_id,
                price_delta: live_delta,
            });
        }

        Ok(CartLine::derive(
            item.id,
            item.name.clone(),
            item.base_price,
            modifiers,
            request.quantity,
            request.special_instructions.clone(),
        ))
    }

    async fn pricing_config(&self, ctx: &TenantContext) -> Result<PricingConfig, CartError> {
        let profile = self
            .directory
            .get_profile(ctx.tenant_id, ctx.restaurant_id)
            .await?
            .ok_or(CartError::ProfileNotFound)?;
        Ok(PricingConfig {
            tax_rate: profile.tax_rate,
            tax_split: TaxSplit::Intrastate,
            delivery_fee_threshold: profile.delivery_fee_threshold,
            delivery_fee_amount: profile.delivery_fee_amount,
        })
    }

    pub(crate) fn priced_lines(cart: &Cart) -> Vec<PricedLine> {
        cart.items
            .iter()
            .map(|line| PricedLine {
                line_total: line.computed_total_price,
                quantity: line.quantity,
            })
            .collect()
    }

    async fn respond(&self, ctx: &TenantContext, cart: Cart) -> Result<CartResponse, CartError> {
        let totals = if cart.is_empty() {
            CartTotal::empty()
        } else {
            let config = self.pricing_config(ctx).await?;
            PricingEngine::compute_total(&Self::priced_lines(&cart), &config, Decimal::ZERO)
        };
        Ok(CartResponse {
            restaurant_id: cart.restaurant_id,
            items: cart.items,
            totals,
            updated_at: cart.updated_at,
        })
    }

    fn empty_response(ctx: &TenantContext) -> CartResponse {
        CartResponse {
            restaurant_id: ctx.restaurant_id,
            items: Vec::new(),
            totals: CartTotal::empty(),
            updated_at: Utc::now(),
        }
    }

    async fn replay(
        &self,
        ctx: &TenantContext,
        idempotency_key: Option<&str>,
    ) -> Result<Option<CartResponse>, CartError> {
        match idempotency_key {
            Some(key) => self.store.replayed_result(ctx.tenant_id, ctx.user_id, key).await,
            None => Ok(None),
        }
    }

    async fn remember(
        &self,
        ctx: &TenantContext,
        idempotency_key: Option<&str>,
        response: &CartResponse,
    ) -> Result<(), CartError> {
        if let Some(key) = idempotency_key {
            self.store
                .remember_result(ctx.tenant_id, ctx.user_id, key, response)
                .await?;
        }
        Ok(())
    }

    fn snapshot_key(
        &self,
        ctx: &TenantContext,
        cart: &Cart,
        coupon_code: Option<&str>,
    ) -> Result<String, CartError> {
        let serialized = serde_json::to_vec(&cart.items)
            .map_err(|e| CartError::CacheError(e.to_string()))?;
        let content_hash = etag::compute(&serialized);
        let ns = cache::restaurant_namespace(ctx.tenant_id, ctx.restaurant_id);
        Ok(format!(
            "{}:pricing:{}:{}",
            ns,
            content_hash.trim_matches('"'),
            coupon_code.unwrap_or("-")
        ))
    }
}
