// Order lifecycle service
//
// Turns a validated cart into a persisted, state-machine-governed order
// and drives it through fulfilment and cancellation. The three rules that
// shape everything here: client-submitted prices are never trusted,
// duplicate retries must never create a second order, and a cancellation
// must never complete with its refund unissued.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::cart::{Cart, CartStore};
use crate::catalog::{MenuCatalog, RestaurantDirectory, RestaurantProfile};
use crate::context::TenantContext;
use crate::coupons::{CouponQuote, CouponService};
use crate::integrations::{bounded, AuditSink, OrderNotifier, PaymentError, PaymentGateway};
use crate::orders::cancellation::{CancellationDenied, CancellationPolicy};
use crate::orders::error::OrderError;
use crate::orders::models::{
    BulkAction, BulkError, BulkOperateRequest, BulkOperationReport, CancelOrderRequest,
    CancellationEligibility, CancellationMetadata, CreateOrderRequest, DeliveryMetadata, Order,
    OrderStatus, TimelineEntry, UpdateStatusRequest,
};
use crate::orders::repository::{InsertOutcome, OrderStore};
use crate::orders::status_machine::StatusMachine;
use crate::pricing::{
    round2, PricingConfig, PricingEngine, TaxSplit, PRICE_TOLERANCE, TOTAL_TOLERANCE,
};

/// Fixed minutes added for the delivery leg of the ETA.
const DELIVERY_LEG_MINUTES: i64 = 20;

/// Fixed buffer minutes added to every ETA.
const BUFFER_MINUTES: i64 = 5;

/// Service for order lifecycle business logic
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cart_store: CartStore,
    catalog: Arc<dyn MenuCatalog>,
    directory: Arc<dyn RestaurantDirectory>,
    coupons: CouponService,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn OrderNotifier>,
    audit: Arc<dyn AuditSink>,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn OrderStore>,
        cart_store: CartStore,
        catalog: Arc<dyn MenuCatalog>,
        directory: Arc<dyn RestaurantDirectory>,
        coupons: CouponService,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn OrderNotifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            cart_store,
            catalog,
            directory,
            coupons,
            gateway,
            notifier,
            audit,
        }
    }

    /// Create an order from the user's stored cart.
    ///
    /// A repeated request with the same idempotency key returns the
    /// original order unchanged: no re-validation, no side effects. On the
    /// first attempt, every line price is re-validated against the live
    /// menu and the total is recomputed server-side before anything is
    /// persisted; a mismatch aborts with nothing written.
    pub async fn create_order(
        &self,
        ctx: &TenantContext,
        request: CreateOrderRequest,
    ) -> Result<Order, OrderError> {
        // Step 1: idempotent replay.
        if let Some(existing) = self
            .store
            .find_by_idempotency_key(ctx.tenant_id, ctx.user_id, &request.idempotency_key)
            .await?
        {
            tracing::debug!(
                "Replaying order {} for idempotency key {}",
                existing.id,
                request.idempotency_key
            );
            return Ok(existing);
        }

        let cart = self.load_cart(ctx).await?;

        // Step 2: server-side price re-validation of every line.
        self.revalidate_prices(ctx, &cart).await?;

        // Step 3: recompute the total and compare against the client's.
        let profile = self.profile(ctx).await?;
        let config = PricingConfig {
            tax_rate: profile.tax_rate,
            tax_split: TaxSplit::Intrastate,
            delivery_fee_threshold: profile.delivery_fee_threshold,
            delivery_fee_amount: profile.delivery_fee_amount,
        };

        let subtotal = round2(cart.items.iter().map(|l| l.computed_total_price).sum());
        let quote = match &request.coupon_code {
            Some(code) => Some(
                self.coupons
                    .quote(ctx.tenant_id, ctx.restaurant_id, ctx.user_id, code, subtotal)
                    .await?,
            ),
            None => None,
        };
        let discount = quote.as_ref().map(|q| q.discount).unwrap_or(Decimal::ZERO);

        let lines = crate::cart::CartService::priced_lines(&cart);
        let totals = PricingEngine::compute_total(&lines, &config, discount);

        if (totals.total - request.client_total).abs() > TOTAL_TOLERANCE {
            return Err(OrderError::TotalMismatch {
                client_total: request.client_total,
                server_total: totals.total,
            });
        }

        // Step 4: scheduled orders must land inside future opening hours.
        let now = Utc::now();
        if let Some(scheduled_for) = request.scheduled_for {
            Self::validate_schedule(scheduled_for, &profile, now)?;
        }

        // Step 5: deterministic delivery estimate.
        let base_time = request.scheduled_for.unwrap_or(now);
        let estimated_delivery_time = Self::estimate_delivery(base_time, totals.item_count);

        let order_id = Uuid::new_v4();

        let payment_reference = if totals.total > Decimal::ZERO {
            Some(self.create_payment_intent(totals.total, order_id).await?)
        } else {
            None
        };

        // The redemption is the atomic guard on the coupon cap; it happens
        // only after every validation has passed.
        if let Some(quote) = &quote {
            self.coupons
                .redeem(quote.coupon_id, ctx.user_id, order_id)
                .await?;
        }

        let order = Order {
            id: order_id,
            tenant_id: ctx.tenant_id,
            restaurant_id: ctx.restaurant_id,
            user_id: ctx.user_id,
            status: OrderStatus::Pending,
            items: cart.items.clone(),
            totals,
            coupon_code: quote.as_ref().map(|q| q.code.clone()),
            payment_reference,
            idempotency_key: request.idempotency_key.clone(),
            estimated_delivery_time,
            scheduled_for: request.scheduled_for,
            actual_delivery_time: None,
            cancellation: None,
            delivery_metadata: None,
            timeline: vec![TimelineEntry {
                status: OrderStatus::Pending,
                at: now,
                actor_id: ctx.user_id,
                notes: None,
            }],
            created_at: now,
            updated_at: now,
        };

        // Step 6: atomic insert against the idempotency index.
        match self.store.insert(&order).await {
            Ok(InsertOutcome::Created(created)) => {
                if let Err(err) = self.cart_store.clear(ctx.tenant_id, ctx.user_id).await {
                    // The order is committed; an unexpired cart is a
                    // nuisance, not a correctness problem.
                    tracing::warn!("Failed to clear cart after order {}: {}", created.id, err);
                }

                self.notifier
                    .notify_new_order(ctx.restaurant_id, &created)
                    .await;
                self.audit
                    .record(
                        ctx.tenant_id,
                        ctx.user_id,
                        "order.create",
                        json!({ "order_id": created.id, "total": created.totals.total }),
                    )
                    .await;

                tracing::info!("Created order {} for user {}", created.id, ctx.user_id);
                Ok(created)
            }
            Ok(InsertOutcome::Existing(existing)) => {
                // Lost a same-key race after redeeming; hand the use back.
                self.release_quote(&quote, ctx.user_id, order_id).await;
                Ok(existing)
            }
            Err(err) => {
                self.release_quote(&quote, ctx.user_id, order_id).await;
                Err(err)
            }
        }
    }

    /// Apply a status transition, appending exactly one timeline entry.
    pub async fn update_status(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        request: UpdateStatusRequest,
        actor_id: Uuid,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .find_by_id(ctx.tenant_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        StatusMachine::transition(order.status, request.status)
            .map_err(|(from, to)| OrderError::InvalidTransition { from, to })?;

        let now = Utc::now();
        let actual_delivery_time = (request.status == OrderStatus::Delivered).then_some(now);

        let updated = self
            .store
            .transition(
                ctx.tenant_id,
                order_id,
                order.status,
                request.status,
                TimelineEntry {
                    status: request.status,
                    at: now,
                    actor_id,
                    notes: request.notes,
                },
                actual_delivery_time,
            )
            .await?;

        self.notifier
            .notify_status_change(order_id, request.status, actor_id)
            .await;
        self.audit
            .record(
                ctx.tenant_id,
                actor_id,
                "order.update_status",
                json!({ "order_id": order_id, "status": request.status }),
            )
            .await;

        Ok(updated)
    }

    /// Merge delivery assignment fields without a status transition.
    pub async fn update_delivery(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        metadata: DeliveryMetadata,
    ) -> Result<Order, OrderError> {
        self.store
            .merge_delivery_metadata(ctx.tenant_id, order_id, &metadata)
            .await
    }

    /// Cancel an order under the tiered refund policy.
    ///
    /// The refund is issued before the status flips: if the gateway fails
    /// or times out, the order is left exactly as it was and the failure is
    /// surfaced. An order must never end up cancelled with a refund
    /// unissued.
    pub async fn cancel(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        request: CancelOrderRequest,
        actor_id: Uuid,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .find_by_id(ctx.tenant_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let now = Utc::now();
        let refund_percentage =
            CancellationPolicy::evaluate(order.status, order.created_at, now).map_err(|denied| {
                match denied {
                    CancellationDenied::NotCancellable => OrderError::NotCancellable,
                    CancellationDenied::WindowExpired => OrderError::CancellationWindowExpired,
                }
            })?;

        let refund_amount = round2(
            order.totals.total * Decimal::from(refund_percentage) / Decimal::from(100),
        );

        let refund_id = match (&order.payment_reference, refund_amount > Decimal::ZERO) {
            (Some(payment_reference), true) => {
                let receipt = bounded(self.gateway.refund(
                    payment_reference,
                    refund_amount,
                    &request.reason,
                ))
                .await
                .ok_or_else(|| {
                    OrderError::RefundFailed("payment gateway timed out".to_string())
                })?
                .map_err(|err| OrderError::RefundFailed(err.to_string()))?;
                Some(receipt.refund_id)
            }
            _ => None,
        };

        let metadata = CancellationMetadata {
            reason: request.reason.clone(),
            refund_amount,
            refund_percentage,
            refund_id,
        };

        let cancelled = self
            .store
            .record_cancellation(
                ctx.tenant_id,
                order_id,
                order.status,
                metadata,
                TimelineEntry {
                    status: OrderStatus::Cancelled,
                    at: now,
                    actor_id,
                    notes: request.notes,
                },
            )
            .await?;

        self.notifier
            .notify_status_change(order_id, OrderStatus::Cancelled, actor_id)
            .await;
        self.audit
            .record(
                ctx.tenant_id,
                actor_id,
                "order.cancel",
                json!({
                    "order_id": order_id,
                    "refund_amount": refund_amount,
                    "refund_percentage": refund_percentage,
                }),
            )
            .await;

        tracing::info!(
            "Cancelled order {} with {}% refund",
            order_id,
            refund_percentage
        );
        Ok(cancelled)
    }

    /// Report the cancellation tier an order would receive, without mutating.
    pub async fn check_cancellation_eligibility(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
    ) -> Result<CancellationEligibility, OrderError> {
        let order = self
            .store
            .find_by_id(ctx.tenant_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        Ok(
            match CancellationPolicy::evaluate(order.status, order.created_at, Utc::now()) {
                Ok(percentage) => CancellationEligibility {
                    cancellable: true,
                    refund_percentage: Some(percentage),
                    reason: None,
                },
                Err(CancellationDenied::NotCancellable) => CancellationEligibility {
                    cancellable: false,
                    refund_percentage: None,
                    reason: Some("Order is already delivered or cancelled".to_string()),
                },
                Err(CancellationDenied::WindowExpired) => CancellationEligibility {
                    cancellable: false,
                    refund_percentage: None,
                    reason: Some("The cancellation window has expired".to_string()),
                },
            },
        )
    }

    /// Apply one action to many orders, independently per order.
    ///
    /// One failing order never blocks the rest; the report tallies
    /// successes and failures. With `dry_run` the rules are evaluated but
    /// nothing is mutated.
    pub async fn bulk_operate(
        &self,
        ctx: &TenantContext,
        request: BulkOperateRequest,
        actor_id: Uuid,
    ) -> Result<BulkOperationReport, OrderError> {
        match request.action {
            BulkAction::UpdateStatus if request.status.is_none() => {
                return Err(OrderError::ValidationError(
                    "status is required for update_status".to_string(),
                ));
            }
            BulkAction::Cancel if request.reason.is_none() => {
                return Err(OrderError::ValidationError(
                    "reason is required for cancel".to_string(),
                ));
            }
            BulkAction::Assign if request.delivery_metadata.is_none() => {
                return Err(OrderError::ValidationError(
                    "delivery_metadata is required for assign".to_string(),
                ));
            }
            _ => {}
        }

        let mut report = BulkOperationReport {
            processed: 0,
            failed: 0,
            errors: Vec::new(),
        };

        for order_id in &request.order_ids {
            let result = self
                .apply_bulk_action(ctx, *order_id, &request, actor_id)
                .await;
            match result {
                Ok(()) => report.processed += 1,
                Err(err) => {
                    report.failed += 1;
                    report.errors.push(BulkError {
                        order_id: *order_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    pub async fn get_order(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
    ) -> Result<Order, OrderError> {
        self.store
            .find_by_id(ctx.tenant_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    pub async fn list_orders(
        &self,
        ctx: &TenantContext,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        self.store
            .list_for_user(ctx.tenant_id, ctx.user_id, status)
            .await
    }

    async fn apply_bulk_action(
        &self,
        ctx: &TenantContext,
        order_id: Uuid,
        request: &BulkOperateRequest,
        actor_id: Uuid,
    ) -> Result<(), OrderError> {
        match request.action {
            BulkAction::UpdateStatus => {
                let status = request.status.ok_or_else(|| {
                    OrderError::ValidationError("status is required".to_string())
                })?;
                if request.dry_run {
                    let order = self
                        .store
                        .find_by_id(ctx.tenant_id, order_id)
                        .await?
                        .ok_or(OrderError::NotFound)?;
                    StatusMachine::transition(order.status, status)
                        .map_err(|(from, to)| OrderError::InvalidTransition { from, to })?;
                    return Ok(());
                }
                self.update_status(
                    ctx,
                    order_id,
                    UpdateStatusRequest {
                        status,
                        notes: request.notes.clone(),
                    },
                    actor_id,
                )
                .await
                .map(|_| ())
            }
            BulkAction::Cancel => {
                let reason = request
                    .reason
                    .clone()
                    .ok_or_else(|| OrderError::ValidationError("reason is required".to_string()))?;
                if request.dry_run {
                    let eligibility = self.check_cancellation_eligibility(ctx, order_id).await?;
                    if !eligibility.cancellable {
                        return Err(OrderError::NotCancellable);
                    }
                    return Ok(());
                }
                self.cancel(
                    ctx,
                    order_id,
                    CancelOrderRequest {
                        reason,
                        notes: request.notes.clone(),
                    },
                    actor_id,
                )
                .await
                .map(|_| ())
            }
            BulkAction::Assign => {
                let metadata = request.delivery_metadata.clone().ok_or_else(|| {
                    OrderError::ValidationError("delivery_metadata is required".to_string())
                })?;
                if request.dry_run {
                    self.store
                        .find_by_id(ctx.tenant_id, order_id)
                        .await?
                        .ok_or(OrderError::NotFound)?;
                    return Ok(());
                }
                self.update_delivery(ctx, order_id, metadata).await.map(|_| ())
            }
        }
    }

    async fn load_cart(&self, ctx: &TenantContext) -> Result<Cart, OrderError> {
        let cart = self
            .cart_store
            .load(ctx.tenant_id, ctx.user_id)
            .await
            .map_err(OrderError::from)?
            .filter(|cart| cart.restaurant_id == ctx.restaurant_id)
            .ok_or(OrderError::EmptyCart)?;

        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        Ok(cart)
    }

    /// Re-validate every cart line against the live menu.
    ///
    /// Collects all offending items rather than stopping at the first so
    /// the client can fix its whole cart in one refresh.
    async fn revalidate_prices(&self, ctx: &TenantContext, cart: &Cart) -> Result<(), OrderError> {
        let item_ids: Vec<Uuid> = cart.items.iter().map(|l| l.item_id).collect();
        let items = bounded(self.catalog.get_items(ctx.tenant_id, ctx.restaurant_id, &item_ids))
            .await
            .ok_or_else(|| OrderError::UpstreamTimeout("menu catalog".to_string()))??;

        let by_id: std::collections::HashMap<Uuid, _> =
            items.into_iter().map(|item| (item.id, item)).collect();

        let mut offending = Vec::new();
        for line in &cart.items {
            let Some(item) = by_id.get(&line.item_id) else {
                offending.push(line.item_id);
                continue;
            };
            if !item.is_available {
                offending.push(line.item_id);
                continue;
            }
            if (line.unit_base_price - item.base_price).abs() > PRICE_TOLERANCE {
                offending.push(line.item_id);
                continue;
            }
            let mut live_unit = item.base_price;
            let mut modifier_ok = true;
            for selection in &line.selected_modifiers {
                match item.option_delta(selection.modifier_id, selection.option_id) {
                    Some(delta) if (selection.price_delta - delta).abs() <= PRICE_TOLERANCE => {
                        live_unit += delta;
                    }
                    _ => {
                        modifier_ok = false;
                        break;
                    }
                }
            }
            if !modifier_ok || (line.computed_unit_price - live_unit).abs() > PRICE_TOLERANCE {
                offending.push(line.item_id);
            }
        }

        if !offending.is_empty() {
            return Err(OrderError::PriceValidationFailed {
                item_ids: offending,
            });
        }
        Ok(())
    }

    async fn profile(&self, ctx: &TenantContext) -> Result<RestaurantProfile, OrderError> {
        bounded(self.directory.get_profile(ctx.tenant_id, ctx.restaurant_id))
            .await
            .ok_or_else(|| OrderError::UpstreamTimeout("restaurant profile".to_string()))??
            .ok_or(OrderError::ProfileNotFound)
    }

    async fn create_payment_intent(
        &self,
        amount: Decimal,
        order_id: Uuid,
    ) -> Result<String, OrderError> {
        let reference = order_id.to_string();
        let intent = bounded(self.gateway.create_payment_intent(amount, &reference))
            .await
            .ok_or_else(|| OrderError::UpstreamTimeout("payment gateway".to_string()))?
            .map_err(|err| match err {
                PaymentError::Timeout => {
                    OrderError::UpstreamTimeout("payment gateway".to_string())
                }
                other => OrderError::ValidationError(format!("Payment setup failed: {}", other)),
            })?;
        Ok(intent.intent_id)
    }

    async fn release_quote(&self, quote: &Option<CouponQuote>, user_id: Uuid, order_id: Uuid) {
        if let Some(quote) = quote {
            if let Err(err) = self
                .coupons
                .release(quote.coupon_id, user_id, order_id)
                .await
            {
                tracing::warn!(
                    "Failed to release coupon {} after losing creation race: {}",
                    quote.code,
                    err
                );
            }
        }
    }

    fn validate_schedule(
        scheduled_for: DateTime<Utc>,
        profile: &RestaurantProfile,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if scheduled_for <= now {
            return Err(OrderError::InvalidSchedule(
                "Scheduled time must be in the future".to_string(),
            ));
        }

        let day = profile
            .operating_hours
            .for_date(scheduled_for.date_naive())
            .filter(|day| day.is_open)
            .ok_or_else(|| {
                OrderError::InvalidSchedule("Restaurant is closed on that day".to_string())
            })?;

        let time = scheduled_for.time();
        if time < day.open || time > day.close {
            return Err(OrderError::InvalidSchedule(format!(
                "Scheduled time must fall within opening hours ({} - {})",
                day.open, day.close
            )));
        }
        Ok(())
    }

    /// Deterministic delivery estimate:
    /// base + (15 + 3 * item_count) preparation + delivery leg + buffer.
    fn estimate_delivery(base_time: DateTime<Utc>, item_count: u32) -> DateTime<Utc> {
        let prep_minutes = 15 + 3 * i64::from(item_count);
        base_time + Duration::minutes(prep_minutes + DELIVERY_LEG_MINUTES + BUFFER_MINUTES)
    }
}
