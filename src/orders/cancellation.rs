// Cancellation refund policy
//
// Time-windowed, percentage-tiered refunds. The 75% tier is gated on the
// order being `confirmed` specifically, not on elapsed time alone: an
// order still `pending` at minute 20 is not eligible for it.

use chrono::{DateTime, Utc};

use crate::orders::OrderStatus;

/// Full refund window, minutes since creation.
pub const FULL_REFUND_WINDOW_MINUTES: i64 = 15;

/// Partial refund window for confirmed orders, minutes since creation.
pub const PARTIAL_REFUND_WINDOW_MINUTES: i64 = 30;

/// Percentage refunded in the partial tier.
pub const PARTIAL_REFUND_PERCENTAGE: u32 = 75;

/// Why a cancellation is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationDenied {
    /// The order is already in a terminal state.
    NotCancellable,
    /// Outside every refund window.
    WindowExpired,
}

/// Service for evaluating the refund tier of a cancellation
pub struct CancellationPolicy;

impl CancellationPolicy {
    /// The refund percentage a cancellation at `now` would receive.
    ///
    /// Tiers, first match wins:
    /// - terminal status: refused
    /// - within 15 minutes of creation: 100%, regardless of status
    /// - confirmed and within 30 minutes: 75%
    /// - otherwise: refused, window expired
    pub fn evaluate(
        status: OrderStatus,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u32, CancellationDenied> {
        if status.is_terminal() {
            return Err(CancellationDenied::NotCancellable);
        }

        let minutes_since_creation = (now - created_at).num_minutes();
        if minutes_since_creation <= FULL_REFUND_WINDOW_MINUTES {
            return Ok(100);
        }
        if status == OrderStatus::Confirmed
            && minutes_since_creation <= PARTIAL_REFUND_WINDOW_MINUTES
        {
            return Ok(PARTIAL_REFUND_PERCENTAGE);
        }
        Err(CancellationDenied::WindowExpired)
    }
}
