// Restaurant live-order feed
//
// Notifications are fire-and-forget: a feed with no listeners, or a full
// channel, never affects the order operation that triggered the event.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::orders::models::{Order, OrderStatus};

/// Events published to a restaurant's live-order feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    NewOrder {
        order_id: Uuid,
        restaurant_id: Uuid,
        total: rust_decimal::Decimal,
        item_count: u32,
    },
    StatusChanged {
        order_id: Uuid,
        status: OrderStatus,
        actor_id: Uuid,
    },
}

/// Live-feed notification contract.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify_new_order(&self, restaurant_id: Uuid, order: &Order);

    async fn notify_status_change(&self, order_id: Uuid, status: OrderStatus, actor_id: Uuid);
}

const FEED_CAPACITY: usize = 256;

/// In-process broadcast feed, one channel per restaurant.
#[derive(Clone, Default)]
pub struct LiveFeed {
    channels: Arc<DashMap<Uuid, broadcast::Sender<FeedEvent>>>,
}

impl LiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a restaurant's feed.
    pub fn subscribe(&self, restaurant_id: Uuid) -> broadcast::Receiver<FeedEvent> {
        self.channels
            .entry(restaurant_id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe()
    }

    fn publish(&self, restaurant_id: Uuid, event: FeedEvent) {
        if let Some(sender) = self.channels.get(&restaurant_id) {
            // Err means no live subscribers; nothing to deliver.
            let _ = sender.send(event);
        }
    }
}

#[async_trait]
impl OrderNotifier for LiveFeed {
    async fn notify_new_order(&self, restaurant_id: Uuid, order: &Order) {
        tracing::debug!("Publishing new-order event for order {}", order.id);
        self.publish(
            restaurant_id,
            FeedEvent::NewOrder {
                order_id: order.id,
                restaurant_id,
                total: order.totals.total,
                item_count: order.totals.item_count,
            },
        );
    }

    async fn notify_status_change(&self, order_id: Uuid, status: OrderStatus, actor_id: Uuid) {
        tracing::debug!("Publishing status-change event for order {}", order_id);
        // Status events go to every open feed; the order id carries enough
        // context for consumers to filter.
        for entry in self.channels.iter() {
            let _ = entry.value().send(FeedEvent::StatusChanged {
                order_id,
                status,
                actor_id,
            });
        }
    }
}
