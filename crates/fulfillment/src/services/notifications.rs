//! Outbound order-lifecycle notifications.
//!
//! Domain operations push [`OrderEvent`]s onto a channel *after* their
//! transaction commits; a [`NotifierWorker`] on its own task drains the
//! channel and hands events to a [`NotificationSink`]. Delivery is
//! best-effort: sink failures are logged and never surface to, or retry,
//! the domain operation. Each event carries a unique id so a sink that
//! sees a redelivery can deduplicate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tamarind_core::{OrderId, UserId};

use crate::models::order::Order;

/// What happened to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEventKind {
    Created,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderEventKind {
    /// Stable event-type key for receivers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order-lifecycle event, bound for the customer.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    /// Unique per dispatch; receivers deduplicate on it.
    pub event_id: Uuid,
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub kind: OrderEventKind,
    /// Event-specific extra: tracking number, cancellation reason.
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Build an event from a committed order.
    #[must_use]
    pub fn for_order(order: &Order, kind: OrderEventKind, detail: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            kind,
            detail,
            occurred_at: Utc::now(),
        }
    }
}

/// Cloneable handle the domain services dispatch through.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: Option<UnboundedSender<OrderEvent>>,
}

impl NotificationDispatcher {
    /// A dispatcher and the receiving end for a worker.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<OrderEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A dispatcher that drops every event. For contexts with no notifier.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Fire-and-forget dispatch. A missing or closed channel is logged,
    /// never an error.
    pub fn dispatch(&self, event: OrderEvent) {
        match &self.sender {
            Some(sender) => {
                if let Err(err) = sender.send(event) {
                    warn!(
                        order_id = %err.0.order_id,
                        kind = %err.0.kind,
                        "notification channel closed, dropping event"
                    );
                }
            }
            None => debug!(kind = %event.kind, "notifications disabled, dropping event"),
        }
    }
}

/// Sink delivery failure.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

/// Where the worker delivers events: mail gateway, push service, a test
/// recorder.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one event. Implementations should be idempotent per
    /// `event_id`.
    async fn deliver(&self, event: &OrderEvent) -> Result<(), NotificationError>;
}

/// Sink that only logs. The default when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, event: &OrderEvent) -> Result<(), NotificationError> {
        info!(
            event_id = %event.event_id,
            order_number = %event.order_number,
            user_id = %event.user_id,
            kind = %event.kind,
            "order notification"
        );
        Ok(())
    }
}

/// Drains the event channel on its own task, outside any request
/// transaction.
pub struct NotifierWorker<S> {
    receiver: UnboundedReceiver<OrderEvent>,
    sink: S,
}

impl<S: NotificationSink> NotifierWorker<S> {
    #[must_use]
    pub const fn new(receiver: UnboundedReceiver<OrderEvent>, sink: S) -> Self {
        Self { receiver, sink }
    }

    /// Run until every dispatcher handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if let Err(err) = self.sink.deliver(&event).await {
                warn!(
                    event_id = %event.event_id,
                    order_id = %event.order_id,
                    kind = %event.kind,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }
}
