use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort send; a closed channel is logged, never propagated.
    pub async fn send_or_log(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.send(event).await {
            warn!(event = kind, error = %e, "Dropping event");
        }
    }
}

/// Lifecycle events published after a store write succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderRequested {
        invoice_id: Uuid,
        invoice_number: String,
        customer_name: String,
        item_count: u32,
        /// Display label, e.g. `₹118`
        total: String,
        visit_time: DateTime<Utc>,
    },
    OrderApproved(Uuid),
    OrderRejected(Uuid),
    PaymentVerified {
        invoice_id: Uuid,
        gateway_order_id: String,
        gateway_payment_id: String,
        advance: String,
    },
    OrderCompleted(Uuid),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderRequested { .. } => "order_requested",
            Event::OrderApproved(_) => "order_approved",
            Event::OrderRejected(_) => "order_rejected",
            Event::PaymentVerified { .. } => "payment_verified",
            Event::OrderCompleted(_) => "order_completed",
        }
    }
}

/// Drains the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderRequested {
                invoice_id,
                invoice_number,
                customer_name,
                item_count,
                total,
                visit_time,
            } => {
                // admin notification for the dashboard
                info!(
                    %invoice_id,
                    %invoice_number,
                    %visit_time,
                    "New pending order from {}: {} item(s), total {}",
                    customer_name,
                    item_count,
                    total
                );
            }
            Event::OrderApproved(invoice_id) => {
                info!(%invoice_id, "Order approved; customer may pay the advance");
            }
            Event::OrderRejected(invoice_id) => {
                info!(%invoice_id, "Order rejected");
            }
            Event::PaymentVerified {
                invoice_id,
                gateway_order_id,
                gateway_payment_id,
                advance,
            } => {
                info!(
                    %invoice_id,
                    %gateway_order_id,
                    %gateway_payment_id,
                    "Advance of {} received; order confirmed",
                    advance
                );
            }
            Event::OrderCompleted(invoice_id) => {
                info!(%invoice_id, "Order completed and fully paid");
            }
        }
    }

    warn!("Event channel closed; event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::OrderApproved(id)).await.unwrap();
        sender.send_or_log(Event::OrderCompleted(id)).await;

        assert_eq!(rx.recv().await, Some(Event::OrderApproved(id)));
        assert_eq!(rx.recv().await, Some(Event::OrderCompleted(id)));
    }

    #[tokio::test]
    async fn closed_channel_is_reported_but_not_fatal() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::OrderRejected(Uuid::new_v4())).await.is_err());
        sender.send_or_log(Event::OrderRejected(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn processing_loop_ends_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(process_events(rx));
        EventSender::new(tx)
            .send(Event::OrderApproved(Uuid::new_v4()))
            .await
            .unwrap();
        handle.await.unwrap();
    }
}
