use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Events emitted by the storefront services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    CategoryCreated(Uuid),

    // Discount events
    DiscountTierUpserted {
        product_id: Uuid,
        min_quantity: i32,
    },
    DiscountTierDeactivated(Uuid),

    // Cart events
    CartItemAdded {
        user_id: Uuid,
        product_id: Uuid,
    },
    CartItemUpdated {
        user_id: Uuid,
        product_id: Uuid,
    },
    CartItemRemoved {
        user_id: Uuid,
        product_id: Uuid,
    },
    CartCleared(Uuid),

    // Checkout events
    CheckoutStarted(Uuid),
    PreferenceCreated {
        user_id: Uuid,
        preference_id: String,
    },
    SaleRecorded {
        sale_id: Uuid,
        payment_id: String,
    },
    SaleAlreadyRecorded {
        sale_id: Uuid,
        payment_id: String,
    },
    SaleStatusChanged {
        sale_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Earnings events
    EarningsAccrued {
        payment_id: String,
        amount: Decimal,
    },
    EarningsPercentageChanged {
        old_percentage: Decimal,
        new_percentage: Decimal,
    },

    // User events
    UserRegistered(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    /// Event delivery is best-effort; it must never abort a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

/// Background task draining the event channel.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = rx.recv().await {
        match &event {
            Event::SaleRecorded {
                sale_id,
                payment_id,
            } => info!(%sale_id, %payment_id, "Sale recorded"),
            Event::EarningsAccrued { payment_id, amount } => {
                info!(%payment_id, %amount, "Earnings accrued")
            }
            other => debug!(?other, "Event processed"),
        }
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender.send(Event::CartCleared(Uuid::new_v4())).await.unwrap();

        assert!(matches!(rx.recv().await, Some(Event::CartCleared(_))));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic even though the receiver is gone.
        sender.send_or_log(Event::CheckoutStarted(Uuid::new_v4())).await;
    }
}
