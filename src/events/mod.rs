use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::entities::{PurchaseOrderStatus, RequestStatus};

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

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping workflow event");
        }
    }
}

/// Where a purchase order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OrderOrigin {
    Direct,
    Request(i32),
    Consolidated(i32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RequestSubmitted(i32),
    RequestStatusChanged {
        request_id: i32,
        old_status: RequestStatus,
        new_status: RequestStatus,
    },
    RequestsConsolidated {
        consolidated_order_id: i32,
        request_ids: Vec<i32>,
    },
    PurchaseOrderCreated {
        purchase_order_id: i32,
        origin: OrderOrigin,
    },
    PurchaseOrderStatusChanged {
        purchase_order_id: i32,
        old_status: PurchaseOrderStatus,
        new_status: PurchaseOrderStatus,
    },
    StockReceived {
        purchase_order_id: i32,
        product_ids: Vec<i32>,
    },
}

/// Event as written to the log stream
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    received_at: DateTime<Utc>,
    event: &'a Event,
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let record = EventRecord {
            received_at: Utc::now(),
            event: &event,
        };
        match serde_json::to_string(&record) {
            Ok(payload) => info!(target: "requisition::events", %payload, "Workflow event"),
            Err(e) => error!("Failed to serialize event {:?}: {}", event, e),
        }
    }

    info!("Event processing loop stopped");
}
