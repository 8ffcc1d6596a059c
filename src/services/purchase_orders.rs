use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    auth::Actor,
    entities::PurchaseOrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    store::{PurchaseOrderDetail, RequisitionStore},
};

/// Purchase-order lifecycle after creation: complete, void and reopen.
#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Arc<dyn RequisitionStore>,
    event_sender: Arc<EventSender>,
    allow_reopen: bool,
}

impl PurchaseOrderService {
    pub fn new(
        store: Arc<dyn RequisitionStore>,
        event_sender: Arc<EventSender>,
        allow_reopen: bool,
    ) -> Self {
        Self {
            store,
            event_sender,
            allow_reopen,
        }
    }

    pub async fn get(&self, id: i32) -> Result<PurchaseOrderDetail, ServiceError> {
        self.store
            .find_purchase_order(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", id)))
    }

    /// Marks the order received and adds every product line to stock.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn complete(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        actor.require_admin()?;
        self.expect_status(id, PurchaseOrderStatus::Pending, "completed")
            .await?;

        if !self
            .store
            .complete_purchase_order(id, Some(actor.user_id))
            .await?
        {
            return Err(self.lost_race(id, "completed"));
        }

        let detail = self.get(id).await?;
        let product_ids: Vec<i32> = detail.items.iter().filter_map(|i| i.product_id).collect();
        self.announce(id, PurchaseOrderStatus::Pending, PurchaseOrderStatus::Completed)
            .await;
        self.event_sender
            .publish(Event::StockReceived {
                purchase_order_id: id,
                product_ids,
            })
            .await;
        info!(purchase_order_id = id, "Purchase order completed");
        Ok(detail)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn void(&self, actor: &Actor, id: i32) -> Result<PurchaseOrderDetail, ServiceError> {
        actor.require_admin()?;
        self.transition(
            actor,
            id,
            PurchaseOrderStatus::Pending,
            PurchaseOrderStatus::Voided,
            "voided",
        )
        .await
    }

    /// Moves a voided order back to pending, when configuration allows it.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn reopen(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        actor.require_admin()?;
        if !self.allow_reopen {
            return Err(ServiceError::InvalidOperation(
                "Reopening voided purchase orders is disabled".to_string(),
            ));
        }
        self.transition(
            actor,
            id,
            PurchaseOrderStatus::Voided,
            PurchaseOrderStatus::Pending,
            "reopened",
        )
        .await
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: i32,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        verb: &str,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.expect_status(id, from, verb).await?;

        if !self
            .store
            .transition_purchase_order(id, from, to, Some(actor.user_id))
            .await?
        {
            return Err(self.lost_race(id, verb));
        }

        self.announce(id, from, to).await;
        info!(purchase_order_id = id, %from, %to, "Purchase order {}", verb);
        self.get(id).await
    }

    async fn expect_status(
        &self,
        id: i32,
        expected: PurchaseOrderStatus,
        verb: &str,
    ) -> Result<(), ServiceError> {
        let current = self.get(id).await?.order.status;
        if current != expected {
            return Err(ServiceError::InvalidStatus(format!(
                "Purchase order {} is {}, only {} orders can be {}",
                id, current, expected, verb
            )));
        }
        Ok(())
    }

    fn lost_race(&self, id: i32, verb: &str) -> ServiceError {
        metrics::record_failure("purchase_order_transition");
        warn!(purchase_order_id = id, "Purchase order changed status concurrently");
        ServiceError::Conflict(format!(
            "Purchase order {} changed status before it could be {}",
            id, verb
        ))
    }

    async fn announce(&self, id: i32, from: PurchaseOrderStatus, to: PurchaseOrderStatus) {
        self.event_sender
            .publish(Event::PurchaseOrderStatusChanged {
                purchase_order_id: id,
                old_status: from,
                new_status: to,
            })
            .await;
    }
}
