use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    auth::Actor,
    entities::{purchase_request, Currency, RequestStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    services::order_derivation::{
        DeriveOrderCommand, OrderDerivationService, OrderLineInput, OrderSource,
    },
    store::{NewPurchaseRequest, NewRequestItem, PurchaseOrderDetail, RequestDetail, RequisitionStore},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitRequestCommand {
    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,
    pub department_id: Option<i32>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<NewRequestItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequestCommand {
    pub provider_id: i32,
    pub lines: Vec<OrderLineInput>,
    pub withholding_percent: Option<Decimal>,
    #[serde(default)]
    pub currency: Currency,
}

fn check_items(items: &[NewRequestItem]) -> Result<(), ServiceError> {
    for (index, item) in items.iter().enumerate() {
        let described = item
            .custom_description
            .as_deref()
            .map_or(false, |d| !d.trim().is_empty());
        if item.product_id.is_none() && !described {
            return Err(ServiceError::ValidationError(format!(
                "Item {} needs a product or a description",
                index + 1
            )));
        }
        if item.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Item {} quantity must be at least 1",
                index + 1
            )));
        }
    }
    Ok(())
}

/// Submission, lookup, approval and rejection of purchase requests.
#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn RequisitionStore>,
    event_sender: Arc<EventSender>,
    derivation: Arc<OrderDerivationService>,
}

impl RequestService {
    pub fn new(
        store: Arc<dyn RequisitionStore>,
        event_sender: Arc<EventSender>,
        derivation: Arc<OrderDerivationService>,
    ) -> Self {
        Self {
            store,
            event_sender,
            derivation,
        }
    }

    #[instrument(skip(self, actor, command), fields(user_id = %actor.user_id))]
    pub async fn submit(
        &self,
        actor: &Actor,
        command: SubmitRequestCommand,
    ) -> Result<RequestDetail, ServiceError> {
        command.validate().map_err(|e| {
            metrics::record_failure("submit_request");
            ServiceError::ValidationError(e.to_string())
        })?;
        check_items(&command.items)?;

        let detail = self
            .store
            .submit_request(NewPurchaseRequest {
                description: command.description.trim().to_string(),
                employee_id: actor.employee_id,
                department_id: command.department_id,
                items: command.items,
            })
            .await?;

        metrics::REQUESTS_SUBMITTED.inc();
        self.event_sender
            .publish(Event::RequestSubmitted(detail.request.id))
            .await;
        info!(
            request_id = detail.request.id,
            items = detail.items.len(),
            "Purchase request submitted"
        );
        Ok(detail)
    }

    pub async fn get(&self, id: i32) -> Result<RequestDetail, ServiceError> {
        self.store
            .find_request(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase request {} not found", id)))
    }

    pub async fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<purchase_request::Model>, ServiceError> {
        self.store.list_requests(status).await
    }

    /// Approves a pending request by deriving its purchase order.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: i32,
        command: ApproveRequestCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.derivation
            .derive_order(
                actor,
                DeriveOrderCommand {
                    source: OrderSource::Request(id),
                    provider_id: Some(command.provider_id),
                    lines: command.lines,
                    withholding_percent: command.withholding_percent,
                    currency: command.currency,
                },
            )
            .await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<purchase_request::Model, ServiceError> {
        actor.require_admin()?;

        let current = self.get(id).await?.request;
        if current.status != RequestStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "Purchase request {} is {}, only pending requests can be rejected",
                id, current.status
            )));
        }

        let rejected = self
            .store
            .transition_request(id, RequestStatus::Pending, RequestStatus::Rejected)
            .await?;
        if !rejected {
            metrics::record_failure("reject_request");
            warn!(request_id = id, "Request changed status while being rejected");
            return Err(ServiceError::Conflict(format!(
                "Purchase request {} changed status concurrently",
                id
            )));
        }

        self.event_sender
            .publish(Event::RequestStatusChanged {
                request_id: id,
                old_status: RequestStatus::Pending,
                new_status: RequestStatus::Rejected,
            })
            .await;
        info!(request_id = id, "Purchase request rejected");

        Ok(purchase_request::Model {
            status: RequestStatus::Rejected,
            ..current
        })
    }
}
