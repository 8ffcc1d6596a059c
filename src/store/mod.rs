//! Data-store collaborator used by the requisition workflows.
//!
//! Every workflow service receives an `Arc<dyn RequisitionStore>` built by the
//! composition root. Operations that write more than one row are single store
//! calls so an implementation can make them atomic.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    consolidated_order, provider, purchase_order, purchase_order_item, purchase_request,
    purchase_request_item, ConsolidatedOrderStatus, ConsolidatedProduct, Currency,
    PurchaseOrderStatus, RequestStatus,
};
use crate::errors::ServiceError;
use crate::services::totals::{OrderTotals, PricedLine};

pub mod memory;
pub mod sea_orm_store;

pub use memory::InMemoryStore;
pub use sea_orm_store::SeaOrmStore;

/// A request line joined with its product, category and submitting employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub line_id: i32,
    pub request_id: i32,
    pub product_id: Option<i32>,
    pub category_id: Option<i32>,
    pub product_description: Option<String>,
    pub custom_description: Option<String>,
    pub quantity: i32,
    pub employee_name: Option<String>,
}

impl LineRecord {
    /// Product description, falling back to the free-text description.
    pub fn description(&self) -> String {
        self.product_description
            .clone()
            .or_else(|| self.custom_description.clone())
            .unwrap_or_else(|| match self.product_id {
                Some(id) => format!("Product #{}", id),
                None => "Custom item".to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDetail {
    pub request: purchase_request::Model,
    pub items: Vec<purchase_request_item::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    pub order: purchase_order::Model,
    pub items: Vec<purchase_order_item::Model>,
    /// Requests linked through the join table (consolidated conversions)
    pub linked_request_ids: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct NewPurchaseRequest {
    pub description: String,
    pub employee_id: Option<i32>,
    pub department_id: Option<i32>,
    pub items: Vec<NewRequestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequestItem {
    pub product_id: Option<i32>,
    pub quantity: i32,
    pub custom_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewConsolidatedOrder {
    pub provider_id: Option<i32>,
    pub products: Vec<ConsolidatedProduct>,
    pub request_ids: Vec<i32>,
}

/// How a new purchase order links back to the requests it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLinkage {
    Direct,
    /// Sets `request_id` and approves the request.
    Request(i32),
    /// Writes join rows for every request, approves them and marks the
    /// consolidated order converted.
    Consolidated {
        consolidated_order_id: i32,
        request_ids: Vec<i32>,
    },
}

#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub provider_id: i32,
    pub currency: Currency,
    pub totals: OrderTotals,
    pub withholding_percent: Decimal,
    pub employee_id: Option<i32>,
    pub changed_by: Option<Uuid>,
    pub linkage: OrderLinkage,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: Option<i32>,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl PricedLine for NewOrderItem {
    fn quantity(&self) -> Decimal {
        Decimal::from(self.quantity)
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
}

#[async_trait]
pub trait RequisitionStore: Send + Sync {
    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> Result<(), ServiceError>;

    /// Inserts a `Pending` request with its lines.
    async fn submit_request(&self, request: NewPurchaseRequest)
        -> Result<RequestDetail, ServiceError>;

    async fn find_request(&self, id: i32) -> Result<Option<RequestDetail>, ServiceError>;

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<purchase_request::Model>, ServiceError>;

    /// Lines of one request, tagged. Unknown request yields an empty list.
    async fn request_lines(&self, request_id: i32) -> Result<Vec<LineRecord>, ServiceError>;

    /// Lines referencing any of `product_ids` that belong to `Pending` requests
    /// other than `exclude_request_id`.
    async fn pending_lines_for_products(
        &self,
        exclude_request_id: i32,
        product_ids: &[i32],
    ) -> Result<Vec<LineRecord>, ServiceError>;

    /// Conditional status update; `false` when the request is not in `from`.
    async fn transition_request(
        &self,
        id: i32,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, ServiceError>;

    /// Claims every request (`Pending` → `InProcess`) and inserts the order.
    /// Fails with `Conflict` and writes nothing if any request is no longer pending.
    async fn commit_consolidation(
        &self,
        order: NewConsolidatedOrder,
    ) -> Result<consolidated_order::Model, ServiceError>;

    async fn find_consolidated_order(
        &self,
        id: i32,
    ) -> Result<Option<consolidated_order::Model>, ServiceError>;

    async fn list_consolidated_orders(
        &self,
        status: Option<ConsolidatedOrderStatus>,
    ) -> Result<Vec<consolidated_order::Model>, ServiceError>;

    async fn find_provider(&self, id: i32) -> Result<Option<provider::Model>, ServiceError>;

    /// Inserts header, lines and linkage as one unit.
    async fn commit_purchase_order(
        &self,
        order: NewPurchaseOrder,
    ) -> Result<PurchaseOrderDetail, ServiceError>;

    async fn find_purchase_order(
        &self,
        id: i32,
    ) -> Result<Option<PurchaseOrderDetail>, ServiceError>;

    /// Conditional status update; `false` when the order is not in `from`.
    async fn transition_purchase_order(
        &self,
        id: i32,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        changed_by: Option<Uuid>,
    ) -> Result<bool, ServiceError>;

    /// `Pending` → `Completed` plus one stock increment per product line.
    async fn complete_purchase_order(
        &self,
        id: i32,
        changed_by: Option<Uuid>,
    ) -> Result<bool, ServiceError>;

    /// Units on hand; zero when the product has no inventory row.
    async fn stock_level(&self, product_id: i32) -> Result<i32, ServiceError>;

    async fn admin_user_ids(&self) -> Result<Vec<Uuid>, ServiceError>;

    async fn insert_notifications(
        &self,
        notifications: Vec<NewNotification>,
    ) -> Result<usize, ServiceError>;
}
