use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    LineRecord, NewConsolidatedOrder, NewNotification, NewPurchaseOrder, NewPurchaseRequest,
    OrderLinkage, PurchaseOrderDetail, RequestDetail, RequisitionStore,
};
use crate::entities::{
    consolidated_order::{self, ConsolidatedProducts, RequestIds},
    employee, inventory, notification, product, provider, purchase_order, purchase_order_item,
    purchase_order_request, purchase_request, purchase_request_item, user_profile,
    ConsolidatedOrderStatus, PurchaseOrderStatus, RequestStatus, Role,
};
use crate::errors::ServiceError;

#[derive(Default)]
struct Tables {
    employees: BTreeMap<i32, employee::Model>,
    profiles: Vec<user_profile::Model>,
    products: BTreeMap<i32, product::Model>,
    providers: BTreeMap<i32, provider::Model>,
    inventory: BTreeMap<i32, inventory::Model>,
    requests: BTreeMap<i32, purchase_request::Model>,
    request_items: BTreeMap<i32, purchase_request_item::Model>,
    consolidated_orders: BTreeMap<i32, consolidated_order::Model>,
    purchase_orders: BTreeMap<i32, purchase_order::Model>,
    purchase_order_items: BTreeMap<i32, purchase_order_item::Model>,
    purchase_order_requests: Vec<purchase_order_request::Model>,
    notifications: Vec<notification::Model>,
    sequences: HashMap<&'static str, i32>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn tag(&self, item: &purchase_request_item::Model) -> LineRecord {
        let product = item.product_id.and_then(|id| self.products.get(&id));
        let employee_name = self
            .requests
            .get(&item.request_id)
            .and_then(|request| request.employee_id)
            .and_then(|id| self.employees.get(&id))
            .map(|employee| employee.name.clone());

        LineRecord {
            line_id: item.id,
            request_id: item.request_id,
            product_id: item.product_id,
            category_id: product.and_then(|p| p.category_id),
            product_description: product.map(|p| p.description.clone()),
            custom_description: item.custom_description.clone(),
            quantity: item.quantity,
            employee_name,
        }
    }

    fn request_detail(&self, id: i32) -> Option<RequestDetail> {
        let request = self.requests.get(&id)?.clone();
        let items = self
            .request_items
            .values()
            .filter(|item| item.request_id == id)
            .cloned()
            .collect();
        Some(RequestDetail { request, items })
    }

    fn order_detail(&self, id: i32) -> Option<PurchaseOrderDetail> {
        let order = self.purchase_orders.get(&id)?.clone();
        let items = self
            .purchase_order_items
            .values()
            .filter(|item| item.purchase_order_id == id)
            .cloned()
            .collect();
        let linked_request_ids = self
            .purchase_order_requests
            .iter()
            .filter(|link| link.purchase_order_id == id)
            .map(|link| link.request_id)
            .collect();
        Some(PurchaseOrderDetail {
            order,
            items,
            linked_request_ids,
        })
    }
}

/// Store kept entirely in process memory.
///
/// A single mutex guards all tables, so every trait operation is atomic.
/// Used by the test suite and by the `in-memory` store backend.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::database_error_message("store unavailable"));
        }
        self.tables
            .lock()
            .map_err(|_| ServiceError::InternalError("in-memory store lock poisoned".into()))
    }

    pub fn add_employee(
        &self,
        name: &str,
        department_id: Option<i32>,
    ) -> Result<employee::Model, ServiceError> {
        let mut tables = self.tables()?;
        let model = employee::Model {
            id: tables.next_id("employees"),
            name: name.to_string(),
            department_id,
        };
        tables.employees.insert(model.id, model.clone());
        Ok(model)
    }

    pub fn add_user(
        &self,
        user_id: Uuid,
        role: Role,
        employee_id: Option<i32>,
    ) -> Result<user_profile::Model, ServiceError> {
        let mut tables = self.tables()?;
        let model = user_profile::Model {
            user_id,
            role,
            employee_id,
        };
        tables.profiles.retain(|profile| profile.user_id != user_id);
        tables.profiles.push(model.clone());
        Ok(model)
    }

    pub fn add_product(
        &self,
        description: &str,
        category_id: Option<i32>,
    ) -> Result<product::Model, ServiceError> {
        let mut tables = self.tables()?;
        let model = product::Model {
            id: tables.next_id("products"),
            description: description.to_string(),
            category_id,
            internal_code: None,
            min_stock: 0,
            max_stock: 0,
        };
        tables.products.insert(model.id, model.clone());
        Ok(model)
    }

    pub fn add_provider(
        &self,
        name: &str,
        withholding_percent: Option<Decimal>,
    ) -> Result<provider::Model, ServiceError> {
        let mut tables = self.tables()?;
        let id = tables.next_id("providers");
        let model = provider::Model {
            id,
            name: name.to_string(),
            tax_id: format!("J-{:08}", id),
            contact_email: None,
            phone: None,
            contributor_type: None,
            withholding_percent,
        };
        tables.providers.insert(model.id, model.clone());
        Ok(model)
    }

    pub fn set_stock(&self, product_id: i32, quantity: i32) -> Result<(), ServiceError> {
        let mut tables = self.tables()?;
        tables.inventory.insert(
            product_id,
            inventory::Model {
                product_id,
                quantity,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn notifications(&self) -> Result<Vec<notification::Model>, ServiceError> {
        Ok(self.tables()?.notifications.clone())
    }
}

#[async_trait]
impl RequisitionStore for InMemoryStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        self.tables().map(|_| ())
    }

    async fn submit_request(
        &self,
        request: NewPurchaseRequest,
    ) -> Result<RequestDetail, ServiceError> {
        let mut tables = self.tables()?;
        let saved = purchase_request::Model {
            id: tables.next_id("purchase_requests"),
            description: request.description,
            submitted_at: Utc::now(),
            status: RequestStatus::Pending,
            employee_id: request.employee_id,
            department_id: request.department_id,
        };
        tables.requests.insert(saved.id, saved.clone());

        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let model = purchase_request_item::Model {
                id: tables.next_id("purchase_request_items"),
                request_id: saved.id,
                product_id: item.product_id,
                quantity: item.quantity,
                custom_description: item.custom_description,
            };
            tables.request_items.insert(model.id, model.clone());
            items.push(model);
        }

        Ok(RequestDetail {
            request: saved,
            items,
        })
    }

    async fn find_request(&self, id: i32) -> Result<Option<RequestDetail>, ServiceError> {
        Ok(self.tables()?.request_detail(id))
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<purchase_request::Model>, ServiceError> {
        let tables = self.tables()?;
        Ok(tables
            .requests
            .values()
            .filter(|request| status.map_or(true, |s| request.status == s))
            .cloned()
            .collect())
    }

    async fn request_lines(&self, request_id: i32) -> Result<Vec<LineRecord>, ServiceError> {
        let tables = self.tables()?;
        Ok(tables
            .request_items
            .values()
            .filter(|item| item.request_id == request_id)
            .map(|item| tables.tag(item))
            .collect())
    }

    async fn pending_lines_for_products(
        &self,
        exclude_request_id: i32,
        product_ids: &[i32],
    ) -> Result<Vec<LineRecord>, ServiceError> {
        let tables = self.tables()?;
        Ok(tables
            .request_items
            .values()
            .filter(|item| item.request_id != exclude_request_id)
            .filter(|item| {
                item.product_id
                    .map_or(false, |product_id| product_ids.contains(&product_id))
            })
            .filter(|item| {
                tables
                    .requests
                    .get(&item.request_id)
                    .map_or(false, |request| request.status == RequestStatus::Pending)
            })
            .map(|item| tables.tag(item))
            .collect())
    }

    async fn transition_request(
        &self,
        id: i32,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.tables()?;
        match tables.requests.get_mut(&id) {
            Some(request) if request.status == from => {
                request.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_consolidation(
        &self,
        order: NewConsolidatedOrder,
    ) -> Result<consolidated_order::Model, ServiceError> {
        let mut tables = self.tables()?;

        let unclaimable: Vec<i32> = order
            .request_ids
            .iter()
            .copied()
            .filter(|id| {
                tables
                    .requests
                    .get(id)
                    .map_or(true, |request| request.status != RequestStatus::Pending)
            })
            .collect();
        if !unclaimable.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Requests {:?} are no longer pending",
                unclaimable
            )));
        }

        for id in &order.request_ids {
            if let Some(request) = tables.requests.get_mut(id) {
                request.status = RequestStatus::InProcess;
            }
        }

        let saved = consolidated_order::Model {
            id: tables.next_id("consolidated_orders"),
            provider_id: order.provider_id,
            created_at: Utc::now(),
            status: ConsolidatedOrderStatus::Pending,
            products: ConsolidatedProducts(order.products),
            request_ids: RequestIds(order.request_ids),
        };
        tables.consolidated_orders.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_consolidated_order(
        &self,
        id: i32,
    ) -> Result<Option<consolidated_order::Model>, ServiceError> {
        Ok(self.tables()?.consolidated_orders.get(&id).cloned())
    }

    async fn list_consolidated_orders(
        &self,
        status: Option<ConsolidatedOrderStatus>,
    ) -> Result<Vec<consolidated_order::Model>, ServiceError> {
        let tables = self.tables()?;
        Ok(tables
            .consolidated_orders
            .values()
            .filter(|order| status.map_or(true, |s| order.status == s))
            .cloned()
            .collect())
    }

    async fn find_provider(&self, id: i32) -> Result<Option<provider::Model>, ServiceError> {
        Ok(self.tables()?.providers.get(&id).cloned())
    }

    async fn commit_purchase_order(
        &self,
        order: NewPurchaseOrder,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let mut tables = self.tables()?;

        match &order.linkage {
            OrderLinkage::Direct => {}
            OrderLinkage::Request(request_id) => {
                let pending = tables
                    .requests
                    .get(request_id)
                    .map_or(false, |request| request.status == RequestStatus::Pending);
                if !pending {
                    return Err(ServiceError::Conflict(format!(
                        "Purchase request {} is no longer pending",
                        request_id
                    )));
                }
            }
            OrderLinkage::Consolidated {
                consolidated_order_id,
                ..
            } => {
                let pending = tables
                    .consolidated_orders
                    .get(consolidated_order_id)
                    .map_or(false, |c| c.status == ConsolidatedOrderStatus::Pending);
                if !pending {
                    return Err(ServiceError::Conflict(format!(
                        "Consolidated order {} was already converted",
                        consolidated_order_id
                    )));
                }
            }
        }

        let now = Utc::now();
        let order_id = tables.next_id("purchase_orders");
        let header = purchase_order::Model {
            id: order_id,
            request_id: match &order.linkage {
                OrderLinkage::Request(request_id) => Some(*request_id),
                _ => None,
            },
            provider_id: order.provider_id,
            order_date: now,
            status: PurchaseOrderStatus::Pending,
            currency: order.currency,
            subtotal: order.totals.subtotal,
            vat: order.totals.vat,
            vat_withheld: order.totals.vat_withheld,
            net_payable: order.totals.net_payable,
            withholding_percent: order.withholding_percent,
            employee_id: order.employee_id,
            changed_by: order.changed_by,
            updated_at: now,
        };
        tables.purchase_orders.insert(order_id, header);

        for item in order.items {
            let model = purchase_order_item::Model {
                id: tables.next_id("purchase_order_items"),
                purchase_order_id: order_id,
                product_id: item.product_id,
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            };
            tables.purchase_order_items.insert(model.id, model);
        }

        match order.linkage {
            OrderLinkage::Direct => {}
            OrderLinkage::Request(request_id) => {
                if let Some(request) = tables.requests.get_mut(&request_id) {
                    request.status = RequestStatus::Approved;
                }
            }
            OrderLinkage::Consolidated {
                consolidated_order_id,
                request_ids,
            } => {
                for request_id in request_ids {
                    tables
                        .purchase_order_requests
                        .push(purchase_order_request::Model {
                            purchase_order_id: order_id,
                            request_id,
                        });
                    if let Some(request) = tables.requests.get_mut(&request_id) {
                        if request.status == RequestStatus::InProcess {
                            request.status = RequestStatus::Approved;
                        }
                    }
                }
                if let Some(consolidated) = tables.consolidated_orders.get_mut(&consolidated_order_id)
                {
                    consolidated.status = ConsolidatedOrderStatus::Converted;
                }
            }
        }

        tables.order_detail(order_id).ok_or_else(|| {
            ServiceError::InternalError(format!("Purchase order {} vanished after insert", order_id))
        })
    }

    async fn find_purchase_order(
        &self,
        id: i32,
    ) -> Result<Option<PurchaseOrderDetail>, ServiceError> {
        Ok(self.tables()?.order_detail(id))
    }

    async fn transition_purchase_order(
        &self,
        id: i32,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        changed_by: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.tables()?;
        match tables.purchase_orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.changed_by = changed_by;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_purchase_order(
        &self,
        id: i32,
        changed_by: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.tables()?;
        let now = Utc::now();

        let pending = tables
            .purchase_orders
            .get(&id)
            .map_or(false, |order| order.status == PurchaseOrderStatus::Pending);
        if !pending {
            return Ok(false);
        }

        let mut restocked: BTreeMap<i32, i32> = BTreeMap::new();
        for item in tables
            .purchase_order_items
            .values()
            .filter(|item| item.purchase_order_id == id)
        {
            let Some(product_id) = item.product_id else {
                continue;
            };
            let current = match restocked.get(&product_id) {
                Some(&quantity) => quantity,
                None => tables.inventory.get(&product_id).map_or(0, |row| row.quantity),
            };
            let updated = current.checked_add(item.quantity).ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Stock of product {} would exceed the supported maximum",
                    product_id
                ))
            })?;
            restocked.insert(product_id, updated);
        }

        if let Some(order) = tables.purchase_orders.get_mut(&id) {
            order.status = PurchaseOrderStatus::Completed;
            order.changed_by = changed_by;
            order.updated_at = now;
        }
        for (product_id, quantity) in restocked {
            tables.inventory.insert(
                product_id,
                inventory::Model {
                    product_id,
                    quantity,
                    updated_at: now,
                },
            );
        }

        Ok(true)
    }

    async fn stock_level(&self, product_id: i32) -> Result<i32, ServiceError> {
        Ok(self
            .tables()?
            .inventory
            .get(&product_id)
            .map_or(0, |row| row.quantity))
    }

    async fn admin_user_ids(&self) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self
            .tables()?
            .profiles
            .iter()
            .filter(|profile| profile.role == Role::Admin)
            .map(|profile| profile.user_id)
            .collect())
    }

    async fn insert_notifications(
        &self,
        notifications: Vec<NewNotification>,
    ) -> Result<usize, ServiceError> {
        let mut tables = self.tables()?;
        let count = notifications.len();
        for new in notifications {
            let model = notification::Model {
                id: tables.next_id("notifications"),
                recipient_id: new.recipient_id,
                title: new.title,
                message: new.message,
                read: false,
                created_at: Utc::now(),
            };
            tables.notifications.push(model);
        }
        Ok(count)
    }
}
