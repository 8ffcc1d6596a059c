use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionError, TransactionTrait,
};
use sea_orm::JoinType;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};
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

/// Relational store backed by sea-orm (Postgres or SQLite).
#[derive(Clone)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn map_transaction_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Joins request lines with their product, request and employee rows.
async fn tag_lines<C: ConnectionTrait>(
    conn: &C,
    items: Vec<purchase_request_item::Model>,
) -> Result<Vec<LineRecord>, DbErr> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: BTreeSet<i32> = items.iter().filter_map(|i| i.product_id).collect();
    let request_ids: BTreeSet<i32> = items.iter().map(|i| i.request_id).collect();

    let products: HashMap<i32, product::Model> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let requests: HashMap<i32, purchase_request::Model> = purchase_request::Entity::find()
        .filter(purchase_request::Column::Id.is_in(request_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let employee_ids: BTreeSet<i32> = requests.values().filter_map(|r| r.employee_id).collect();
    let employees: HashMap<i32, String> = if employee_ids.is_empty() {
        HashMap::new()
    } else {
        employee::Entity::find()
            .filter(employee::Column::Id.is_in(employee_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|e| (e.id, e.name))
            .collect()
    };

    Ok(items
        .into_iter()
        .map(|item| {
            let product = item.product_id.and_then(|id| products.get(&id));
            let employee_name = requests
                .get(&item.request_id)
                .and_then(|r| r.employee_id)
                .and_then(|id| employees.get(&id))
                .cloned();
            LineRecord {
                line_id: item.id,
                request_id: item.request_id,
                product_id: item.product_id,
                category_id: product.and_then(|p| p.category_id),
                product_description: product.map(|p| p.description.clone()),
                custom_description: item.custom_description,
                quantity: item.quantity,
                employee_name,
            }
        })
        .collect())
}

async fn load_order_detail<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<Option<PurchaseOrderDetail>, DbErr> {
    let Some(order) = purchase_order::Entity::find_by_id(id).one(conn).await? else {
        return Ok(None);
    };

    let items = purchase_order_item::Entity::find()
        .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
        .order_by_asc(purchase_order_item::Column::Id)
        .all(conn)
        .await?;

    let linked_request_ids = purchase_order_request::Entity::find()
        .filter(purchase_order_request::Column::PurchaseOrderId.eq(id))
        .order_by_asc(purchase_order_request::Column::RequestId)
        .all(conn)
        .await?
        .into_iter()
        .map(|link| link.request_id)
        .collect();

    Ok(Some(PurchaseOrderDetail {
        order,
        items,
        linked_request_ids,
    }))
}

#[async_trait]
impl RequisitionStore for SeaOrmStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        self.db.ping().await?;
        Ok(())
    }

    #[instrument(skip(self, request))]
    async fn submit_request(
        &self,
        request: NewPurchaseRequest,
    ) -> Result<RequestDetail, ServiceError> {
        self.db
            .transaction::<_, RequestDetail, ServiceError>(|txn| {
                Box::pin(async move {
                    let saved = purchase_request::ActiveModel {
                        description: Set(request.description),
                        submitted_at: Set(Utc::now()),
                        status: Set(RequestStatus::Pending),
                        employee_id: Set(request.employee_id),
                        department_id: Set(request.department_id),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    let mut items = Vec::with_capacity(request.items.len());
                    for item in request.items {
                        let line = purchase_request_item::ActiveModel {
                            request_id: Set(saved.id),
                            product_id: Set(item.product_id),
                            quantity: Set(item.quantity),
                            custom_description: Set(item.custom_description),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                        items.push(line);
                    }

                    Ok(RequestDetail {
                        request: saved,
                        items,
                    })
                })
            })
            .await
            .map_err(map_transaction_error)
    }

    async fn find_request(&self, id: i32) -> Result<Option<RequestDetail>, ServiceError> {
        let Some(request) = purchase_request::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };

        let items = purchase_request_item::Entity::find()
            .filter(purchase_request_item::Column::RequestId.eq(id))
            .order_by_asc(purchase_request_item::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(Some(RequestDetail { request, items }))
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<purchase_request::Model>, ServiceError> {
        let mut query = purchase_request::Entity::find();
        if let Some(status) = status {
            query = query.filter(purchase_request::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(purchase_request::Column::SubmittedAt)
            .all(self.db.as_ref())
            .await?)
    }

    async fn request_lines(&self, request_id: i32) -> Result<Vec<LineRecord>, ServiceError> {
        let items = purchase_request_item::Entity::find()
            .filter(purchase_request_item::Column::RequestId.eq(request_id))
            .order_by_asc(purchase_request_item::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(tag_lines(self.db.as_ref(), items).await?)
    }

    #[instrument(skip(self))]
    async fn pending_lines_for_products(
        &self,
        exclude_request_id: i32,
        product_ids: &[i32],
    ) -> Result<Vec<LineRecord>, ServiceError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = purchase_request_item::Entity::find()
            .join(
                JoinType::InnerJoin,
                purchase_request_item::Relation::Request.def(),
            )
            .filter(purchase_request_item::Column::ProductId.is_in(product_ids.to_vec()))
            .filter(purchase_request_item::Column::RequestId.ne(exclude_request_id))
            .filter(purchase_request::Column::Status.eq(RequestStatus::Pending))
            .order_by_asc(purchase_request_item::Column::Id)
            .all(self.db.as_ref())
            .await?;
        debug!(candidates = items.len(), "Loaded pending candidate lines");

        Ok(tag_lines(self.db.as_ref(), items).await?)
    }

    async fn transition_request(
        &self,
        id: i32,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, ServiceError> {
        let result = purchase_request::Entity::update_many()
            .col_expr(purchase_request::Column::Status, Expr::value(to))
            .filter(purchase_request::Column::Id.eq(id))
            .filter(purchase_request::Column::Status.eq(from))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    #[instrument(skip(self, order), fields(requests = order.request_ids.len()))]
    async fn commit_consolidation(
        &self,
        order: NewConsolidatedOrder,
    ) -> Result<consolidated_order::Model, ServiceError> {
        self.db
            .transaction::<_, consolidated_order::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let claimed = purchase_request::Entity::update_many()
                        .col_expr(
                            purchase_request::Column::Status,
                            Expr::value(RequestStatus::InProcess),
                        )
                        .filter(purchase_request::Column::Id.is_in(order.request_ids.clone()))
                        .filter(purchase_request::Column::Status.eq(RequestStatus::Pending))
                        .exec(txn)
                        .await?;

                    if claimed.rows_affected != order.request_ids.len() as u64 {
                        return Err(ServiceError::Conflict(format!(
                            "Only {} of {} requests were still pending",
                            claimed.rows_affected,
                            order.request_ids.len()
                        )));
                    }

                    let saved = consolidated_order::ActiveModel {
                        provider_id: Set(order.provider_id),
                        created_at: Set(Utc::now()),
                        status: Set(ConsolidatedOrderStatus::Pending),
                        products: Set(ConsolidatedProducts(order.products)),
                        request_ids: Set(RequestIds(order.request_ids)),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    Ok(saved)
                })
            })
            .await
            .map_err(map_transaction_error)
    }

    async fn find_consolidated_order(
        &self,
        id: i32,
    ) -> Result<Option<consolidated_order::Model>, ServiceError> {
        Ok(consolidated_order::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?)
    }

    async fn list_consolidated_orders(
        &self,
        status: Option<ConsolidatedOrderStatus>,
    ) -> Result<Vec<consolidated_order::Model>, ServiceError> {
        let mut query = consolidated_order::Entity::find();
        if let Some(status) = status {
            query = query.filter(consolidated_order::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(consolidated_order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    async fn find_provider(&self, id: i32) -> Result<Option<provider::Model>, ServiceError> {
        Ok(provider::Entity::find_by_id(id).one(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, order), fields(provider_id = order.provider_id))]
    async fn commit_purchase_order(
        &self,
        order: NewPurchaseOrder,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        self.db
            .transaction::<_, PurchaseOrderDetail, ServiceError>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let request_id = match &order.linkage {
                        OrderLinkage::Request(request_id) => Some(*request_id),
                        _ => None,
                    };

                    let header = purchase_order::ActiveModel {
                        request_id: Set(request_id),
                        provider_id: Set(order.provider_id),
                        order_date: Set(now),
                        status: Set(PurchaseOrderStatus::Pending),
                        currency: Set(order.currency),
                        subtotal: Set(order.totals.subtotal),
                        vat: Set(order.totals.vat),
                        vat_withheld: Set(order.totals.vat_withheld),
                        net_payable: Set(order.totals.net_payable),
                        withholding_percent: Set(order.withholding_percent),
                        employee_id: Set(order.employee_id),
                        changed_by: Set(order.changed_by),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    for item in order.items {
                        purchase_order_item::ActiveModel {
                            purchase_order_id: Set(header.id),
                            product_id: Set(item.product_id),
                            description: Set(item.description),
                            quantity: Set(item.quantity),
                            unit_price: Set(item.unit_price),
                            line_total: Set(item.line_total),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }

                    match order.linkage {
                        OrderLinkage::Direct => {}
                        OrderLinkage::Request(request_id) => {
                            let approved = purchase_request::Entity::update_many()
                                .col_expr(
                                    purchase_request::Column::Status,
                                    Expr::value(RequestStatus::Approved),
                                )
                                .filter(purchase_request::Column::Id.eq(request_id))
                                .filter(purchase_request::Column::Status.eq(RequestStatus::Pending))
                                .exec(txn)
                                .await?;
                            if approved.rows_affected != 1 {
                                return Err(ServiceError::Conflict(format!(
                                    "Purchase request {} is no longer pending",
                                    request_id
                                )));
                            }
                        }
                        OrderLinkage::Consolidated {
                            consolidated_order_id,
                            request_ids,
                        } => {
                            let converted = consolidated_order::Entity::update_many()
                                .col_expr(
                                    consolidated_order::Column::Status,
                                    Expr::value(ConsolidatedOrderStatus::Converted),
                                )
                                .filter(consolidated_order::Column::Id.eq(consolidated_order_id))
                                .filter(
                                    consolidated_order::Column::Status
                                        .eq(ConsolidatedOrderStatus::Pending),
                                )
                                .exec(txn)
                                .await?;
                            if converted.rows_affected != 1 {
                                return Err(ServiceError::Conflict(format!(
                                    "Consolidated order {} was already converted",
                                    consolidated_order_id
                                )));
                            }

                            if !request_ids.is_empty() {
                                purchase_order_request::Entity::insert_many(
                                    request_ids.iter().map(|request_id| {
                                        purchase_order_request::ActiveModel {
                                            purchase_order_id: Set(header.id),
                                            request_id: Set(*request_id),
                                        }
                                    }),
                                )
                                .exec_without_returning(txn)
                                .await?;
                            }

                            if !request_ids.is_empty() {
                                purchase_request::Entity::update_many()
                                    .col_expr(
                                        purchase_request::Column::Status,
                                        Expr::value(RequestStatus::Approved),
                                    )
                                    .filter(purchase_request::Column::Id.is_in(request_ids))
                                    .filter(
                                        purchase_request::Column::Status
                                            .eq(RequestStatus::InProcess),
                                    )
                                    .exec(txn)
                                    .await?;
                            }
                        }
                    }

                    load_order_detail(txn, header.id).await?.ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "Purchase order {} vanished after insert",
                            header.id
                        ))
                    })
                })
            })
            .await
            .map_err(map_transaction_error)
    }

    async fn find_purchase_order(
        &self,
        id: i32,
    ) -> Result<Option<PurchaseOrderDetail>, ServiceError> {
        Ok(load_order_detail(self.db.as_ref(), id).await?)
    }

    async fn transition_purchase_order(
        &self,
        id: i32,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        changed_by: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let result = purchase_order::Entity::update_many()
            .col_expr(purchase_order::Column::Status, Expr::value(to))
            .col_expr(purchase_order::Column::ChangedBy, Expr::value(changed_by))
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_order::Column::Id.eq(id))
            .filter(purchase_order::Column::Status.eq(from))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    #[instrument(skip(self))]
    async fn complete_purchase_order(
        &self,
        id: i32,
        changed_by: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        self.db
            .transaction::<_, bool, ServiceError>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let completed = purchase_order::Entity::update_many()
                        .col_expr(
                            purchase_order::Column::Status,
                            Expr::value(PurchaseOrderStatus::Completed),
                        )
                        .col_expr(purchase_order::Column::ChangedBy, Expr::value(changed_by))
                        .col_expr(purchase_order::Column::UpdatedAt, Expr::value(now))
                        .filter(purchase_order::Column::Id.eq(id))
                        .filter(purchase_order::Column::Status.eq(PurchaseOrderStatus::Pending))
                        .exec(txn)
                        .await?;
                    if completed.rows_affected != 1 {
                        return Ok(false);
                    }

                    let items = purchase_order_item::Entity::find()
                        .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
                        .all(txn)
                        .await?;

                    for item in items {
                        let Some(product_id) = item.product_id else {
                            continue;
                        };

                        let bumped = inventory::Entity::update_many()
                            .col_expr(
                                inventory::Column::Quantity,
                                Expr::col(inventory::Column::Quantity).add(item.quantity),
                            )
                            .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
                            .filter(inventory::Column::ProductId.eq(product_id))
                            .exec(txn)
                            .await?;

                        if bumped.rows_affected == 0 {
                            inventory::Entity::insert(inventory::ActiveModel {
                                product_id: Set(product_id),
                                quantity: Set(item.quantity),
                                updated_at: Set(now),
                            })
                            .exec_without_returning(txn)
                            .await?;
                        }
                    }

                    Ok(true)
                })
            })
            .await
            .map_err(map_transaction_error)
    }

    async fn stock_level(&self, product_id: i32) -> Result<i32, ServiceError> {
        Ok(inventory::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .map_or(0, |row| row.quantity))
    }

    async fn admin_user_ids(&self) -> Result<Vec<Uuid>, ServiceError> {
        Ok(user_profile::Entity::find()
            .filter(user_profile::Column::Role.eq(Role::Admin))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|profile| profile.user_id)
            .collect())
    }

    async fn insert_notifications(
        &self,
        notifications: Vec<NewNotification>,
    ) -> Result<usize, ServiceError> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let count = notifications.len();
        let now = Utc::now();
        let rows = notifications.into_iter().map(|n| notification::ActiveModel {
            recipient_id: Set(n.recipient_id),
            title: Set(n.title),
            message: Set(n.message),
            read: Set(false),
            created_at: Set(now),
            ..Default::default()
        });
        notification::Entity::insert_many(rows)
            .exec(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
