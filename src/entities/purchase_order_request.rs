use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Join table between purchase orders and the requests a consolidated order carried
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_order_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub purchase_order_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub request_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::PurchaseOrderId",
        to = "super::purchase_order::Column::Id"
    )]
    PurchaseOrder,
    #[sea_orm(
        belongs_to = "super::purchase_request::Entity",
        from = "Column::RequestId",
        to = "super::purchase_request::Column::Id"
    )]
    Request,
}

impl ActiveModelBehavior for ActiveModel {}
