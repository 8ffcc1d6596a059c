use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "Pendiente")]
    Pending,
    #[sea_orm(string_value = "Completada")]
    Completed,
    #[sea_orm(string_value = "Anulada")]
    Voided,
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseOrderStatus::Pending => write!(f, "Pending"),
            PurchaseOrderStatus::Completed => write!(f, "Completed"),
            PurchaseOrderStatus::Voided => write!(f, "Voided"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Currency {
    #[default]
    #[sea_orm(string_value = "Bs")]
    Local,
    #[sea_orm(string_value = "USD")]
    Usd,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Local => "Bs",
            Currency::Usd => "USD",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Set only when the order was derived from a single request
    pub request_id: Option<i32>,
    pub provider_id: i32,
    pub order_date: DateTime<Utc>,
    pub status: PurchaseOrderStatus,
    pub currency: Currency,
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub vat_withheld: Decimal,
    pub net_payable: Decimal,
    pub withholding_percent: Decimal,
    pub employee_id: Option<i32>,
    pub changed_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_item::Entity")]
    Items,
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id"
    )]
    Provider,
}

impl Related<super::purchase_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        active_model.updated_at = Set(Utc::now());
        Ok(active_model)
    }
}
