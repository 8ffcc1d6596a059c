use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ConsolidatedOrderStatus {
    #[sea_orm(string_value = "Pendiente")]
    Pending,
    #[sea_orm(string_value = "Convertida")]
    Converted,
}

impl fmt::Display for ConsolidatedOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsolidatedOrderStatus::Pending => write!(f, "Pending"),
            ConsolidatedOrderStatus::Converted => write!(f, "Converted"),
        }
    }
}

/// Snapshot of one product (or one custom item) in a consolidated order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedProduct {
    pub product_id: Option<i32>,
    pub description: String,
    pub quantity: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct ConsolidatedProducts(pub Vec<ConsolidatedProduct>);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct RequestIds(pub Vec<i32>);

/// Draft grouping of pending requests, consumed when converted into a purchase order
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consolidated_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub provider_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub status: ConsolidatedOrderStatus,
    #[sea_orm(column_type = "Json")]
    pub products: ConsolidatedProducts,
    #[sea_orm(column_type = "Json")]
    pub request_ids: RequestIds,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
