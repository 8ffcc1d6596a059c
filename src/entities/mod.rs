//! sea-orm entities, one module per table.

pub mod consolidated_order;
pub mod employee;
pub mod inventory;
pub mod notification;
pub mod product;
pub mod provider;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod purchase_order_request;
pub mod purchase_request;
pub mod purchase_request_item;
pub mod user_profile;

pub use consolidated_order::{ConsolidatedOrderStatus, ConsolidatedProduct};
pub use purchase_order::{Currency, PurchaseOrderStatus};
pub use purchase_request::RequestStatus;
pub use user_profile::Role;
