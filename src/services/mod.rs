// Order Totals Calculator
pub mod totals;

// Request consolidation workflow
pub mod consolidation;
pub mod grouping;
pub mod order_derivation;

// Lifecycle services
pub mod notifications;
pub mod purchase_orders;
pub mod requests;

// Service factory for dependency injection
pub mod factory;

pub use factory::{ServiceContainer, ServiceFactory, WorkflowSettings};
