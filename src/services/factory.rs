use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        consolidation::ConsolidationService, grouping::GroupingEngine,
        notifications::NotificationService, order_derivation::OrderDerivationService,
        purchase_orders::PurchaseOrderService, requests::RequestService,
        totals::DEFAULT_WITHHOLDING_PERCENT,
    },
    store::RequisitionStore,
};

/// Workflow policy knobs taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub default_withholding_percent: Decimal,
    pub allow_reopen_voided_orders: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_withholding_percent: DEFAULT_WITHHOLDING_PERCENT,
            allow_reopen_voided_orders: true,
        }
    }
}

impl From<&AppConfig> for WorkflowSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_withholding_percent: Decimal::from(config.default_withholding_percent),
            allow_reopen_voided_orders: config.allow_reopen_voided_orders,
        }
    }
}

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    store: Arc<dyn RequisitionStore>,
    event_sender: Arc<EventSender>,
    settings: WorkflowSettings,
}

impl ServiceFactory {
    pub fn new(
        store: Arc<dyn RequisitionStore>,
        event_sender: EventSender,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            event_sender: Arc::new(event_sender),
            settings,
        }
    }

    pub fn grouping_engine(&self) -> GroupingEngine {
        GroupingEngine::new(self.store.clone())
    }

    pub fn consolidation_service(&self) -> ConsolidationService {
        ConsolidationService::new(self.store.clone(), self.event_sender.clone())
    }

    pub fn order_derivation_service(&self) -> OrderDerivationService {
        OrderDerivationService::new(
            self.store.clone(),
            self.event_sender.clone(),
            self.settings.default_withholding_percent,
        )
    }

    pub fn purchase_order_service(&self) -> PurchaseOrderService {
        PurchaseOrderService::new(
            self.store.clone(),
            self.event_sender.clone(),
            self.settings.allow_reopen_voided_orders,
        )
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(self.store.clone())
    }

    /// Gets a reference to the store
    pub fn store(&self) -> &Arc<dyn RequisitionStore> {
        &self.store
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub grouping: Arc<GroupingEngine>,
    pub consolidation: Arc<ConsolidationService>,
    pub derivation: Arc<OrderDerivationService>,
    pub requests: Arc<RequestService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        let derivation = Arc::new(factory.order_derivation_service());
        Self {
            grouping: Arc::new(factory.grouping_engine()),
            consolidation: Arc::new(factory.consolidation_service()),
            requests: Arc::new(RequestService::new(
                factory.store.clone(),
                factory.event_sender.clone(),
                derivation.clone(),
            )),
            purchase_orders: Arc::new(factory.purchase_order_service()),
            derivation,
        }
    }
}
