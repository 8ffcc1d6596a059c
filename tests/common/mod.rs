#![allow(dead_code)]

use std::sync::Arc;

use requisition_api::{
    auth::Actor,
    entities::Role,
    events::{self, EventSender},
    services::{ServiceContainer, ServiceFactory, WorkflowSettings},
    store::{InMemoryStore, NewRequestItem},
    services::requests::SubmitRequestCommand,
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Services wired to a fresh in-memory store with one admin, one employee
/// and one provider.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub services: ServiceContainer,
    pub admin: Actor,
    pub employee: Actor,
    pub provider_id: i32,
    _event_task: tokio::task::JoinHandle<()>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(WorkflowSettings::default())
    }

    pub fn with_settings(settings: WorkflowSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());

        let admin_id = Uuid::new_v4();
        store.add_user(admin_id, Role::Admin, None).unwrap();

        let employee = store.add_employee("Maria Gonzalez", Some(3)).unwrap();
        let employee_user = Uuid::new_v4();
        store
            .add_user(employee_user, Role::User, Some(employee.id))
            .unwrap();

        let provider = store.add_provider("Office Supplies Ltd", None).unwrap();

        let (tx, rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(rx));
        let factory = ServiceFactory::new(store.clone(), EventSender::new(tx), settings);

        Self {
            services: ServiceContainer::new(&factory),
            store,
            admin: Actor::admin(admin_id),
            employee: Actor::employee(employee_user, employee.id),
            provider_id: provider.id,
            _event_task: event_task,
        }
    }

    pub fn product(&self, description: &str, category_id: Option<i32>) -> i32 {
        self.store.add_product(description, category_id).unwrap().id
    }

    pub fn provider(&self, name: &str, withholding_percent: Option<Decimal>) -> i32 {
        self.store.add_provider(name, withholding_percent).unwrap().id
    }

    /// Submits a request as the employee with `(product_id, quantity)` lines.
    pub async fn submit(&self, lines: &[(i32, i32)]) -> i32 {
        let items = lines
            .iter()
            .map(|&(product_id, quantity)| NewRequestItem {
                product_id: Some(product_id),
                quantity,
                custom_description: None,
            })
            .collect();
        self.submit_items(items).await
    }

    pub async fn submit_items(&self, items: Vec<NewRequestItem>) -> i32 {
        self.services
            .requests
            .submit(
                &self.employee,
                SubmitRequestCommand {
                    description: "Monthly supplies".to_string(),
                    department_id: Some(3),
                    items,
                },
            )
            .await
            .unwrap()
            .request
            .id
    }
}
