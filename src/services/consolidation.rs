//! Consolidation Builder: merges pending requests into one consolidated order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    auth::Actor,
    entities::{consolidated_order, ConsolidatedOrderStatus, ConsolidatedProduct, RequestStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    store::{LineRecord, NewConsolidatedOrder, RequisitionStore},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsolidateCommand {
    #[validate(length(min = 1, message = "At least one request is required"))]
    pub request_ids: Vec<i32>,
    /// May be left unset until a supplier is chosen
    pub provider_id: Option<i32>,
}

/// Flattens request lines into one entry per product, in order of first appearance.
///
/// Quantities of a repeated product are summed. Custom lines (no product id)
/// are kept as separate entries. A summed quantity that does not fit in an
/// `i32` is rejected with `InvalidInput`.
pub fn merge_request_lines(lines: &[LineRecord]) -> Result<Vec<ConsolidatedProduct>, ServiceError> {
    let mut merged: Vec<ConsolidatedProduct> = Vec::new();
    let mut positions: HashMap<i32, usize> = HashMap::new();

    for line in lines {
        match line.product_id {
            Some(product_id) => match positions.get(&product_id) {
                Some(&index) => {
                    let entry = &mut merged[index];
                    entry.quantity = entry.quantity.checked_add(line.quantity).ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "Combined quantity of product {} is too large",
                            product_id
                        ))
                    })?;
                }
                None => {
                    positions.insert(product_id, merged.len());
                    merged.push(ConsolidatedProduct {
                        product_id: Some(product_id),
                        description: line.description(),
                        quantity: line.quantity,
                    });
                }
            },
            None => merged.push(ConsolidatedProduct {
                product_id: None,
                description: line.description(),
                quantity: line.quantity,
            }),
        }
    }

    Ok(merged)
}

#[derive(Clone)]
pub struct ConsolidationService {
    store: Arc<dyn RequisitionStore>,
    event_sender: Arc<EventSender>,
}

impl ConsolidationService {
    pub fn new(store: Arc<dyn RequisitionStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    pub async fn get(&self, id: i32) -> Result<consolidated_order::Model, ServiceError> {
        self.store
            .find_consolidated_order(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Consolidated order {} not found", id)))
    }

    pub async fn list(
        &self,
        status: Option<ConsolidatedOrderStatus>,
    ) -> Result<Vec<consolidated_order::Model>, ServiceError> {
        self.store.list_consolidated_orders(status).await
    }

    /// Creates a consolidated order from pending requests and claims them.
    ///
    /// The claim and the insert happen as one unit; a request claimed by a
    /// concurrent consolidation makes the whole call fail with `Conflict`.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn consolidate(
        &self,
        actor: &Actor,
        command: ConsolidateCommand,
    ) -> Result<consolidated_order::Model, ServiceError> {
        let result = self.build_and_commit(actor, command).await;
        if let Err(e) = &result {
            metrics::record_failure("consolidate");
            warn!(error = %e, "Consolidation failed");
        }
        result
    }

    async fn build_and_commit(
        &self,
        actor: &Actor,
        command: ConsolidateCommand,
    ) -> Result<consolidated_order::Model, ServiceError> {
        actor.require_admin()?;
        command.validate()?;

        let mut request_ids: Vec<i32> = Vec::with_capacity(command.request_ids.len());
        for id in command.request_ids {
            if !request_ids.contains(&id) {
                request_ids.push(id);
            }
        }

        if let Some(provider_id) = command.provider_id {
            if self.store.find_provider(provider_id).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Provider {} not found",
                    provider_id
                )));
            }
        }

        let mut lines = Vec::new();
        for &request_id in &request_ids {
            let detail = self
                .store
                .find_request(request_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Purchase request {} not found", request_id))
                })?;
            if detail.request.status != RequestStatus::Pending {
                return Err(ServiceError::InvalidStatus(format!(
                    "Purchase request {} is {}, only pending requests can be consolidated",
                    request_id, detail.request.status
                )));
            }

            let request_lines = self.store.request_lines(request_id).await?;
            if request_lines.is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "Purchase request {} has no line items",
                    request_id
                )));
            }
            lines.extend(request_lines);
        }

        let products = merge_request_lines(&lines)?;
        let saved = self
            .store
            .commit_consolidation(NewConsolidatedOrder {
                provider_id: command.provider_id,
                products,
                request_ids: request_ids.clone(),
            })
            .await?;

        metrics::CONSOLIDATIONS.inc();
        self.event_sender
            .publish(Event::RequestsConsolidated {
                consolidated_order_id: saved.id,
                request_ids: request_ids.clone(),
            })
            .await;
        for &request_id in &request_ids {
            self.event_sender
                .publish(Event::RequestStatusChanged {
                    request_id,
                    old_status: RequestStatus::Pending,
                    new_status: RequestStatus::InProcess,
                })
                .await;
        }

        info!(
            consolidated_order_id = saved.id,
            requests = request_ids.len(),
            products = saved.products.0.len(),
            "Consolidated order created"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(request_id: i32, product_id: Option<i32>, quantity: i32, custom: Option<&str>) -> LineRecord {
        LineRecord {
            line_id: 0,
            request_id,
            product_id,
            category_id: None,
            product_description: product_id.map(|id| format!("Product {}", id)),
            custom_description: custom.map(str::to_string),
            quantity,
            employee_name: None,
        }
    }

    #[test]
    fn repeated_products_are_summed() {
        let merged = merge_request_lines(&[
            line(1, Some(9), 2, None),
            line(2, Some(9), 4, None),
        ])
        .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].product_id, Some(9));
        assert_eq!(merged[0].quantity, 6);
    }

    #[test]
    fn custom_items_are_never_merged() {
        let merged = merge_request_lines(&[
            line(1, None, 1, Some("Toner")),
            line(2, None, 1, Some("Toner")),
            line(2, Some(3), 5, None),
        ])
        .unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].description, "Toner");
        assert_eq!(merged[1].description, "Toner");
        assert_eq!(merged[2].quantity, 5);
    }

    #[test]
    fn first_appearance_order_is_kept() {
        let merged = merge_request_lines(&[
            line(1, Some(4), 1, None),
            line(1, Some(2), 1, None),
            line(2, Some(4), 1, None),
        ])
        .unwrap();
        let order: Vec<Option<i32>> = merged.iter().map(|p| p.product_id).collect();
        assert_eq!(order, vec![Some(4), Some(2)]);
    }

    #[test]
    fn combined_quantity_overflow_is_rejected() {
        let half = i32::MAX / 2 + 1;
        let result = merge_request_lines(&[
            line(1, Some(7), half, None),
            line(2, Some(7), half, None),
        ]);

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }
}
