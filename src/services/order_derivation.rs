//! Order Derivation: turns a consolidated order, a single request or an ad hoc
//! line list into a purchase order with computed totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    auth::Actor,
    entities::{ConsolidatedOrderStatus, Currency, RequestStatus},
    errors::ServiceError,
    events::{Event, EventSender, OrderOrigin},
    metrics,
    services::{
        notifications::NotificationService,
        totals::{check_unit_price, compute_totals, line_total, PricedLine},
    },
    store::{NewOrderItem, NewPurchaseOrder, OrderLinkage, PurchaseOrderDetail, RequisitionStore},
};

/// What a purchase order is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSource {
    Direct,
    Request(i32),
    Consolidated(i32),
}

impl From<OrderSource> for OrderOrigin {
    fn from(source: OrderSource) -> Self {
        match source {
            OrderSource::Direct => OrderOrigin::Direct,
            OrderSource::Request(id) => OrderOrigin::Request(id),
            OrderSource::Consolidated(id) => OrderOrigin::Consolidated(id),
        }
    }
}

impl OrderSource {
    fn label(&self) -> &'static str {
        match self {
            OrderSource::Direct => "direct",
            OrderSource::Request(_) => "request",
            OrderSource::Consolidated(_) => "consolidated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: Option<i32>,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine for OrderLineInput {
    fn quantity(&self) -> Decimal {
        Decimal::from(self.quantity)
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

#[derive(Debug, Clone)]
pub struct DeriveOrderCommand {
    pub source: OrderSource,
    /// Falls back to the consolidated order's provider when unset
    pub provider_id: Option<i32>,
    pub lines: Vec<OrderLineInput>,
    /// Overrides the provider's default withholding percentage
    pub withholding_percent: Option<Decimal>,
    pub currency: Currency,
}

fn validate_lines(lines: &[OrderLineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one line item is required".to_string(),
        ));
    }

    for (index, line) in lines.iter().enumerate() {
        let described = line
            .description
            .as_deref()
            .map_or(false, |d| !d.trim().is_empty());
        if line.product_id.is_none() && !described {
            return Err(ServiceError::ValidationError(format!(
                "Line {} needs a product or a description",
                index + 1
            )));
        }
        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Line {} quantity must be at least 1",
                index + 1
            )));
        }
        if line.unit_price.is_sign_negative() {
            return Err(ServiceError::ValidationError(format!(
                "Line {} unit price cannot be negative",
                index + 1
            )));
        }
        check_unit_price(index + 1, line.unit_price)?;
    }

    Ok(())
}

/// Per-product quantities of the priced lines must equal those of the source.
/// Lines without a product are not compared.
pub fn check_lines_cover_source(
    expected: &BTreeMap<i32, i64>,
    lines: &[OrderLineInput],
) -> Result<(), ServiceError> {
    let mut supplied: BTreeMap<i32, i64> = BTreeMap::new();
    for line in lines {
        if let Some(product_id) = line.product_id {
            *supplied.entry(product_id).or_insert(0) += i64::from(line.quantity);
        }
    }

    if &supplied == expected {
        return Ok(());
    }

    let mismatches: Vec<String> = expected
        .keys()
        .chain(supplied.keys())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .filter_map(|product_id| {
            let want = expected.get(product_id).copied().unwrap_or(0);
            let got = supplied.get(product_id).copied().unwrap_or(0);
            (want != got).then(|| format!("product {}: expected {}, got {}", product_id, want, got))
        })
        .collect();

    Err(ServiceError::ValidationError(format!(
        "Order lines do not match the source quantities ({})",
        mismatches.join("; ")
    )))
}

fn quantities_by_product<I>(pairs: I) -> BTreeMap<i32, i64>
where
    I: IntoIterator<Item = (Option<i32>, i32)>,
{
    let mut totals = BTreeMap::new();
    for (product_id, quantity) in pairs {
        if let Some(product_id) = product_id {
            *totals.entry(product_id).or_insert(0) += i64::from(quantity);
        }
    }
    totals
}

#[derive(Clone)]
pub struct OrderDerivationService {
    store: Arc<dyn RequisitionStore>,
    notifications: NotificationService,
    event_sender: Arc<EventSender>,
    default_withholding_percent: Decimal,
}

impl OrderDerivationService {
    pub fn new(
        store: Arc<dyn RequisitionStore>,
        event_sender: Arc<EventSender>,
        default_withholding_percent: Decimal,
    ) -> Self {
        Self {
            notifications: NotificationService::new(store.clone()),
            store,
            event_sender,
            default_withholding_percent,
        }
    }

    /// Creates a purchase order from `command.source` and links it back.
    ///
    /// Admin notification runs after the order is committed; its failure is
    /// logged and does not affect the result.
    #[instrument(skip(self, actor, command), fields(user_id = %actor.user_id, source = ?command.source))]
    pub async fn derive_order(
        &self,
        actor: &Actor,
        command: DeriveOrderCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        let result = self.derive_and_commit(actor, command).await;
        if let Err(e) = &result {
            metrics::record_failure("derive_order");
            warn!(error = %e, "Order derivation failed");
        }
        result
    }

    async fn derive_and_commit(
        &self,
        actor: &Actor,
        command: DeriveOrderCommand,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        actor.require_admin()?;
        validate_lines(&command.lines)?;

        if let Some(percent) = command.withholding_percent {
            if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
                return Err(ServiceError::InvalidInput(format!(
                    "Withholding percent {} must be between 0 and 100",
                    percent
                )));
            }
        }

        let (linkage, employee_id, approved_requests, source_provider) = match command.source {
            OrderSource::Direct => (OrderLinkage::Direct, actor.employee_id, Vec::new(), None),
            OrderSource::Request(request_id) => {
                let detail = self.store.find_request(request_id).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("Purchase request {} not found", request_id))
                })?;
                if detail.request.status != RequestStatus::Pending {
                    return Err(ServiceError::InvalidStatus(format!(
                        "Purchase request {} is {}, only pending requests can be approved",
                        request_id, detail.request.status
                    )));
                }
                let expected =
                    quantities_by_product(detail.items.iter().map(|i| (i.product_id, i.quantity)));
                check_lines_cover_source(&expected, &command.lines)?;
                (
                    OrderLinkage::Request(request_id),
                    detail.request.employee_id,
                    vec![request_id],
                    None,
                )
            }
            OrderSource::Consolidated(consolidated_order_id) => {
                let consolidated = self
                    .store
                    .find_consolidated_order(consolidated_order_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Consolidated order {} not found",
                            consolidated_order_id
                        ))
                    })?;
                if consolidated.status != ConsolidatedOrderStatus::Pending {
                    return Err(ServiceError::InvalidStatus(format!(
                        "Consolidated order {} was already converted",
                        consolidated_order_id
                    )));
                }
                let expected = quantities_by_product(
                    consolidated
                        .products
                        .0
                        .iter()
                        .map(|p| (p.product_id, p.quantity)),
                );
                check_lines_cover_source(&expected, &command.lines)?;
                let request_ids = consolidated.request_ids.0.clone();
                (
                    OrderLinkage::Consolidated {
                        consolidated_order_id,
                        request_ids: request_ids.clone(),
                    },
                    actor.employee_id,
                    request_ids,
                    consolidated.provider_id,
                )
            }
        };

        let provider_id = command.provider_id.or(source_provider).ok_or_else(|| {
            ServiceError::ValidationError("A provider is required for the purchase order".to_string())
        })?;
        let provider = self
            .store
            .find_provider(provider_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Provider {} not found", provider_id)))?;

        let withholding_percent = command
            .withholding_percent
            .or(provider.withholding_percent)
            .unwrap_or(self.default_withholding_percent);
        let totals = compute_totals(&command.lines, Some(withholding_percent));

        let items = command
            .lines
            .into_iter()
            .map(|line| NewOrderItem {
                line_total: line_total(line.quantity, line.unit_price),
                product_id: line.product_id,
                description: line.description,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let detail = self
            .store
            .commit_purchase_order(NewPurchaseOrder {
                provider_id: provider.id,
                currency: command.currency,
                totals,
                withholding_percent,
                employee_id,
                changed_by: Some(actor.user_id),
                linkage,
                items,
            })
            .await?;
        let order_id = detail.order.id;

        metrics::PURCHASE_ORDERS_CREATED
            .with_label_values(&[command.source.label()])
            .inc();

        self.event_sender
            .publish(Event::PurchaseOrderCreated {
                purchase_order_id: order_id,
                origin: command.source.into(),
            })
            .await;
        let previous = match command.source {
            OrderSource::Consolidated(_) => RequestStatus::InProcess,
            _ => RequestStatus::Pending,
        };
        for request_id in approved_requests {
            self.event_sender
                .publish(Event::RequestStatusChanged {
                    request_id,
                    old_status: previous,
                    new_status: RequestStatus::Approved,
                })
                .await;
        }

        self.notifications
            .notify_admins(
                "New purchase order",
                &format!(
                    "Purchase order #{} for {}: net payable {} {}",
                    order_id,
                    provider.name,
                    totals.net_payable.round_dp(2),
                    command.currency.symbol()
                ),
            )
            .await;

        info!(
            purchase_order_id = order_id,
            provider_id = provider.id,
            subtotal = %totals.subtotal,
            net_payable = %totals.net_payable,
            %withholding_percent,
            "Purchase order created"
        );
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn priced(product_id: Option<i32>, quantity: i32) -> OrderLineInput {
        OrderLineInput {
            product_id,
            description: Some("Item".to_string()),
            quantity,
            unit_price: dec!(10),
        }
    }

    #[test]
    fn split_lines_may_cover_one_product() {
        let expected = BTreeMap::from([(9, 6)]);
        let lines = vec![priced(Some(9), 4), priced(Some(9), 2)];
        assert!(check_lines_cover_source(&expected, &lines).is_ok());
    }

    #[test]
    fn custom_lines_are_not_compared() {
        let expected = BTreeMap::from([(9, 6)]);
        let lines = vec![priced(Some(9), 6), priced(None, 1)];
        assert!(check_lines_cover_source(&expected, &lines).is_ok());
    }

    #[test]
    fn quantity_mismatch_is_rejected() {
        let expected = BTreeMap::from([(9, 6), (3, 1)]);
        let lines = vec![priced(Some(9), 5), priced(Some(4), 1)];

        let err = check_lines_cover_source(&expected, &lines).unwrap_err();
        let ServiceError::ValidationError(message) = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("product 3: expected 1, got 0"));
        assert!(message.contains("product 4: expected 0, got 1"));
        assert!(message.contains("product 9: expected 6, got 5"));
    }

    #[test]
    fn line_validation_rules() {
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[priced(Some(1), 0)]).is_err());

        let mut blank = priced(None, 1);
        blank.description = Some("  ".to_string());
        assert!(validate_lines(&[blank]).is_err());

        let mut negative = priced(Some(1), 1);
        negative.unit_price = dec!(-1);
        assert!(validate_lines(&[negative]).is_err());

        assert!(validate_lines(&[priced(None, 2)]).is_ok());
    }
}
