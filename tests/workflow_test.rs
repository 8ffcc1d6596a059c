mod common;

use assert_matches::assert_matches;
use common::Harness;
use requisition_api::{
    entities::{ConsolidatedOrderStatus, Currency, PurchaseOrderStatus, RequestStatus},
    errors::ServiceError,
    services::{
        consolidation::ConsolidateCommand,
        order_derivation::{DeriveOrderCommand, OrderLineInput, OrderSource},
        requests::ApproveRequestCommand,
        WorkflowSettings,
    },
    store::{NewRequestItem, RequisitionStore},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;

fn priced(product_id: i32, quantity: i32, unit_price: Decimal) -> OrderLineInput {
    OrderLineInput {
        product_id: Some(product_id),
        description: None,
        quantity,
        unit_price,
    }
}

fn custom_priced(description: &str, quantity: i32, unit_price: Decimal) -> OrderLineInput {
    OrderLineInput {
        product_id: None,
        description: Some(description.to_string()),
        quantity,
        unit_price,
    }
}

async fn request_status(h: &Harness, id: i32) -> RequestStatus {
    h.services.requests.get(id).await.unwrap().request.status
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn grouping_collects_pending_requests_sharing_products() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    let pens = h.product("Blue pens", Some(1));
    let chair = h.product("Office chair", Some(2));

    let reference = h.submit(&[(paper, 2), (pens, 1)]).await;
    let r2 = h.submit(&[(paper, 3)]).await;
    let r3 = h.submit(&[(pens, 4), (chair, 1)]).await;
    let _r4 = h.submit(&[(chair, 2)]).await;
    let r5 = h.submit(&[(paper, 5)]).await;
    h.services.requests.reject(&h.admin, r5).await.unwrap();

    let groups = h
        .services
        .grouping
        .find_groupable_requests(reference)
        .await;

    assert_eq!(groups.by_product.len(), 2);
    let paper_group = groups
        .by_product
        .iter()
        .find(|g| g.product_id == paper)
        .unwrap();
    assert_eq!(paper_group.total_quantity, 3);
    assert_eq!(paper_group.request_ids, BTreeSet::from([r2]));
    assert_eq!(paper_group.description, "Paper A4");

    let pens_group = groups
        .by_product
        .iter()
        .find(|g| g.product_id == pens)
        .unwrap();
    assert_eq!(pens_group.total_quantity, 4);
    assert_eq!(pens_group.request_ids, BTreeSet::from([r3]));

    assert_eq!(groups.by_category.len(), 1);
    let stationery = &groups.by_category[0];
    assert_eq!(stationery.category_id, 1);
    assert_eq!(stationery.total_quantity, 7);
    assert_eq!(stationery.request_ids, BTreeSet::from([r2, r3]));
    assert_eq!(stationery.product_ids, BTreeSet::from([paper, pens]));

    assert_eq!(groups.request_ids(), BTreeSet::from([r2, r3]));
    assert!(!groups.request_ids().contains(&reference));
}

#[tokio::test]
async fn grouping_group_totals_match_their_lines() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    let reference = h.submit(&[(paper, 1)]).await;
    h.submit(&[(paper, 2), (paper, 6)]).await;
    h.submit(&[(paper, 4)]).await;

    let groups = h
        .services
        .grouping
        .find_groupable_requests(reference)
        .await;

    for group in &groups.by_product {
        let sum: i64 = group.lines.iter().map(|l| i64::from(l.quantity)).sum();
        assert_eq!(group.total_quantity, sum);
        assert_eq!(group.total_quantity, 12);
    }
    for group in &groups.by_category {
        let sum: i64 = group.lines.iter().map(|l| i64::from(l.quantity)).sum();
        assert_eq!(group.total_quantity, sum);
    }
}

#[tokio::test]
async fn grouping_returns_empty_for_custom_only_or_unknown_reference() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    h.submit(&[(paper, 2)]).await;

    let custom_only = h
        .submit_items(vec![NewRequestItem {
            product_id: None,
            quantity: 1,
            custom_description: Some("Coffee machine".to_string()),
        }])
        .await;

    assert!(h
        .services
        .grouping
        .find_groupable_requests(custom_only)
        .await
        .is_empty());
    assert!(h
        .services
        .grouping
        .find_groupable_requests(9_999)
        .await
        .is_empty());
}

#[tokio::test]
async fn grouping_swallows_store_failures() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    let reference = h.submit(&[(paper, 2)]).await;
    h.submit(&[(paper, 3)]).await;

    h.store.set_unavailable(true);
    let groups = h
        .services
        .grouping
        .find_groupable_requests(reference)
        .await;
    h.store.set_unavailable(false);

    assert!(groups.is_empty());
}

#[tokio::test]
async fn consolidated_requests_are_no_longer_groupable() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    let reference = h.submit(&[(paper, 1)]).await;
    let r2 = h.submit(&[(paper, 3)]).await;

    h.services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r2],
                provider_id: None,
            },
        )
        .await
        .unwrap();

    assert!(h
        .services
        .grouping
        .find_groupable_requests(reference)
        .await
        .is_empty());
}

// ---------------------------------------------------------------------------
// Consolidation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consolidation_merges_lines_and_claims_requests() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    let pens = h.product("Blue pens", Some(1));

    let r1 = h.submit(&[(paper, 2), (pens, 1)]).await;
    let r2 = h
        .submit_items(vec![
            NewRequestItem {
                product_id: Some(paper),
                quantity: 3,
                custom_description: None,
            },
            NewRequestItem {
                product_id: None,
                quantity: 1,
                custom_description: Some("Toner cartridge".to_string()),
            },
        ])
        .await;

    let order = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r1, r2, r1],
                provider_id: Some(h.provider_id),
            },
        )
        .await
        .unwrap();

    assert_eq!(order.status, ConsolidatedOrderStatus::Pending);
    assert_eq!(order.provider_id, Some(h.provider_id));
    assert_eq!(order.request_ids.0, vec![r1, r2]);

    let products = &order.products.0;
    assert_eq!(products.len(), 3);
    assert_eq!(products[0].product_id, Some(paper));
    assert_eq!(products[0].quantity, 5);
    assert_eq!(products[0].description, "Paper A4");
    assert_eq!(products[1].product_id, Some(pens));
    assert_eq!(products[1].quantity, 1);
    assert_eq!(products[2].product_id, None);
    assert_eq!(products[2].description, "Toner cartridge");

    let total: i32 = products.iter().map(|p| p.quantity).sum();
    assert_eq!(total, 7);

    assert_eq!(request_status(&h, r1).await, RequestStatus::InProcess);
    assert_eq!(request_status(&h, r2).await, RequestStatus::InProcess);

    let stored = h.services.consolidation.get(order.id).await.unwrap();
    assert_eq!(stored, order);
    let pending = h
        .services
        .consolidation
        .list(Some(ConsolidatedOrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn consolidation_rejects_requests_that_are_not_pending() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let r1 = h.submit(&[(paper, 2)]).await;

    let command = ConsolidateCommand {
        request_ids: vec![r1],
        provider_id: None,
    };
    h.services
        .consolidation
        .consolidate(&h.admin, command.clone())
        .await
        .unwrap();

    let err = h
        .services
        .consolidation
        .consolidate(&h.admin, command)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn concurrent_consolidations_claim_a_request_once() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let r1 = h.submit(&[(paper, 2)]).await;

    let command = ConsolidateCommand {
        request_ids: vec![r1],
        provider_id: None,
    };
    let (first, second) = tokio::join!(
        h.services.consolidation.consolidate(&h.admin, command.clone()),
        h.services.consolidation.consolidate(&h.admin, command),
    );

    let successes = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1);
    let err = first.err().or(second.err()).unwrap();
    assert!(matches!(
        err,
        ServiceError::InvalidStatus(_) | ServiceError::Conflict(_)
    ));
}

#[tokio::test]
async fn consolidation_with_unknown_request_claims_nothing() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let r1 = h.submit(&[(paper, 2)]).await;

    let err = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r1, 4_242],
                provider_id: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(request_status(&h, r1).await, RequestStatus::Pending);
}

#[tokio::test]
async fn consolidation_input_checks() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let r1 = h.submit(&[(paper, 2)]).await;

    let empty = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![],
                provider_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(empty, ServiceError::ValidationError(_));

    let unknown_provider = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r1],
                provider_id: Some(777),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(unknown_provider, ServiceError::NotFound(_));

    let forbidden = h
        .services
        .consolidation
        .consolidate(
            &h.employee,
            ConsolidateCommand {
                request_ids: vec![r1],
                provider_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(forbidden, ServiceError::Forbidden(_));
    assert_eq!(request_status(&h, r1).await, RequestStatus::Pending);
}

// ---------------------------------------------------------------------------
// Order derivation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consolidated_order_converts_into_purchase_order() {
    let h = Harness::new();
    let paper = h.product("Paper A4", Some(1));
    let pens = h.product("Blue pens", Some(1));

    let r1 = h.submit(&[(paper, 2), (pens, 1)]).await;
    let r2 = h.submit(&[(paper, 3)]).await;
    let consolidated = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r1, r2],
                provider_id: Some(h.provider_id),
            },
        )
        .await
        .unwrap();

    let detail = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Consolidated(consolidated.id),
                provider_id: Some(h.provider_id),
                lines: vec![
                    priced(paper, 5, dec!(10)),
                    priced(pens, 1, dec!(2)),
                    custom_priced("Delivery", 1, dec!(30)),
                ],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.order.status, PurchaseOrderStatus::Pending);
    assert_eq!(detail.order.request_id, None);
    assert_eq!(detail.order.subtotal, dec!(82));
    assert_eq!(detail.order.vat, dec!(13.12));
    assert_eq!(detail.order.vat_withheld, dec!(9.84));
    assert_eq!(detail.order.net_payable, dec!(85.28));
    assert_eq!(detail.order.withholding_percent, dec!(75));
    assert_eq!(detail.items.len(), 3);
    assert_eq!(detail.items[0].line_total, dec!(50));

    let mut linked = detail.linked_request_ids.clone();
    linked.sort_unstable();
    assert_eq!(linked, vec![r1, r2]);

    assert_eq!(request_status(&h, r1).await, RequestStatus::Approved);
    assert_eq!(request_status(&h, r2).await, RequestStatus::Approved);
    assert_eq!(
        h.services
            .consolidation
            .get(consolidated.id)
            .await
            .unwrap()
            .status,
        ConsolidatedOrderStatus::Converted
    );

    let again = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Consolidated(consolidated.id),
                provider_id: Some(h.provider_id),
                lines: vec![priced(paper, 5, dec!(10)), priced(pens, 1, dec!(2))],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(again, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn mismatched_quantities_leave_consolidated_order_untouched() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let r1 = h.submit(&[(paper, 4)]).await;
    let consolidated = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r1],
                provider_id: None,
            },
        )
        .await
        .unwrap();

    let err = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Consolidated(consolidated.id),
                provider_id: Some(h.provider_id),
                lines: vec![priced(paper, 3, dec!(10))],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(request_status(&h, r1).await, RequestStatus::InProcess);
    assert_eq!(
        h.services
            .consolidation
            .get(consolidated.id)
            .await
            .unwrap()
            .status,
        ConsolidatedOrderStatus::Pending
    );
}

#[tokio::test]
async fn approving_a_request_links_the_order_to_it() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let full_withholding = h.provider("Tax Agent Supplies", Some(dec!(100)));
    let request = h.submit(&[(paper, 2)]).await;

    let detail = h
        .services
        .requests
        .approve(
            &h.admin,
            request,
            ApproveRequestCommand {
                provider_id: full_withholding,
                lines: vec![priced(paper, 2, dec!(100))],
                withholding_percent: None,
                currency: Currency::Usd,
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.order.request_id, Some(request));
    assert_eq!(detail.order.employee_id, h.employee.employee_id);
    assert_eq!(detail.order.currency, Currency::Usd);
    assert_eq!(detail.order.subtotal, dec!(200));
    assert_eq!(detail.order.vat_withheld, detail.order.vat);
    assert_eq!(detail.order.net_payable, dec!(200));
    assert_eq!(request_status(&h, request).await, RequestStatus::Approved);

    let approved = h
        .services
        .requests
        .list(Some(RequestStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved.len(), 1);
}

#[tokio::test]
async fn explicit_withholding_overrides_provider_and_default() {
    let h = Harness::with_settings(WorkflowSettings {
        default_withholding_percent: dec!(100),
        allow_reopen_voided_orders: true,
    });
    let paper = h.product("Paper A4", None);
    let full_withholding = h.provider("Tax Agent Supplies", Some(dec!(100)));

    let overridden = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(full_withholding),
                lines: vec![priced(paper, 1, dec!(100))],
                withholding_percent: Some(Decimal::ZERO),
                currency: Currency::Local,
            },
        )
        .await
        .unwrap();
    assert_eq!(overridden.order.vat_withheld, Decimal::ZERO);
    assert_eq!(overridden.order.net_payable, dec!(116));

    let from_default = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(h.provider_id),
                lines: vec![priced(paper, 1, dec!(100))],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap();
    assert_eq!(from_default.order.withholding_percent, dec!(100));
    assert_eq!(from_default.order.net_payable, dec!(100));

    let out_of_range = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(h.provider_id),
                lines: vec![priced(paper, 1, dec!(100))],
                withholding_percent: Some(dec!(150)),
                currency: Currency::Local,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(out_of_range, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn direct_orders_notify_every_admin() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);

    let detail = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(h.provider_id),
                lines: vec![priced(paper, 3, dec!(10))],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap();

    assert_eq!(detail.order.request_id, None);
    assert!(detail.linked_request_ids.is_empty());

    let notifications = h.store.notifications().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].recipient_id, h.admin.user_id);
    assert_eq!(notifications[0].title, "New purchase order");
    assert!(notifications[0].message.contains("Office Supplies Ltd"));
    assert!(!notifications[0].read);
}

#[tokio::test]
async fn derivation_checks_caller_provider_and_source() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let request = h.submit(&[(paper, 1)]).await;
    h.services.requests.reject(&h.admin, request).await.unwrap();

    let command = |source| DeriveOrderCommand {
        source,
        provider_id: Some(h.provider_id),
        lines: vec![priced(paper, 1, dec!(5))],
        withholding_percent: None,
        currency: Currency::Local,
    };

    assert_matches!(
        h.services
            .derivation
            .derive_order(&h.employee, command(OrderSource::Direct))
            .await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        h.services
            .derivation
            .derive_order(&h.admin, command(OrderSource::Request(request)))
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
    assert_matches!(
        h.services
            .derivation
            .derive_order(&h.admin, command(OrderSource::Consolidated(31)))
            .await,
        Err(ServiceError::NotFound(_))
    );

    let mut unknown_provider = command(OrderSource::Direct);
    unknown_provider.provider_id = Some(404);
    assert_matches!(
        h.services
            .derivation
            .derive_order(&h.admin, unknown_provider)
            .await,
        Err(ServiceError::NotFound(_))
    );

    let mut no_lines = command(OrderSource::Direct);
    no_lines.lines.clear();
    assert_matches!(
        h.services.derivation.derive_order(&h.admin, no_lines).await,
        Err(ServiceError::ValidationError(_))
    );
}

// ---------------------------------------------------------------------------
// Request and purchase order lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitted_requests_start_pending_and_can_be_rejected() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let request = h.submit(&[(paper, 1)]).await;

    let detail = h.services.requests.get(request).await.unwrap();
    assert_eq!(detail.request.status, RequestStatus::Pending);
    assert_eq!(detail.request.employee_id, h.employee.employee_id);
    assert_eq!(detail.items.len(), 1);

    assert_matches!(
        h.services.requests.reject(&h.employee, request).await,
        Err(ServiceError::Forbidden(_))
    );

    let rejected = h.services.requests.reject(&h.admin, request).await.unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_matches!(
        h.services.requests.reject(&h.admin, request).await,
        Err(ServiceError::InvalidStatus(_))
    );
    assert_matches!(
        h.services.requests.get(5_000).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn completing_an_order_adds_stock() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let pens = h.product("Blue pens", None);
    h.store.set_stock(paper, 10).unwrap();

    let order = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(h.provider_id),
                lines: vec![
                    priced(paper, 5, dec!(1)),
                    priced(pens, 2, dec!(1)),
                    custom_priced("Shipping", 1, dec!(15)),
                ],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap();

    let completed = h
        .services
        .purchase_orders
        .complete(&h.admin, order.order.id)
        .await
        .unwrap();
    assert_eq!(completed.order.status, PurchaseOrderStatus::Completed);
    assert_eq!(completed.order.changed_by, Some(h.admin.user_id));

    assert_eq!(h.store.stock_level(paper).await.unwrap(), 15);
    assert_eq!(h.store.stock_level(pens).await.unwrap(), 2);

    assert_matches!(
        h.services
            .purchase_orders
            .complete(&h.admin, order.order.id)
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
    assert_eq!(h.store.stock_level(paper).await.unwrap(), 15);
}

#[tokio::test]
async fn voided_orders_reopen_only_when_allowed() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let command = || DeriveOrderCommand {
        source: OrderSource::Direct,
        provider_id: Some(h.provider_id),
        lines: vec![priced(paper, 1, dec!(1))],
        withholding_percent: None,
        currency: Currency::Local,
    };

    let id = h
        .services
        .derivation
        .derive_order(&h.admin, command())
        .await
        .unwrap()
        .order
        .id;

    assert_matches!(
        h.services.purchase_orders.void(&h.employee, id).await,
        Err(ServiceError::Forbidden(_))
    );
    let voided = h.services.purchase_orders.void(&h.admin, id).await.unwrap();
    assert_eq!(voided.order.status, PurchaseOrderStatus::Voided);
    assert_matches!(
        h.services.purchase_orders.complete(&h.admin, id).await,
        Err(ServiceError::InvalidStatus(_))
    );

    let reopened = h
        .services
        .purchase_orders
        .reopen(&h.admin, id)
        .await
        .unwrap();
    assert_eq!(reopened.order.status, PurchaseOrderStatus::Pending);

    let strict = Harness::with_settings(WorkflowSettings {
        default_withholding_percent: dec!(75),
        allow_reopen_voided_orders: false,
    });
    let paper = strict.product("Paper A4", None);
    let id = strict
        .services
        .derivation
        .derive_order(
            &strict.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(strict.provider_id),
                lines: vec![priced(paper, 1, dec!(1))],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap()
        .order
        .id;
    strict
        .services
        .purchase_orders
        .void(&strict.admin, id)
        .await
        .unwrap();
    assert_matches!(
        strict.services.purchase_orders.reopen(&strict.admin, id).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn submit_rejects_malformed_requests() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);

    let no_items = h
        .services
        .requests
        .submit(
            &h.employee,
            requisition_api::services::requests::SubmitRequestCommand {
                description: "Nothing".to_string(),
                department_id: None,
                items: vec![],
            },
        )
        .await;
    assert_matches!(no_items, Err(ServiceError::ValidationError(_)));

    let zero_quantity = h
        .services
        .requests
        .submit(
            &h.employee,
            requisition_api::services::requests::SubmitRequestCommand {
                description: "Paper".to_string(),
                department_id: None,
                items: vec![NewRequestItem {
                    product_id: Some(paper),
                    quantity: 0,
                    custom_description: None,
                }],
            },
        )
        .await;
    assert_matches!(zero_quantity, Err(ServiceError::ValidationError(_)));

    assert!(h.services.requests.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn consolidation_rejects_quantities_that_overflow_when_merged() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let half = i32::MAX / 2 + 1;
    let r1 = h.submit(&[(paper, half)]).await;
    let r2 = h.submit(&[(paper, half)]).await;

    let err = h
        .services
        .consolidation
        .consolidate(
            &h.admin,
            ConsolidateCommand {
                request_ids: vec![r1, r2],
                provider_id: None,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidInput(_));
    assert_eq!(request_status(&h, r1).await, RequestStatus::Pending);
    assert_eq!(request_status(&h, r2).await, RequestStatus::Pending);
    assert!(h.services.consolidation.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn derivation_rejects_unit_prices_beyond_the_limit() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);

    let err = h
        .services
        .derivation
        .derive_order(
            &h.admin,
            DeriveOrderCommand {
                source: OrderSource::Direct,
                provider_id: Some(h.provider_id),
                lines: vec![priced(paper, 2, Decimal::MAX / dec!(2))],
                withholding_percent: None,
                currency: Currency::Local,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn consolidated_conversion_falls_back_to_the_consolidated_provider() {
    let h = Harness::new();
    let paper = h.product("Paper A4", None);
    let with_provider = h.submit(&[(paper, 2)]).await;
    let without_provider = h.submit(&[(paper, 3)]).await;

    let consolidate = |request_id, provider_id| ConsolidateCommand {
        request_ids: vec![request_id],
        provider_id,
    };
    let chosen = h
        .services
        .consolidation
        .consolidate(&h.admin, consolidate(with_provider, Some(h.provider_id)))
        .await
        .unwrap();
    let unassigned = h
        .services
        .consolidation
        .consolidate(&h.admin, consolidate(without_provider, None))
        .await
        .unwrap();

    let convert = |consolidated_id, quantity| DeriveOrderCommand {
        source: OrderSource::Consolidated(consolidated_id),
        provider_id: None,
        lines: vec![priced(paper, quantity, dec!(10))],
        withholding_percent: None,
        currency: Currency::Local,
    };

    let detail = h
        .services
        .derivation
        .derive_order(&h.admin, convert(chosen.id, 2))
        .await
        .unwrap();
    assert_eq!(detail.order.provider_id, h.provider_id);

    let err = h
        .services
        .derivation
        .derive_order(&h.admin, convert(unassigned.id, 3))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(
        h.services.consolidation.get(unassigned.id).await.unwrap().status,
        ConsolidatedOrderStatus::Pending
    );
}
