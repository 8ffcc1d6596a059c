//! Grouping Engine.
//!
//! Given a reference request, finds the other pending requests that share at
//! least one product with it and aggregates their lines per product and per
//! product category. Category groups are scoped to the categories of the
//! reference request's own products.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::errors::ServiceError;
use crate::metrics;
use crate::store::{LineRecord, RequisitionStore};

/// Product and category ids referenced by the reference request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingScope {
    pub product_ids: BTreeSet<i32>,
    pub category_ids: BTreeSet<i32>,
}

impl GroupingScope {
    /// Lines without a product are ignored.
    pub fn from_lines(lines: &[LineRecord]) -> Self {
        let mut scope = Self::default();
        for line in lines {
            if let Some(product_id) = line.product_id {
                scope.product_ids.insert(product_id);
                if let Some(category_id) = line.category_id {
                    scope.category_ids.insert(category_id);
                }
            }
        }
        scope
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductGroup {
    pub product_id: i32,
    pub description: String,
    pub total_quantity: i64,
    pub request_ids: BTreeSet<i32>,
    pub lines: Vec<LineRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category_id: i32,
    pub total_quantity: i64,
    pub request_ids: BTreeSet<i32>,
    pub product_ids: BTreeSet<i32>,
    pub lines: Vec<LineRecord>,
}

/// Result of [`GroupingEngine::find_groupable_requests`]. Callers must not
/// rely on group order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupableRequests {
    pub by_product: Vec<ProductGroup>,
    pub by_category: Vec<CategoryGroup>,
}

impl GroupableRequests {
    pub fn is_empty(&self) -> bool {
        self.by_product.is_empty() && self.by_category.is_empty()
    }

    /// Every request id that appears in any group
    pub fn request_ids(&self) -> BTreeSet<i32> {
        self.by_product
            .iter()
            .flat_map(|g| g.request_ids.iter().copied())
            .chain(
                self.by_category
                    .iter()
                    .flat_map(|g| g.request_ids.iter().copied()),
            )
            .collect()
    }
}

/// Aggregates candidate lines into product and category groups.
///
/// Lines whose product is outside `scope.product_ids` are dropped, as are
/// category groups for categories outside `scope.category_ids`.
pub fn aggregate_groups(scope: &GroupingScope, candidates: Vec<LineRecord>) -> GroupableRequests {
    let mut by_product: BTreeMap<i32, ProductGroup> = BTreeMap::new();
    let mut by_category: BTreeMap<i32, CategoryGroup> = BTreeMap::new();

    for line in candidates {
        let Some(product_id) = line.product_id else {
            continue;
        };
        if !scope.product_ids.contains(&product_id) {
            continue;
        }

        if let Some(category_id) = line
            .category_id
            .filter(|id| scope.category_ids.contains(id))
        {
            let group = by_category
                .entry(category_id)
                .or_insert_with(|| CategoryGroup {
                    category_id,
                    total_quantity: 0,
                    request_ids: BTreeSet::new(),
                    product_ids: BTreeSet::new(),
                    lines: Vec::new(),
                });
            group.total_quantity += i64::from(line.quantity);
            group.request_ids.insert(line.request_id);
            group.product_ids.insert(product_id);
            group.lines.push(line.clone());
        }

        let group = by_product
            .entry(product_id)
            .or_insert_with(|| ProductGroup {
                product_id,
                description: line.description(),
                total_quantity: 0,
                request_ids: BTreeSet::new(),
                lines: Vec::new(),
            });
        group.total_quantity += i64::from(line.quantity);
        group.request_ids.insert(line.request_id);
        group.lines.push(line);
    }

    GroupableRequests {
        by_product: by_product.into_values().collect(),
        by_category: by_category.into_values().collect(),
    }
}

#[derive(Clone)]
pub struct GroupingEngine {
    store: Arc<dyn RequisitionStore>,
}

impl GroupingEngine {
    pub fn new(store: Arc<dyn RequisitionStore>) -> Self {
        Self { store }
    }

    /// Finds pending requests that could be consolidated with the reference request.
    ///
    /// Never fails: a missing request yields empty groups, and store failures
    /// are logged and also yield empty groups.
    #[instrument(skip(self))]
    pub async fn find_groupable_requests(&self, reference_request_id: i32) -> GroupableRequests {
        match self.collect_groups(reference_request_id).await {
            Ok(groups) => groups,
            Err(e) => {
                metrics::record_failure("find_groupable_requests");
                error!(
                    reference_request_id,
                    error = %e,
                    "Failed to load groupable requests"
                );
                GroupableRequests::default()
            }
        }
    }

    async fn collect_groups(
        &self,
        reference_request_id: i32,
    ) -> Result<GroupableRequests, ServiceError> {
        let reference_lines = self.store.request_lines(reference_request_id).await?;
        let scope = GroupingScope::from_lines(&reference_lines);
        if scope.product_ids.is_empty() {
            return Ok(GroupableRequests::default());
        }

        let product_ids: Vec<i32> = scope.product_ids.iter().copied().collect();
        let candidates = self
            .store
            .pending_lines_for_products(reference_request_id, &product_ids)
            .await?;
        debug!(
            reference_request_id,
            candidates = candidates.len(),
            "Aggregating candidate lines"
        );

        Ok(aggregate_groups(&scope, candidates))
    }
}
