//! Prometheus counters for the requisition workflows, exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref REQUESTS_SUBMITTED: IntCounter = IntCounter::new(
        "purchase_requests_submitted_total",
        "Total number of purchase requests submitted"
    )
    .expect("metric can be created");
    pub static ref CONSOLIDATIONS: IntCounter = IntCounter::new(
        "consolidated_orders_created_total",
        "Total number of consolidated orders created"
    )
    .expect("metric can be created");
    pub static ref PURCHASE_ORDERS_CREATED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_orders_created_total",
            "Total number of purchase orders created, by origin"
        ),
        &["origin"]
    )
    .expect("metric can be created");
    pub static ref WORKFLOW_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "requisition_workflow_failures_total",
            "Total number of failed workflow operations"
        ),
        &["operation"]
    )
    .expect("metric can be created");
}

fn register_all() {
    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(REQUESTS_SUBMITTED.clone()),
        Box::new(CONSOLIDATIONS.clone()),
        Box::new(PURCHASE_ORDERS_CREATED.clone()),
        Box::new(WORKFLOW_FAILURES.clone()),
    ];
    for collector in collectors {
        // AlreadyReg is expected on every call after the first
        if let Err(e) = REGISTRY.register(collector) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                error!("Failed to register metric: {}", e);
            }
        }
    }
}

lazy_static! {
    static ref REGISTERED: () = register_all();
}

/// Registers the workflow counters with [`REGISTRY`]. Safe to call repeatedly.
pub fn init() {
    lazy_static::initialize(&REGISTERED);
}

pub fn record_failure(operation: &str) {
    WORKFLOW_FAILURES.with_label_values(&[operation]).inc();
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    init();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
