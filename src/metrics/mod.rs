
use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    /// Submissions rejected at admission, by reason (full, closed, held)
    pub static ref QUEUE_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("queue_rejected", "Requests rejected before reaching a worker"),
        &["reason"]
    )
    .expect("metric can not be created");

    pub static ref LOCK_WAIT_DURATION_METRIC: Histogram = Histogram::with_opts(
        HistogramOpts::new("lock_wait_duration_ms", "Histogram of write-lock wait time in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets"))
    )
    .expect("metric can not be created");

    pub static ref LOCK_TIMEOUTS: IntCounter =
        IntCounter::new("lock_timeouts", "Write-lock waits that exhausted their budget")
            .expect("metric can not be created");

    /// Instances touched by cascades, by class (create, delete)
    pub static ref CASCADE_INSTANCES: IntCounterVec = IntCounterVec::new(
        Opts::new("cascade_instances", "Instances created or deleted by dependency cascades"),
        &["class"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_ACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_actions", "Reconciliation actions executed"),
        &["object", "action", "status"]
    )
    .expect("metric can not be created");

    pub static ref REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("requests", "Processed requests by kind and result code"),
        &["kind", "code"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(QUEUE_REJECTED.clone()),
        Box::new(LOCK_WAIT_DURATION_METRIC.clone()),
        Box::new(LOCK_TIMEOUTS.clone()),
        Box::new(CASCADE_INSTANCES.clone()),
        Box::new(RECONCILE_ACTIONS.clone()),
        Box::new(REQUESTS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `/metrics` until `shutdown` is cancelled.
pub async fn start_server(
    port: u16,
    shutdown: CancellationToken,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (addr, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            shutdown.cancelled().await;
        });
    info!("metrics server listening on {}", addr);
    server.await;
}

pub(crate) fn render(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(render(&REGISTRY))
}
