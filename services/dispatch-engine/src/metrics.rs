use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    // Parcel lifecycle metrics
    pub static ref PARCELS_CREATED: IntCounter = IntCounter::new(
        "parcels_created_total",
        "Total parcels created"
    ).expect("metric can be created");

    pub static ref RIDER_ASSIGNMENTS: IntCounter = IntCounter::new(
        "rider_assignments_total",
        "Total rider assignments"
    ).expect("metric can be created");

    pub static ref PARCELS_DELIVERED: IntCounter = IntCounter::new(
        "parcels_delivered_total",
        "Total parcels delivered"
    ).expect("metric can be created");

    // Earnings metrics
    pub static ref EARNINGS_RECORDED: IntCounter = IntCounter::new(
        "earnings_recorded_total",
        "Total earnings written to the ledger"
    ).expect("metric can be created");

    pub static ref EARNING_AMOUNT: Histogram = Histogram::with_opts(
        HistogramOpts::new("earning_amount_distribution", "Distribution of earning amounts")
            .buckets(vec![25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0])
    ).expect("metric can be created");

    pub static ref CASHOUTS_SETTLED: IntCounter = IntCounter::new(
        "cashouts_settled_total",
        "Total cash-outs settled"
    ).expect("metric can be created");

    pub static ref CASHOUT_AMOUNT: Histogram = Histogram::with_opts(
        HistogramOpts::new("cashout_amount_distribution", "Distribution of cash-out amounts")
            .buckets(vec![100.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 25000.0])
    ).expect("metric can be created");

    // NATS metrics
    pub static ref NATS_MESSAGES_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("nats_messages_published_total", "Total NATS messages published"),
        &["subject", "status"]
    ).expect("metric can be created");

    // Redis cache metrics
    pub static ref CACHE_HITS: IntCounter = IntCounter::new(
        "cache_hits_total",
        "Total cache hits"
    ).expect("metric can be created");

    pub static ref CACHE_MISSES: IntCounter = IntCounter::new(
        "cache_misses_total",
        "Total cache misses"
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    // Parcel lifecycle metrics
    registry.register(Box::new(PARCELS_CREATED.clone()))?;
    registry.register(Box::new(RIDER_ASSIGNMENTS.clone()))?;
    registry.register(Box::new(PARCELS_DELIVERED.clone()))?;

    // Earnings metrics
    registry.register(Box::new(EARNINGS_RECORDED.clone()))?;
    registry.register(Box::new(EARNING_AMOUNT.clone()))?;
    registry.register(Box::new(CASHOUTS_SETTLED.clone()))?;
    registry.register(Box::new(CASHOUT_AMOUNT.clone()))?;

    // NATS metrics
    registry.register(Box::new(NATS_MESSAGES_PUBLISHED.clone()))?;

    // Cache metrics
    registry.register(Box::new(CACHE_HITS.clone()))?;
    registry.register(Box::new(CACHE_MISSES.clone()))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let registry = Registry::new();
        let result = register_metrics(&registry);
        assert!(result.is_ok());
    }

    #[test]
    fn test_metrics_handler() {
        let _ = register_metrics(prometheus::default_registry());
        PARCELS_DELIVERED.inc();
        let result = metrics_handler();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("parcels_delivered_total"));
    }
}
