//! Prometheus metrics for the node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; [`NodeMetrics::gather_text`]
//! encodes it in the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::NodeError;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Units that entered the ingestion pipeline.
    pub units_processed: IntCounter,
    pub units_accepted: IntCounter,
    pub units_rejected: IntCounter,
    /// Units evicted while waiting for parents.
    pub units_orphaned: IntCounter,
    pub units_stable: IntCounter,
    pub units_authored: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub pending_units: IntGauge,
    pub main_chain_length: IntGauge,
    /// Events discarded because a subscriber's queue was full.
    pub events_dropped: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent admitting one unit, in milliseconds.
    pub unit_process_time_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
        };
        let units_processed = counter("weave_units_processed_total", "Units entering ingestion")?;
        let units_accepted = counter("weave_units_accepted_total", "Units admitted to the DAG")?;
        let units_rejected = counter("weave_units_rejected_total", "Units rejected at ingestion")?;
        let units_orphaned = counter(
            "weave_units_orphaned_total",
            "Units evicted while waiting for parents",
        )?;
        let units_stable = counter("weave_units_stable_total", "Main-chain units marked stable")?;
        let units_authored = counter("weave_units_authored_total", "Units authored locally")?;

        let gauge = |name: &str, help: &str| {
            register_int_gauge_with_registry!(Opts::new(name, help), registry)
        };
        let pending_units = gauge("weave_pending_units", "Units waiting for parents")?;
        let main_chain_length = gauge("weave_main_chain_length", "Native asset main chain length")?;
        let events_dropped = gauge(
            "weave_events_dropped",
            "Consensus events dropped for slow subscribers",
        )?;

        // 0.05 ms to ~800 ms
        let unit_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("weave_unit_process_time_ms", "Unit admission time in milliseconds")
                .buckets(prometheus::exponential_buckets(0.05, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            units_processed,
            units_accepted,
            units_rejected,
            units_orphaned,
            units_stable,
            units_authored,
            pending_units,
            main_chain_length,
            events_dropped,
            unit_process_time_ms,
        })
    }

    /// Current values in the Prometheus text format.
    pub fn gather_text(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_encodes() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.units_accepted.inc_by(3);
        metrics.pending_units.set(2);
        metrics.unit_process_time_ms.observe(0.4);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("weave_units_accepted_total 3"));
        assert!(text.contains("weave_pending_units 2"));
        assert!(text.contains("weave_unit_process_time_ms_count 1"));
    }

    #[test]
    fn instances_are_independent() {
        let a = NodeMetrics::new().unwrap();
        let b = NodeMetrics::new().unwrap();
        a.units_rejected.inc();
        assert_eq!(a.units_rejected.get(), 1);
        assert_eq!(b.units_rejected.get(), 0);
    }
}
