//! Prometheus metrics for a wallet system.
//!
//! Each [`SystemMetrics`] owns a private [`Registry`] so several systems in
//! one process never collide. [`SystemMetrics::gather_text`] renders the
//! Prometheus text exposition format for whatever endpoint the embedding
//! application exposes.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct SystemMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Engine lifecycle events handled and announced.
    pub events_dispatched: IntCounter,
    /// Engine events dropped because the system or entity was gone.
    pub events_dropped: IntCounter,
    /// Outbound engine queries forwarded to the query service.
    pub queries_issued: IntCounter,
    /// Outbound engine queries announced back as failures.
    pub queries_failed: IntCounter,
    pub estimations_succeeded: IntCounter,
    pub estimations_failed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Networks published by the last discovery pass.
    pub networks: IntGauge,
    pub wallet_managers: IntGauge,
}

impl SystemMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let events_dispatched = register_int_counter_with_registry!(
            Opts::new(
                "walletkit_events_dispatched_total",
                "Engine events handled and announced to the listener"
            ),
            registry
        )
        .expect("failed to register events_dispatched counter");

        let events_dropped = register_int_counter_with_registry!(
            Opts::new(
                "walletkit_events_dropped_total",
                "Engine events dropped for a missing system or entity"
            ),
            registry
        )
        .expect("failed to register events_dropped counter");

        let queries_issued = register_int_counter_with_registry!(
            Opts::new(
                "walletkit_queries_issued_total",
                "Engine queries forwarded to the query service"
            ),
            registry
        )
        .expect("failed to register queries_issued counter");

        let queries_failed = register_int_counter_with_registry!(
            Opts::new(
                "walletkit_queries_failed_total",
                "Engine queries announced as failed"
            ),
            registry
        )
        .expect("failed to register queries_failed counter");

        let estimations_succeeded = register_int_counter_with_registry!(
            Opts::new(
                "walletkit_estimations_succeeded_total",
                "Limit estimations that produced an amount"
            ),
            registry
        )
        .expect("failed to register estimations_succeeded counter");

        let estimations_failed = register_int_counter_with_registry!(
            Opts::new(
                "walletkit_estimations_failed_total",
                "Limit estimations that ended in a terminal error"
            ),
            registry
        )
        .expect("failed to register estimations_failed counter");

        let networks = register_int_gauge_with_registry!(
            Opts::new("walletkit_networks", "Networks known to the system"),
            registry
        )
        .expect("failed to register networks gauge");

        let wallet_managers = register_int_gauge_with_registry!(
            Opts::new("walletkit_wallet_managers", "Wallet managers owned by the system"),
            registry
        )
        .expect("failed to register wallet_managers gauge");

        Self {
            registry,
            events_dispatched,
            events_dropped,
            queries_issued,
            queries_failed,
            estimations_succeeded,
            estimations_failed,
            networks,
            wallet_managers,
        }
    }

    /// Encode every metric in the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_output() {
        let metrics = SystemMetrics::new();
        metrics.events_dispatched.inc();
        metrics.events_dispatched.inc();
        metrics.networks.set(3);

        let text = metrics.gather_text();
        assert!(text.contains("walletkit_events_dispatched_total 2"));
        assert!(text.contains("walletkit_networks 3"));
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let a = SystemMetrics::new();
        let b = SystemMetrics::new();
        a.queries_failed.inc();
        assert_eq!(a.queries_failed.get(), 1);
        assert_eq!(b.queries_failed.get(), 0);
    }
}
