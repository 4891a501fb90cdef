// src/metrics/collector.rs
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

use crate::probe::CheckOutcome;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Probe metrics
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub target_status: IntGaugeVec,

    // Cycle metrics
    pub cycles_total: IntCounter,
    pub cycle_duration_seconds: Histogram,
    pub monitored_targets: IntGauge,

    // Sink metrics
    pub sink_write_failures_total: IntCounter,

    // API metrics
    pub api_requests_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        // Probe metrics
        let probes_total = IntCounterVec::new(
            Opts::new("sentinel_probes_total", "Total number of probes"),
            &["outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "sentinel_probe_duration_seconds",
                "Probe duration in seconds",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let target_status = IntGaugeVec::new(
            Opts::new(
                "sentinel_target_status",
                "Last status code per target (0=unreachable)",
            ),
            &["target"],
        )?;
        registry.register(Box::new(target_status.clone()))?;

        // Cycle metrics
        let cycles_total =
            IntCounter::new("sentinel_cycles_total", "Total completed check cycles")?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "sentinel_cycle_duration_seconds",
            "Check cycle duration in seconds",
        ))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        let monitored_targets =
            IntGauge::new("sentinel_monitored_targets", "Number of monitored targets")?;
        registry.register(Box::new(monitored_targets.clone()))?;

        // Sink metrics
        let sink_write_failures_total = IntCounter::new(
            "sentinel_sink_write_failures_total",
            "Check outcomes the result sink rejected",
        )?;
        registry.register(Box::new(sink_write_failures_total.clone()))?;

        // API metrics
        let api_requests_total = IntCounterVec::new(
            Opts::new("sentinel_api_requests_total", "Total API requests"),
            &["method", "path", "status_code"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        Ok(Self {
            probes_total,
            probe_duration_seconds,
            target_status,
            cycles_total,
            cycle_duration_seconds,
            monitored_targets,
            sink_write_failures_total,
            api_requests_total,
        })
    }

    pub fn record_probe(&self, outcome: &CheckOutcome) {
        let label = if outcome.is_reachable() { "reachable" } else { "unreachable" };
        self.probes_total.with_label_values(&[label]).inc();

        self.probe_duration_seconds
            .with_label_values(&[label])
            .observe(Duration::from_millis(outcome.latency_ms).as_secs_f64());

        self.target_status
            .with_label_values(&[outcome.target.as_str()])
            .set(outcome.status_code as i64);
    }

    pub fn record_cycle(&self, targets: usize, duration: Duration) {
        self.cycles_total.inc();
        self.cycle_duration_seconds.observe(duration.as_secs_f64());
        self.monitored_targets.set(targets as i64);
    }

    pub fn record_sink_failure(&self) {
        self.sink_write_failures_total.inc();
    }

    pub fn record_api_request(&self, method: &str, path: &str, status_code: u16) {
        let status = status_code.to_string();
        self.api_requests_total
            .with_label_values(&[method, path, &status])
            .inc();
    }
}
