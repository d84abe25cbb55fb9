use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{
    errors::Result,
    models::{Decision, MediaKind},
    services::compression::CompressionOutcome,
};

pub struct MetricsService {
    registry: Registry,
    quota_decisions: IntCounterVec,
    compression_runs: IntCounterVec,
    compression_ratio: Histogram,
}

impl MetricsService {
    pub fn new() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let quota_decisions = IntCounterVec::new(
            Opts::new("quota_decisions_total", "Upload admission decisions"),
            &["kind", "outcome"],
        )?;
        let compression_runs = IntCounterVec::new(
            Opts::new("compression_runs_total", "Compression attempts by result"),
            &["kind", "outcome"],
        )?;
        let compression_ratio = Histogram::with_opts(
            HistogramOpts::new("compression_ratio", "Output size divided by input size")
                .buckets(vec![0.1, 0.2, 0.3, 0.5, 0.7, 0.9, 1.0]),
        )?;

        registry.register(Box::new(quota_decisions.clone()))?;
        registry.register(Box::new(compression_runs.clone()))?;
        registry.register(Box::new(compression_ratio.clone()))?;

        Ok(Self {
            registry,
            quota_decisions,
            compression_runs,
            compression_ratio,
        })
    }

    pub fn record_decision(&self, decision: &Decision) {
        let outcome = decision.reason.map_or("allowed", |r| r.as_str());
        self.quota_decisions
            .with_label_values(&[decision.media_kind.as_str(), outcome])
            .inc();
    }

    pub fn record_compression(&self, kind: MediaKind, outcome: &CompressionOutcome) {
        self.compression_runs
            .with_label_values(&[kind.as_str(), outcome.status.as_str()])
            .inc();
        if !outcome.status.is_passthrough() {
            self.compression_ratio.observe(outcome.ratio());
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(anyhow::Error::from)?;
        String::from_utf8(buffer).map_err(|e| anyhow::Error::from(e).into())
    }
}
