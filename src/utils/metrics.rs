use crate::error::Result;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// How a single collector call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Returned data
    Ok,
    /// Returned successfully but with nothing in it
    Empty,
    /// Collaborator returned an error; degraded to empty
    Failed,
    /// Deadline elapsed; degraded to empty
    TimedOut,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Ok => "ok",
            CallOutcome::Empty => "empty",
            CallOutcome::Failed => "error",
            CallOutcome::TimedOut => "timeout",
        }
    }

    /// Data was lost to an upstream problem, as opposed to a true zero-signal
    pub fn is_degraded(&self) -> bool {
        matches!(self, CallOutcome::Failed | CallOutcome::TimedOut)
    }
}

/// Collector telemetry, owned by the engine rather than a global registry
pub struct CollectorMetrics {
    registry: Registry,
    calls: IntCounterVec,
    latency: HistogramVec,
    enabled: bool,
}

impl CollectorMetrics {
    pub fn new(namespace: &str, enabled: bool) -> Result<Self> {
        let registry = Registry::new();

        let calls = IntCounterVec::new(
            Opts::new("collector_calls_total", "Collector calls by source and outcome")
                .namespace(namespace.to_string()),
            &["source", "outcome"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("collector_latency_seconds", "Collector call latency")
                .namespace(namespace.to_string())
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 1.5, 2.0, 3.0]),
            &["source"],
        )?;

        registry.register(Box::new(calls.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            calls,
            latency,
            enabled,
        })
    }

    /// Metrics that record nothing; for tests and benchmarks
    pub fn disabled() -> Result<Self> {
        Self::new("attribution", false)
    }

    pub fn record(&self, source: &str, outcome: CallOutcome, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        self.calls.with_label_values(&[source, outcome.as_str()]).inc();
        self.latency.with_label_values(&[source]).observe(elapsed.as_secs_f64());
    }

    pub fn count(&self, source: &str, outcome: CallOutcome) -> u64 {
        self.calls.with_label_values(&[source, outcome.as_str()]).get()
    }

    /// Render the Prometheus text exposition format
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_outcomes() {
        assert!(CallOutcome::TimedOut.is_degraded());
        assert!(CallOutcome::Failed.is_degraded());
        assert!(!CallOutcome::Empty.is_degraded());
        assert!(!CallOutcome::Ok.is_degraded());
    }

    #[test]
    fn test_record_and_gather() {
        let metrics = CollectorMetrics::new("test", true).unwrap();
        metrics.record("patterns", CallOutcome::TimedOut, Duration::from_millis(2000));
        metrics.record("patterns", CallOutcome::Empty, Duration::from_millis(10));
        metrics.record("patterns", CallOutcome::Empty, Duration::from_millis(12));

        assert_eq!(metrics.count("patterns", CallOutcome::TimedOut), 1);
        assert_eq!(metrics.count("patterns", CallOutcome::Empty), 2);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("test_collector_calls_total"));
        assert!(text.contains("outcome=\"timeout\""));
    }

    #[test]
    fn test_disabled_metrics_record_nothing() {
        let metrics = CollectorMetrics::disabled().unwrap();
        metrics.record("institutions", CallOutcome::Ok, Duration::from_millis(5));
        assert_eq!(metrics.count("institutions", CallOutcome::Ok), 0);
    }
}
