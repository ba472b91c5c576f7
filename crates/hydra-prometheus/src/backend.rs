use async_trait::async_trait;
use hydra_core::{JobEvent, Subscribe};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0];

/// Job metrics fed from [`JobEvent`]s. Clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    attempts_submitted: IntCounter,
    attempts_failed: IntCounterVec,
    retries_scheduled: IntCounter,
    jobs_finished: IntCounterVec,
    attempt_duration: Histogram,
}

impl PrometheusMetrics {
    /// Metrics registered in a fresh [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Metrics registered in `registry`, e.g. the application's shared one.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let attempts_submitted = IntCounter::with_opts(Opts::new(
            "hydra_attempts_submitted_total",
            "Attempts accepted by the control plane",
        ))?;
        let attempts_failed = IntCounterVec::new(
            Opts::new("hydra_attempts_failed_total", "Attempts that ended in failure"),
            &["kind"],
        )?;
        let retries_scheduled = IntCounter::with_opts(Opts::new(
            "hydra_retries_scheduled_total",
            "Retries scheduled after a failed attempt",
        ))?;
        let jobs_finished = IntCounterVec::new(
            Opts::new("hydra_jobs_finished_total", "Jobs that reached a terminal outcome"),
            &["status"],
        )?;
        let attempt_duration = Histogram::with_opts(
            HistogramOpts::new(
                "hydra_attempt_duration_seconds",
                "Time from submission to terminal state of one attempt",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(attempts_submitted.clone()))?;
        registry.register(Box::new(attempts_failed.clone()))?;
        registry.register(Box::new(retries_scheduled.clone()))?;
        registry.register(Box::new(jobs_finished.clone()))?;
        registry.register(Box::new(attempt_duration.clone()))?;

        Ok(Self {
            registry,
            attempts_submitted,
            attempts_failed,
            retries_scheduled,
            jobs_finished,
            attempt_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Current metrics in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn record(&self, event: &JobEvent) {
        match event {
            JobEvent::AttemptSubmitted { .. } => self.attempts_submitted.inc(),
            JobEvent::AttemptSucceeded { duration, .. } => {
                if let Some(d) = duration {
                    self.attempt_duration.observe(d.as_secs_f64());
                }
            }
            JobEvent::AttemptFailed { kind, duration, .. } => {
                self.attempts_failed.with_label_values(&[kind.as_str()]).inc();
                if let Some(d) = duration {
                    self.attempt_duration.observe(d.as_secs_f64());
                }
            }
            JobEvent::RetryScheduled { .. } => self.retries_scheduled.inc(),
            JobEvent::JobFinished { status, .. } => {
                self.jobs_finished.with_label_values(&[status.as_str()]).inc()
            }
            JobEvent::IdIssued { .. }
            | JobEvent::DuplicateSubmission { .. }
            | JobEvent::CancelRequested { .. } => {}
        }
    }
}

#[async_trait]
impl Subscribe for PrometheusMetrics {
    async fn on_event(&self, event: &JobEvent) {
        self.record(event);
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}
