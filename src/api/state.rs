//! API shared state

use crate::metrics::MetricSurface;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Gauges written by the query executor
    pub metrics: MetricSurface,

    /// Number of scheduled query jobs
    pub jobs: usize,
}

impl ApiState {
    pub fn new(metrics: MetricSurface) -> Self {
        Self { metrics, jobs: 0 }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}
