//! Running one query once
//!
//! [`QueryExecutor::execute`] is what every scheduler tick does:
//!
//! ```text
//! health check ─┬─ unhealthy → up=0, stop
//!               └─ healthy → up=1 → fetch (with timeout) → coerce cells → gauges
//! ```
//!
//! The duration gauge is written on every path, including the unhealthy one.
//! `query_error` is decided once from the outcome of the whole invocation.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, error, instrument, trace, warn};

use crate::coercion::to_float;
use crate::config::{ExporterSettings, QueryJob};
use crate::database::{DatabaseError, QuerySource};
use crate::metrics::MetricSurface;

/// How an invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    /// Every cell was coerced and written (this includes zero rows)
    Succeeded,

    /// The health check failed; the query was not sent
    Unhealthy,

    /// The query did not finish before the deadline
    TimedOut,

    /// The database rejected the query or a cell could not be decoded
    Failed(String),

    /// A cell could not be turned into a number
    CoercionFailed { column: String, raw: String },
}

impl ExecutionStatus {
    /// Whether this outcome sets `query_error`
    ///
    /// `None` means the flag is left untouched.
    fn error_flag(&self) -> Option<bool> {
        match self {
            ExecutionStatus::Succeeded => Some(false),
            ExecutionStatus::Unhealthy => None,
            ExecutionStatus::TimedOut
            | ExecutionStatus::Failed(_)
            | ExecutionStatus::CoercionFailed { .. } => Some(true),
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Succeeded => write!(f, "succeeded"),
            ExecutionStatus::Unhealthy => write!(f, "database unhealthy"),
            ExecutionStatus::TimedOut => write!(f, "timed out"),
            ExecutionStatus::Failed(reason) => write!(f, "failed: {reason}"),
            ExecutionStatus::CoercionFailed { column, raw } => {
                write!(f, "column '{column}' holds non-numeric value '{raw}'")
            }
        }
    }
}

/// Result of one invocation of a query
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub duration: Duration,

    /// `(column, value)` pairs written to `query_value`, in row order
    pub values: Vec<(String, f64)>,

    pub status: ExecutionStatus,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

/// Writes the duration gauge when dropped, so no exit path can skip it
struct DurationGuard<'a> {
    metrics: &'a MetricSurface,
    database: &'a str,
    query: &'a str,
    started: Instant,
}

impl<'a> DurationGuard<'a> {
    fn start(metrics: &'a MetricSurface, database: &'a str, query: &'a str) -> Self {
        Self {
            metrics,
            database,
            query,
            started: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for DurationGuard<'_> {
    fn drop(&mut self) {
        self.metrics
            .set_duration(self.database, self.query, self.started.elapsed());
    }
}

/// Executes queries against a [`QuerySource`] and publishes the results
pub struct QueryExecutor {
    settings: ExporterSettings,
    metrics: MetricSurface,
}

impl QueryExecutor {
    pub fn new(settings: ExporterSettings, metrics: MetricSurface) -> Self {
        Self { settings, metrics }
    }

    pub fn metrics(&self) -> &MetricSurface {
        &self.metrics
    }

    pub fn settings(&self) -> &ExporterSettings {
        &self.settings
    }

    /// Run `job` once against `source`
    ///
    /// Never fails: every problem is logged, reflected in the gauges and
    /// reported through the returned status.
    #[instrument(skip_all, fields(database = %source.name(), query = %job.name))]
    pub async fn execute(&self, source: &dyn QuerySource, job: &QueryJob) -> ExecutionOutcome {
        let database = source.name();
        let guard = DurationGuard::start(&self.metrics, database, &job.name);

        let mut values = Vec::new();
        let status = self.run(source, job, &mut values).await;

        if let Some(failed) = status.error_flag() {
            self.metrics.set_query_error(database, &job.name, failed);
        }

        let duration = guard.elapsed();
        drop(guard);

        debug!(?duration, "query {status}");

        ExecutionOutcome {
            duration,
            values,
            status,
        }
    }

    async fn run(
        &self,
        source: &dyn QuerySource,
        job: &QueryJob,
        values: &mut Vec<(String, f64)>,
    ) -> ExecutionStatus {
        let database = source.name();

        if !source.ensure_healthy().await {
            warn!("database is unhealthy, skipping query");
            self.metrics.set_up(database, false);
            return ExecutionStatus::Unhealthy;
        }
        self.metrics.set_up(database, true);

        trace!(sql = %job.sql, "running query");

        let timeout = self.settings.query_timeout;
        let rows = match tokio::time::timeout(timeout, source.fetch(&job.sql)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(DatabaseError::Timeout(_))) | Err(_) => {
                error!(?timeout, "query timed out");
                return ExecutionStatus::TimedOut;
            }
            Ok(Err(e)) => {
                error!("query failed: {e}");
                return ExecutionStatus::Failed(e.to_string());
            }
        };

        for row in &rows {
            for (column, cell) in row.cells() {
                let (value, ok) = to_float(cell);
                if !ok {
                    error!(column = %column, raw = %cell, "cannot convert value to float");
                    return ExecutionStatus::CoercionFailed {
                        column: column.clone(),
                        raw: cell.to_string(),
                    };
                }

                self.metrics.set_value(database, &job.name, column, value);
                values.push((column.clone(), value));
            }
        }

        trace!(rows = rows.len(), "query finished");
        ExecutionStatus::Succeeded
    }
}
