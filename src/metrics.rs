//! The Prometheus metric surface
//!
//! Four gauge families live in a private [`Registry`]:
//!
//! - `postgresdb_exporter_query_value{database,name,col}`: last value of a cell
//! - `postgresdb_exporter_query_error{database,name}`: 1 if the last run failed
//! - `postgresdb_exporter_query_duration_seconds{database,name}`: last run time
//! - `postgresdb_exporter_up{database}`: result of the last health check
//!
//! Each label set holds exactly one value; later writes replace earlier ones.

use std::sync::Arc;
use std::time::Duration;

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

const NAMESPACE: &str = "postgresdb";
const SUBSYSTEM: &str = "exporter";

/// Content type of the text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

struct Gauges {
    registry: Registry,
    value: GaugeVec,
    error: GaugeVec,
    duration: GaugeVec,
    up: GaugeVec,
}

/// Shared handle to the exporter's gauges
///
/// Cheap to clone; all clones write to and render the same registry.
#[derive(Clone)]
pub struct MetricSurface {
    inner: Arc<Gauges>,
}

impl MetricSurface {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let value = gauge_vec(
            &registry,
            "query_value",
            "Value of a column returned by a query",
            &["database", "name", "col"],
        )?;
        let error = gauge_vec(
            &registry,
            "query_error",
            "Whether the last execution of a query failed",
            &["database", "name"],
        )?;
        let duration = gauge_vec(
            &registry,
            "query_duration_seconds",
            "Duration of the last execution of a query",
            &["database", "name"],
        )?;
        let up = gauge_vec(
            &registry,
            "up",
            "Whether the database answered the last health check",
            &["database"],
        )?;

        Ok(Self {
            inner: Arc::new(Gauges {
                registry,
                value,
                error,
                duration,
                up,
            }),
        })
    }

    pub fn set_up(&self, database: &str, up: bool) {
        self.inner
            .up
            .with_label_values(&[database])
            .set(flag(up));
    }

    pub fn set_query_error(&self, database: &str, name: &str, failed: bool) {
        self.inner
            .error
            .with_label_values(&[database, name])
            .set(flag(failed));
    }

    pub fn set_duration(&self, database: &str, name: &str, duration: Duration) {
        self.inner
            .duration
            .with_label_values(&[database, name])
            .set(duration.as_secs_f64());
    }

    pub fn set_value(&self, database: &str, name: &str, column: &str, value: f64) {
        self.inner
            .value
            .with_label_values(&[database, name, column])
            .set(value);
    }

    /// Render every family in the text exposition format
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Number of databases whose last health check passed and failed
    pub fn database_counts(&self) -> (usize, usize) {
        let Some(up) = self.family("up") else {
            return (0, 0);
        };

        up.get_metric()
            .iter()
            .fold((0, 0), |(alive, down), metric| {
                if metric.get_gauge().get_value() > 0.0 {
                    (alive + 1, down)
                } else {
                    (alive, down + 1)
                }
            })
    }

    /// Current value of a gauge, if that label set has been written
    ///
    /// `family` is the short name (`up`, `query_value`, ...); labels are
    /// matched as a whole.
    pub fn gauge_value(&self, family: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.family(family)?
            .get_metric()
            .iter()
            .find(|metric| {
                let pairs = metric.get_label();
                pairs.len() == labels.len()
                    && labels.iter().all(|(name, value)| {
                        pairs
                            .iter()
                            .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
                    })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    fn family(&self, family: &str) -> Option<MetricFamily> {
        let full_name = format!("{NAMESPACE}_{SUBSYSTEM}_{family}");

        self.inner
            .registry
            .gather()
            .into_iter()
            .find(|mf| mf.get_name() == full_name)
    }
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, MetricsError> {
    let opts = Opts::new(name, help)
        .namespace(NAMESPACE)
        .subsystem(SUBSYSTEM);
    let gauge = GaugeVec::new(opts, labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}
