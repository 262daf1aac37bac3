pub mod actors;
pub mod api;
pub mod coercion;
pub mod config;
pub mod database;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod util;

pub use coercion::{SqlValue, to_float};
pub use executor::{ExecutionOutcome, ExecutionStatus, QueryExecutor};
pub use metrics::{MetricSurface, MetricsError};
pub use scheduler::Scheduler;
