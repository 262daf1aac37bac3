//! Helper functions for integration tests

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sql_exporter::config::{ExporterSettings, QueryJob};
use sql_exporter::database::{DatabaseError, DatabaseResult, QuerySource, ResultRow};
use sql_exporter::{MetricSurface, QueryExecutor, SqlValue};

/// What the fake database answers to a query
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<ResultRow>),
    Error(String),
}

/// In-process stand-in for a database target
///
/// Health, replies and latency can be changed while jobs are running.
pub struct FakeSource {
    name: String,
    healthy: AtomicBool,
    reply: Mutex<Reply>,
    delay: Mutex<Duration>,
    fetches: AtomicUsize,
    health_checks: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            healthy: AtomicBool::new(true),
            reply: Mutex::new(Reply::Rows(Vec::new())),
            delay: Mutex::new(Duration::ZERO),
            fetches: AtomicUsize::new(0),
            health_checks: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_rows(self, rows: Vec<ResultRow>) -> Self {
        self.set_reply(Reply::Rows(rows));
        self
    }

    pub fn unhealthy(self) -> Self {
        self.set_healthy(false);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuerySource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_healthy(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }

    async fn fetch(&self, _sql: &str) -> DatabaseResult<Vec<ResultRow>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Rows(rows) => Ok(rows),
            Reply::Error(message) => Err(DatabaseError::Query(sqlx::Error::Protocol(message))),
        }
    }
}

pub fn row<const N: usize>(cells: [(&str, SqlValue); N]) -> ResultRow {
    ResultRow::from_iter(cells)
}

pub fn query_job(name: &str) -> QueryJob {
    QueryJob {
        sql: format!("SELECT * FROM {name}"),
        name: name.to_string(),
        interval: 1,
    }
}

pub fn create_executor(timeout: Duration) -> Arc<QueryExecutor> {
    Arc::new(QueryExecutor::new(
        ExporterSettings {
            query_timeout: timeout,
        },
        MetricSurface::new().unwrap(),
    ))
}

/// Label set of a `query_value` gauge
pub fn value_labels<'a>(database: &'a str, name: &'a str, col: &'a str) -> [(&'a str, &'a str); 3] {
    [("database", database), ("name", name), ("col", col)]
}

/// Label set of the per-query gauges
pub fn query_labels<'a>(database: &'a str, name: &'a str) -> [(&'a str, &'a str); 2] {
    [("database", database), ("name", name)]
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
