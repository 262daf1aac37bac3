//! Failure tests for scheduling and connection handling
//!
//! These tests verify that the exporter keeps going when databases misbehave:
//! - Databases that are down at startup
//! - Unreachable hosts
//! - Closed connection pools

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use sql_exporter::config::{Config, ExporterSettings};
use sql_exporter::database::{DatabaseError, DatabaseTarget, QuerySource};
use sql_exporter::{ExecutionStatus, MetricSurface, QueryExecutor, Scheduler, SqlValue};

use crate::helpers::*;

const UNREACHABLE: &str = r#"
queryTimeout: 1
databases:
  - host: 127.0.0.1
    port: 1
    user: exporter
    password: secret
    database: pg_down
    driver: postgres
    queries:
      - { name: users, sql: "SELECT count(*) AS total FROM users" }
  - host: 127.0.0.1
    port: 1
    database: my_down
    driver: mysql
    queries:
      - { name: orders, sql: "SELECT count(*) AS total FROM orders" }
"#;

fn unreachable_targets() -> (Vec<Arc<DatabaseTarget>>, ExporterSettings) {
    let config = Config::from_yaml_str(UNREACHABLE).unwrap();
    let settings = ExporterSettings {
        query_timeout: Duration::from_millis(300),
    };

    let targets = config
        .databases
        .iter()
        .map(|database| Arc::new(DatabaseTarget::open(database, settings).unwrap()))
        .collect();

    (targets, settings)
}

#[tokio::test]
async fn test_down_at_startup_is_still_scheduled() {
    let executor = create_executor(Duration::from_secs(5));
    let source = Arc::new(FakeSource::new("app").unhealthy());

    let mut scheduler = Scheduler::new(executor.clone());
    let dyn_source: Arc<dyn QuerySource> = source.clone();
    scheduler
        .start_sources([(dyn_source, vec![query_job("users")])])
        .await;

    assert_eq!(scheduler.handles().len(), 1);
    assert_eq!(
        executor.metrics().gauge_value("up", &[("database", "app")]),
        Some(0.0)
    );

    let handle = scheduler.handle("app", "users").unwrap();
    let outcome = handle.run_now().await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Unhealthy);
    assert_eq!(source.fetches(), 0);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_database_recovers_once_reachable() {
    let executor = create_executor(Duration::from_secs(5));
    let source = Arc::new(
        FakeSource::new("app")
            .unhealthy()
            .with_rows(vec![row([("total", SqlValue::Int(3))])]),
    );

    let mut scheduler = Scheduler::new(executor.clone());
    let dyn_source: Arc<dyn QuerySource> = source.clone();
    scheduler
        .start_sources([(dyn_source, vec![query_job("users")])])
        .await;
    let handle = scheduler.handle("app", "users").unwrap();

    assert_eq!(
        handle.run_now().await.unwrap().status,
        ExecutionStatus::Unhealthy
    );

    source.set_healthy(true);
    let outcome = handle.run_now().await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Succeeded);
    let metrics = executor.metrics();
    assert_eq!(metrics.gauge_value("up", &[("database", "app")]), Some(1.0));
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "users", "total")),
        Some(3.0)
    );

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_targets_report_down() {
    let (targets, settings) = unreachable_targets();
    let metrics = MetricSurface::new().unwrap();
    let executor = Arc::new(QueryExecutor::new(settings, metrics.clone()));

    let mut scheduler = Scheduler::new(executor);
    scheduler.start(&targets).await;

    assert_eq!(scheduler.handles().len(), 2);
    assert_eq!(metrics.gauge_value("up", &[("database", "pg_down")]), Some(0.0));
    assert_eq!(metrics.gauge_value("up", &[("database", "my_down")]), Some(0.0));

    let outcome = scheduler
        .handle("pg_down", "users")
        .unwrap()
        .run_now()
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Unhealthy);
    assert_eq!(
        metrics.gauge_value("query_error", &query_labels("pg_down", "users")),
        None
    );

    scheduler.shutdown().await;
    for target in &targets {
        target.close().await;
    }
}

#[tokio::test]
async fn test_unreachable_host_stays_unhealthy() {
    let (targets, _) = unreachable_targets();

    for target in &targets {
        for _ in 0..3 {
            assert!(!target.ensure_healthy().await);
        }
        assert_eq!(target.reconnects(), 0);
    }
}

#[tokio::test]
async fn test_closed_pool_is_reopened_by_health_check() {
    let (targets, _) = unreachable_targets();
    let target = &targets[0];

    target.close().await;
    assert!(target.pool().await.is_closed());

    target.ensure_healthy().await;

    assert_eq!(target.reconnects(), 1);
    assert!(!target.pool().await.is_closed());

    // A second check finds an open pool and does not swap it again
    target.ensure_healthy().await;
    assert_eq!(target.reconnects(), 1);
}

#[tokio::test]
async fn test_query_on_closed_pool_fails_cleanly() {
    let (targets, _) = unreachable_targets();
    let target = &targets[1];
    target.close().await;

    let result = target.pool().await.fetch("SELECT 1").await;
    assert_matches!(result, Err(_));
}

#[tokio::test]
async fn test_refused_connection_times_out_at_deadline() {
    let (targets, settings) = unreachable_targets();

    for target in &targets {
        // Refused connections are retried until the acquire deadline
        let result = QuerySource::fetch(target.as_ref(), "SELECT 1").await;
        assert_matches!(result, Err(DatabaseError::Timeout(d)) if d == settings.query_timeout);
    }
}
