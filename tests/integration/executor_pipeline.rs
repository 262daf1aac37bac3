//! End-to-end executor runs against an in-process source
//!
//! These tests follow one invocation from the health check to the gauges:
//! - Values written per column
//! - Aggregate error flag
//! - Timeouts and query errors
//! - Last-write-wins convergence

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use sql_exporter::{ExecutionStatus, SqlValue};

use crate::helpers::*;

#[tokio::test]
async fn test_every_column_becomes_a_gauge() {
    let executor = create_executor(Duration::from_secs(5));
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let source = FakeSource::new("app").with_rows(vec![row([
        ("total", SqlValue::Int(12)),
        ("ratio", SqlValue::Bytes(b"0.25".to_vec())),
        ("active", SqlValue::Bool(true)),
        ("last_seen", SqlValue::Timestamp(ts)),
    ])]);

    let outcome = executor.execute(&source, &query_job("users")).await;

    assert_eq!(outcome.status, ExecutionStatus::Succeeded);
    let metrics = executor.metrics();
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "users", "total")),
        Some(12.0)
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "users", "ratio")),
        Some(0.25)
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "users", "active")),
        Some(1.0)
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "users", "last_seen")),
        Some(1_704_067_200.0)
    );
    assert_eq!(metrics.gauge_value("up", &[("database", "app")]), Some(1.0));
    assert_eq!(
        metrics.gauge_value("query_error", &query_labels("app", "users")),
        Some(0.0)
    );
}

#[tokio::test]
async fn test_null_cell_is_written_as_nan() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app").with_rows(vec![row([("maybe", SqlValue::Null)])]);

    let outcome = executor.execute(&source, &query_job("q")).await;

    assert!(outcome.is_success());
    let value = executor
        .metrics()
        .gauge_value("query_value", &value_labels("app", "q", "maybe"))
        .unwrap();
    assert!(value.is_nan());
}

#[tokio::test]
async fn test_zero_rows_is_success() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app");

    let outcome = executor.execute(&source, &query_job("empty")).await;

    assert_eq!(outcome.status, ExecutionStatus::Succeeded);
    assert!(outcome.values.is_empty());
    assert_eq!(
        executor
            .metrics()
            .gauge_value("query_error", &query_labels("app", "empty")),
        Some(0.0)
    );
    assert!(!executor.metrics().render().unwrap().contains("query_value{"));
}

#[tokio::test]
async fn test_coercion_failure_after_success_keeps_error_set() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app").with_rows(vec![
        row([
            ("good", SqlValue::Int(1)),
            ("bad", SqlValue::Text("abc".into())),
            ("skipped", SqlValue::Int(3)),
        ]),
        row([("next_row", SqlValue::Int(4))]),
    ]);

    let outcome = executor.execute(&source, &query_job("mixed")).await;

    assert_matches!(
        &outcome.status,
        ExecutionStatus::CoercionFailed { column, raw } if column == "bad" && raw == "abc"
    );
    assert_eq!(outcome.values, vec![("good".to_string(), 1.0)]);

    let metrics = executor.metrics();
    assert_eq!(
        metrics.gauge_value("query_error", &query_labels("app", "mixed")),
        Some(1.0)
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "mixed", "good")),
        Some(1.0)
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "mixed", "skipped")),
        None
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "mixed", "next_row")),
        None
    );
}

#[tokio::test]
async fn test_unsupported_type_fails_coercion() {
    let executor = create_executor(Duration::from_secs(5));
    let source =
        FakeSource::new("app").with_rows(vec![row([("doc", SqlValue::Unsupported("JSONB".into()))])]);

    let outcome = executor.execute(&source, &query_job("json")).await;

    assert_matches!(outcome.status, ExecutionStatus::CoercionFailed { .. });
}

#[tokio::test]
async fn test_timeout_sets_error_and_no_values() {
    let executor = create_executor(Duration::from_millis(50));
    let source = FakeSource::new("app")
        .with_rows(vec![row([("total", SqlValue::Int(1))])])
        .with_delay(Duration::from_millis(500));

    let outcome = executor.execute(&source, &query_job("slow")).await;

    assert_eq!(outcome.status, ExecutionStatus::TimedOut);
    assert!(outcome.duration < Duration::from_millis(500));

    let metrics = executor.metrics();
    assert_eq!(
        metrics.gauge_value("query_error", &query_labels("app", "slow")),
        Some(1.0)
    );
    assert_eq!(
        metrics.gauge_value("query_value", &value_labels("app", "slow", "total")),
        None
    );
    assert!(
        metrics
            .gauge_value("query_duration_seconds", &query_labels("app", "slow"))
            .is_some()
    );
}

#[tokio::test]
async fn test_query_error_is_reported() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app");
    source.set_reply(Reply::Error("relation \"users\" does not exist".into()));

    let outcome = executor.execute(&source, &query_job("broken")).await;

    assert_matches!(&outcome.status, ExecutionStatus::Failed(reason) if reason.contains("does not exist"));
    assert_eq!(
        executor
            .metrics()
            .gauge_value("query_error", &query_labels("app", "broken")),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_error_flag_clears_on_next_success() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app");
    let job = query_job("flaky");

    source.set_reply(Reply::Error("boom".into()));
    executor.execute(&source, &job).await;
    assert_eq!(
        executor.metrics().gauge_value("query_error", &query_labels("app", "flaky")),
        Some(1.0)
    );

    source.set_reply(Reply::Rows(vec![row([("n", SqlValue::Int(1))])]));
    executor.execute(&source, &job).await;
    assert_eq!(
        executor.metrics().gauge_value("query_error", &query_labels("app", "flaky")),
        Some(0.0)
    );
}

#[tokio::test]
async fn test_unhealthy_source_never_runs_sql() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app").unhealthy();

    let outcome = executor.execute(&source, &query_job("users")).await;

    assert_eq!(outcome.status, ExecutionStatus::Unhealthy);
    assert_eq!(source.fetches(), 0);

    let metrics = executor.metrics();
    assert_eq!(metrics.gauge_value("up", &[("database", "app")]), Some(0.0));
    assert_eq!(
        metrics.gauge_value("query_error", &query_labels("app", "users")),
        None
    );
}

#[tokio::test]
async fn test_unhealthy_keeps_previous_error_flag() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app");
    let job = query_job("users");

    source.set_reply(Reply::Error("boom".into()));
    executor.execute(&source, &job).await;

    source.set_healthy(false);
    executor.execute(&source, &job).await;

    assert_eq!(
        executor.metrics().gauge_value("query_error", &query_labels("app", "users")),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_repeated_runs_converge() {
    let executor = create_executor(Duration::from_secs(5));
    let source = FakeSource::new("app").with_rows(vec![row([("total", SqlValue::Int(7))])]);
    let job = query_job("users");

    executor.execute(&source, &job).await;
    let first = executor.metrics().render().unwrap();

    for _ in 0..5 {
        executor.execute(&source, &job).await;
    }

    assert_eq!(
        executor
            .metrics()
            .gauge_value("query_value", &value_labels("app", "users", "total")),
        Some(7.0)
    );

    // Only the duration gauge may differ between scrapes
    let strip = |text: &str| {
        text.lines()
            .filter(|line| !line.contains("duration"))
            .map(str::to_string)
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first), strip(&executor.metrics().render().unwrap()));
}
