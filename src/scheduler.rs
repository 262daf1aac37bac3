//! Binding queries to recurring jobs
//!
//! The scheduler spawns one [`QueryJobActor`](crate::actors::QueryJobActor)
//! per configured query. Jobs are registered whether or not their database
//! answers the initial connection check: a database that is down at startup
//! reports `up=0` and is picked up by a later tick once it becomes reachable.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::actors::JobHandle;
use crate::config::QueryJob;
use crate::database::{DatabaseTarget, QuerySource};
use crate::executor::QueryExecutor;

pub struct Scheduler {
    executor: Arc<QueryExecutor>,
    handles: Vec<JobHandle>,
}

impl Scheduler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self {
            executor,
            handles: Vec::new(),
        }
    }

    /// Start a recurring job for `job` against `source`
    ///
    /// The first execution happens right away.
    pub fn register(&mut self, source: Arc<dyn QuerySource>, job: QueryJob) -> JobHandle {
        debug!(
            database = %source.name(),
            query = %job.name,
            interval = ?job.interval(),
            "registering query job"
        );

        let handle = JobHandle::spawn(source, job, self.executor.clone());
        self.handles.push(handle.clone());
        handle
    }

    /// Check every database and register all their queries
    pub async fn start(&mut self, targets: &[Arc<DatabaseTarget>]) {
        let bindings = targets.iter().map(|target| {
            let source: Arc<dyn QuerySource> = target.clone();
            (source, target.queries().to_vec())
        });

        self.start_sources(bindings).await;
    }

    /// Like [`start`](Self::start), for any [`QuerySource`]
    pub async fn start_sources<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = (Arc<dyn QuerySource>, Vec<QueryJob>)>,
    {
        let bindings: Vec<_> = bindings.into_iter().collect();
        let metrics = self.executor.metrics();

        let checks = bindings.iter().map(|(source, _)| source.ensure_healthy());
        let results = join_all(checks).await;

        for ((source, _), healthy) in bindings.iter().zip(results) {
            if healthy {
                info!(database = %source.name(), "database is reachable");
            } else {
                warn!(
                    database = %source.name(),
                    "database is not reachable, its queries will be retried on schedule"
                );
            }
            metrics.set_up(source.name(), healthy);
        }

        for (source, queries) in bindings {
            for job in queries {
                self.register(source.clone(), job);
            }
        }

        info!(jobs = self.handles.len(), "scheduler started");
    }

    pub fn handles(&self) -> &[JobHandle] {
        &self.handles
    }

    /// The handle of a registered job
    pub fn handle(&self, database: &str, query: &str) -> Option<&JobHandle> {
        self.handles
            .iter()
            .find(|handle| handle.database == database && handle.query == query)
    }

    /// Stop every job
    pub async fn shutdown(&self) {
        for handle in &self.handles {
            if let Err(e) = handle.shutdown().await {
                debug!(
                    database = %handle.database,
                    query = %handle.query,
                    "job already stopped: {e:#}"
                );
            }
        }
        info!("scheduler stopped");
    }
}
