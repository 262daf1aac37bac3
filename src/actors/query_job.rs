//! QueryJobActor - Runs one query of one database on its interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → spawn execution → QueryExecutor → gauges
//!     ↑
//!     └─── Commands (RunNow, Shutdown)
//! ```
//!
//! Every tick spawns its execution as a separate task, so a run that outlasts
//! the interval does not hold back the next tick. Two runs of the same job can
//! therefore overlap.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, instrument, trace, warn};

use crate::config::QueryJob;
use crate::database::QuerySource;
use crate::executor::{ExecutionOutcome, QueryExecutor};

use super::messages::JobCommand;

/// Actor that executes a single query periodically
pub struct QueryJobActor {
    source: Arc<dyn QuerySource>,

    job: Arc<QueryJob>,

    /// Shared by every job of every database
    executor: Arc<QueryExecutor>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<JobCommand>,

    /// Executions spawned by ticks that have not finished yet
    running: JoinSet<()>,
}

impl QueryJobActor {
    pub fn new(
        source: Arc<dyn QuerySource>,
        job: QueryJob,
        executor: Arc<QueryExecutor>,
        command_rx: mpsc::Receiver<JobCommand>,
    ) -> Self {
        Self {
            source,
            job: Arc::new(job),
            executor,
            command_rx,
            running: JoinSet::new(),
        }
    }

    /// Run the actor's main loop
    ///
    /// The first tick fires immediately. The loop ends on a Shutdown command
    /// or when every handle has been dropped.
    #[instrument(skip(self), fields(database = %self.source.name(), query = %self.job.name))]
    pub async fn run(mut self) {
        debug!(interval = ?self.job.interval(), "starting query job actor");

        let mut ticker = interval(self.job.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    trace!("tick");
                    self.spawn_execution();
                }

                // Reap finished executions
                Some(result) = self.running.join_next(), if !self.running.is_empty() => {
                    if let Err(e) = result
                        && e.is_panic()
                    {
                        warn!("query execution panicked: {e}");
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(JobCommand::RunNow { respond_to }) => {
                            debug!("received RunNow command");
                            let outcome = self.execute().await;
                            let _ = respond_to.send(outcome);
                        }

                        Some(JobCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            debug!("all handles dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.running.abort_all();
        debug!("query job actor stopped");
    }

    fn spawn_execution(&mut self) {
        let source = self.source.clone();
        let job = self.job.clone();
        let executor = self.executor.clone();

        self.running.spawn(async move {
            executor.execute(source.as_ref(), &job).await;
        });
    }

    async fn execute(&self) -> ExecutionOutcome {
        self.executor.execute(self.source.as_ref(), &self.job).await
    }
}

/// Handle for controlling a QueryJobActor
///
/// Cloneable; the actor stops once every clone is dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct JobHandle {
    sender: mpsc::Sender<JobCommand>,

    /// Database the query runs against
    pub database: String,

    /// Query name
    pub query: String,
}

impl JobHandle {
    /// Spawn a new job actor
    pub fn spawn(
        source: Arc<dyn QuerySource>,
        job: QueryJob,
        executor: Arc<QueryExecutor>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let database = source.name().to_string();
        let query = job.name.clone();

        let actor = QueryJobActor::new(source, job, executor, cmd_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            database,
            query,
        }
    }

    /// Execute the query now and wait for its outcome
    pub async fn run_now(&self) -> Result<ExecutionOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(JobCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive outcome")
    }

    /// Stop the actor and abort its running executions
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(JobCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
