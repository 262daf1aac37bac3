//! Message types for actor communication
//!
//! Query job actors are controlled through an mpsc command channel. Requests
//! that expect an answer carry a oneshot sender for the reply.

use tokio::sync::oneshot;

use crate::executor::ExecutionOutcome;

/// Commands that can be sent to a QueryJobActor
#[derive(Debug)]
pub enum JobCommand {
    /// Execute the query immediately, outside the interval timer
    ///
    /// Used for testing and manual refresh operations.
    RunNow {
        /// Channel to send the outcome back
        respond_to: oneshot::Sender<ExecutionOutcome>,
    },

    /// Stop the actor
    ///
    /// Executions started by earlier ticks are aborted.
    Shutdown,
}
