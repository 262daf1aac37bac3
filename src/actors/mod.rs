//! Actor-based query scheduling
//!
//! Each (database, query) pair gets its own [`QueryJobActor`] running as an
//! independent task. The actor owns a timer and an mpsc command channel; the
//! matching [`JobHandle`] is the only way to talk to it.
//!
//! ```text
//!   Scheduler ──spawns──▶ QueryJobActor (app/users)  ──▶ QueryExecutor ──▶ MetricSurface
//!             ──spawns──▶ QueryJobActor (app/orders) ──▶ QueryExecutor ──▶ MetricSurface
//!             ──spawns──▶ QueryJobActor (shop/stock) ──▶ QueryExecutor ──▶ MetricSurface
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: `RunNow` and `Shutdown` over the actor's mpsc channel
//! 2. **Request/Response**: `RunNow` answers with the outcome over a oneshot

pub mod messages;
pub mod query_job;

pub use messages::JobCommand;
pub use query_job::{JobHandle, QueryJobActor};
