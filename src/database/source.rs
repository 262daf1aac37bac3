//! The seam between the query executor and a database

use async_trait::async_trait;

use super::ResultRow;
use super::error::DatabaseResult;

/// Something the executor can run queries against
///
/// [`DatabaseTarget`](super::DatabaseTarget) is the production
/// implementation. The executor only relies on this trait, so it does not
/// care which driver sits behind it.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: every scheduled job of a database
/// shares the same source and jobs may run concurrently.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Name used as the `database` metric label
    fn name(&self) -> &str;

    /// Probe the database, repairing a closed connection pool if needed
    ///
    /// Returns `false` if the database cannot be reached right now.
    async fn ensure_healthy(&self) -> bool;

    /// Run a statement and return every row it produced
    ///
    /// Implementations do not apply a deadline themselves; the executor
    /// bounds the returned future.
    async fn fetch(&self, sql: &str) -> DatabaseResult<Vec<ResultRow>>;
}
