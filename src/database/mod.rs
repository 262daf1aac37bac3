//! Access to the monitored databases
//!
//! Every configured database becomes a [`DatabaseTarget`] owning one sqlx
//! connection pool. The pool lives in a swappable cell so a pool that was
//! closed can be replaced without recreating the target.
//!
//! ## Layout
//!
//! - [`connection`]: connection parameters, connection strings, the target and
//!   its health check
//! - [`pool`]: the driver-specific pool (PostgreSQL or MySQL)
//! - [`decode`]: turns driver rows into [`SqlValue`] cells
//! - [`source`]: the [`QuerySource`] trait the executor runs against

pub mod connection;
pub mod decode;
pub mod error;
pub mod pool;
pub mod source;

pub use connection::{ConnectionParams, DatabaseTarget, PoolLimits};
pub use error::{DatabaseError, DatabaseResult};
pub use pool::{DatabasePool, Probe};
pub use source::QuerySource;

use crate::coercion::SqlValue;

/// One row of a result set, cells in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    cells: Vec<(String, SqlValue)>,
}

impl ResultRow {
    pub fn new(cells: Vec<(String, SqlValue)>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[(String, SqlValue)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, SqlValue)> for ResultRow {
    fn from_iter<T: IntoIterator<Item = (S, SqlValue)>>(iter: T) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value))
                .collect(),
        }
    }
}
