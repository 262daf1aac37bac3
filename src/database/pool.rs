//! Driver-specific connection pools

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlSslMode};
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgConnectOptions, PgPool, PgSslMode};
use sqlx::{Connection, Database, MySql, Pool, Postgres};
use tracing::{debug, instrument};

use crate::config::{Driver, ExporterSettings};

use super::ResultRow;
use super::connection::{ConnectionParams, PoolLimits};
use super::decode;
use super::error::{DatabaseError, DatabaseResult};

/// Connection pool wrapper for the supported drivers
///
/// Cloning is cheap: both variants are reference counted handles to the same
/// pool.
#[derive(Clone, Debug)]
pub enum DatabasePool {
    Postgres(PgPool),
    MySql(MySqlPool),
}

/// Result of a liveness probe
#[derive(Debug)]
pub enum Probe {
    /// A connection could be acquired and answered a ping
    Alive,

    /// The pool itself has been closed; reopening it may help
    Closed,

    /// Network, authentication or server failure
    Failed(sqlx::Error),
}

impl DatabasePool {
    /// Create a pool without connecting
    ///
    /// Connections are established on first use, so an unreachable database
    /// does not fail here. Only parameters that can never work are rejected.
    pub fn open(
        params: &ConnectionParams,
        limits: PoolLimits,
        settings: &ExporterSettings,
    ) -> DatabaseResult<Self> {
        if params.host.trim().is_empty() {
            return Err(DatabaseError::InvalidParams("host is empty".to_string()));
        }
        if params.database.trim().is_empty() {
            return Err(DatabaseError::InvalidParams(
                "database name is empty".to_string(),
            ));
        }
        if limits.max_open == 0 {
            return Err(DatabaseError::InvalidParams(
                "max open connections must be at least 1".to_string(),
            ));
        }

        let pool = match params.driver {
            Driver::Postgres => {
                let options = PgConnectOptions::new()
                    .host(&params.host)
                    .port(params.port)
                    .username(&params.user)
                    .password(&params.password)
                    .database(&params.database)
                    .ssl_mode(PgSslMode::Disable);

                DatabasePool::Postgres(
                    pool_options::<Postgres>(limits, settings).connect_lazy_with(options),
                )
            }
            Driver::MySql => {
                let options = MySqlConnectOptions::new()
                    .host(&params.host)
                    .port(params.port)
                    .username(&params.user)
                    .password(&params.password)
                    .database(&params.database)
                    .ssl_mode(MySqlSslMode::Disabled);

                DatabasePool::MySql(
                    pool_options::<MySql>(limits, settings).connect_lazy_with(options),
                )
            }
        };

        debug!(
            driver = %params.driver,
            max_open = limits.max_open,
            max_idle = limits.effective_max_idle(),
            "created lazy connection pool"
        );

        Ok(pool)
    }

    pub fn driver(&self) -> Driver {
        match self {
            DatabasePool::Postgres(_) => Driver::Postgres,
            DatabasePool::MySql(_) => Driver::MySql,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DatabasePool::Postgres(pool) => pool.is_closed(),
            DatabasePool::MySql(pool) => pool.is_closed(),
        }
    }

    /// Acquire a connection and ping the server
    pub async fn probe(&self) -> Probe {
        if self.is_closed() {
            return Probe::Closed;
        }

        let result = match self {
            DatabasePool::Postgres(pool) => ping(pool).await,
            DatabasePool::MySql(pool) => ping(pool).await,
        };

        match result {
            Ok(()) => Probe::Alive,
            Err(sqlx::Error::PoolClosed) => Probe::Closed,
            Err(e) => Probe::Failed(e),
        }
    }

    /// Run `sql` and decode every returned row
    ///
    /// Statements go over the simple (text) protocol. Drivers then hand
    /// NUMERIC/DECIMAL columns over as decimal text, which keeps their full
    /// precision until coercion.
    #[instrument(skip_all, fields(driver = %self.driver()))]
    pub async fn fetch(&self, sql: &str) -> DatabaseResult<Vec<ResultRow>> {
        match self {
            DatabasePool::Postgres(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                rows.iter().map(decode::pg_row).collect()
            }
            DatabasePool::MySql(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                rows.iter().map(decode::mysql_row).collect()
            }
        }
    }

    /// Close the pool, waiting for checked out connections to be returned
    pub async fn close(&self) {
        match self {
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::MySql(pool) => pool.close().await,
        }
    }
}

fn pool_options<DB: Database>(limits: PoolLimits, settings: &ExporterSettings) -> PoolOptions<DB> {
    // sqlx has no cap on the number of idle connections. A limit of zero is
    // honored by closing connections on release; any other limit leaves idle
    // connections to the pool's idle timeout.
    let keep_idle = limits.effective_max_idle() > 0;

    PoolOptions::<DB>::new()
        .max_connections(limits.max_open)
        .min_connections(0)
        .acquire_timeout(settings.query_timeout)
        .after_release(move |_conn, _meta| Box::pin(async move { Ok(keep_idle) }))
}

async fn ping<DB: Database>(pool: &Pool<DB>) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}
