//! Connection parameters and the per-database target
//!
//! A [`DatabaseTarget`] is created once per configured database and lives for
//! the whole process. Its pool sits behind a [`RwLock`]: every execution takes
//! a cheap clone of the current pool, and a reconnect swaps a fresh pool in
//! under the write lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{DatabaseConfig, Driver, ExporterSettings, QueryJob};
use crate::util::mask_secret;

use super::ResultRow;
use super::error::DatabaseResult;
use super::pool::{DatabasePool, Probe};
use super::source::QuerySource;

/// Everything needed to reach one database
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionParams {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            driver: config.driver,
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        }
    }

    /// Driver specific connection string
    ///
    /// - postgres: `user=U password=P host=H port=N dbname=D sslmode=disable`
    /// - mysql: `U:P@tcp(H:N)/D`
    pub fn connection_string(&self) -> String {
        self.format_with_password(&self.password)
    }

    /// The connection string with the password masked, safe for logs
    pub fn redacted(&self) -> String {
        self.format_with_password(&mask_secret(&self.password))
    }

    fn format_with_password(&self, password: &str) -> String {
        match self.driver {
            Driver::Postgres => format!(
                "user={} password={} host={} port={} dbname={} sslmode=disable",
                self.user, password, self.host, self.port, self.database
            ),
            Driver::MySql => format!(
                "{}:{}@tcp({}:{})/{}",
                self.user, password, self.host, self.port, self.database
            ),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &mask_secret(&self.password))
            .field("database", &self.database)
            .finish()
    }
}

/// Pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_idle: u32,
    pub max_open: u32,
}

impl PoolLimits {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_idle: config.max_idle_conns,
            max_open: config.max_open_conns,
        }
    }

    /// Idle connections can never exceed open connections
    pub fn effective_max_idle(&self) -> u32 {
        self.max_idle.min(self.max_open)
    }
}

/// A monitored database and the queries scheduled against it
pub struct DatabaseTarget {
    name: String,
    params: ConnectionParams,
    limits: PoolLimits,
    settings: ExporterSettings,
    pool: RwLock<DatabasePool>,
    reconnects: AtomicU64,
    queries: Vec<QueryJob>,
}

impl DatabaseTarget {
    /// Build the target and its (lazy) pool
    ///
    /// Does not touch the network: an unreachable database is only noticed by
    /// the first health check.
    pub fn open(config: &DatabaseConfig, settings: ExporterSettings) -> DatabaseResult<Self> {
        let params = ConnectionParams::from_config(config);
        let limits = PoolLimits::from_config(config);
        let pool = DatabasePool::open(&params, limits, &settings)?;

        info!(database = %config.database, connection = %params.redacted(), "configured database");

        Ok(Self {
            name: config.database.clone(),
            params,
            limits,
            settings,
            pool: RwLock::new(pool),
            reconnects: AtomicU64::new(0),
            queries: config.queries.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queries(&self) -> &[QueryJob] {
        &self.queries
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn connection_string(&self) -> String {
        self.params.connection_string()
    }

    /// Number of times the pool has been replaced
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// A handle to the current pool
    pub async fn pool(&self) -> DatabasePool {
        self.pool.read().await.clone()
    }

    /// Check the database can be reached, reopening a closed pool once
    #[instrument(skip(self), fields(database = %self.name))]
    pub async fn ensure_healthy(&self) -> bool {
        match self.pool().await.probe().await {
            Probe::Alive => true,
            Probe::Closed => {
                debug!("connection pool is closed");
                if let Err(e) = self.reopen().await {
                    warn!("failed to reopen connection pool: {e}");
                    return false;
                }

                match self.pool().await.probe().await {
                    Probe::Alive => true,
                    Probe::Closed => {
                        warn!("connection pool closed again right after reopening");
                        false
                    }
                    Probe::Failed(e) => {
                        warn!("database unreachable after reopening: {e}");
                        false
                    }
                }
            }
            Probe::Failed(e) => {
                warn!("database unreachable: {e}");
                false
            }
        }
    }

    /// Replace a closed pool with a fresh one built from the same parameters
    ///
    /// Concurrent callers race for the write lock; whoever comes second finds
    /// an open pool and leaves it alone.
    pub async fn reopen(&self) -> DatabaseResult<()> {
        let mut pool = self.pool.write().await;
        if !pool.is_closed() {
            debug!(database = %self.name, "pool already reopened");
            return Ok(());
        }

        *pool = DatabasePool::open(&self.params, self.limits, &self.settings)?;
        self.reconnects.fetch_add(1, Ordering::Relaxed);

        info!(database = %self.name, "reopened connection pool");
        Ok(())
    }

    /// Close the current pool
    pub async fn close(&self) {
        self.pool().await.close().await;
        debug!(database = %self.name, "closed connection pool");
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.params.redacted())
    }
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("limits", &self.limits)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl QuerySource for DatabaseTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_healthy(&self) -> bool {
        DatabaseTarget::ensure_healthy(self).await
    }

    async fn fetch(&self, sql: &str) -> DatabaseResult<Vec<ResultRow>> {
        self.pool()
            .await
            .fetch(sql)
            .await
            .map_err(|e| e.with_deadline(self.settings.query_timeout))
    }
}
