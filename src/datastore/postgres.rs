mod errors;
pub mod postgres_client;
use crate::config::Config;
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, Pool},
};
use prometheus::{
    core::{Collector, Desc},
    proto::MetricFamily,
    IntGauge, Opts,
};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Connection string for the yatube database. Contains the password, so it never gets logged.
pub struct Dsn(String);

impl Dsn {
    pub fn new(config: &Config) -> Self {
        Dsn(config.db_dsn.clone())
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dsn(<redacted>)")
    }
}

impl From<Dsn> for String {
    fn from(dsn: Dsn) -> String {
        dsn.0
    }
}

/// An implementation of datastore::Client backed by Postgres. Tables are created by the SQL
/// files under `migrations/`.
///
/// Also a prometheus `Collector`: register it to export the pool's size and idle connections.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<ConnectionManager<PgConnection>>,
    pool_gauges: [IntGauge; 3],
}

impl PostgresStore {
    /// Opens the pool. Fails if no connection can be made within `conn_timeout`.
    pub fn new(dsn: Dsn, max_pool_size: u32, conn_timeout: Duration) -> Result<Self, anyhow::Error> {
        let pool = Pool::builder()
            .max_size(max_pool_size)
            .connection_timeout(conn_timeout)
            .build(ConnectionManager::<PgConnection>::new(dsn))?;
        let gauge = |name: &str, help: &str| IntGauge::with_opts(Opts::new(name, help));
        let pool_gauges = [
            gauge("yatube_db_connections", "Open DB connections")?,
            gauge("yatube_db_connections_idle", "Open DB connections not serving a query")?,
            gauge("yatube_db_connections_max", "Most DB connections the pool will open")?,
        ];
        pool_gauges[2].set(i64::from(pool.max_size()));
        info!(
            connections = pool.state().connections,
            max = max_pool_size,
            "connected to Postgres"
        );
        Ok(Self { pool, pool_gauges })
    }
}

impl Collector for PostgresStore {
    fn desc(&self) -> Vec<&Desc> {
        self.pool_gauges.iter().flat_map(|g| g.desc()).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let state = self.pool.state();
        self.pool_gauges[0].set(i64::from(state.connections));
        self.pool_gauges[1].set(i64::from(state.idle_connections));
        self.pool_gauges.iter().flat_map(|g| g.collect()).collect()
    }
}
