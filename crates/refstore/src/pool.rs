//! Connection pool utilities

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a connection pool from a database URL with a small default size.
///
/// ```ignore
/// let pool = refstore::create_pool("postgres://root@localhost:26257/core")?;
/// let client = pool.get().await?;
/// ```
pub fn create_pool(database_url: &str) -> StoreResult<Pool> {
    create_pool_with_size(database_url, 16)
}

/// Create a connection pool with a custom maximum size.
pub fn create_pool_with_size(database_url: &str, max_size: usize) -> StoreResult<Pool> {
    create_pool_with_manager_config(database_url, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Create a connection pool from a [`StoreConfig`].
pub fn create_pool_with_config(config: &StoreConfig) -> StoreResult<Pool> {
    create_pool_with_size(&config.database.url, config.database.max_connections)
}

/// Create a connection pool with an explicit TLS connector and pool tuning.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> StoreResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| StoreError::Connection(e.to_string()))?;

    let mgr = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| StoreError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_url_is_a_connection_error() {
        let err = create_pool("postgres://host:notaport/db").unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)), "{err}");
    }

    #[tokio::test]
    async fn pool_builds_without_connecting() {
        let config = StoreConfig::new("postgres://root@localhost:26257/core");
        let pool = create_pool_with_config(&config).unwrap();
        assert_eq!(pool.status().max_size, 16);
    }
}
