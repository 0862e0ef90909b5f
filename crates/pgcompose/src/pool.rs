//! Connection pool helpers.
//!
//! A pooled `deadpool_postgres::Client` is itself an [`crate::Executor`]:
//!
//! ```ignore
//! let pool = pgcompose::create_pool(&std::env::var("DATABASE_URL")?)?;
//! let client = pool.get().await?;
//! let users: Vec<User> = select("shop.user", Whereable::all()).fetch_all(&client).await?;
//! ```

use crate::error::{DbError, DbResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a `NoTls` pool from a database URL with a default size of 16.
pub fn create_pool(database_url: &str) -> DbResult<Pool> {
    create_pool_with_config(database_url, 16)
}

/// Create a `NoTls` pool with a custom maximum size.
pub fn create_pool_with_config(database_url: &str, max_size: usize) -> DbResult<Pool> {
    create_pool_with_manager_config(database_url, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Create a pool with a TLS connector and injected manager/pool settings.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> DbResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| DbError::Connection(e.to_string()))?;

    let manager = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(manager))
        .build()
        .map_err(|e| DbError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}
