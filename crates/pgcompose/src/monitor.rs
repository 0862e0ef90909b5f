//! Query listeners and instrumentation.
//!
//! [`InstrumentedExecutor`] wraps any [`Executor`](crate::Executor) and
//! notifies [`QueryListener`]s with the rendered SQL before execution and with
//! the outcome afterwards. Without listeners it behaves exactly like the
//! wrapped executor.
//!
//! ```rust,ignore
//! use pgcompose::monitor::{InstrumentedExecutor, MonitorConfig, StatsListener};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsListener::new());
//! let db = InstrumentedExecutor::new(client)
//!     .with_config(
//!         MonitorConfig::new()
//!             .with_query_timeout(Duration::from_secs(30))
//!             .with_slow_query_threshold(Duration::from_millis(200)),
//!     )
//!     .with_listener_arc(stats.clone());
//! ```

mod config;
mod instrumented;
mod stats;
mod types;

#[cfg(feature = "tracing")]
mod tracing_listener;


pub use config::MonitorConfig;
pub use instrumented::InstrumentedExecutor;
pub use stats::{QueryStats, StatsListener};
pub use types::{FnListener, QueryContext, QueryListener, QueryOutcome, QueryType, fn_listener};

#[cfg(feature = "tracing")]
pub use tracing_listener::TracingListener;

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
