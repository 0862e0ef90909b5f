use super::config::MonitorConfig;
use super::types::{QueryContext, QueryListener, QueryOutcome};
use crate::error::{DbError, DbResult};
use crate::executor::{Executor, RawRow};
use crate::fragment::Param;
use crate::schema::Schema;
use std::sync::Arc;
use std::time::Instant;

/// An executor wrapper that notifies listeners and enforces timeouts.
///
/// It can also carry the [`Schema`] statements are validated against.
pub struct InstrumentedExecutor<E> {
    inner: E,
    listeners: Vec<Arc<dyn QueryListener>>,
    config: MonitorConfig,
    schema: Option<Schema>,
}

impl<E: Executor> InstrumentedExecutor<E> {
    /// Wrap an executor with no listeners.
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            listeners: Vec::new(),
            config: MonitorConfig::default(),
            schema: None,
        }
    }

    /// Set the monitor configuration.
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a listener.
    pub fn with_listener<L: QueryListener + 'static>(self, listener: L) -> Self {
        self.with_listener_arc(Arc::new(listener))
    }

    /// Add a shared listener.
    pub fn with_listener_arc(mut self, listener: Arc<dyn QueryListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate statements against `schema` before execution.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// The wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwrap into the inner executor.
    pub fn into_inner(self) -> E {
        self.inner
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

impl<E: Executor> Executor for InstrumentedExecutor<E> {
    async fn query_rows(&self, sql: &str, params: &[Param]) -> DbResult<Vec<RawRow>> {
        let mut ctx = QueryContext::new(sql, params.len());
        if self.config.capture_params {
            ctx = ctx.with_params(params);
        }
        for listener in &self.listeners {
            listener.before_query(&ctx);
        }

        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.inner.query_rows(sql, params)).await {
                    Ok(result) => result,
                    Err(_) => Err(DbError::Timeout(timeout)),
                }
            }
            None => self.inner.query_rows(sql, params).await,
        };
        let duration = start.elapsed();

        let outcome = match &result {
            Ok(rows) => QueryOutcome::Rows(rows.len()),
            Err(e) => QueryOutcome::error(e.to_string()),
        };
        let slow = self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| duration > threshold);
        for listener in &self.listeners {
            listener.after_query(&ctx, duration, &outcome);
            if slow {
                listener.on_slow_query(&ctx, duration);
            }
        }

        result
    }

    fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref().or_else(|| self.inner.schema())
    }
}
