use super::truncate_sql_bytes;
use super::types::{QueryContext, QueryListener, QueryOutcome};
use std::time::Duration;
use tracing::Level;

/// A `tracing`-based listener that emits every rendered statement.
///
/// Events use the target `pgcompose.sql`. Enable via the crate feature
/// `tracing` (on by default).
#[derive(Debug, Clone)]
pub struct TracingListener {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingListener {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

impl TracingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryListener for TracingListener {
    fn before_query(&self, ctx: &QueryContext) {
        let sql = self.truncate_sql(&ctx.sql);
        emit_at_level!(
            self.level,
            target: "pgcompose.sql",
            query_type = ?ctx.query_type,
            param_count = ctx.param_count,
            params = ?ctx.params,
            sql = %sql,
        );
    }

    fn after_query(&self, ctx: &QueryContext, duration: Duration, outcome: &QueryOutcome) {
        if outcome.is_error() {
            tracing::warn!(
                target: "pgcompose.sql",
                query_type = ?ctx.query_type,
                duration_ms = duration.as_millis() as u64,
                outcome = %outcome,
                "statement failed"
            );
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        tracing::warn!(
            target: "pgcompose.sql",
            duration_ms = duration.as_millis() as u64,
            sql = %self.truncate_sql(&ctx.sql),
            "slow statement"
        );
    }
}
