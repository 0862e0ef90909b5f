use std::time::Duration;

/// Configuration for [`InstrumentedExecutor`](super::InstrumentedExecutor).
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Query timeout duration. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// Queries slower than this trigger `on_slow_query`.
    pub slow_query_threshold: Option<Duration>,
    /// Whether listeners receive debug-formatted parameter values.
    pub capture_params: bool,
}

impl MonitorConfig {
    /// Create a new configuration with defaults (no timeout, no threshold).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout duration.
    ///
    /// Queries exceeding it fail with [`DbError::Timeout`](crate::DbError::Timeout).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set the slow query threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Include parameter values in [`QueryContext`](super::QueryContext).
    pub fn capture_params(mut self) -> Self {
        self.capture_params = true;
        self
    }
}
