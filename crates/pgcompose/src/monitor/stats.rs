use super::types::{QueryContext, QueryListener, QueryOutcome, QueryType};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Collected query statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Total number of statements executed.
    pub total_queries: u64,
    /// Statements that failed.
    pub failed_queries: u64,
    /// Total execution time.
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    /// Slowest statement duration.
    pub max_duration: Duration,
    /// Slowest statement SQL.
    pub slowest_query: Option<String>,
}

/// Aggregates counts and timings across statements.
#[derive(Debug, Default)]
pub struct StatsListener {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
}

impl StatsListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self
                .slowest_query
                .lock()
                .map(|slowest| slowest.clone())
                .unwrap_or_default(),
        }
    }
}

impl QueryListener for StatsListener {
    fn before_query(&self, _ctx: &QueryContext) {}

    fn after_query(&self, ctx: &QueryContext, duration: Duration, outcome: &QueryOutcome) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if outcome.is_error() {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);

        let counter = match ctx.query_type {
            QueryType::Select => Some(&self.select_count),
            QueryType::Insert => Some(&self.insert_count),
            QueryType::Update => Some(&self.update_count),
            QueryType::Delete => Some(&self.delete_count),
            QueryType::Truncate | QueryType::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if self.max_duration_nanos.fetch_max(nanos, Ordering::Relaxed) < nanos {
            if let Ok(mut slowest) = self.slowest_query.lock() {
                *slowest = Some(ctx.sql.clone());
            }
        }
    }
}
