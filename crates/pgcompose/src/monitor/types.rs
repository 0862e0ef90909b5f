use crate::fragment::Param;
use std::fmt;
use std::time::Duration;

/// The kind of statement being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    /// Other SQL (DDL, hand-written statements)
    Other,
}

impl QueryType {
    /// Detect the statement kind from its leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" => QueryType::Select,
            "INSERT" => QueryType::Insert,
            "UPDATE" => QueryType::Update,
            "DELETE" => QueryType::Delete,
            "TRUNCATE" => QueryType::Truncate,
            _ => QueryType::Other,
        }
    }
}

/// Information about the statement about to run.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// The rendered SQL.
    pub sql: String,
    /// Number of bound parameters.
    pub param_count: usize,
    /// Debug-formatted parameters (empty unless capture is enabled).
    pub params: Vec<String>,
    /// Detected statement kind.
    pub query_type: QueryType,
}

impl QueryContext {
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            sql: sql.to_string(),
            param_count,
            params: Vec::new(),
            query_type: QueryType::from_sql(sql),
        }
    }

    /// Attach debug-formatted parameter values.
    pub fn with_params(mut self, params: &[Param]) -> Self {
        self.params = params.iter().map(|p| format!("{p:?}")).collect();
        self
    }
}

/// Maximum length for error messages in `QueryOutcome::Error`.
const MAX_ERROR_LEN: usize = 512;

/// How a statement ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Number of rows returned.
    Rows(usize),
    /// Error message (truncated).
    Error(String),
}

impl QueryOutcome {
    pub fn error(message: String) -> Self {
        if message.len() > MAX_ERROR_LEN {
            let truncated = super::truncate_sql_bytes(&message, MAX_ERROR_LEN);
            Self::Error(format!("{truncated}..."))
        } else {
            Self::Error(message)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Rows(n) => write!(f, "{n} rows"),
            QueryOutcome::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Observer of statement execution.
///
/// Listeners only observe; they cannot alter or cancel a statement.
pub trait QueryListener: Send + Sync {
    /// Called with the rendered SQL right before it is sent.
    fn before_query(&self, ctx: &QueryContext);

    /// Called after the statement completes (success or failure).
    fn after_query(&self, _ctx: &QueryContext, _duration: Duration, _outcome: &QueryOutcome) {}

    /// Called when a statement exceeds the configured slow-query threshold.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}

/// A listener built from a closure. See [`fn_listener`].
pub struct FnListener<F>(F);

/// Wrap a closure as a [`QueryListener`] receiving every statement.
///
/// ```ignore
/// let db = InstrumentedExecutor::new(client)
///     .with_listener(fn_listener(|ctx| eprintln!("{}", ctx.sql)));
/// ```
pub fn fn_listener<F>(f: F) -> FnListener<F>
where
    F: Fn(&QueryContext) + Send + Sync,
{
    FnListener(f)
}

impl<F> QueryListener for FnListener<F>
where
    F: Fn(&QueryContext) + Send + Sync,
{
    fn before_query(&self, ctx: &QueryContext) {
        (self.0)(ctx)
    }
}
