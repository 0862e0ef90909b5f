//! # pgcompose
//!
//! Composable, parameter-safe query construction for PostgreSQL.
//!
//! ## Features
//!
//! - **Fragments**: SQL text, bound values and identifiers composed as values;
//!   placeholders are numbered once, at render time
//! - **Whereables**: ordered column filters with conditions, raw SQL, nested
//!   subqueries and references to enclosing rows
//! - **Nested and lateral subqueries**: embed a statement as a value, or attach
//!   correlated subqueries as properties of each returned row
//! - **JSON results**: every statement returns rows as JSON, shaped as a row,
//!   a row array, a scalar or a scalar array
//! - **Executors**: run against a `tokio_postgres::Client`, a transaction or a
//!   pooled client; wrap any of them to observe queries
//!
//! ```ignore
//! use pgcompose::prelude::*;
//! use pgcompose::condition::is_not_distinct_from;
//!
//! let users: Vec<serde_json::Value> = select(
//!     "shop.user",
//!     whereable! {
//!         "id" => is_not_distinct_from(nested(
//!             select_one("shop.order", whereable! { "id" => 3 }).column("user_id"),
//!         )),
//!     },
//! )
//! .order_by(OrderBy::asc("id"))
//! .fetch_all(&client)
//! .await?;
//! ```

pub mod condition;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod ident;
pub mod monitor;
pub mod nested;
pub mod prelude;
pub mod schema;
pub mod shape;
pub mod stmt;
pub mod whereable;

pub use condition::Condition;
pub use error::{DbError, DbResult};
pub use executor::{Executor, RawRow};
pub use fragment::{
    Compiled, Fragment, IntoOperand, Literal, Operand, Param, ParentRef, Scope, ancestor, ident,
    param, parent, self_ref, sql, sql_default,
};
pub use ident::Ident;
pub use monitor::{
    FnListener, InstrumentedExecutor, MonitorConfig, QueryContext, QueryListener, QueryOutcome,
    QueryStats, QueryType, StatsListener, fn_listener,
};
pub use nested::{Nested, NestedUse, nested};
pub use schema::{ColumnMeta, Schema, TableSchema};
pub use shape::{LateralSlot, ResultMode, ShapePlan, Shaped, shape};
pub use stmt::{
    ACTION_PROPERTY, Aggregate, ConflictTarget, Delete, Direction, Insert, Laterals, Lock,
    LockStrength, LockWait, Nulls, OrderBy, Prepared, Record, Select, Statement, Truncate,
    Update, Upsert, UpsertAction, avg, count, deletes, insert, insert_many, max, min,
    on_constraint, select, select_one, sum, truncate, update, upsert, upsert_many,
};
pub use whereable::{IntoWhereValue, WhereValue, Whereable};

#[cfg(feature = "tracing")]
pub use monitor::TracingListener;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
