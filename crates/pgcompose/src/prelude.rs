//! Convenient imports for typical `pgcompose` usage.
//!
//! ```ignore
//! use pgcompose::prelude::*;
//! ```

pub use crate::{
    DbError, DbResult, Executor, Fragment, Nested, OrderBy, Record, Select, Shaped, Statement,
    Whereable, ancestor, count, deletes, ident, insert, insert_many, nested, on_constraint,
    parent, record, select, select_one, self_ref, sql, sql_default, truncate, update, upsert,
    upsert_many, whereable,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
