//! Embedding one statement as a value inside another.
//!
//! [`nested`] wraps a column-producing [`Select`] so it can stand wherever a
//! value is expected: a whereable entry, a condition operand, an insert or
//! update value. The inner statement compiles as an independent subquery one
//! level deeper than its host; it keeps the host's ancestor chain, so inside a
//! lateral subquery it can still refer to enclosing rows.
//!
//! Correlated subqueries that contribute properties to each returned row are
//! declared with `Select::lateral` instead (see [`crate::stmt::Laterals`]).

use crate::error::{DbError, DbResult};
use crate::fragment::{Fragment, Scope, sql};
use crate::shape::ResultMode;
use crate::stmt::Select;
use std::sync::Arc;

/// Where an embedded statement appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedUse {
    /// A single value: comparison operand, insert/update value.
    Scalar,
    /// The right-hand side of `IN`.
    Set,
    /// A bound of `BETWEEN`.
    RangeBound,
}

/// An embedded scalar statement.
#[derive(Debug, Clone)]
pub struct Nested {
    select: Arc<Select>,
}

/// Embed `select` as a value.
///
/// The statement must produce a column (`select_one(..).column(..)`, an
/// aggregate, or `.extra(..)`) or a column array (`select(..).column(..)`).
pub fn nested(select: Select) -> Nested {
    Nested {
        select: Arc::new(select),
    }
}

impl From<Select> for Nested {
    fn from(select: Select) -> Self {
        nested(select)
    }
}

impl Nested {
    /// The embedded statement's result mode.
    pub fn result_mode(&self) -> ResultMode {
        self.select.result_mode()
    }

    /// The embedded statement.
    pub fn statement(&self) -> &Select {
        &self.select
    }

    pub(crate) fn is_correlated(&self) -> bool {
        self.select.is_correlated()
    }

    /// Compile the inner statement in a child of `host` and wrap it for `usage`.
    ///
    /// A column array becomes `ARRAY(...)` in a single-value position and a
    /// plain subquery on the right of `IN`; it is rejected as a range bound.
    pub(crate) fn embed(&self, host: &Scope<'_>, usage: NestedUse) -> DbResult<Fragment> {
        let mode = self.result_mode();
        let open = match (mode, usage) {
            (ResultMode::Row | ResultMode::RowArray, _) => {
                return Err(DbError::NonScalarNested(mode));
            }
            (ResultMode::ColumnArray, NestedUse::RangeBound) => {
                return Err(DbError::InvalidRange(
                    "a range bound must be a single value, not a column array".to_string(),
                ));
            }
            (ResultMode::ColumnArray, NestedUse::Scalar) => "ARRAY(",
            _ => "(",
        };
        if self.select.has_laterals() {
            return Err(DbError::validation(
                "a nested statement cannot declare lateral subqueries",
            ));
        }
        let inner = self.select.build_subquery(&host.descend_nested())?;
        Ok(sql(open).append(inner).text(")"))
    }
}
