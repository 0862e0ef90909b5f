use super::{Returning, Statement, table_as, where_clause};
use crate::error::DbResult;
use crate::fragment::{Fragment, Scope, sql};
use crate::shape::{ResultMode, ShapePlan};
use crate::whereable::Whereable;

/// A DELETE statement returning the removed rows.
#[derive(Debug, Clone)]
#[must_use]
pub struct Delete {
    table: String,
    filter: Whereable,
    returning: Returning,
}

/// Delete every row of `table` matching `filter`.
///
/// An empty filter deletes every row.
pub fn deletes(table: impl Into<String>, filter: Whereable) -> Delete {
    Delete {
        table: table.into(),
        filter,
        returning: Returning::default(),
    }
}

impl Delete {
    /// Return only these columns of each removed row.
    pub fn returning(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.returning.columns(columns);
        self
    }

    /// Add a computed property to each returned row.
    pub fn extras(mut self, name: impl Into<String>, expression: Fragment) -> Self {
        self.returning.extra(name, expression);
        self
    }
}

impl Statement for Delete {
    fn result_mode(&self) -> ResultMode {
        ResultMode::RowArray
    }

    fn build(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)> {
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);
        let out = sql("DELETE FROM ")
            .append(table_as(&self.table, &alias))
            .append(where_clause(&self.filter, &inner)?)
            .append(self.returning.render(&inner, &alias, None)?);
        Ok((out, ShapePlan::new(ResultMode::RowArray)))
    }
}
