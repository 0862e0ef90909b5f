use super::record::{Record, render_value};
use super::{Returning, Statement, column_name, table_as, where_clause};
use crate::error::{DbError, DbResult};
use crate::fragment::{Fragment, Scope, sql};
use crate::shape::{ResultMode, ShapePlan};
use crate::whereable::Whereable;

/// An UPDATE statement returning the updated rows.
#[derive(Debug, Clone)]
#[must_use]
pub struct Update {
    table: String,
    values: Record,
    filter: Whereable,
    returning: Returning,
}

/// Assign `values` to every row of `table` matching `filter`.
///
/// Inside a value, [`crate::self_ref`] stands for the column being assigned,
/// so `sql("").self_ref().text(" + 1")` increments it.
pub fn update(table: impl Into<String>, values: Record, filter: Whereable) -> Update {
    Update {
        table: table.into(),
        values,
        filter,
        returning: Returning::default(),
    }
}

impl Update {
    /// Return only these columns of each updated row.
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

impl Statement for Update {
    fn result_mode(&self) -> ResultMode {
        ResultMode::RowArray
    }

    fn build(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)> {
        if self.values.is_empty() {
            return Err(DbError::validation("UPDATE requires at least one column"));
        }
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);

        let mut assignments = Vec::with_capacity(self.values.len());
        for (column, value) in self.values.entries() {
            let target = column_name(&inner, column)?;
            let value = render_value(value, &inner.with_self(column)?)?;
            assignments.push(sql(format!("{target} = ")).append(value));
        }

        let out = sql("UPDATE ")
            .append(table_as(&self.table, &alias))
            .text(" SET ")
            .append(Fragment::join(assignments, ", "))
            .append(where_clause(&self.filter, &inner)?)
            .append(self.returning.render(&inner, &alias, None)?);
        Ok((out, ShapePlan::new(ResultMode::RowArray)))
    }
}
