use super::record::{Record, render_value};
use super::{Returning, Statement, column_name, table_as};
use crate::error::{DbError, DbResult};
use crate::fragment::{Fragment, Scope, sql};
use crate::ident::quote;
use crate::shape::{RESULT_COLUMN, ResultMode, ShapePlan};

/// An INSERT statement returning the inserted rows.
#[derive(Debug, Clone)]
#[must_use]
pub struct Insert {
    table: String,
    records: Vec<Record>,
    many: bool,
    returning: Returning,
}

/// Insert one record; yields the inserted row.
pub fn insert(table: impl Into<String>, record: Record) -> Insert {
    Insert {
        table: table.into(),
        records: vec![record],
        many: false,
        returning: Returning::default(),
    }
}

/// Insert several records in one statement; yields the inserted rows.
///
/// Records may set different columns: the column list is their union and
/// missing values are `DEFAULT`.
pub fn insert_many(table: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Insert {
    Insert {
        table: table.into(),
        records: records.into_iter().collect(),
        many: true,
        returning: Returning::default(),
    }
}

impl Insert {
    /// Return only these columns of each inserted row.
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

impl Statement for Insert {
    fn result_mode(&self) -> ResultMode {
        if self.many {
            ResultMode::RowArray
        } else {
            ResultMode::Row
        }
    }

    fn build(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)> {
        let plan = ShapePlan::new(self.result_mode());
        if self.records.is_empty() {
            return Ok((empty_result(), plan));
        }
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);
        let out = sql("INSERT INTO ")
            .append(table_as(&self.table, &alias))
            .append(values_clause(&self.records, &inner)?)
            .append(self.returning.render(&inner, &alias, None)?);
        Ok((out, plan))
    }
}

/// A statement returning no rows, for inserts of zero records.
pub(super) fn empty_result() -> Fragment {
    sql(format!("SELECT NULL::jsonb AS {} WHERE false", quote(RESULT_COLUMN)))
}

/// ` ("a", "b") VALUES (...), (...)` or ` DEFAULT VALUES`.
pub(super) fn values_clause(records: &[Record], scope: &Scope<'_>) -> DbResult<Fragment> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for column in record.columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    if columns.is_empty() {
        if records.len() > 1 {
            return Err(DbError::validation(
                "cannot insert several records that set no columns",
            ));
        }
        return Ok(sql(" DEFAULT VALUES"));
    }

    let names = columns
        .iter()
        .map(|column| column_name(scope, column))
        .collect::<DbResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            values.push(match record.get(column) {
                Some(value) => render_value(value, scope)?,
                None => sql("DEFAULT"),
            });
        }
        rows.push(sql("(").append(Fragment::join(values, ", ")).text(")"));
    }

    Ok(sql(format!(" ({}) VALUES ", names.join(", "))).append(Fragment::join(rows, ", ")))
}
