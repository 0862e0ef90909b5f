use super::insert::{empty_result, values_clause};
use super::record::Record;
use super::{Returning, Statement, column_name, json_object, table_as};
use crate::error::{DbError, DbResult};
use crate::fragment::{Fragment, Scope, sql};
use crate::ident::{Ident, quote};
use crate::shape::{ResultMode, ShapePlan};
use serde::{Deserialize, Serialize};

/// Property added to each upserted row telling which action happened.
pub const ACTION_PROPERTY: &str = "$action";

/// The outcome of an upsert for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpsertAction {
    Insert,
    Update,
}

/// What a conflicting row is detected by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictTarget {
    /// A unique index over these columns.
    Columns(Vec<String>),
    /// A named unique or exclusion constraint.
    Constraint(String),
}

/// Target a named constraint: `ON CONFLICT ON CONSTRAINT "name"`.
pub fn on_constraint(name: impl Into<String>) -> ConflictTarget {
    ConflictTarget::Constraint(name.into())
}

impl From<&str> for ConflictTarget {
    fn from(column: &str) -> Self {
        ConflictTarget::Columns(vec![column.to_string()])
    }
}

impl From<String> for ConflictTarget {
    fn from(column: String) -> Self {
        ConflictTarget::Columns(vec![column])
    }
}

impl From<Vec<&str>> for ConflictTarget {
    fn from(columns: Vec<&str>) -> Self {
        ConflictTarget::Columns(columns.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ConflictTarget {
    fn from(columns: Vec<String>) -> Self {
        ConflictTarget::Columns(columns)
    }
}

impl<const N: usize> From<[&str; N]> for ConflictTarget {
    fn from(columns: [&str; N]) -> Self {
        ConflictTarget::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

/// `INSERT ... ON CONFLICT ... DO UPDATE`, returning each row with its action.
#[derive(Debug, Clone)]
#[must_use]
pub struct Upsert {
    table: String,
    records: Vec<Record>,
    many: bool,
    target: ConflictTarget,
    update_columns: Option<Vec<String>>,
    no_null_update_columns: Vec<String>,
    suppress_action: bool,
    returning: Returning,
}

/// Insert `record`, or update the row it conflicts with on `target`.
pub fn upsert(
    table: impl Into<String>,
    record: Record,
    target: impl Into<ConflictTarget>,
) -> Upsert {
    Upsert::new(table.into(), vec![record], false, target.into())
}

/// Upsert several records in one statement.
pub fn upsert_many(
    table: impl Into<String>,
    records: impl IntoIterator<Item = Record>,
    target: impl Into<ConflictTarget>,
) -> Upsert {
    Upsert::new(table.into(), records.into_iter().collect(), true, target.into())
}

impl Upsert {
    fn new(table: String, records: Vec<Record>, many: bool, target: ConflictTarget) -> Self {
        Self {
            table,
            records,
            many,
            target,
            update_columns: None,
            no_null_update_columns: Vec::new(),
            suppress_action: false,
            returning: Returning::default(),
        }
    }

    /// Columns overwritten on conflict. Defaults to every inserted column
    /// outside the conflict target.
    pub fn update_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.update_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Columns that keep their current value when the incoming one is NULL.
    pub fn no_null_update_columns(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.no_null_update_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Do not add the `$action` property to returned rows.
    pub fn suppress_action(mut self) -> Self {
        self.suppress_action = true;
        self
    }

    /// Return only these columns of each row.
    pub fn returning(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.returning.columns(columns);
        self
    }

    /// Add a computed property to each returned row.
    pub fn extras(mut self, name: impl Into<String>, expression: Fragment) -> Self {
        self.returning.extra(name, expression);
        self
    }

    fn conflict_clause(&self, scope: &Scope<'_>) -> DbResult<String> {
        match &self.target {
            ConflictTarget::Columns(columns) if columns.is_empty() => {
                Err(DbError::EmptyConflictTarget)
            }
            ConflictTarget::Columns(columns) => {
                let names = columns
                    .iter()
                    .map(|column| column_name(scope, column))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(format!(" ON CONFLICT ({})", names.join(", ")))
            }
            ConflictTarget::Constraint(name) => Ok(format!(
                " ON CONFLICT ON CONSTRAINT {}",
                Ident::single(name)?.to_sql()
            )),
        }
    }

    fn update_targets(&self) -> Vec<String> {
        if let Some(columns) = &self.update_columns {
            return columns.clone();
        }
        let conflict: &[String] = match &self.target {
            ConflictTarget::Columns(columns) => columns,
            ConflictTarget::Constraint(_) => &[],
        };
        let mut targets: Vec<String> = Vec::new();
        for record in &self.records {
            for column in record.columns() {
                let known = targets.iter().any(|c| c == column);
                if !known && !conflict.iter().any(|c| c == column) {
                    targets.push(column.to_string());
                }
            }
        }
        targets
    }

    fn action_clause(&self, scope: &Scope<'_>, alias: &str) -> DbResult<String> {
        let targets = self.update_targets();
        if targets.is_empty() {
            // Nothing to overwrite: a no-op assignment still returns the row.
            return match &self.target {
                ConflictTarget::Columns(columns) => {
                    let first = columns.first().ok_or(DbError::EmptyConflictTarget)?;
                    let first = column_name(scope, first)?;
                    Ok(format!(" DO UPDATE SET {first} = EXCLUDED.{first}"))
                }
                ConflictTarget::Constraint(_) => Ok(" DO NOTHING".to_string()),
            };
        }
        let mut assignments = Vec::with_capacity(targets.len());
        for column in &targets {
            let name = column_name(scope, column)?;
            let keep_current = self.no_null_update_columns.iter().any(|c| c == column);
            assignments.push(if keep_current {
                format!(
                    "{name} = CASE WHEN EXCLUDED.{name} IS NULL THEN {}.{name} ELSE EXCLUDED.{name} END",
                    quote(alias)
                )
            } else {
                format!("{name} = EXCLUDED.{name}")
            });
        }
        Ok(format!(" DO UPDATE SET {}", assignments.join(", ")))
    }

    fn action_json(&self, alias: &str) -> Option<Fragment> {
        if self.suppress_action {
            return None;
        }
        let action = sql(format!(
            "CASE {}.xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END",
            quote(alias)
        ));
        Some(json_object(vec![(ACTION_PROPERTY.to_string(), action)]))
    }
}

impl Statement for Upsert {
    fn result_mode(&self) -> ResultMode {
        if self.many {
            ResultMode::RowArray
        } else {
            ResultMode::Row
        }
    }

    fn build(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)> {
        let plan = ShapePlan::new(self.result_mode());
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);
        let conflict = self.conflict_clause(&inner)?;
        if self.records.is_empty() {
            return Ok((empty_result(), plan));
        }
        let out = sql("INSERT INTO ")
            .append(table_as(&self.table, &alias))
            .append(values_clause(&self.records, &inner)?)
            .text(conflict)
            .text(self.action_clause(&inner, &alias)?)
            .append(self.returning.render(&inner, &alias, self.action_json(&alias))?);
        Ok((out, plan))
    }
}
