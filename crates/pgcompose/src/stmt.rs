//! Statement builders.
//!
//! Every builder compiles to one SQL statement projecting a single `jsonb`
//! value per row into a `"result"` column, plus a [`ShapePlan`] telling the
//! shaper how to turn the raw rows back into the declared [`ResultMode`].
//!
//! ```ignore
//! use pgcompose::prelude::*;
//!
//! let orders = select("shop.order", Whereable::all())
//!     .lateral("user", select_one("shop.user", whereable! { "id" => parent("user_id") }))
//!     .order_by(OrderBy::asc("id"))
//!     .fetch_all::<serde_json::Value>(&client)
//!     .await?;
//! ```

mod delete;
mod insert;
mod record;
mod select;
mod truncate;
mod update;
mod upsert;

#[cfg(test)]
mod tests;

pub use delete::{Delete, deletes};
pub use insert::{Insert, insert, insert_many};
pub use record::Record;
pub use select::{
    Aggregate, Direction, Laterals, Lock, LockStrength, LockWait, Nulls, OrderBy, Select, avg,
    count, max, min, select, select_one, sum,
};
pub use truncate::{Truncate, truncate};
pub use update::{Update, update};
pub use upsert::{ACTION_PROPERTY, ConflictTarget, Upsert, UpsertAction, on_constraint, upsert, upsert_many};

use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use crate::fragment::{Compiled, Fragment, Scope, ident, sql};
use crate::ident::{Ident, quote, quote_literal};
use crate::schema::Schema;
use crate::shape::{RESULT_COLUMN, ResultMode, ShapePlan, Shaped, shape};
use crate::whereable::Whereable;
use serde::de::DeserializeOwned;

/// `jsonb_build_object` accepts at most 100 arguments.
const MAX_OBJECT_PAIRS: usize = 50;

/// A statement compiled for execution.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub compiled: Compiled,
    pub plan: ShapePlan,
}

/// A buildable, executable statement.
pub trait Statement: Send + Sync {
    /// What the statement yields.
    fn result_mode(&self) -> ResultMode;

    /// Compile in `scope` to a fragment and a shaping plan.
    fn build(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)>;

    /// Compile at the top level, validating identifiers against `schema`.
    fn prepare(&self, schema: Option<&Schema>) -> DbResult<Prepared> {
        let (fragment, plan) = self.build(&Scope::root(schema))?;
        Ok(Prepared {
            compiled: fragment.render()?,
            plan,
        })
    }

    /// Rendered SQL and parameters.
    fn compile(&self) -> DbResult<Compiled> {
        Ok(self.prepare(None)?.compiled)
    }

    /// Debug helper: the rendered SQL, or the build error message.
    fn to_sql(&self) -> String {
        match self.compile() {
            Ok(compiled) => compiled.sql,
            Err(e) => format!("<build error: {e}>"),
        }
    }

    /// Execute and shape the result.
    fn run(
        &self,
        exec: &impl Executor,
    ) -> impl std::future::Future<Output = DbResult<Shaped>> + Send {
        async move {
            let prepared = self.prepare(exec.schema())?;
            let rows = exec
                .query_rows(&prepared.compiled.sql, &prepared.compiled.params)
                .await?;
            shape(&prepared.plan, rows)
        }
    }

    /// Execute and deserialize every returned value.
    fn fetch_all<T: DeserializeOwned + Send>(
        &self,
        exec: &impl Executor,
    ) -> impl std::future::Future<Output = DbResult<Vec<T>>> + Send {
        async move {
            let shaped = self.run(exec).await?;
            shaped
                .into_values()
                .into_iter()
                .map(|value| serde_json::from_value(value).map_err(DbError::from))
                .collect()
        }
    }

    /// Execute and deserialize the first returned value, if any.
    fn fetch_opt<T: DeserializeOwned + Send>(
        &self,
        exec: &impl Executor,
    ) -> impl std::future::Future<Output = DbResult<Option<T>>> + Send {
        async move {
            let shaped = self.run(exec).await?;
            match shaped.into_values().into_iter().next() {
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
                None => Ok(None),
            }
        }
    }

    /// Execute and deserialize the first returned value; `NotFound` when none.
    fn fetch_one<T: DeserializeOwned + Send>(
        &self,
        exec: &impl Executor,
    ) -> impl std::future::Future<Output = DbResult<T>> + Send {
        async move {
            self.fetch_opt(exec)
                .await?
                .ok_or_else(|| DbError::not_found("statement returned no rows"))
        }
    }
}

// ==================== shared rendering ====================

/// `"schema"."table" AS "alias"`
pub(crate) fn table_as(table: &str, alias: &str) -> Fragment {
    ident(table).text(" AS ").text(quote(alias))
}

/// An unqualified, validated column name for column lists and SET targets.
pub(crate) fn column_name(scope: &Scope<'_>, column: &str) -> DbResult<String> {
    scope.check_column(column)?;
    Ok(Ident::single(column)?.to_sql())
}

/// ` WHERE <filter>`, or nothing for an empty filter.
pub(crate) fn where_clause(filter: &Whereable, scope: &Scope<'_>) -> DbResult<Fragment> {
    if filter.is_empty() {
        return Ok(Fragment::new());
    }
    Ok(sql(" WHERE ").append(filter.compile(scope)?))
}

/// `jsonb_build_object('k', v, ...)`, chained with `||` past the argument limit.
pub(crate) fn json_object(pairs: Vec<(String, Fragment)>) -> Fragment {
    if pairs.is_empty() {
        return sql("'{}'::jsonb");
    }
    let mut chunks = Vec::new();
    let mut pairs = pairs.into_iter().peekable();
    while pairs.peek().is_some() {
        let chunk = pairs.by_ref().take(MAX_OBJECT_PAIRS).map(|(key, value)| {
            sql(quote_literal(&key)).text(", ").append(value)
        });
        chunks.push(
            sql("jsonb_build_object(")
                .append(Fragment::join(chunk, ", "))
                .text(")"),
        );
    }
    Fragment::join(chunks, " || ")
}

/// Named expressions merged into each returned row object.
pub(crate) fn resolve_extras(
    extras: &[(String, Fragment)],
    scope: &Scope<'_>,
) -> DbResult<Vec<(String, Fragment)>> {
    extras
        .iter()
        .map(|(name, fragment)| -> DbResult<_> { Ok((name.clone(), fragment.resolve(scope)?)) })
        .collect()
}

/// The JSON object for one row of the relation entered in `scope`.
///
/// `columns == None` means every column. `strip_ordinal` removes the `$row`
/// column a fan-out derived table carries.
pub(crate) fn row_json(
    scope: &Scope<'_>,
    alias: &str,
    columns: Option<&[String]>,
    extras: &[(String, Fragment)],
    strip_ordinal: bool,
) -> DbResult<Fragment> {
    let base = match columns {
        None if strip_ordinal => sql(format!(
            "(to_jsonb({}.*) - {})",
            quote(alias),
            quote_literal(crate::shape::ORDINAL_COLUMN)
        )),
        None => sql(format!("to_jsonb({}.*)", quote(alias))),
        Some(columns) => {
            let pairs = columns
                .iter()
                .map(|column| -> DbResult<_> { Ok((column.clone(), sql(scope.qualify(column)?))) })
                .collect::<DbResult<Vec<_>>>()?;
            json_object(pairs)
        }
    };
    if extras.is_empty() {
        return Ok(base);
    }
    Ok(base
        .text(" || ")
        .append(json_object(resolve_extras(extras, scope)?)))
}

/// `<json> AS "result"`
pub(crate) fn as_result(json: Fragment) -> Fragment {
    json.text(format!(" AS {}", quote(RESULT_COLUMN)))
}

/// Columns projected by `RETURNING`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Returning {
    columns: Option<Vec<String>>,
    extras: Vec<(String, Fragment)>,
}

impl Returning {
    pub(crate) fn columns(&mut self, columns: impl IntoIterator<Item = impl Into<String>>) {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
    }

    pub(crate) fn extra(&mut self, name: impl Into<String>, fragment: Fragment) {
        let name = name.into();
        match self.extras.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = fragment,
            None => self.extras.push((name, fragment)),
        }
    }

    /// ` RETURNING <json> AS "result"`, with `suffix` appended to the JSON.
    pub(crate) fn render(
        &self,
        scope: &Scope<'_>,
        alias: &str,
        suffix: Option<Fragment>,
    ) -> DbResult<Fragment> {
        let mut json = row_json(scope, alias, self.columns.as_deref(), &self.extras, false)?;
        if let Some(suffix) = suffix {
            json = json.text(" || ").append(suffix);
        }
        Ok(sql(" RETURNING ").append(as_result(json)))
    }
}
