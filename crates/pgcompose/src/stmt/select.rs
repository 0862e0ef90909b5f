//! SELECT statements, lateral subqueries and aggregates.
//!
//! A select compiles to one of four shapes depending on where it appears:
//!
//! - **top level, no laterals**: a plain `SELECT <json> AS "result" FROM ...`;
//! - **top level with laterals**: the outer rows are numbered in a derived
//!   table and each lateral is `LEFT JOIN`ed un-aggregated; the shaper folds
//!   the fan-out back into one value per outer row;
//! - **lateral child**: like the top level, but grandchild laterals are
//!   aggregated in SQL and merged into each row's JSON;
//! - **nested value**: `SELECT <expr> FROM ...` embedded in parentheses.

use super::{Statement, as_result, json_object, row_json, table_as, where_clause};
use crate::error::{DbError, DbResult};
use crate::fragment::{Fragment, Scope, sql};
use crate::ident::{Ident, quote};
use crate::shape::{LateralSlot, ORDINAL_COLUMN, RESULT_COLUMN, ResultMode, ShapePlan};
use crate::whereable::Whereable;

// ==================== ORDER BY ====================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Placement of NULLs in a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

#[derive(Debug, Clone)]
enum OrderTarget {
    Column(String),
    Expr(Fragment),
}

/// One ORDER BY item.
#[derive(Debug, Clone)]
#[must_use]
pub struct OrderBy {
    target: OrderTarget,
    direction: Direction,
    nulls: Option<Nulls>,
}

impl OrderBy {
    /// Order by a column, ascending.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            target: OrderTarget::Column(column.into()),
            direction: Direction::Asc,
            nulls: None,
        }
    }

    /// Order by a column, descending.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            direction: Direction::Desc,
            ..Self::asc(column)
        }
    }

    /// Order by an arbitrary expression.
    pub fn expr(fragment: Fragment, direction: Direction) -> Self {
        Self {
            target: OrderTarget::Expr(fragment),
            direction,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(Nulls::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(Nulls::Last);
        self
    }

    fn render(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        let target = match &self.target {
            OrderTarget::Column(column) => sql(scope.qualify(column)?),
            OrderTarget::Expr(fragment) => fragment.resolve(scope)?,
        };
        let mut out = target.text(match self.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
        if let Some(nulls) = self.nulls {
            out = out.text(match nulls {
                Nulls::First => " NULLS FIRST",
                Nulls::Last => " NULLS LAST",
            });
        }
        Ok(out)
    }

    fn has_parent_refs(&self) -> bool {
        match &self.target {
            OrderTarget::Column(_) => false,
            OrderTarget::Expr(fragment) => fragment.has_parent_refs(),
        }
    }
}

// ==================== row locks ====================

/// Row lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrength {
    Update,
    NoKeyUpdate,
    Share,
    KeyShare,
}

/// What to do when a row is already locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockWait {
    #[default]
    Wait,
    NoWait,
    SkipLocked,
}

/// A `FOR UPDATE` / `FOR SHARE` clause. Only valid on a top-level select.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Lock {
    strength: LockStrength,
    of: Vec<String>,
    wait: LockWait,
}

impl Lock {
    pub fn new(strength: LockStrength) -> Self {
        Self {
            strength,
            of: Vec::new(),
            wait: LockWait::Wait,
        }
    }

    pub fn for_update() -> Self {
        Self::new(LockStrength::Update)
    }

    pub fn for_no_key_update() -> Self {
        Self::new(LockStrength::NoKeyUpdate)
    }

    pub fn for_share() -> Self {
        Self::new(LockStrength::Share)
    }

    pub fn for_key_share() -> Self {
        Self::new(LockStrength::KeyShare)
    }

    /// Restrict the lock to the given relation aliases.
    pub fn of(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.of = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn nowait(mut self) -> Self {
        self.wait = LockWait::NoWait;
        self
    }

    pub fn skip_locked(mut self) -> Self {
        self.wait = LockWait::SkipLocked;
        self
    }

    fn render(&self) -> DbResult<Fragment> {
        let mut out = sql(match self.strength {
            LockStrength::Update => " FOR UPDATE",
            LockStrength::NoKeyUpdate => " FOR NO KEY UPDATE",
            LockStrength::Share => " FOR SHARE",
            LockStrength::KeyShare => " FOR KEY SHARE",
        });
        if !self.of.is_empty() {
            let aliases = self
                .of
                .iter()
                .map(|alias| Ident::single(alias).map(|ident| ident.to_sql()))
                .collect::<DbResult<Vec<_>>>()?;
            out = out.text(" OF ").text(aliases.join(", "));
        }
        Ok(out.text(match self.wait {
            LockWait::Wait => "",
            LockWait::NoWait => " NOWAIT",
            LockWait::SkipLocked => " SKIP LOCKED",
        }))
    }
}

// ==================== projections ====================

/// An aggregate function over the matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn function(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

#[derive(Debug, Clone)]
enum Projection {
    All,
    Columns(Vec<String>),
    Column(String),
    Extra(Fragment),
    Aggregate(Aggregate, Option<String>),
}

/// Correlated subqueries attached to each returned row.
#[derive(Debug, Clone)]
pub enum Laterals {
    /// Each statement's value becomes the named property of the row.
    Map(Vec<(String, Select)>),
    /// The statement's value replaces the row.
    Passthrough(Box<Select>),
}

// ==================== Select ====================

/// A SELECT statement.
#[derive(Debug, Clone)]
#[must_use]
pub struct Select {
    table: String,
    filter: Whereable,
    single: bool,
    projection: Projection,
    force_array: bool,
    extras: Vec<(String, Fragment)>,
    order: Vec<OrderBy>,
    limit: Option<i64>,
    offset: Option<i64>,
    lock: Option<Lock>,
    laterals: Option<Laterals>,
    build_error: Option<String>,
}

/// Select every row of `table` matching `filter`.
pub fn select(table: impl Into<String>, filter: Whereable) -> Select {
    Select::new(table, filter, false)
}

/// Select at most one row of `table` matching `filter` (`LIMIT 1`).
pub fn select_one(table: impl Into<String>, filter: Whereable) -> Select {
    Select::new(table, filter, true)
}

fn aggregate(
    table: impl Into<String>,
    filter: Whereable,
    function: Aggregate,
    column: Option<String>,
) -> Select {
    let mut select = Select::new(table, filter, false);
    select.projection = Projection::Aggregate(function, column);
    select
}

/// `count(*)` of the matching rows.
pub fn count(table: impl Into<String>, filter: Whereable) -> Select {
    aggregate(table, filter, Aggregate::Count, None)
}

/// `sum(column)` over the matching rows.
pub fn sum(table: impl Into<String>, filter: Whereable, column: impl Into<String>) -> Select {
    aggregate(table, filter, Aggregate::Sum, Some(column.into()))
}

/// `avg(column)` over the matching rows.
pub fn avg(table: impl Into<String>, filter: Whereable, column: impl Into<String>) -> Select {
    aggregate(table, filter, Aggregate::Avg, Some(column.into()))
}

/// `min(column)` over the matching rows.
pub fn min(table: impl Into<String>, filter: Whereable, column: impl Into<String>) -> Select {
    aggregate(table, filter, Aggregate::Min, Some(column.into()))
}

/// `max(column)` over the matching rows.
pub fn max(table: impl Into<String>, filter: Whereable, column: impl Into<String>) -> Select {
    aggregate(table, filter, Aggregate::Max, Some(column.into()))
}

impl Select {
    fn new(table: impl Into<String>, filter: Whereable, single: bool) -> Self {
        Self {
            table: table.into(),
            filter,
            single,
            projection: Projection::All,
            force_array: false,
            extras: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            lock: None,
            laterals: None,
            build_error: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter(&self) -> &Whereable {
        &self.filter
    }

    pub fn laterals(&self) -> Option<&Laterals> {
        self.laterals.as_ref()
    }

    fn project(mut self, projection: Projection) -> Self {
        if matches!(self.projection, Projection::Aggregate(..)) {
            self.build_error = Some("the projection of an aggregate cannot be changed".into());
        } else {
            self.projection = projection;
        }
        self
    }

    /// Return only these columns of each row.
    pub fn columns(self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.project(Projection::Columns(
            columns.into_iter().map(Into::into).collect(),
        ))
    }

    /// Return one column's value instead of row objects.
    pub fn column(self, column: impl Into<String>) -> Self {
        self.project(Projection::Column(column.into()))
    }

    /// Return an array of one column's values, even from `select_one`.
    pub fn array(mut self, column: impl Into<String>) -> Self {
        self.force_array = true;
        self.project(Projection::Column(column.into()))
    }

    /// Return one expression's value instead of row objects.
    pub fn extra(self, expression: Fragment) -> Self {
        self.project(Projection::Extra(expression))
    }

    /// Add a computed property to each returned row object.
    pub fn extras(mut self, name: impl Into<String>, expression: Fragment) -> Self {
        let name = name.into();
        match self.extras.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = expression,
            None => self.extras.push((name, expression)),
        }
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Bound as a parameter. Ignored by `select_one`, which always fetches one row.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Attach a correlated subquery whose value becomes property `name`.
    pub fn lateral(mut self, name: impl Into<String>, select: Select) -> Self {
        let name = name.into();
        match &mut self.laterals {
            None => self.laterals = Some(Laterals::Map(vec![(name, select)])),
            Some(Laterals::Map(entries)) => {
                match entries.iter_mut().find(|(existing, _)| *existing == name) {
                    Some(slot) => slot.1 = select,
                    None => entries.push((name, select)),
                }
            }
            Some(Laterals::Passthrough(_)) => {
                self.build_error =
                    Some("named laterals cannot be combined with a passthrough lateral".into());
            }
        }
        self
    }

    /// Attach a correlated subquery whose value replaces each row.
    pub fn passthrough(mut self, select: Select) -> Self {
        if matches!(self.laterals, Some(Laterals::Map(_))) {
            self.build_error =
                Some("a passthrough lateral cannot be combined with named laterals".into());
        } else {
            self.laterals = Some(Laterals::Passthrough(Box::new(select)));
        }
        self
    }

    /// What this select yields.
    pub fn result_mode(&self) -> ResultMode {
        match self.projection {
            Projection::All | Projection::Columns(_) if self.single => ResultMode::Row,
            Projection::All | Projection::Columns(_) => ResultMode::RowArray,
            Projection::Aggregate(..) => ResultMode::Column,
            Projection::Column(_) | Projection::Extra(_) if self.force_array => {
                ResultMode::ColumnArray
            }
            Projection::Column(_) | Projection::Extra(_) if self.single => ResultMode::Column,
            Projection::Column(_) | Projection::Extra(_) => ResultMode::ColumnArray,
        }
    }

    pub(crate) fn has_laterals(&self) -> bool {
        !self.lateral_entries().is_empty()
    }

    /// Whether anything in this statement, laterals included, refers to an
    /// enclosing row.
    pub(crate) fn is_correlated(&self) -> bool {
        self.filter.has_parent_refs()
            || self.extras.iter().any(|(_, f)| f.has_parent_refs())
            || self.order.iter().any(OrderBy::has_parent_refs)
            || matches!(&self.projection, Projection::Extra(f) if f.has_parent_refs())
            || self
                .lateral_entries()
                .iter()
                .any(|(_, select)| select.is_correlated())
    }

    fn lateral_entries(&self) -> Vec<(Option<&str>, &Select)> {
        match &self.laterals {
            None => Vec::new(),
            Some(Laterals::Map(entries)) => entries
                .iter()
                .map(|(name, select)| (Some(name.as_str()), select))
                .collect(),
            Some(Laterals::Passthrough(select)) => vec![(None, select.as_ref())],
        }
    }

    fn check(&self, scope: &Scope<'_>) -> DbResult<()> {
        if let Some(message) = &self.build_error {
            return Err(DbError::validation(message.clone()));
        }
        let aggregate = matches!(self.projection, Projection::Aggregate(..));
        if aggregate && !self.order.is_empty() {
            return Err(DbError::validation("an aggregate select cannot be ordered"));
        }
        if aggregate && self.has_laterals() {
            return Err(DbError::validation(
                "an aggregate select cannot declare lateral subqueries",
            ));
        }
        if self.lock.is_some() {
            if scope.depth() > 0 {
                return Err(DbError::validation(
                    "row locks are only allowed on the top-level statement",
                ));
            }
            if aggregate || self.has_laterals() {
                return Err(DbError::validation(
                    "row locks cannot be combined with aggregates or lateral subqueries",
                ));
            }
        }
        let scalar = self.result_mode().is_scalar();
        if scalar && !self.extras.is_empty() {
            return Err(DbError::validation("extras require a row projection"));
        }
        if scalar && matches!(self.laterals, Some(Laterals::Map(_))) {
            return Err(DbError::validation(
                "lateral properties require a row projection",
            ));
        }
        Ok(())
    }

    fn effective_limit(&self) -> Option<i64> {
        if self.single { Some(1) } else { self.limit }
    }

    fn order_clause(&self, scope: &Scope<'_>) -> DbResult<Option<Fragment>> {
        if self.order.is_empty() {
            return Ok(None);
        }
        let items = self
            .order
            .iter()
            .map(|order| order.render(scope))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Some(Fragment::join(items, ", ")))
    }

    /// `WHERE`, `ORDER BY`, `LIMIT` and `OFFSET`.
    fn tail(&self, scope: &Scope<'_>, order: Option<Fragment>) -> DbResult<Fragment> {
        let mut out = where_clause(&self.filter, scope)?;
        if let Some(order) = order {
            out = out.text(" ORDER BY ").append(order);
        }
        if let Some(limit) = self.effective_limit() {
            out = out.text(" LIMIT ").bind(limit);
        }
        if let Some(offset) = self.offset {
            out = out.text(" OFFSET ").bind(offset);
        }
        Ok(out)
    }

    /// The single value a scalar projection selects.
    fn value_expr(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        Ok(match &self.projection {
            Projection::Column(column) => sql(scope.qualify(column)?),
            Projection::Extra(fragment) => fragment.resolve(scope)?,
            Projection::Aggregate(Aggregate::Count, None) => sql("count(*)"),
            Projection::Aggregate(function, Some(column)) => sql(format!(
                "{}({})",
                function.function(),
                scope.qualify(column)?
            )),
            Projection::Aggregate(function, None) => {
                return Err(DbError::validation(format!(
                    "{}() needs a column",
                    function.function()
                )));
            }
            Projection::All | Projection::Columns(_) => {
                return Err(DbError::NonScalarNested(self.result_mode()));
            }
        })
    }

    /// The `jsonb` value projected for each row.
    fn result_json(&self, scope: &Scope<'_>, alias: &str, strip_ordinal: bool) -> DbResult<Fragment> {
        match &self.projection {
            Projection::All => row_json(scope, alias, None, &self.extras, strip_ordinal),
            Projection::Columns(columns) => {
                row_json(scope, alias, Some(columns.as_slice()), &self.extras, strip_ordinal)
            }
            _ => Ok(sql("to_jsonb(").append(self.value_expr(scope)?).text(")")),
        }
    }

    fn row_number(order: Option<&Fragment>) -> Fragment {
        let window = match order {
            Some(order) => sql("ORDER BY ").append(order.clone()),
            None => Fragment::new(),
        };
        sql("row_number() OVER (")
            .append(window)
            .text(format!(") AS {}", quote(ORDINAL_COLUMN)))
    }

    // ==================== compilation ====================

    /// Top-level statement, with or without laterals.
    fn build_top(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)> {
        self.check(scope)?;
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);
        let order = self.order_clause(&inner)?;
        let mode = self.result_mode();
        let entries = self.lateral_entries();

        if entries.is_empty() {
            let mut out = sql("SELECT ")
                .append(as_result(self.result_json(&inner, &alias, false)?))
                .text(" FROM ")
                .append(table_as(&self.table, &alias))
                .append(self.tail(&inner, order)?);
            if let Some(lock) = &self.lock {
                out = out.append(lock.render()?);
            }
            return Ok((out, ShapePlan::new(mode)));
        }

        let outer = quote(&alias);
        let ordinal = quote(ORDINAL_COLUMN);
        let mut projection = vec![sql(format!("{outer}.{ordinal} AS {ordinal}"))];
        if !matches!(self.laterals, Some(Laterals::Passthrough(_))) {
            projection.push(as_result(self.result_json(&inner, &alias, true)?));
        }

        let child_scope = inner.descend_lateral();
        let mut plan = ShapePlan::new(mode);
        let mut joins = Fragment::new();
        for (index, (property, child)) in entries.into_iter().enumerate() {
            let lateral = scope.lateral_alias(index);
            let ordinal_alias = format!("{lateral}{ORDINAL_COLUMN}");
            let quoted = quote(&lateral);
            projection.push(sql(format!(
                "{quoted}.{ordinal} AS {}",
                quote(&ordinal_alias)
            )));
            projection.push(sql(format!(
                "{quoted}.{} AS {quoted}",
                quote(RESULT_COLUMN)
            )));
            joins = joins.append(left_join(
                child.is_correlated(),
                child.build_lateral_child(&child_scope)?,
                &lateral,
            ));
            plan.laterals.push(LateralSlot {
                property: property.map(str::to_string),
                column: lateral,
                ordinal: ordinal_alias,
                mode: child.result_mode(),
            });
        }

        let numbered = sql(format!("SELECT {outer}.*, "))
            .append(Self::row_number(order.as_ref()))
            .text(" FROM ")
            .append(table_as(&self.table, &alias))
            .append(self.tail(&inner, order)?);

        let out = sql("SELECT ")
            .append(Fragment::join(projection, ", "))
            .text(" FROM (")
            .append(numbered)
            .text(format!(") AS {outer}"))
            .append(joins)
            .text(format!(" ORDER BY {outer}.{ordinal}"));
        Ok((out, plan))
    }

    /// A lateral child: one JSON value and one ordinal per row, with its own
    /// laterals aggregated and merged.
    fn build_lateral_child(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        self.check(scope)?;
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);
        let order = self.order_clause(&inner)?;

        let grandchild_scope = inner.descend_lateral();
        let mut joins = Fragment::new();
        let mut properties = Vec::new();
        let mut replacement = None;
        for (index, (property, child)) in self.lateral_entries().into_iter().enumerate() {
            let lateral = inner.lateral_alias(index);
            joins = joins.append(left_join(
                child.is_correlated(),
                child.build_aggregated_child(&grandchild_scope)?,
                &lateral,
            ));
            let value = sql(format!("{}.{}", quote(&lateral), quote(RESULT_COLUMN)));
            match property {
                Some(property) => properties.push((property.to_string(), value)),
                None => replacement = Some(value),
            }
        }

        let json = match replacement {
            Some(value) => value,
            None if properties.is_empty() => self.result_json(&inner, &alias, false)?,
            None => self
                .result_json(&inner, &alias, false)?
                .text(" || ")
                .append(json_object(properties)),
        };

        Ok(sql("SELECT ")
            .append(as_result(json))
            .text(", ")
            .append(Self::row_number(order.as_ref()))
            .text(" FROM ")
            .append(table_as(&self.table, &alias))
            .append(joins)
            .append(self.tail(&inner, order)?))
    }

    /// A lateral below the top level: array modes are aggregated to one
    /// `jsonb` array so each parent row stays a single row.
    fn build_aggregated_child(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        let body = self.build_lateral_child(scope)?;
        if !self.result_mode().is_array() {
            return Ok(body);
        }
        let derived = quote(&scope.derived_alias());
        let result = quote(RESULT_COLUMN);
        let ordinal = quote(ORDINAL_COLUMN);
        Ok(sql(format!(
            "SELECT coalesce(jsonb_agg({derived}.{result} ORDER BY {derived}.{ordinal}), '[]'::jsonb) AS {result} FROM ("
        ))
        .append(body)
        .text(format!(") AS {derived}")))
    }

    /// An independent scalar subquery, embedded by [`crate::Nested`].
    pub(crate) fn build_subquery(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        self.check(scope)?;
        let alias = scope.alias_for(&self.table)?;
        let inner = scope.enter(&self.table, &alias);
        let order = self.order_clause(&inner)?;
        Ok(sql("SELECT ")
            .append(self.value_expr(&inner)?)
            .text(" FROM ")
            .append(table_as(&self.table, &alias))
            .append(self.tail(&inner, order)?))
    }
}

fn left_join(correlated: bool, body: Fragment, alias: &str) -> Fragment {
    let join = if correlated {
        " LEFT JOIN LATERAL ("
    } else {
        " LEFT JOIN ("
    };
    sql(join)
        .append(body)
        .text(format!(") AS {} ON true", quote(alias)))
}

impl Statement for Select {
    fn result_mode(&self) -> ResultMode {
        Select::result_mode(self)
    }

    fn build(&self, scope: &Scope<'_>) -> DbResult<(Fragment, ShapePlan)> {
        self.build_top(scope)
    }
}
