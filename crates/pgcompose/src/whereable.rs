//! Declarative filters compiled to WHERE clauses.
//!
//! A [`Whereable`] is an ordered mapping from column name to a value. Entry
//! order only affects the generated text (for reproducible SQL), never the
//! meaning: entries are joined with `AND`.
//!
//! | value                      | compiles to                          |
//! |----------------------------|--------------------------------------|
//! | literal                    | `"t"."col" = $n`                     |
//! | `None` literal             | `"t"."col" IS NULL`                  |
//! | [`Condition`]              | `(<condition with self = "t"."col">)`|
//! | raw [`Fragment`]           | `(<fragment with self = "t"."col">)` |
//! | nested column              | `"t"."col" = (SELECT ...)`           |
//! | nested column array        | `"t"."col" IN (SELECT ...)`          |
//! | parent reference           | `"t"."col" = "outer"."other"`        |

use crate::condition::Condition;
use crate::error::{DbError, DbResult};
use crate::fragment::{Fragment, Operand, ParentRef, Scope, for_each_literal, sql};
use crate::nested::{Nested, NestedUse};
use crate::shape::ResultMode;

/// A value in a whereable entry.
#[derive(Debug, Clone)]
pub enum WhereValue {
    Operand(Operand),
    Condition(Condition),
}

/// Conversion into a [`WhereValue`].
pub trait IntoWhereValue {
    fn into_where_value(self) -> WhereValue;
}

impl IntoWhereValue for WhereValue {
    fn into_where_value(self) -> WhereValue {
        self
    }
}

impl IntoWhereValue for Condition {
    fn into_where_value(self) -> WhereValue {
        WhereValue::Condition(self)
    }
}

impl IntoWhereValue for Operand {
    fn into_where_value(self) -> WhereValue {
        WhereValue::Operand(self)
    }
}

impl IntoWhereValue for Fragment {
    fn into_where_value(self) -> WhereValue {
        WhereValue::Operand(Operand::Fragment(self))
    }
}

impl IntoWhereValue for Nested {
    fn into_where_value(self) -> WhereValue {
        WhereValue::Operand(Operand::Nested(self))
    }
}

impl IntoWhereValue for ParentRef {
    fn into_where_value(self) -> WhereValue {
        WhereValue::Operand(Operand::Parent(self))
    }
}

impl<T: crate::fragment::Literal> IntoWhereValue for Option<T> {
    fn into_where_value(self) -> WhereValue {
        WhereValue::Operand(crate::fragment::IntoOperand::into_operand(self))
    }
}

macro_rules! impl_where_literal {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoWhereValue for $t {
                fn into_where_value(self) -> WhereValue {
                    WhereValue::Operand(crate::fragment::IntoOperand::into_operand(self))
                }
            }
        )*
    };
}

for_each_literal!(impl_where_literal);

#[derive(Debug, Clone)]
enum Entry {
    Column(String, WhereValue),
    Clause(Fragment),
}

/// An ordered column filter.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Whereable {
    entries: Vec<Entry>,
}

impl Whereable {
    /// An empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// The filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Set the value for `column`; re-setting a column replaces it in place.
    pub fn with(mut self, column: impl Into<String>, value: impl IntoWhereValue) -> Self {
        let column = column.into();
        let value = value.into_where_value();
        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            Entry::Column(name, slot) if *name == column => Some(slot),
            _ => None,
        });
        match existing {
            Some(slot) => *slot = value,
            None => self.entries.push(Entry::Column(column, value)),
        }
        self
    }

    /// Add a raw clause not tied to a column.
    pub fn clause(mut self, fragment: Fragment) -> Self {
        self.entries.push(Entry::Clause(fragment));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Column(name, _) => Some(name.as_str()),
            Entry::Clause(_) => None,
        })
    }

    /// Whether any entry refers to an enclosing row.
    pub fn has_parent_refs(&self) -> bool {
        self.entries.iter().any(|entry| match entry {
            Entry::Column(_, WhereValue::Operand(operand)) => operand.has_parent_refs(),
            Entry::Column(_, WhereValue::Condition(condition)) => {
                condition.fragment().has_parent_refs()
            }
            Entry::Clause(fragment) => fragment.has_parent_refs(),
        })
    }

    /// Compile to one resolved, `AND`-joined fragment.
    ///
    /// Columns are qualified with the scope's current alias. An empty filter
    /// compiles to `true`.
    pub fn compile(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        if self.entries.is_empty() {
            return Ok(sql("true"));
        }
        let mut parts = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            parts.push(match entry {
                Entry::Column(column, value) => compile_entry(column, value, scope)?,
                Entry::Clause(fragment) => fragment.resolve(scope)?.parenthesized(),
            });
        }
        Ok(Fragment::join(parts, " AND "))
    }
}

fn compile_entry(column: &str, value: &WhereValue, scope: &Scope<'_>) -> DbResult<Fragment> {
    let scope = scope.with_self(column)?;
    let lhs = scope.resolve_self()?.to_string();

    let fragment = match value {
        WhereValue::Condition(condition) => {
            return Ok(condition.fragment().resolve(&scope)?.parenthesized());
        }
        WhereValue::Operand(Operand::Fragment(fragment)) => {
            return Ok(fragment.resolve(&scope)?.parenthesized());
        }
        WhereValue::Operand(Operand::Value(param)) if param.is_null() => {
            sql(lhs).text(" IS NULL")
        }
        WhereValue::Operand(Operand::Value(param)) => {
            sql(lhs).text(" = ").push_param(param.clone())
        }
        WhereValue::Operand(Operand::Nested(nested)) => {
            let (operator, usage) = match nested.result_mode() {
                ResultMode::ColumnArray => (" IN ", NestedUse::Set),
                ResultMode::Column => (" = ", NestedUse::Scalar),
                mode => return Err(DbError::NonScalarNested(mode)),
            };
            sql(lhs).text(operator).append(nested.embed(&scope, usage)?)
        }
        WhereValue::Operand(Operand::Parent(parent)) => {
            sql(lhs).text(" = ").text(scope.resolve_parent(parent)?)
        }
        WhereValue::Operand(Operand::Default) => {
            return Err(DbError::validation(format!(
                "DEFAULT is not a valid filter value for column '{column}'"
            )));
        }
    };
    Ok(fragment)
}

/// Build a [`Whereable`] from `column => value` pairs.
///
/// ```ignore
/// let filter = whereable! { "last_name" => "Charpin", "first_name" => sql("").self_ref().text(" = 'Nico'") };
/// ```
#[macro_export]
macro_rules! whereable {
    () => {
        $crate::Whereable::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::Whereable::new()$(.with($column, $value))+
    };
}
