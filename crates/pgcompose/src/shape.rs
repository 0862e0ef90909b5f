//! Result modes and the result shaper.
//!
//! Every statement projects one JSON value per row into a `result` column.
//! The shaper turns the executor's raw rows into the declared shape. When
//! lateral subqueries are joined at the top level, the executor returns one
//! row per combination of outer row and lateral rows; the shaper groups them
//! by the outer row ordinal (`$row`) and folds each lateral back into a single
//! property.

use crate::error::{DbError, DbResult};
use crate::executor::RawRow;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

pub(crate) const RESULT_COLUMN: &str = "result";
pub(crate) const ORDINAL_COLUMN: &str = "$row";

/// What a statement yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// At most one row object.
    Row,
    /// A sequence of row objects.
    RowArray,
    /// At most one scalar.
    Column,
    /// A sequence of scalars.
    ColumnArray,
}

impl ResultMode {
    pub fn is_array(self) -> bool {
        matches!(self, Self::RowArray | Self::ColumnArray)
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Column | Self::ColumnArray)
    }
}

/// One lateral join folded into each outer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateralSlot {
    /// Property receiving the value; `None` replaces the whole row.
    pub property: Option<String>,
    /// Column holding the lateral value.
    pub column: String,
    /// Column holding the lateral row ordinal (NULL when nothing matched).
    pub ordinal: String,
    /// The lateral statement's result mode.
    pub mode: ResultMode,
}

/// How to reshape raw rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapePlan {
    pub mode: ResultMode,
    pub laterals: Vec<LateralSlot>,
}

impl ShapePlan {
    pub fn new(mode: ResultMode) -> Self {
        Self {
            mode,
            laterals: Vec::new(),
        }
    }

    /// Whether rows must be grouped by the outer row ordinal.
    pub fn is_keyed(&self) -> bool {
        !self.laterals.is_empty()
    }
}

/// A shaped query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Shaped {
    /// `None` when no row matched (distinct from an empty object).
    Row(Option<Value>),
    Rows(Vec<Value>),
    /// `None` when no row matched.
    Scalar(Option<Value>),
    Scalars(Vec<Value>),
}

impl Shaped {
    pub fn mode(&self) -> ResultMode {
        match self {
            Shaped::Row(_) => ResultMode::Row,
            Shaped::Rows(_) => ResultMode::RowArray,
            Shaped::Scalar(_) => ResultMode::Column,
            Shaped::Scalars(_) => ResultMode::ColumnArray,
        }
    }

    /// The whole result as one JSON value (`null` for a missing row).
    pub fn into_value(self) -> Value {
        match self {
            Shaped::Row(value) | Shaped::Scalar(value) => value.unwrap_or(Value::Null),
            Shaped::Rows(values) | Shaped::Scalars(values) => Value::Array(values),
        }
    }

    /// The result as a list of values (0 or 1 for single modes).
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Shaped::Row(value) | Shaped::Scalar(value) => value.into_iter().collect(),
            Shaped::Rows(values) | Shaped::Scalars(values) => values,
        }
    }

    /// Deserialize the whole result.
    pub fn deserialize<T: DeserializeOwned>(self) -> DbResult<T> {
        Ok(serde_json::from_value(self.into_value())?)
    }
}

/// Reshape raw executor rows according to `plan`.
pub fn shape(plan: &ShapePlan, rows: Vec<RawRow>) -> DbResult<Shaped> {
    let values = if plan.is_keyed() {
        fold_laterals(plan, rows)?
    } else {
        rows.into_iter()
            .map(|mut row| {
                row.remove(RESULT_COLUMN).ok_or_else(|| {
                    DbError::shape_mismatch(format!(
                        "expected a '{RESULT_COLUMN}' column in {:?} mode",
                        plan.mode
                    ))
                })
            })
            .collect::<DbResult<Vec<_>>>()?
    };

    Ok(match plan.mode {
        ResultMode::Row => Shaped::Row(values.into_iter().next()),
        ResultMode::RowArray => Shaped::Rows(values),
        ResultMode::Column => Shaped::Scalar(values.into_iter().next()),
        ResultMode::ColumnArray => Shaped::Scalars(values),
    })
}

struct Group {
    base: Option<Value>,
    slots: Vec<Vec<(i64, Value)>>,
}

fn fold_laterals(plan: &ShapePlan, rows: Vec<RawRow>) -> DbResult<Vec<Value>> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for mut row in rows {
        let key = ordinal(&row, ORDINAL_COLUMN)?.ok_or_else(|| {
            DbError::shape_mismatch(format!("missing outer row ordinal '{ORDINAL_COLUMN}'"))
        })?;
        let slot = match index.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                groups.push(Group {
                    base: row.remove(RESULT_COLUMN),
                    slots: vec![Vec::new(); plan.laterals.len()],
                });
                *entry.insert(groups.len() - 1)
            }
        };
        let group = &mut groups[slot];

        for (lateral, seen) in plan.laterals.iter().zip(group.slots.iter_mut()) {
            // A NULL ordinal means the LEFT JOIN found nothing for this row.
            let Some(position) = ordinal(&row, &lateral.ordinal)? else {
                continue;
            };
            if seen.iter().any(|(p, _)| *p == position) {
                continue;
            }
            let value = row.remove(&lateral.column).unwrap_or(Value::Null);
            seen.push((position, value));
        }
    }

    groups
        .into_iter()
        .map(|group| fold_group(plan, group))
        .collect()
}

fn fold_group(plan: &ShapePlan, group: Group) -> DbResult<Value> {
    let mut base = group.base;
    for (lateral, mut items) in plan.laterals.iter().zip(group.slots) {
        items.sort_by_key(|(position, _)| *position);
        let mut values = items.into_iter().map(|(_, value)| value);
        let folded = if lateral.mode.is_array() {
            Value::Array(values.collect())
        } else {
            values.next().unwrap_or(Value::Null)
        };

        match &lateral.property {
            None => base = Some(folded),
            Some(property) => match base.as_mut() {
                Some(Value::Object(map)) => {
                    map.insert(property.clone(), folded);
                }
                _ => {
                    return Err(DbError::shape_mismatch(format!(
                        "cannot attach lateral property '{property}' to a non-object row"
                    )));
                }
            },
        }
    }
    base.ok_or_else(|| DbError::shape_mismatch("row has no result value"))
}

fn ordinal(row: &RawRow, column: &str) -> DbResult<Option<i64>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            DbError::shape_mismatch(format!("ordinal column '{column}' is not an integer"))
        }),
    }
}
