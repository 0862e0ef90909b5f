use crate::error::DbResult;
use crate::fragment::{Fragment, IntoOperand, Operand, Scope};
use crate::nested::NestedUse;

/// An ordered set of column values for insert, update and upsert.
///
/// Values may be literals, [`crate::nested`] statements, raw fragments, parent
/// references or [`crate::sql_default`]. Setting a column twice replaces its
/// value in place.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Record {
    entries: Vec<(String, Operand)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl IntoOperand) -> Self {
        let column = column.into();
        let value = value.into_operand();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
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
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&Operand> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub(crate) fn entries(&self) -> &[(String, Operand)] {
        &self.entries
    }
}

/// Render one value in `scope`. Nested statements are embedded as scalars.
pub(crate) fn render_value(value: &Operand, scope: &Scope<'_>) -> DbResult<Fragment> {
    value.clone().into_fragment(NestedUse::Scalar).resolve(scope)
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```ignore
/// let favorite = record! {
///     "user_id" => nested(select_one("shop.user", whereable! { "first_name" => "Nico" }).column("id")),
///     "product_id" => 4,
/// };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::Record::new()$(.set($column, $value))+
    };
}
