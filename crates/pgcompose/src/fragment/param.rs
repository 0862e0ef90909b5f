use super::Fragment;
use crate::nested::{Nested, NestedUse};
use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A value that can be bound as a query parameter.
///
/// Implemented for the scalar types the executor adapters understand and for
/// `Option<T>` of them. `None` binds SQL `NULL`.
pub trait Literal: ToSql + Send + Sync + 'static {
    /// Whether this value binds SQL `NULL`.
    fn is_null(&self) -> bool {
        false
    }
}

/// A bound parameter value.
#[derive(Clone)]
pub struct Param {
    value: Arc<dyn ToSql + Send + Sync>,
    is_null: bool,
}

impl Param {
    /// Wrap a literal value.
    pub fn new<T: Literal>(value: T) -> Self {
        let is_null = value.is_null();
        Self {
            value: Arc::new(value),
            is_null,
        }
    }

    /// Whether the value is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Reference compatible with `tokio-postgres` query methods.
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        &*self.value
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.value, f)
    }
}

/// A reference to a column of an enclosing row.
///
/// `levels == 1` is the row immediately around the current lateral subquery;
/// higher values walk further up the alias chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub(crate) column: String,
    pub(crate) levels: usize,
}

impl ParentRef {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn levels(&self) -> usize {
        self.levels
    }
}

/// Reference a column of the immediately enclosing row.
pub fn parent(column: impl Into<String>) -> ParentRef {
    ancestor(1, column)
}

/// Reference a column of the row `levels` steps up the alias chain.
pub fn ancestor(levels: usize, column: impl Into<String>) -> ParentRef {
    ParentRef {
        column: column.into(),
        levels,
    }
}

/// The right-hand side of a comparison or an assignment.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A bound value.
    Value(Param),
    /// Raw SQL, embedded verbatim.
    Fragment(Fragment),
    /// An embedded scalar statement.
    Nested(Nested),
    /// A column of an enclosing row.
    Parent(ParentRef),
    /// The SQL `DEFAULT` keyword (insert and update values only).
    Default,
}

impl Operand {
    pub(crate) fn into_fragment(self, usage: NestedUse) -> Fragment {
        match self {
            Operand::Value(param) => Fragment::new().push_param(param),
            Operand::Fragment(fragment) => fragment,
            Operand::Nested(nested) => Fragment::new().nested_as(nested, usage),
            Operand::Parent(parent) => Fragment::new().ancestor(parent.levels, parent.column),
            Operand::Default => Fragment::new().text("DEFAULT"),
        }
    }

    pub(crate) fn has_parent_refs(&self) -> bool {
        match self {
            Operand::Value(_) | Operand::Default => false,
            Operand::Fragment(fragment) => fragment.has_parent_refs(),
            Operand::Nested(nested) => nested.is_correlated(),
            Operand::Parent(_) => true,
        }
    }
}

/// The SQL `DEFAULT` keyword as an insert or update value.
pub fn sql_default() -> Operand {
    Operand::Default
}

/// Conversion into an [`Operand`].
pub trait IntoOperand {
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl IntoOperand for Fragment {
    fn into_operand(self) -> Operand {
        Operand::Fragment(self)
    }
}

impl IntoOperand for Nested {
    fn into_operand(self) -> Operand {
        Operand::Nested(self)
    }
}

impl IntoOperand for ParentRef {
    fn into_operand(self) -> Operand {
        Operand::Parent(self)
    }
}

impl<T: Literal> Literal for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

impl<T: Literal> IntoOperand for Option<T> {
    fn into_operand(self) -> Operand {
        Operand::Value(Param::new(self))
    }
}

/// Invoke `$m!` with every concrete literal type.
macro_rules! for_each_literal {
    ($m:ident) => {
        $m!(
            bool,
            i16,
            i32,
            i64,
            f32,
            f64,
            String,
            &'static str,
            Vec<u8>,
            Vec<i16>,
            Vec<i32>,
            Vec<i64>,
            Vec<String>,
            serde_json::Value,
            uuid::Uuid,
            chrono::NaiveDate,
            chrono::NaiveTime,
            chrono::NaiveDateTime,
            chrono::DateTime<chrono::Utc>,
            chrono::DateTime<chrono::FixedOffset>
        );
    };
}
pub(crate) use for_each_literal;

macro_rules! impl_literal {
    ($($t:ty),* $(,)?) => {
        $(
            impl Literal for $t {}

            impl IntoOperand for $t {
                fn into_operand(self) -> Operand {
                    Operand::Value(Param::new(self))
                }
            }
        )*
    };
}

for_each_literal!(impl_literal);
