//! Composable SQL fragments.
//!
//! A [`Fragment`] is an ordered tree of segments: literal text, bound values,
//! identifiers, self/parent references, embedded statements and sub-fragments.
//! Fragments are immutable values; every builder method consumes `self` and
//! returns the extended fragment.
//!
//! Compiling is two passes:
//! 1. [`Fragment::resolve`] replaces self/parent references and embedded
//!    statements using a [`Scope`];
//! 2. [`Fragment::render`] walks the tree depth-first and numbers placeholders
//!    `$1..$n` in encounter order.
//!
//! ```ignore
//! use pgcompose::{sql, self_ref};
//!
//! let compiled = sql("SELECT * FROM ")
//!     .ident("shop.user")
//!     .text(" WHERE id = ")
//!     .bind(3_i32)
//!     .compile()?;
//! assert_eq!(compiled.sql, r#"SELECT * FROM "shop"."user" WHERE id = $1"#);
//! ```

mod param;
mod render;
mod scope;


pub(crate) use param::for_each_literal;
pub use param::{IntoOperand, Literal, Operand, Param, ParentRef, ancestor, parent, sql_default};
pub use render::Compiled;
pub use scope::Scope;

use crate::nested::{Nested, NestedUse};

#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Text(String),
    Param(Param),
    Ident(String),
    SelfRef,
    Parent(ParentRef),
    Nested(Nested, NestedUse),
    Group(Fragment),
}

/// A composable unit of SQL text plus bound parameters.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Fragment {
    segments: Vec<Segment>,
}

/// Start a fragment with raw SQL text.
pub fn sql(text: impl AsRef<str>) -> Fragment {
    Fragment::new().text(text)
}

/// A fragment holding only a self reference.
///
/// Inside a whereable entry it stands for the compared column; inside an
/// update value, for the column being assigned.
pub fn self_ref() -> Fragment {
    Fragment::new().self_ref()
}

/// A fragment holding only a quoted identifier.
pub fn ident(name: impl Into<String>) -> Fragment {
    Fragment::new().ident(name)
}

/// A fragment holding only a bound value.
pub fn param<T: Literal>(value: T) -> Fragment {
    Fragment::new().bind(value)
}

impl Fragment {
    /// An empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL text.
    pub fn text(mut self, text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        if text.is_empty() {
            return self;
        }
        match self.segments.last_mut() {
            Some(Segment::Text(last)) => last.push_str(text),
            _ => self.segments.push(Segment::Text(text.to_string())),
        }
        self
    }

    /// Append a placeholder and bind `value` to it.
    pub fn bind<T: Literal>(self, value: T) -> Self {
        self.push_param(Param::new(value))
    }

    /// Append a table or column name. Validated and quoted when rendered.
    pub fn ident(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Ident(name.into()));
        self
    }

    /// Append a self reference.
    pub fn self_ref(mut self) -> Self {
        self.segments.push(Segment::SelfRef);
        self
    }

    /// Append a reference to a column of the enclosing row.
    pub fn parent(self, column: impl Into<String>) -> Self {
        self.ancestor(1, column)
    }

    /// Append a reference to a column of the row `levels` steps up.
    pub fn ancestor(mut self, levels: usize, column: impl Into<String>) -> Self {
        self.segments.push(Segment::Parent(ParentRef {
            column: column.into(),
            levels,
        }));
        self
    }

    /// Append an embedded scalar statement, rendered in parentheses.
    pub fn nested(self, nested: Nested) -> Self {
        self.nested_as(nested, NestedUse::Scalar)
    }

    /// Append any operand (value, fragment, nested statement, parent reference).
    pub fn operand(self, operand: impl IntoOperand) -> Self {
        self.append(operand.into_operand().into_fragment(NestedUse::Scalar))
    }

    /// Append another fragment.
    pub fn append(mut self, other: Fragment) -> Self {
        if !other.is_empty() {
            self.segments.push(Segment::Group(other));
        }
        self
    }

    /// Join fragments with a separator.
    pub fn join(parts: impl IntoIterator<Item = Fragment>, separator: &str) -> Self {
        parts
            .into_iter()
            .enumerate()
            .fold(Fragment::new(), |acc, (i, part)| {
                let acc = if i > 0 { acc.text(separator) } else { acc };
                acc.append(part)
            })
    }

    /// Whether the fragment has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether any segment refers to an enclosing row, including through
    /// embedded statements.
    pub fn has_parent_refs(&self) -> bool {
        self.segments.iter().any(|segment| match segment {
            Segment::Parent(_) => true,
            Segment::Nested(nested, _) => nested.is_correlated(),
            Segment::Group(inner) => inner.has_parent_refs(),
            _ => false,
        })
    }

    pub(crate) fn push_param(mut self, param: Param) -> Self {
        self.segments.push(Segment::Param(param));
        self
    }

    pub(crate) fn nested_as(mut self, nested: Nested, usage: NestedUse) -> Self {
        self.segments.push(Segment::Nested(nested, usage));
        self
    }

    /// Wrap in parentheses.
    pub(crate) fn parenthesized(self) -> Self {
        sql("(").append(self).text(")")
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        sql(text)
    }
}
