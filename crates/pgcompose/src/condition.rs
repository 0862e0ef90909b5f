//! Condition combinators.
//!
//! Each combinator produces a [`Condition`]: a fragment whose left-hand side
//! is an implicit self reference, bound to a column when the condition is used
//! as a whereable value.
//!
//! ```ignore
//! use pgcompose::condition::{between_symmetric, is_in, like};
//! use pgcompose::{nested, select_one, whereable};
//!
//! let filter = whereable! {
//!     "description" => like("%Dune%"),
//!     "id" => is_in(vec![1, 2, 3]),
//!     "user_id" => between_symmetric(
//!         nested(select_one("shop.order", whereable! { "id" => 2 }).column("user_id")),
//!         nested(select_one("shop.order", whereable! { "id" => 1 }).column("user_id")),
//!     ),
//! };
//! ```
//!
//! Operands are anything implementing [`IntoOperand`]: literal values (bound
//! as parameters), raw [`Fragment`]s, [`Nested`] statements and parent
//! references.

use crate::fragment::{Fragment, IntoOperand, Literal, Param, sql};
use crate::nested::{Nested, NestedUse};

/// A comparison against the implicit self reference.
#[derive(Debug, Clone)]
#[must_use]
pub struct Condition(Fragment);

impl Condition {
    /// A condition from raw SQL; use [`crate::self_ref`] for the compared column.
    pub fn raw(fragment: Fragment) -> Self {
        Self(fragment)
    }

    /// The underlying fragment.
    pub fn fragment(&self) -> &Fragment {
        &self.0
    }

    pub fn into_fragment(self) -> Fragment {
        self.0
    }
}

fn compare(operator: &str, operand: impl IntoOperand) -> Condition {
    Condition(
        Fragment::new()
            .self_ref()
            .text(format!(" {operator} "))
            .append(operand.into_operand().into_fragment(NestedUse::Scalar)),
    )
}

fn range(operator: &str, low: impl IntoOperand, high: impl IntoOperand) -> Condition {
    Condition(
        Fragment::new()
            .self_ref()
            .text(format!(" {operator} "))
            .append(low.into_operand().into_fragment(NestedUse::RangeBound))
            .text(" AND ")
            .append(high.into_operand().into_fragment(NestedUse::RangeBound)),
    )
}

fn unary(suffix: &str) -> Condition {
    Condition(Fragment::new().self_ref().text(suffix))
}

/// `self = operand`
pub fn eq(operand: impl IntoOperand) -> Condition {
    compare("=", operand)
}

/// `self <> operand`
pub fn ne(operand: impl IntoOperand) -> Condition {
    compare("<>", operand)
}

/// `self < operand`
pub fn lt(operand: impl IntoOperand) -> Condition {
    compare("<", operand)
}

/// `self <= operand`
pub fn lte(operand: impl IntoOperand) -> Condition {
    compare("<=", operand)
}

/// `self > operand`
pub fn gt(operand: impl IntoOperand) -> Condition {
    compare(">", operand)
}

/// `self >= operand`
pub fn gte(operand: impl IntoOperand) -> Condition {
    compare(">=", operand)
}

/// `self BETWEEN low AND high`
pub fn between(low: impl IntoOperand, high: impl IntoOperand) -> Condition {
    range("BETWEEN", low, high)
}

/// `self BETWEEN SYMMETRIC low AND high`: bounds may come in either order.
pub fn between_symmetric(low: impl IntoOperand, high: impl IntoOperand) -> Condition {
    range("BETWEEN SYMMETRIC", low, high)
}

/// `self NOT BETWEEN low AND high`
pub fn not_between(low: impl IntoOperand, high: impl IntoOperand) -> Condition {
    range("NOT BETWEEN", low, high)
}

/// `self NOT BETWEEN SYMMETRIC low AND high`
pub fn not_between_symmetric(low: impl IntoOperand, high: impl IntoOperand) -> Condition {
    range("NOT BETWEEN SYMMETRIC", low, high)
}

/// `self LIKE pattern`
pub fn like(pattern: impl IntoOperand) -> Condition {
    compare("LIKE", pattern)
}

/// `self NOT LIKE pattern`
pub fn not_like(pattern: impl IntoOperand) -> Condition {
    compare("NOT LIKE", pattern)
}

/// `self ILIKE pattern`
pub fn ilike(pattern: impl IntoOperand) -> Condition {
    compare("ILIKE", pattern)
}

/// `self NOT ILIKE pattern`
pub fn not_ilike(pattern: impl IntoOperand) -> Condition {
    compare("NOT ILIKE", pattern)
}

/// `self ~ pattern` (POSIX regex, case-sensitive)
pub fn re_match(pattern: impl IntoOperand) -> Condition {
    compare("~", pattern)
}

/// `self ~* pattern` (POSIX regex, case-insensitive)
pub fn re_imatch(pattern: impl IntoOperand) -> Condition {
    compare("~*", pattern)
}

/// `self IS DISTINCT FROM operand` (NULL-safe inequality)
pub fn is_distinct_from(operand: impl IntoOperand) -> Condition {
    compare("IS DISTINCT FROM", operand)
}

/// `self IS NOT DISTINCT FROM operand` (NULL-safe equality)
pub fn is_not_distinct_from(operand: impl IntoOperand) -> Condition {
    compare("IS NOT DISTINCT FROM", operand)
}

/// `self IS NULL`
pub fn is_null() -> Condition {
    unary(" IS NULL")
}

/// `self IS NOT NULL`
pub fn is_not_null() -> Condition {
    unary(" IS NOT NULL")
}

/// `self IS TRUE`
pub fn is_true() -> Condition {
    unary(" IS TRUE")
}

/// `self IS FALSE`
pub fn is_false() -> Condition {
    unary(" IS FALSE")
}

/// The right-hand side of `IN`.
#[derive(Debug, Clone)]
pub enum Members {
    /// Literal values, each bound separately.
    List(Vec<Param>),
    /// A column or column-array statement.
    Nested(Nested),
    /// Raw SQL producing a set (a subquery or a value list).
    Fragment(Fragment),
}

/// Conversion into [`Members`].
pub trait IntoMembers {
    fn into_members(self) -> Members;
}

impl<T: Literal> IntoMembers for Vec<T> {
    fn into_members(self) -> Members {
        Members::List(self.into_iter().map(Param::new).collect())
    }
}

impl<T: Literal, const N: usize> IntoMembers for [T; N] {
    fn into_members(self) -> Members {
        Members::List(self.into_iter().map(Param::new).collect())
    }
}

impl IntoMembers for Nested {
    fn into_members(self) -> Members {
        Members::Nested(self)
    }
}

impl IntoMembers for Fragment {
    fn into_members(self) -> Members {
        Members::Fragment(self)
    }
}

impl IntoMembers for Members {
    fn into_members(self) -> Members {
        self
    }
}

fn membership(operator: &str, members: Members, empty: &str) -> Condition {
    let set = match members {
        Members::List(params) if params.is_empty() => return Condition(sql(empty)),
        Members::List(params) => Fragment::join(
            params.into_iter().map(|p| Fragment::new().push_param(p)),
            ", ",
        )
        .parenthesized(),
        Members::Nested(nested) => Fragment::new().nested_as(nested, NestedUse::Set),
        Members::Fragment(fragment) => fragment.parenthesized(),
    };
    Condition(
        Fragment::new()
            .self_ref()
            .text(format!(" {operator} "))
            .append(set),
    )
}

/// `self IN (...)`. An empty literal list matches nothing (`false`).
pub fn is_in(members: impl IntoMembers) -> Condition {
    membership("IN", members.into_members(), "false")
}

/// `self NOT IN (...)`. An empty literal list matches everything (`true`).
pub fn is_not_in(members: impl IntoMembers) -> Condition {
    membership("NOT IN", members.into_members(), "true")
}

/// All conditions hold. No conditions at all is `true`.
pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    combine(conditions, " AND ", "true")
}

/// Any condition holds. No conditions at all is `false`.
pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    combine(conditions, " OR ", "false")
}

/// The condition does not hold.
pub fn not(condition: Condition) -> Condition {
    Condition(sql("NOT ").append(condition.0.parenthesized()))
}

fn combine(
    conditions: impl IntoIterator<Item = Condition>,
    separator: &str,
    empty: &str,
) -> Condition {
    let parts: Vec<Fragment> = conditions
        .into_iter()
        .map(|c| c.0.parenthesized())
        .collect();
    if parts.is_empty() {
        return Condition(sql(empty));
    }
    Condition(Fragment::join(parts, separator))
}
