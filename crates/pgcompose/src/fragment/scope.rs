use super::ParentRef;
use crate::error::{DbError, DbResult};
use crate::ident::{Ident, quote};
use crate::schema::Schema;

/// Compile-time context threaded through every build call.
///
/// A scope carries the optional schema descriptor, the chain of enclosing row
/// relations (outermost first), every alias visible from enclosing levels, the
/// nesting depth used to generate unique aliases, the relation currently being
/// compiled and, inside a whereable entry or an assignment, the column a self
/// reference stands for.
#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    schema: Option<&'a Schema>,
    chain: Vec<Relation>,
    enclosing: Vec<String>,
    depth: usize,
    relation: Option<Relation>,
    self_column: Option<String>,
}

#[derive(Debug, Clone)]
struct Relation {
    table: String,
    alias: String,
}

impl<'a> Scope<'a> {
    /// Top-level scope.
    pub fn root(schema: Option<&'a Schema>) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// The schema descriptor identifiers are validated against.
    pub fn schema(&self) -> Option<&'a Schema> {
        self.schema
    }

    /// Nesting depth (0 at the top-level statement).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Aliases of the enclosing rows, outermost first.
    pub fn alias_chain(&self) -> Vec<&str> {
        self.chain.iter().map(|r| r.alias.as_str()).collect()
    }

    /// Alias of the relation being compiled, if any.
    pub fn current_alias(&self) -> Option<&str> {
        self.relation.as_ref().map(|r| r.alias.as_str())
    }

    /// The table alias for `table` at this depth.
    ///
    /// Top-level tables are aliased by their own name; deeper ones get the
    /// depth appended. An alias already taken by an enclosing level (a table
    /// literally named `user_1` above a nested `user`) gets a further `_<n>`.
    pub(crate) fn alias_for(&self, table: &str) -> DbResult<String> {
        let ident = Ident::parse(table)?;
        if let Some(schema) = self.schema {
            schema.require_table(table)?;
        }
        let base = match self.depth {
            0 => ident.name().to_string(),
            depth => format!("{}_{depth}", ident.name()),
        };
        let mut alias = base.clone();
        let mut suffix = 1;
        while self.enclosing.iter().any(|taken| *taken == alias) {
            alias = format!("{base}_{suffix}");
            suffix += 1;
        }
        Ok(alias)
    }

    /// Alias of the `index`-th lateral join made at this depth.
    pub(crate) fn lateral_alias(&self, index: usize) -> String {
        match self.depth {
            0 => format!("lateral_{index}"),
            depth => format!("lateral_{depth}_{index}"),
        }
    }

    /// Alias of the derived table wrapping an aggregated subquery.
    pub(crate) fn derived_alias(&self) -> String {
        format!("sq_{}", self.depth)
    }

    /// Enter `table` (aliased `alias`) as the relation being compiled.
    pub(crate) fn enter(&self, table: &str, alias: &str) -> Self {
        Self {
            relation: Some(Relation {
                table: table.to_string(),
                alias: alias.to_string(),
            }),
            self_column: None,
            ..self.clone()
        }
    }

    /// Bind self references to `column` of the current relation.
    pub(crate) fn with_self(&self, column: &str) -> DbResult<Self> {
        let qualified = self.qualify(column)?;
        Ok(Self {
            self_column: Some(qualified),
            ..self.clone()
        })
    }

    /// Scope for an independent subquery: one level deeper, same ancestors.
    pub(crate) fn descend_nested(&self) -> Self {
        Self {
            schema: self.schema,
            chain: self.chain.clone(),
            enclosing: self.enclosing_with_current(),
            depth: self.depth + 1,
            relation: None,
            self_column: None,
        }
    }

    /// Scope for a lateral subquery correlated to rows of the current relation.
    pub(crate) fn descend_lateral(&self) -> Self {
        let mut chain = self.chain.clone();
        chain.extend(self.relation.clone());
        Self {
            schema: self.schema,
            chain,
            enclosing: self.enclosing_with_current(),
            depth: self.depth + 1,
            relation: None,
            self_column: None,
        }
    }

    fn enclosing_with_current(&self) -> Vec<String> {
        let mut enclosing = self.enclosing.clone();
        if let Some(relation) = &self.relation {
            enclosing.push(relation.alias.clone());
        }
        enclosing
    }

    /// Validate a column of the current relation against the schema.
    pub(crate) fn check_column(&self, column: &str) -> DbResult<()> {
        Ident::single(column)?;
        match (self.schema, &self.relation) {
            (Some(schema), Some(relation)) => schema.require_column(&relation.table, column),
            _ => Ok(()),
        }
    }

    /// Render a column of the current relation, alias-qualified.
    pub(crate) fn qualify(&self, column: &str) -> DbResult<String> {
        self.check_column(column)?;
        let column = Ident::single(column)?.to_sql();
        Ok(match &self.relation {
            Some(relation) => format!("{}.{column}", quote(&relation.alias)),
            None => column,
        })
    }

    pub(crate) fn resolve_self(&self) -> DbResult<&str> {
        self.self_column.as_deref().ok_or(DbError::UnresolvedSelf)
    }

    pub(crate) fn resolve_parent(&self, parent: &ParentRef) -> DbResult<String> {
        let unresolved = || DbError::UnresolvedParent {
            column: parent.column.clone(),
            levels: parent.levels,
        };
        if parent.levels == 0 || parent.levels > self.chain.len() {
            return Err(unresolved());
        }
        let relation = &self.chain[self.chain.len() - parent.levels];
        let column = Ident::single(&parent.column)?.to_sql();
        if let Some(schema) = self.schema {
            schema.require_column(&relation.table, &parent.column)?;
        }
        Ok(format!("{}.{column}", quote(&relation.alias)))
    }
}
