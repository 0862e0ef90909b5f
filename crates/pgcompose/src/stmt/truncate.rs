use crate::error::DbResult;
use crate::executor::Executor;
use crate::fragment::{Compiled, Fragment, ident, sql};
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identity {
    Restart,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Cascade,
    Restrict,
}

/// A TRUNCATE statement. Returns nothing.
#[derive(Debug, Clone)]
#[must_use]
pub struct Truncate {
    tables: Vec<String>,
    identity: Option<Identity>,
    behavior: Option<Behavior>,
}

/// Empty `table`.
pub fn truncate(table: impl Into<String>) -> Truncate {
    Truncate {
        tables: vec![table.into()],
        identity: None,
        behavior: None,
    }
}

impl Truncate {
    /// Empty another table in the same statement.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    /// Reset sequences owned by the truncated tables.
    pub fn restart_identity(mut self) -> Self {
        self.identity = Some(Identity::Restart);
        self
    }

    pub fn continue_identity(mut self) -> Self {
        self.identity = Some(Identity::Continue);
        self
    }

    /// Also truncate tables referencing these ones by foreign key.
    pub fn cascade(mut self) -> Self {
        self.behavior = Some(Behavior::Cascade);
        self
    }

    pub fn restrict(mut self) -> Self {
        self.behavior = Some(Behavior::Restrict);
        self
    }

    pub fn fragment(&self) -> Fragment {
        let tables = Fragment::join(self.tables.iter().map(ident), ", ");
        let mut out = sql("TRUNCATE ").append(tables);
        out = match self.identity {
            Some(Identity::Restart) => out.text(" RESTART IDENTITY"),
            Some(Identity::Continue) => out.text(" CONTINUE IDENTITY"),
            None => out,
        };
        match self.behavior {
            Some(Behavior::Cascade) => out.text(" CASCADE"),
            Some(Behavior::Restrict) => out.text(" RESTRICT"),
            None => out,
        }
    }

    pub fn compile(&self) -> DbResult<Compiled> {
        self.compile_with(None)
    }

    /// Compile, checking every table against `schema` first.
    pub fn compile_with(&self, schema: Option<&Schema>) -> DbResult<Compiled> {
        if let Some(schema) = schema {
            for table in &self.tables {
                schema.require_table(table)?;
            }
        }
        self.fragment().compile_with(schema)
    }

    /// Execute the statement.
    pub async fn run(&self, exec: &impl Executor) -> DbResult<()> {
        let compiled = self.compile_with(exec.schema())?;
        exec.query_rows(&compiled.sql, &compiled.params).await?;
        Ok(())
    }
}
