use super::{Fragment, Param, Scope, Segment};
use crate::error::{DbError, DbResult};
use crate::executor::{Executor, RawRow};
use crate::ident::Ident;
use crate::schema::Schema;
use tokio_postgres::types::ToSql;

/// Rendered SQL text with its ordered parameter list.
///
/// `sql` contains placeholders `$1..$n` where `n == params.len()`.
#[derive(Debug, Clone, Default)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Compiled {
    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_sql).collect()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    fn push_param(&mut self, param: &Param) {
        self.params.push(param.clone());
        self.sql.push('$');
        self.sql.push_str(&self.params.len().to_string());
    }
}

impl Fragment {
    /// Replace self references, parent references and embedded statements.
    ///
    /// Fails fast with a build error when a reference cannot be resolved in
    /// `scope`.
    pub fn resolve(&self, scope: &Scope<'_>) -> DbResult<Fragment> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            segments.push(match segment {
                Segment::SelfRef => Segment::Text(scope.resolve_self()?.to_string()),
                Segment::Parent(parent) => Segment::Text(scope.resolve_parent(parent)?),
                Segment::Nested(nested, usage) => Segment::Group(nested.embed(scope, *usage)?),
                Segment::Group(inner) => Segment::Group(inner.resolve(scope)?),
                other => other.clone(),
            });
        }
        Ok(Fragment { segments })
    }

    /// Render a resolved fragment to SQL text and parameters.
    pub fn render(&self) -> DbResult<Compiled> {
        let mut out = Compiled::default();
        self.render_into(&mut out)?;
        Ok(out)
    }

    fn render_into(&self, out: &mut Compiled) -> DbResult<()> {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.sql.push_str(text),
                Segment::Param(param) => out.push_param(param),
                Segment::Ident(name) => Ident::parse(name)?.write_sql(&mut out.sql),
                Segment::Group(inner) => inner.render_into(out)?,
                Segment::SelfRef => return Err(DbError::UnresolvedSelf),
                Segment::Parent(parent) => {
                    return Err(DbError::UnresolvedParent {
                        column: parent.column.clone(),
                        levels: parent.levels,
                    });
                }
                Segment::Nested(..) => {
                    return Err(DbError::validation(
                        "embedded statement was not resolved before rendering",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve at the top level and render.
    pub fn compile(&self) -> DbResult<Compiled> {
        self.compile_with(None)
    }

    /// Resolve at the top level, validating embedded statements against `schema`.
    pub fn compile_with(&self, schema: Option<&Schema>) -> DbResult<Compiled> {
        self.resolve(&Scope::root(schema))?.render()
    }

    /// Execute the fragment as a complete statement and return raw rows.
    pub async fn fetch_raw(&self, executor: &impl Executor) -> DbResult<Vec<RawRow>> {
        let compiled = self.compile_with(executor.schema())?;
        executor.query_rows(&compiled.sql, &compiled.params).await
    }
}
