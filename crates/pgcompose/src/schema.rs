//! Table descriptors used to validate identifiers at build time.
//!
//! A [`Schema`] is produced outside this crate (by hand, or from a generated
//! JSON descriptor) and attached to an executor. When present, every table and
//! column a statement mentions is checked against it before any SQL is sent.

use crate::error::{DbError, DbResult};
use crate::ident::Ident;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_schema_name() -> String {
    "public".to_string()
}

/// Column information for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,
    /// Postgres type name (informational).
    #[serde(default)]
    pub data_type: Option<String>,
    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Table information for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schema name (e.g., "public").
    #[serde(default = "default_schema_name")]
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Column metadata.
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add an untyped, nullable column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnMeta {
            name: name.into(),
            data_type: None,
            nullable: true,
        });
        self
    }

    /// Add a typed column.
    pub fn typed_column(
        mut self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        nullable: bool,
    ) -> Self {
        self.columns.push(ColumnMeta {
            name: name.into(),
            data_type: Some(data_type.into()),
            nullable,
        });
        self
    }

    /// Add several untyped columns.
    pub fn with_columns(self, columns: &[&str]) -> Self {
        columns.iter().fold(self, |table, name| table.column(*name))
    }

    /// Check if this table has a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a column.
    pub fn get_column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Registry of table descriptors, keyed by schema then table name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<String, HashMap<String, TableSchema>>,
}

impl Schema {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tables.
    pub fn from_tables(tables: impl IntoIterator<Item = TableSchema>) -> Self {
        tables.into_iter().fold(Self::new(), Self::with_table)
    }

    /// Load a registry from a JSON array of table descriptors.
    ///
    /// ```json
    /// [{ "schema": "shop", "name": "user", "columns": [{ "name": "id" }] }]
    /// ```
    pub fn from_json(json: &str) -> DbResult<Self> {
        let tables: Vec<TableSchema> = serde_json::from_str(json)?;
        Ok(Self::from_tables(tables))
    }

    /// Register a table (replacing any previous descriptor with the same name).
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.register(table);
        self
    }

    /// Register a table in place.
    pub fn register(&mut self, table: TableSchema) {
        self.tables
            .entry(table.schema.clone())
            .or_default()
            .insert(table.name.clone(), table);
    }

    /// Look up a table by (optionally schema-qualified) name.
    ///
    /// Unqualified names resolve against `public`.
    pub fn get_table(&self, qualified: &str) -> Option<&TableSchema> {
        let ident = Ident::parse(qualified).ok()?;
        let schema = ident.schema().unwrap_or("public");
        self.tables.get(schema)?.get(ident.name())
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    /// Whether no table is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn require_table(&self, qualified: &str) -> DbResult<&TableSchema> {
        self.get_table(qualified)
            .ok_or_else(|| DbError::UnknownTable(qualified.to_string()))
    }

    pub(crate) fn require_column(&self, qualified: &str, column: &str) -> DbResult<()> {
        let table = self.require_table(qualified)?;
        if table.has_column(column) {
            Ok(())
        } else {
            Err(DbError::UnknownColumn {
                table: qualified.to_string(),
                column: column.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> Schema {
        Schema::new()
            .with_table(TableSchema::new("shop", "user").with_columns(&["id", "first_name"]))
            .with_table(TableSchema::new("public", "audit").column("id"))
    }

    #[test]
    fn resolves_qualified_and_public_tables() {
        let schema = shop();
        assert_eq!(schema.len(), 2);
        assert!(schema.get_table("shop.user").is_some());
        assert!(schema.get_table("user").is_none());
        assert!(schema.get_table("audit").is_some());
        assert!(schema.get_table("public.audit").is_some());
    }

    #[test]
    fn reports_unknown_identifiers() {
        let schema = shop();
        assert!(schema.require_column("shop.user", "first_name").is_ok());
        assert!(matches!(
            schema.require_column("shop.user", "nickname"),
            Err(DbError::UnknownColumn { .. })
        ));
        assert!(matches!(
            schema.require_table("shop.missing"),
            Err(DbError::UnknownTable(_))
        ));
    }

    #[test]
    fn loads_json_descriptor() {
        let schema = Schema::from_json(
            r#"[{"schema":"shop","name":"favorite","columns":[{"name":"id","data_type":"int4","nullable":false},{"name":"user_id"}]}]"#,
        )
        .unwrap();
        let table = schema.get_table("shop.favorite").unwrap();
        assert!(table.has_column("user_id"));
        assert!(!table.get_column("id").unwrap().nullable);
        assert!(table.get_column("user_id").unwrap().nullable);
    }
}
