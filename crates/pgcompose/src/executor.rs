//! The executor contract and its `tokio-postgres` adapters.
//!
//! An [`Executor`] receives rendered SQL and the ordered parameter list and
//! returns raw rows as JSON maps. Implementations are provided for
//! `tokio_postgres::Client`, `tokio_postgres::Transaction` and, with the `pool`
//! feature, `deadpool_postgres::Client`. Passing a transaction is how callers
//! group several statements atomically.

use crate::error::{DbError, DbResult};
use crate::fragment::Param;
use crate::schema::Schema;
use serde_json::{Map, Number, Value};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, ToSql, Type};

/// One returned row: column name to JSON value.
pub type RawRow = Map<String, Value>;

/// Runs rendered SQL.
pub trait Executor: Send + Sync {
    /// Execute `sql` with `params` bound to `$1..$n` and return all rows.
    fn query_rows(
        &self,
        sql: &str,
        params: &[Param],
    ) -> impl std::future::Future<Output = DbResult<Vec<RawRow>>> + Send;

    /// Schema descriptor used to validate identifiers before execution.
    fn schema(&self) -> Option<&Schema> {
        None
    }
}

fn params_ref(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(Param::as_sql).collect()
}

impl Executor for tokio_postgres::Client {
    async fn query_rows(&self, sql: &str, params: &[Param]) -> DbResult<Vec<RawRow>> {
        let params = params_ref(params);
        let rows = self
            .query(sql, &params)
            .await
            .map_err(DbError::from_db_error)?;
        rows.iter().map(row_to_raw).collect()
    }
}

impl Executor for tokio_postgres::Transaction<'_> {
    async fn query_rows(&self, sql: &str, params: &[Param]) -> DbResult<Vec<RawRow>> {
        let params = params_ref(params);
        let rows = self
            .query(sql, &params)
            .await
            .map_err(DbError::from_db_error)?;
        rows.iter().map(row_to_raw).collect()
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    async fn query_rows(&self, sql: &str, params: &[Param]) -> DbResult<Vec<RawRow>> {
        // Delegate to the deref target (tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        Executor::query_rows(client, sql, params).await
    }
}

/// Decode a row into a JSON map, column by column.
pub fn row_to_raw(row: &Row) -> DbResult<RawRow> {
    let mut map = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.name(), column.type_())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, name: &str) -> DbResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| DbError::decode(name, e.to_string()))
}

fn float(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn decode_column(row: &Row, idx: usize, name: &str, ty: &Type) -> DbResult<Value> {
    let value = match *ty {
        Type::JSONB | Type::JSON => get::<Value>(row, idx, name)?.unwrap_or(Value::Null),
        Type::BOOL => get::<bool>(row, idx, name)?.map(Value::from).unwrap_or_default(),
        Type::INT2 => get::<i16>(row, idx, name)?.map(Value::from).unwrap_or_default(),
        Type::INT4 => get::<i32>(row, idx, name)?.map(Value::from).unwrap_or_default(),
        Type::INT8 => get::<i64>(row, idx, name)?.map(Value::from).unwrap_or_default(),
        Type::OID => get::<u32>(row, idx, name)?.map(Value::from).unwrap_or_default(),
        Type::FLOAT4 => float(get::<f32>(row, idx, name)?.map(f64::from)),
        Type::FLOAT8 => float(get::<f64>(row, idx, name)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx, name)?.map(Value::from).unwrap_or_default()
        }
        Type::UUID => get::<uuid::Uuid>(row, idx, name)?
            .map(|v| Value::from(v.to_string()))
            .unwrap_or_default(),
        Type::TIMESTAMPTZ => get::<chrono::DateTime<chrono::Utc>>(row, idx, name)?
            .map(|v| Value::from(v.to_rfc3339()))
            .unwrap_or_default(),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx, name)?
            .map(|v| Value::from(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or_default(),
        Type::DATE => get::<chrono::NaiveDate>(row, idx, name)?
            .map(|v| Value::from(v.to_string()))
            .unwrap_or_default(),
        Type::TIME => get::<chrono::NaiveTime>(row, idx, name)?
            .map(|v| Value::from(v.to_string()))
            .unwrap_or_default(),
        _ => {
            return Err(DbError::decode(
                name,
                format!("unsupported column type '{}'; cast it to text or jsonb", ty.name()),
            ));
        }
    };
    Ok(value)
}
