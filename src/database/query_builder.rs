use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgPool, Row};
use std::time::Instant;
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseError;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

fn warn_if_slow(started: Instant, query: &str) {
    let elapsed = started.elapsed().as_millis() as u64;
    if elapsed >= config::config().database.slow_query_threshold_ms {
        tracing::warn!(elapsed_ms = elapsed, query = %query, "slow query");
    }
}

pub struct QueryBuilder<T> {
    table_name: String,
    filter: Option<Filter>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        // Reuse Filter table name validation
        Filter::new(&name).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        Ok(Self {
            table_name: name,
            filter: None,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        let mut filter = Filter::new(&self.table_name).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        filter
            .assign(filter_data)
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, BindValue::from(p));
        }
        let started = Instant::now();
        let rows = q.fetch_all(pool).await?;
        warn_if_slow(started, &sql_result.query);
        Ok(rows)
    }

    pub async fn select_optional(self, pool: &PgPool) -> Result<Option<T>, DatabaseError> {
        let sql_result = self.sql_result()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, BindValue::from(p));
        }
        Ok(q.fetch_optional(pool).await?)
    }

    pub async fn count(self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let sql_result = match self.filter {
            Some(filter) => filter.to_count_sql(),
            None => Filter::new(&self.table_name).and_then(|f| f.to_count_sql()),
        }
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, BindValue::from(p));
        }
        let started = Instant::now();
        let row = q.fetch_one(pool).await?;
        warn_if_slow(started, &sql_result.query);
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    fn sql_result(&self) -> Result<SqlResult, DatabaseError> {
        let result = match &self.filter {
            Some(filter) => filter.to_sql(),
            None => Filter::new(&self.table_name).and_then(|f| f.to_sql()),
        };
        let sql = result.map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        tracing::trace!(query = %sql.query, params = sql.params.len(), "filter query");
        Ok(sql)
    }
}

/// Postgres will not compare a uuid/date column against a text parameter, so
/// JSON strings that parse as one of those types are bound as that type.
#[derive(Debug, PartialEq)]
pub(crate) enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(String),
    Json(Value),
}

impl From<&Value> for BindValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    BindValue::Float(f)
                } else {
                    BindValue::Text(n.to_string())
                }
            }
            Value::String(s) => {
                if let Ok(id) = Uuid::parse_str(s) {
                    BindValue::Uuid(id)
                } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    BindValue::Date(date)
                } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    BindValue::Timestamp(ts.with_timezone(&Utc))
                } else {
                    BindValue::Text(s.clone())
                }
            }
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: BindValue,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        BindValue::Null => q.bind(None::<String>),
        BindValue::Bool(b) => q.bind(b),
        BindValue::Int(i) => q.bind(i),
        BindValue::Float(f) => q.bind(f),
        BindValue::Uuid(u) => q.bind(u),
        BindValue::Date(d) => q.bind(d),
        BindValue::Timestamp(t) => q.bind(t),
        BindValue::Text(s) => q.bind(s),
        BindValue::Json(j) => q.bind(j),
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: BindValue,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        BindValue::Null => q.bind(None::<String>),
        BindValue::Bool(b) => q.bind(b),
        BindValue::Int(i) => q.bind(i),
        BindValue::Float(f) => q.bind(f),
        BindValue::Uuid(u) => q.bind(u),
        BindValue::Date(d) => q.bind(d),
        BindValue::Timestamp(t) => q.bind(t),
        BindValue::Text(s) => q.bind(s),
        BindValue::Json(j) => q.bind(j),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_are_typed_by_shape() {
        let id = Uuid::new_v4();
        assert_eq!(BindValue::from(&json!(id.to_string())), BindValue::Uuid(id));
        assert!(matches!(BindValue::from(&json!("2024-05-01")), BindValue::Date(_)));
        assert!(matches!(BindValue::from(&json!("2024-05-01T10:00:00Z")), BindValue::Timestamp(_)));
        assert_eq!(BindValue::from(&json!("open")), BindValue::Text("open".to_string()));
    }

    #[test]
    fn scalars_and_documents() {
        assert_eq!(BindValue::from(&json!(7)), BindValue::Int(7));
        assert_eq!(BindValue::from(&json!(true)), BindValue::Bool(true));
        assert_eq!(BindValue::from(&Value::Null), BindValue::Null);
        assert!(matches!(BindValue::from(&json!({ "a": 1 })), BindValue::Json(_)));
    }
}
