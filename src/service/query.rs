//! Reflection-driven query execution against PostgreSQL.
//!
//! Every operation introspects the target table's columns (and, when an
//! attribute column is in play, its custom field definitions) before building
//! SQL. Database failures never escape as errors here; they are logged and
//! folded into `QueryOutcome::Fault` so the envelope layer can collapse them
//! to the no-result sentinel.

use crate::schema::{db_schema, ColumnSet, CustomField, SchemaIntrospector};
use crate::service::outcome::QueryOutcome;
use crate::sql::{
    build_delete, build_detail, build_insert, build_insert_many, build_list, build_update,
    build_upsert_many, BulkSpec, DeleteSpec, InsertSpec, PgBindValue, QueryBuf, QuerySpec,
    UpdateSpec,
};
use chrono::{FixedOffset, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::PgPool;

pub struct QueryService;

impl QueryService {
    /// Read many rows: page query plus its count twin, sharing one filter
    /// construction.
    pub async fn get_all(pool: &PgPool, spec: &QuerySpec, tz: FixedOffset) -> QueryOutcome {
        let (columns, fields) = match Self::introspect(pool, spec).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };

        let lq = build_list(spec, &columns, &fields, tz, Utc::now());

        let total = match Self::fetch_count(pool, &lq.count).await {
            Ok(n) => n,
            Err(e) => return fault("count query failed", &e),
        };
        let rows = match Self::fetch_rows(pool, &lq.data).await {
            Ok(rows) => rows,
            Err(e) => return fault("list query failed", &e),
        };

        QueryOutcome::Rows {
            total,
            limit: lq.limit.unwrap_or(0),
            page: lq.page,
            rows,
        }
    }

    /// Read one row by exact-match conditions.
    pub async fn get_detail(pool: &PgPool, spec: &QuerySpec) -> QueryOutcome {
        let (columns, fields) = match Self::introspect(pool, spec).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };

        let q = build_detail(spec, &columns, &fields);
        match Self::fetch_optional(pool, &q).await {
            Ok(Some(row)) => QueryOutcome::One(row),
            Ok(None) => QueryOutcome::Empty,
            Err(e) => fault("detail query failed", &e),
        }
    }

    /// Insert one row, echoing the generated id.
    pub async fn insert(pool: &PgPool, spec: &InsertSpec, tz: FixedOffset) -> QueryOutcome {
        let (columns, fields) =
            match Self::introspect_table(pool, &spec.table, spec.attribute_column.is_some()).await {
                Ok(pair) => pair,
                Err(outcome) => return outcome,
            };

        let q = match build_insert(spec, &columns, &fields, tz, Utc::now()) {
            Ok(q) => q,
            Err(reject) => return rejected(reject),
        };
        match Self::fetch_optional(pool, &q).await {
            Ok(Some(row)) => QueryOutcome::Written {
                affected: 1,
                echo: json!({ "id": row.get("id").cloned().unwrap_or(Value::Null) }),
            },
            // RETURNING on a successful insert always yields a row; this arm
            // is unreachable in practice.
            Ok(None) => QueryOutcome::Written { affected: 0, echo: Value::Null },
            Err(e) => fault("insert failed", &e),
        }
    }

    /// Insert a batch in one statement, echoing the batch back.
    pub async fn insert_many(pool: &PgPool, spec: &BulkSpec, tz: FixedOffset) -> QueryOutcome {
        let (columns, _) = match Self::introspect_table(pool, &spec.table, false).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };
        let q = match build_insert_many(spec, &columns, tz, Utc::now()) {
            Ok(q) => q,
            Err(reject) => return rejected(reject),
        };
        Self::run_write(pool, &q, json!(spec.rows)).await
    }

    /// Insert-or-update a batch against the given conflict target.
    pub async fn upsert_many(pool: &PgPool, spec: &BulkSpec, tz: FixedOffset) -> QueryOutcome {
        let (columns, _) = match Self::introspect_table(pool, &spec.table, false).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };
        let q = match build_upsert_many(spec, &columns, tz, Utc::now()) {
            Ok(q) => q,
            Err(reject) => return rejected(reject),
        };
        Self::run_write(pool, &q, json!(spec.rows)).await
    }

    /// Update rows matching the conditions, echoing the conditions back.
    pub async fn update(pool: &PgPool, spec: &UpdateSpec, tz: FixedOffset) -> QueryOutcome {
        let (columns, fields) =
            match Self::introspect_table(pool, &spec.table, spec.attribute_column.is_some()).await {
                Ok(pair) => pair,
                Err(outcome) => return outcome,
            };
        let q = match build_update(spec, &columns, &fields, tz, Utc::now()) {
            Ok(q) => q,
            Err(reject) => return rejected(reject),
        };
        Self::run_write(pool, &q, json!(spec.conditions)).await
    }

    /// Delete rows matching the conditions.
    pub async fn delete(pool: &PgPool, spec: &DeleteSpec) -> QueryOutcome {
        let (columns, _) = match Self::introspect_table(pool, &spec.table, false).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };
        let q = match build_delete(spec, &columns) {
            Ok(q) => q,
            Err(reject) => return rejected(reject),
        };
        Self::run_write(pool, &q, json!(spec.conditions)).await
    }

    async fn introspect(
        pool: &PgPool,
        spec: &QuerySpec,
    ) -> Result<(ColumnSet, Vec<CustomField>), QueryOutcome> {
        Self::introspect_table(pool, &spec.table, spec.attribute_column.is_some()).await
    }

    /// Columns and (optionally) custom fields for a table, fetched fresh.
    /// An unknown table comes back as an empty column set and is a fault.
    async fn introspect_table(
        pool: &PgPool,
        table: &str,
        with_fields: bool,
    ) -> Result<(ColumnSet, Vec<CustomField>), QueryOutcome> {
        let columns = SchemaIntrospector::table_columns(pool, &db_schema(), table)
            .await
            .map_err(|e| fault("column introspection failed", &e))?;
        if columns.is_empty() {
            tracing::error!(table = %table, "table has no columns");
            return Err(QueryOutcome::Fault(format!("unknown table {table}")));
        }
        let fields = if with_fields {
            SchemaIntrospector::custom_fields(pool, table)
                .await
                .map_err(|e| fault("custom field introspection failed", &e))?
        } else {
            Vec::new()
        };
        Ok((columns, fields))
    }

    async fn run_write(pool: &PgPool, q: &QueryBuf, echo: Value) -> QueryOutcome {
        match Self::execute(pool, q).await {
            Ok(affected) => QueryOutcome::Written { affected, echo },
            Err(e) => fault("write failed", &e),
        }
    }

    async fn fetch_count(pool: &PgPool, q: &QueryBuf) -> Result<u64, sqlx::Error> {
        use sqlx::Row;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = Self::bind_all(q).fetch_one(pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_rows(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = Self::bind_all(q).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = Self::bind_all(q).fetch_optional(pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn execute(pool: &PgPool, q: &QueryBuf) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let result = Self::bind_all(q).execute(pool).await?;
        Ok(result.rows_affected())
    }

    fn bind_all(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }
}

fn rejected(reject: crate::sql::Reject) -> QueryOutcome {
    tracing::warn!(reason = reject.as_str(), "statement rejected");
    QueryOutcome::Rejected(reject)
}

fn fault(context: &str, e: &sqlx::Error) -> QueryOutcome {
    tracing::error!(error = %e, "{context}");
    QueryOutcome::Fault(format!("{context}: {e}"))
}

/// Decode a database row into a JSON object. Each cell is probed against the
/// types the resource tables use, narrowest integer first, text last.
pub fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row};
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    // Zoneless timestamps echo the format the write path stores.
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
