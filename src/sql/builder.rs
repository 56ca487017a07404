//! Builds parameterized SELECT/INSERT/UPDATE/DELETE statements from table
//! descriptors and the live column set.
//!
//! Every caller-supplied value becomes a `$n` placeholder, cast to the
//! column's declared type so values arriving as strings from the HTTP layer
//! bind correctly. Only the descriptor's raw fragments (joins, custom
//! conditions/columns, group-by, having, custom order) are interpolated
//! verbatim; those are caller-trusted by contract.

use crate::schema::{ColumnSet, CustomField, DropdownValue, DROPDOWN_SEPARATOR};
use crate::sql::descriptor::{BulkSpec, DeleteSpec, InsertSpec, QuerySpec, UpdateSpec};
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value};

/// Reserved condition keys controlling paging and sort instead of filtering.
pub const RESERVED_KEYS: &[&str] = &["order", "sort", "page", "limit"];

/// Case-insensitive string values replaced with the current server timestamp.
const TIME_SENTINELS: &[&str] = &["CURRENT_TIMESTAMP()", "NOW()"];

/// Default page size when the caller sends nothing usable.
pub const DEFAULT_LIMIT: u64 = 20;

/// Why a write was refused before any SQL executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reject {
    /// Payload touches a protected column (e.g. the primary key).
    ProtectedColumn,
    /// Bulk payload references a column the table does not have.
    UnknownColumn,
    /// Unconditioned update/delete.
    EmptyConditions,
    /// Nothing left to write after filtering.
    EmptyPayload,
    /// A bulk row's key set differs from the first row's.
    MismatchedBatch,
    /// Upsert without a conflict target.
    MissingConflictTarget,
}

impl Reject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reject::ProtectedColumn => "payload touches a protected column",
            Reject::UnknownColumn => "payload references an unknown column",
            Reject::EmptyConditions => "unconditioned write refused",
            Reject::EmptyPayload => "empty payload",
            Reject::MismatchedBatch => "bulk rows have mismatched key sets",
            Reject::MissingConflictTarget => "upsert requires conflict columns",
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder for `column`, cast to its declared type when known.
    fn placeholder(&mut self, columns: &ColumnSet, column: &str, v: Value) -> String {
        let n = self.push_param(v);
        match columns.data_type(column) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// Escape a string for direct inclusion in a raw SQL fragment. Controllers
/// use this when a custom condition has to carry request data.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Flatten a JSON value to the text form used for comparisons and sentinel
/// checks.
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replace recognized time/null sentinel strings. `empty_is_null` extends the
/// null sentinels with the empty string (single-insert behavior).
fn substitute_sentinels(
    v: &Value,
    tz: FixedOffset,
    now: DateTime<Utc>,
    empty_is_null: bool,
) -> Value {
    let Value::String(s) = v else {
        return v.clone();
    };
    let trimmed = s.trim();
    let upper = trimmed.to_uppercase();
    if TIME_SENTINELS.contains(&upper.as_str()) {
        return Value::String(format_timestamp(now, tz));
    }
    if upper == "NULL" || (empty_is_null && trimmed.is_empty()) {
        return Value::Null;
    }
    Value::String(trimmed.to_string())
}

pub fn format_timestamp(now: DateTime<Utc>, tz: FixedOffset) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Calendar date for a `date`-typed condition value: a positive number is a
/// unix timestamp, anything else means "today" in the given timezone.
fn condition_date(v: &Value, tz: FixedOffset, now: DateTime<Utc>) -> String {
    let ts = match v {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    let instant = if ts > 0 {
        DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or(now)
    } else {
        now
    };
    instant.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// Paging and sort controls parsed out of the reserved condition keys.
#[derive(Clone, Debug, PartialEq)]
pub struct ListControls {
    pub order: Option<String>,
    pub sort: &'static str,
    pub page: u64,
    pub limit: Option<u64>,
}

/// `false`-equivalent values that explicitly disable paging or ordering:
/// boolean false, zero, "0", or an empty string.
fn is_false_equivalent(v: &Value) -> bool {
    match v {
        Value::Bool(false) => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => {
            let t = s.trim();
            t.is_empty() || t == "0"
        }
        _ => false,
    }
}

fn positive_int(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_i64().filter(|i| *i > 0).map(|i| i as u64),
        Value::String(s) => s.trim().parse::<i64>().ok().filter(|i| *i > 0).map(|i| i as u64),
        _ => None,
    }
}

pub fn parse_list_controls(conditions: &Map<String, Value>, columns: &ColumnSet) -> ListControls {
    let order = match conditions.get("order") {
        Some(v) if is_false_equivalent(v) => None,
        Some(Value::String(s)) if columns.contains(s) => Some(s.clone()),
        _ => columns.first_name().map(str::to_string),
    };

    let sort = match conditions.get("sort").map(value_text) {
        Some(s) if s.eq_ignore_ascii_case("desc") => "DESC",
        _ => "ASC",
    };

    let page = conditions.get("page").and_then(positive_int).unwrap_or(1);

    let limit = match conditions.get("limit") {
        Some(v) if is_false_equivalent(v) => None,
        Some(v) => Some(positive_int(v).unwrap_or(DEFAULT_LIMIT)),
        None => Some(DEFAULT_LIMIT),
    };

    ListControls { order, sort, page, limit }
}

/// Filter conditions down to real columns, dropping reserved keys. Unknown
/// keys are silently discarded, never an error.
fn column_filters(conditions: &Map<String, Value>, columns: &ColumnSet) -> Map<String, Value> {
    conditions
        .iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()) && columns.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Filter conditions down to known custom field keys.
fn attribute_filters(conditions: &Map<String, Value>, fields: &[CustomField]) -> Map<String, Value> {
    conditions
        .iter()
        .filter(|(k, _)| fields.iter().any(|f| f.key == *k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Typed condition fragments for the filtered real-column map.
fn push_value_conditions(
    q: &mut QueryBuf,
    spec: &QuerySpec,
    filters: &Map<String, Value>,
    columns: &ColumnSet,
    tz: FixedOffset,
    now: DateTime<Utc>,
    parts: &mut Vec<String>,
) {
    let table = &spec.table;
    for (key, v) in filters {
        if spec.condition_types.is_date(key) {
            let date = condition_date(v, tz, now);
            let n = q.push_param(Value::String(date));
            parts.push(format!("{table}.{key}::date = ${n}::date"));
        } else if spec.condition_types.is_like(key) {
            let n = q.push_param(Value::String(format!("%{}%", value_text(v))));
            parts.push(format!("{table}.{key}::text ILIKE ${n}"));
        } else {
            push_equality(q, columns, &format!("{table}.{key}"), key, v, parts);
        }
    }
}

/// Exact equality, or set membership when the value is an array.
fn push_equality(
    q: &mut QueryBuf,
    columns: &ColumnSet,
    lhs: &str,
    column: &str,
    v: &Value,
    parts: &mut Vec<String>,
) {
    if let Value::Array(items) = v {
        let placeholders: Vec<String> = items
            .iter()
            .map(|item| q.placeholder(columns, column, item.clone()))
            .collect();
        parts.push(format!("{} IN ({})", lhs, placeholders.join(", ")));
    } else {
        let ph = q.placeholder(columns, column, v.clone());
        parts.push(format!("{} = {}", lhs, ph));
    }
}

/// JSON-path equality predicates for custom attribute filters. Dropdown
/// fields compare the stored `id`.
fn push_attribute_conditions(
    q: &mut QueryBuf,
    table: &str,
    attribute_column: &str,
    filters: &Map<String, Value>,
    fields: &[CustomField],
    parts: &mut Vec<String>,
) {
    for (key, v) in filters {
        let Some(field) = fields.iter().find(|f| f.key == *key) else {
            continue;
        };
        let n = q.push_param(Value::String(value_text(v)));
        if field.is_dropdown() {
            parts.push(format!("{table}.{attribute_column}#>>'{{{key},id}}' = ${n}"));
        } else {
            parts.push(format!("{table}.{attribute_column}->>'{key}' = ${n}"));
        }
    }
}

/// Extraction expressions projecting custom fields out of the jsonb column.
/// Dropdown fields concatenate id and value with `||` for client-side
/// splitting.
fn custom_field_projection(table: &str, attribute_column: &str, fields: &[CustomField]) -> Vec<String> {
    fields
        .iter()
        .map(|f| {
            let key = &f.key;
            if f.is_dropdown() {
                format!(
                    "CONCAT_WS('{sep}', {table}.{attribute_column}#>>'{{{key},id}}', \
                     {table}.{attribute_column}#>>'{{{key},value}}') AS {key}",
                    sep = DROPDOWN_SEPARATOR,
                )
            } else {
                format!("{table}.{attribute_column}->>'{key}' AS {key}")
            }
        })
        .collect()
}

/// Shared WHERE clause for the list data and count statements. Pushes params
/// into `q` and returns the clause (with leading space) or an empty string.
fn where_clause(
    q: &mut QueryBuf,
    spec: &QuerySpec,
    columns: &ColumnSet,
    fields: &[CustomField],
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> String {
    let mut parts = Vec::new();
    let filters = column_filters(&spec.conditions, columns);
    push_value_conditions(q, spec, &filters, columns, tz, now, &mut parts);

    if let Some(attr) = spec.attribute_column.as_deref() {
        let attr_filters = attribute_filters(&spec.conditions, fields);
        push_attribute_conditions(q, &spec.table, attr, &attr_filters, fields, &mut parts);
    }

    parts.extend(spec.custom_conditions.iter().cloned());

    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// GROUP BY / HAVING tail. Group columns are qualified with the table name
/// unless already dotted; HAVING only applies together with GROUP BY.
fn group_clause(spec: &QuerySpec) -> String {
    if spec.group_by.is_empty() {
        return String::new();
    }
    let cols: Vec<String> = spec
        .group_by
        .iter()
        .map(|c| {
            if c.contains('.') {
                c.clone()
            } else {
                format!("{}.{}", spec.table, c)
            }
        })
        .collect();
    let mut clause = format!(" GROUP BY {}", cols.join(", "));
    if !spec.having.is_empty() {
        clause.push_str(&format!(" HAVING {}", spec.having.join(" AND ")));
    }
    clause
}

/// A read-many statement pair: the page query and its matching count query.
#[derive(Debug)]
pub struct ListQuery {
    pub data: QueryBuf,
    pub count: QueryBuf,
    pub limit: Option<u64>,
    pub page: u64,
}

/// Build the list statement and its count twin from the same filter, join and
/// group logic.
pub fn build_list(
    spec: &QuerySpec,
    columns: &ColumnSet,
    fields: &[CustomField],
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> ListQuery {
    let controls = parse_list_controls(&spec.conditions, columns);
    let table = &spec.table;

    // Column projection: real columns (allow/deny applied), qualified under
    // joins, then custom computed columns and custom-field extractions.
    let mut projected = columns.project(&spec.column_select, &spec.column_deselect);
    if !spec.joins.is_empty() {
        projected = projected.iter().map(|c| format!("{table}.{c}")).collect();
    }
    if let Some(attr) = spec.attribute_column.as_deref() {
        projected.extend(custom_field_projection(table, attr, fields));
    }
    projected.extend(spec.custom_columns.iter().cloned());

    let join_clause = if spec.joins.is_empty() {
        String::new()
    } else {
        format!(" {}", spec.joins.join(" "))
    };

    let mut data = QueryBuf::new();
    let where_sql = where_clause(&mut data, spec, columns, fields, tz, now);
    let group_sql = group_clause(spec);

    let mut sql = format!(
        "SELECT {} FROM {}{}{}{}",
        projected.join(", "),
        table,
        join_clause,
        where_sql,
        group_sql,
    );

    if let Some(custom_order) = spec.custom_order.as_deref() {
        sql.push_str(&format!(" ORDER BY {}", custom_order));
    } else if let Some(order) = &controls.order {
        let order_column = if spec.joins.is_empty() {
            order.clone()
        } else {
            format!("{table}.{order}")
        };
        sql.push_str(&format!(" ORDER BY {} {}", order_column, controls.sort));
    }

    if let Some(limit) = controls.limit {
        // Page and limit are caller-supplied; the product can exceed u64.
        let offset = limit.saturating_mul(controls.page - 1);
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    }
    data.sql = sql;

    // Count twin: same filters/joins/grouping; grouped queries count over a
    // wrapping subquery.
    let mut count = QueryBuf::new();
    let count_where = where_clause(&mut count, spec, columns, fields, tz, now);
    let inner = format!(
        "SELECT COUNT(*) AS count FROM {}{}{}{}",
        table, join_clause, count_where, group_sql,
    );
    count.sql = if spec.group_by.is_empty() {
        inner
    } else {
        format!("SELECT COUNT(*) AS count FROM ({}) AS grouped", inner)
    };

    ListQuery {
        data,
        count,
        limit: controls.limit,
        page: controls.page,
    }
}

/// Build the single-row detail statement: same column resolution as the list,
/// pure-equality conditions, capped to one row.
pub fn build_detail(
    spec: &QuerySpec,
    columns: &ColumnSet,
    fields: &[CustomField],
) -> QueryBuf {
    let table = &spec.table;
    let mut projected = columns.project(&spec.column_select, &spec.column_deselect);
    if !spec.joins.is_empty() {
        projected = projected.iter().map(|c| format!("{table}.{c}")).collect();
    }
    if let Some(attr) = spec.attribute_column.as_deref() {
        projected.extend(custom_field_projection(table, attr, fields));
    }
    projected.extend(spec.custom_columns.iter().cloned());

    let mut q = QueryBuf::new();
    let mut parts = Vec::new();
    let filters = column_filters(&spec.conditions, columns);
    for (key, v) in &filters {
        let lhs = if spec.joins.is_empty() {
            key.clone()
        } else {
            format!("{table}.{key}")
        };
        push_equality(&mut q, columns, &lhs, key, v, &mut parts);
    }
    if let Some(attr) = spec.attribute_column.as_deref() {
        let attr_filters = attribute_filters(&spec.conditions, fields);
        push_attribute_conditions(&mut q, table, attr, &attr_filters, fields, &mut parts);
    }
    parts.extend(spec.custom_conditions.iter().cloned());

    let join_clause = if spec.joins.is_empty() {
        String::new()
    } else {
        format!(" {}", spec.joins.join(" "))
    };
    let where_sql = if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    };

    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT 1",
        projected.join(", "),
        table,
        join_clause,
        where_sql,
    );
    q
}

/// Assemble the custom-attribute JSON object for a write. Dropdown values are
/// decoded from the `id||value` wire format and silently omitted when
/// malformed.
fn assemble_custom_object(
    data: &Map<String, Value>,
    fields: &[CustomField],
) -> Map<String, Value> {
    let mut object = Map::new();
    for (key, v) in data {
        let Some(field) = fields.iter().find(|f| f.key == *key) else {
            continue;
        };
        if field.is_dropdown() {
            if let Some(dd) = DropdownValue::decode(&value_text(v)) {
                object.insert(
                    key.clone(),
                    serde_json::json!({ "id": dd.id, "value": dd.value }),
                );
            }
        } else {
            object.insert(key.clone(), v.clone());
        }
    }
    object
}

fn touches_protected(keys: &[&String], protected: &[String]) -> bool {
    keys.iter().any(|k| protected.iter().any(|p| p == *k))
}

/// Build a single-row INSERT. Unknown keys are dropped; a protected-column
/// touch rejects the whole statement before any SQL runs.
pub fn build_insert(
    spec: &InsertSpec,
    columns: &ColumnSet,
    fields: &[CustomField],
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> Result<QueryBuf, Reject> {
    let attr = spec.attribute_column.as_deref();
    let data: Map<String, Value> = spec
        .data
        .iter()
        .filter(|(k, _)| columns.contains(k) && Some(k.as_str()) != attr)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let custom = match attr {
        Some(_) => attribute_filters(&spec.data, fields),
        None => Map::new(),
    };

    if data.is_empty() && custom.is_empty() {
        return Err(Reject::EmptyPayload);
    }
    let keys: Vec<&String> = data.keys().collect();
    if touches_protected(&keys, &spec.protected_columns) {
        return Err(Reject::ProtectedColumn);
    }

    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (key, v) in &data {
        let v = substitute_sentinels(v, tz, now, true);
        cols.push(key.clone());
        placeholders.push(q.placeholder(columns, key, v));
    }

    let custom_object = assemble_custom_object(&custom, fields);
    if let (Some(attr), false) = (attr, custom_object.is_empty()) {
        let n = q.push_param(Value::Object(custom_object));
        cols.push(attr.to_string());
        placeholders.push(format!("${}::jsonb", n));
    }

    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        spec.table,
        cols.join(", "),
        placeholders.join(", "),
    );
    Ok(q)
}

fn bulk_values(
    q: &mut QueryBuf,
    spec: &BulkSpec,
    columns: &ColumnSet,
    keys: &[&String],
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> Result<Vec<String>, Reject> {
    let mut groups = Vec::with_capacity(spec.rows.len());
    for row in &spec.rows {
        let row_keys: Vec<&String> = row.keys().collect();
        if row_keys != keys {
            return Err(Reject::MismatchedBatch);
        }
        let placeholders: Vec<String> = keys
            .iter()
            .map(|k| {
                let v = substitute_sentinels(&row[k.as_str()], tz, now, false);
                q.placeholder(columns, k, v)
            })
            .collect();
        groups.push(format!("({})", placeholders.join(", ")));
    }
    Ok(groups)
}

fn validate_bulk<'a>(spec: &'a BulkSpec, columns: &ColumnSet) -> Result<Vec<&'a String>, Reject> {
    let Some(first) = spec.rows.first() else {
        return Err(Reject::EmptyPayload);
    };
    let keys: Vec<&String> = first.keys().collect();
    if keys.is_empty() {
        return Err(Reject::EmptyPayload);
    }
    // Column membership is checked once, from the first row; every other row
    // must then match the first row's key set exactly, order included.
    if keys.iter().any(|k| !columns.contains(k)) {
        return Err(Reject::UnknownColumn);
    }
    if touches_protected(&keys, &spec.protected_columns) {
        return Err(Reject::ProtectedColumn);
    }
    Ok(keys)
}

/// Build a multi-row INSERT. The whole batch is rejected when any row's key
/// set differs from the first row's (order-sensitive).
pub fn build_insert_many(
    spec: &BulkSpec,
    columns: &ColumnSet,
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> Result<QueryBuf, Reject> {
    let keys = validate_bulk(spec, columns)?;
    let mut q = QueryBuf::new();
    let groups = bulk_values(&mut q, spec, columns, &keys, tz, now)?;
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        spec.table,
        keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "),
        groups.join(", "),
    );
    Ok(q)
}

/// Build a multi-row INSERT .. ON CONFLICT DO UPDATE, re-assigning every
/// inserted column to its incoming value.
pub fn build_upsert_many(
    spec: &BulkSpec,
    columns: &ColumnSet,
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> Result<QueryBuf, Reject> {
    if spec.conflict_columns.is_empty() {
        return Err(Reject::MissingConflictTarget);
    }
    let keys = validate_bulk(spec, columns)?;
    let mut q = QueryBuf::new();
    let groups = bulk_values(&mut q, spec, columns, &keys, tz, now)?;
    let assignments: Vec<String> = keys
        .iter()
        .map(|k| format!("{k} = EXCLUDED.{k}"))
        .collect();
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
        spec.table,
        keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "),
        groups.join(", "),
        spec.conflict_columns.join(", "),
        assignments.join(", "),
    );
    Ok(q)
}

/// Build an UPDATE. Refuses unconditioned or no-op updates; custom attributes
/// are merged into the jsonb column with a merge-patch expression instead of
/// full replacement.
pub fn build_update(
    spec: &UpdateSpec,
    columns: &ColumnSet,
    fields: &[CustomField],
    tz: FixedOffset,
    now: DateTime<Utc>,
) -> Result<QueryBuf, Reject> {
    if spec.conditions.is_empty() {
        return Err(Reject::EmptyConditions);
    }
    let attr = spec.attribute_column.as_deref();
    let data: Map<String, Value> = spec
        .data
        .iter()
        .filter(|(k, _)| columns.contains(k) && Some(k.as_str()) != attr)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let custom = match attr {
        Some(_) => attribute_filters(&spec.data, fields),
        None => Map::new(),
    };

    let keys: Vec<&String> = data.keys().collect();
    if touches_protected(&keys, &spec.protected_columns) {
        return Err(Reject::ProtectedColumn);
    }

    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (key, v) in &data {
        let v = substitute_sentinels(v, tz, now, false);
        match &v {
            Value::Null => sets.push(format!("{key} = NULL")),
            Value::String(s) if s.is_empty() => sets.push(format!("{key} = NULL")),
            other => {
                let ph = q.placeholder(columns, key, other.clone());
                sets.push(format!("{key} = {ph}"));
            }
        }
    }

    if let Some(attr) = attr {
        let patch = assemble_custom_object(&custom, fields);
        if !patch.is_empty() {
            let n = q.push_param(Value::Object(patch));
            sets.push(format!(
                "{attr} = COALESCE({attr}, '{{}}'::jsonb) || ${n}::jsonb"
            ));
        }
    }

    if sets.is_empty() {
        return Err(Reject::EmptyPayload);
    }

    let mut parts = Vec::new();
    let filters = column_filters(&spec.conditions, columns);
    for (key, v) in &filters {
        push_equality(&mut q, columns, key, key, v, &mut parts);
    }
    if let Some(attr) = attr {
        for (key, v) in &attribute_filters(&spec.conditions, fields) {
            let n = q.push_param(Value::String(value_text(v)));
            parts.push(format!("{attr}->>'{key}' = ${n}"));
        }
    }
    if parts.is_empty() {
        return Err(Reject::EmptyConditions);
    }

    q.sql = format!(
        "UPDATE {} SET {} WHERE {}",
        spec.table,
        sets.join(", "),
        parts.join(" AND "),
    );
    Ok(q)
}

/// Build a DELETE. An empty condition map is refused outright.
pub fn build_delete(spec: &DeleteSpec, columns: &ColumnSet) -> Result<QueryBuf, Reject> {
    if spec.conditions.is_empty() {
        return Err(Reject::EmptyConditions);
    }
    let mut q = QueryBuf::new();
    let mut parts = Vec::new();
    let filters = column_filters(&spec.conditions, columns);
    for (key, v) in &filters {
        push_equality(&mut q, columns, key, key, v, &mut parts);
    }
    if parts.is_empty() {
        return Err(Reject::EmptyConditions);
    }
    q.sql = format!("DELETE FROM {} WHERE {}", spec.table, parts.join(" AND "));
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, FieldKind};
    use crate::sql::descriptor::ConditionTypes;
    use serde_json::json;

    fn like_types(keys: &[&str]) -> ConditionTypes {
        ConditionTypes {
            like: keys.iter().map(|k| k.to_string()).collect(),
            date: vec![],
        }
    }

    fn date_types(keys: &[&str]) -> ConditionTypes {
        ConditionTypes {
            like: vec![],
            date: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T20:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn users_columns() -> ColumnSet {
        ColumnSet::new(vec![
            Column { name: "id".into(), data_type: "integer".into() },
            Column { name: "username".into(), data_type: "character varying".into() },
            Column { name: "fullname".into(), data_type: "character varying".into() },
            Column { name: "created_date".into(), data_type: "timestamp without time zone".into() },
        ])
    }

    fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn list_filters_and_paginates() {
        let spec = QuerySpec {
            table: "users".into(),
            conditions: obj(&[
                ("username", json!("ann")),
                ("limit", json!("10")),
                ("page", json!("2")),
            ]),
            condition_types: like_types(&["username"]),
            ..Default::default()
        };
        let lq = build_list(&spec, &users_columns(), &[], tz(), now());
        assert_eq!(
            lq.data.sql,
            "SELECT id, username, fullname, created_date FROM users \
             WHERE users.username::text ILIKE $1 ORDER BY id ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(lq.data.params, vec![json!("%ann%")]);
        assert_eq!(lq.count.sql, "SELECT COUNT(*) AS count FROM users WHERE users.username::text ILIKE $1");
        assert_eq!(lq.limit, Some(10));
        assert_eq!(lq.page, 2);
    }

    #[test]
    fn extreme_page_and_limit_saturate_instead_of_overflowing() {
        let huge = i64::MAX.to_string();
        let spec = QuerySpec {
            table: "users".into(),
            conditions: obj(&[
                ("limit", json!(huge.clone())),
                ("page", json!(huge)),
            ]),
            ..Default::default()
        };
        let lq = build_list(&spec, &users_columns(), &[], tz(), now());
        assert!(lq
            .data
            .sql
            .ends_with(&format!(" LIMIT {} OFFSET {}", i64::MAX, u64::MAX)));
        assert_eq!(lq.limit, Some(i64::MAX as u64));
    }

    #[test]
    fn unknown_condition_keys_are_silently_dropped() {
        let spec = QuerySpec {
            table: "users".into(),
            conditions: obj(&[("ghost", json!("x")), ("id", json!(7))]),
            ..Default::default()
        };
        let lq = build_list(&spec, &users_columns(), &[], tz(), now());
        assert_eq!(
            lq.data.sql,
            "SELECT id, username, fullname, created_date FROM users \
             WHERE users.id = $1::integer ORDER BY id ASC LIMIT 20 OFFSET 0"
        );
        assert_eq!(lq.data.params, vec![json!(7)]);
    }

    #[test]
    fn array_condition_becomes_in_clause() {
        let spec = QuerySpec {
            table: "users".into(),
            conditions: obj(&[("id", json!([1, 2, 3]))]),
            ..Default::default()
        };
        let lq = build_list(&spec, &users_columns(), &[], tz(), now());
        assert!(lq.data.sql.contains("users.id IN ($1::integer, $2::integer, $3::integer)"));
        assert_eq!(lq.data.params.len(), 3);
    }

    #[test]
    fn date_condition_compares_calendar_date_in_timezone() {
        let spec = QuerySpec {
            table: "users".into(),
            conditions: obj(&[("created_date", json!("0"))]),
            condition_types: date_types(&["created_date"]),
            ..Default::default()
        };
        let lq = build_list(&spec, &users_columns(), &[], tz(), now());
        assert!(lq.data.sql.contains("users.created_date::date = $1::date"));
        // 2024-03-01T20:30Z is already 2024-03-02 at UTC+7.
        assert_eq!(lq.data.params, vec![json!("2024-03-02")]);
    }

    #[test]
    fn joins_qualify_columns_and_order_field() {
        let spec = QuerySpec {
            table: "cities".into(),
            joins: vec!["LEFT JOIN provinces ON provinces.id = cities.province_id".into()],
            custom_columns: vec!["provinces.name AS province".into()],
            group_by: vec!["id".into()],
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name", "province_id"]);
        let lq = build_list(&spec, &columns, &[], tz(), now());
        assert_eq!(
            lq.data.sql,
            "SELECT cities.id, cities.name, cities.province_id, provinces.name AS province \
             FROM cities LEFT JOIN provinces ON provinces.id = cities.province_id \
             GROUP BY cities.id ORDER BY cities.id ASC LIMIT 20 OFFSET 0"
        );
        // Grouped count wraps a subquery.
        assert_eq!(
            lq.count.sql,
            "SELECT COUNT(*) AS count FROM (SELECT COUNT(*) AS count FROM cities \
             LEFT JOIN provinces ON provinces.id = cities.province_id GROUP BY cities.id) AS grouped"
        );
    }

    #[test]
    fn invalid_order_falls_back_to_first_column_and_asc() {
        let columns = users_columns();
        let controls = parse_list_controls(
            &obj(&[("order", json!("ghost")), ("sort", json!("sideways"))]),
            &columns,
        );
        assert_eq!(controls.order.as_deref(), Some("id"));
        assert_eq!(controls.sort, "ASC");
    }

    #[test]
    fn false_equivalent_limit_disables_paging() {
        let columns = users_columns();
        for v in [json!(false), json!(0), json!("0"), json!("")] {
            let controls = parse_list_controls(&obj(&[("limit", v)]), &columns);
            assert_eq!(controls.limit, None);
        }
        let controls = parse_list_controls(&obj(&[("limit", json!("-3"))]), &columns);
        assert_eq!(controls.limit, Some(DEFAULT_LIMIT));
    }

    #[test]
    fn custom_field_projection_extracts_json_paths() {
        let fields = vec![
            CustomField { key: "nickname".into(), kind: FieldKind::Scalar },
            CustomField { key: "color".into(), kind: FieldKind::Dropdown },
        ];
        let spec = QuerySpec {
            table: "customers".into(),
            attribute_column: Some("attributes".into()),
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name"]);
        let lq = build_list(&spec, &columns, &fields, tz(), now());
        assert!(lq.data.sql.contains("customers.attributes->>'nickname' AS nickname"));
        assert!(lq.data.sql.contains(
            "CONCAT_WS('||', customers.attributes#>>'{color,id}', \
             customers.attributes#>>'{color,value}') AS color"
        ));
    }

    #[test]
    fn attribute_filter_compares_dropdown_id_path() {
        let fields = vec![CustomField { key: "color".into(), kind: FieldKind::Dropdown }];
        let spec = QuerySpec {
            table: "customers".into(),
            attribute_column: Some("attributes".into()),
            conditions: obj(&[("color", json!("3"))]),
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name"]);
        let lq = build_list(&spec, &columns, &fields, tz(), now());
        assert!(lq.data.sql.contains("customers.attributes#>>'{color,id}' = $1"));
    }

    #[test]
    fn detail_is_equality_only_and_capped_to_one_row() {
        let spec = QuerySpec {
            table: "users".into(),
            conditions: obj(&[("id", json!("7"))]),
            ..Default::default()
        };
        let q = build_detail(&spec, &users_columns(), &[]);
        assert_eq!(
            q.sql,
            "SELECT id, username, fullname, created_date FROM users WHERE id = $1::integer LIMIT 1"
        );
    }

    #[test]
    fn insert_drops_unknown_keys_and_returns_id() {
        let spec = InsertSpec {
            table: "users".into(),
            data: obj(&[("username", json!("ann")), ("ghost", json!("x"))]),
            protected_columns: vec!["id".into()],
            ..Default::default()
        };
        let q = build_insert(&spec, &users_columns(), &[], tz(), now()).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO users (username) VALUES ($1::character varying) RETURNING id"
        );
        assert_eq!(q.params, vec![json!("ann")]);
    }

    #[test]
    fn insert_rejects_protected_columns_without_building_sql() {
        let spec = InsertSpec {
            table: "users".into(),
            data: obj(&[("id", json!(9)), ("username", json!("ann"))]),
            protected_columns: vec!["id".into()],
            ..Default::default()
        };
        assert_eq!(
            build_insert(&spec, &users_columns(), &[], tz(), now()).unwrap_err(),
            Reject::ProtectedColumn
        );
    }

    #[test]
    fn insert_substitutes_time_and_null_sentinels() {
        let spec = InsertSpec {
            table: "users".into(),
            data: obj(&[
                ("username", json!("ann")),
                ("created_date", json!("now()")),
                ("fullname", json!("NULL")),
            ]),
            ..Default::default()
        };
        let q = build_insert(&spec, &users_columns(), &[], tz(), now()).unwrap();
        // 2024-03-01T20:30Z at UTC+7.
        assert_eq!(
            q.params,
            vec![json!("ann"), json!("2024-03-02 03:30:00"), Value::Null]
        );
    }

    #[test]
    fn insert_assembles_custom_attribute_object() {
        let fields = vec![
            CustomField { key: "nickname".into(), kind: FieldKind::Scalar },
            CustomField { key: "color".into(), kind: FieldKind::Dropdown },
        ];
        let spec = InsertSpec {
            table: "customers".into(),
            data: obj(&[
                ("name", json!("Acme")),
                ("nickname", json!("ac")),
                ("color", json!("3||Blue")),
            ]),
            attribute_column: Some("attributes".into()),
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name", "attributes"]);
        let q = build_insert(&spec, &columns, &fields, tz(), now()).unwrap();
        assert!(q.sql.ends_with("(name, attributes) VALUES ($1, $2::jsonb) RETURNING id"));
        assert_eq!(
            q.params[1],
            json!({ "nickname": "ac", "color": { "id": 3, "value": "Blue" } })
        );
    }

    #[test]
    fn malformed_dropdown_values_are_silently_omitted() {
        let fields = vec![CustomField { key: "color".into(), kind: FieldKind::Dropdown }];
        let spec = InsertSpec {
            table: "customers".into(),
            data: obj(&[("name", json!("Acme")), ("color", json!("0||Blue"))]),
            attribute_column: Some("attributes".into()),
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name", "attributes"]);
        let q = build_insert(&spec, &columns, &fields, tz(), now()).unwrap();
        assert!(!q.sql.contains("attributes"));
    }

    #[test]
    fn bulk_rejects_mismatched_key_sets_even_reordered() {
        let spec = BulkSpec {
            table: "provinces".into(),
            rows: vec![
                obj(&[("name", json!("A")), ("code", json!("a"))]),
                obj(&[("code", json!("b")), ("name", json!("B"))]),
            ],
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name", "code"]);
        assert_eq!(
            build_insert_many(&spec, &columns, tz(), now()).unwrap_err(),
            Reject::MismatchedBatch
        );
    }

    #[test]
    fn bulk_validates_columns_from_first_row() {
        let spec = BulkSpec {
            table: "provinces".into(),
            rows: vec![obj(&[("ghost", json!("A"))])],
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name"]);
        assert_eq!(
            build_insert_many(&spec, &columns, tz(), now()).unwrap_err(),
            Reject::UnknownColumn
        );
    }

    #[test]
    fn upsert_reassigns_every_inserted_column() {
        let spec = BulkSpec {
            table: "refresh_tokens".into(),
            rows: vec![obj(&[
                ("user_id", json!(1)),
                ("user_agent", json!("ua")),
                ("token", json!("t")),
            ])],
            conflict_columns: vec!["user_id".into(), "user_agent".into()],
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "user_id", "user_agent", "token"]);
        let q = build_upsert_many(&spec, &columns, tz(), now()).unwrap();
        assert!(q.sql.ends_with(
            "ON CONFLICT (user_id, user_agent) DO UPDATE SET \
             user_id = EXCLUDED.user_id, user_agent = EXCLUDED.user_agent, token = EXCLUDED.token"
        ));
    }

    #[test]
    fn update_refuses_empty_conditions() {
        let spec = UpdateSpec {
            table: "users".into(),
            data: obj(&[("fullname", json!("Ann B"))]),
            ..Default::default()
        };
        assert_eq!(
            build_update(&spec, &users_columns(), &[], tz(), now()).unwrap_err(),
            Reject::EmptyConditions
        );
    }

    #[test]
    fn update_merges_custom_attributes_with_patch_expression() {
        let fields = vec![CustomField { key: "nickname".into(), kind: FieldKind::Scalar }];
        let spec = UpdateSpec {
            table: "customers".into(),
            data: obj(&[("nickname", json!("ac"))]),
            conditions: obj(&[("id", json!(4))]),
            attribute_column: Some("attributes".into()),
            ..Default::default()
        };
        let columns = ColumnSet::from_names(["id", "name", "attributes"]);
        let q = build_update(&spec, &columns, &fields, tz(), now()).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE customers SET attributes = COALESCE(attributes, '{}'::jsonb) || $1::jsonb \
             WHERE id = $2"
        );
        assert_eq!(q.params[0], json!({ "nickname": "ac" }));
    }

    #[test]
    fn update_turns_empty_values_into_null() {
        let spec = UpdateSpec {
            table: "users".into(),
            data: obj(&[("fullname", json!(""))]),
            conditions: obj(&[("id", json!(4))]),
            ..Default::default()
        };
        let q = build_update(&spec, &users_columns(), &[], tz(), now()).unwrap();
        assert!(q.sql.contains("fullname = NULL"));
    }

    #[test]
    fn delete_refuses_empty_conditions() {
        let spec = DeleteSpec { table: "cities".into(), conditions: Map::new() };
        assert_eq!(
            build_delete(&spec, &ColumnSet::from_names(["id"])).unwrap_err(),
            Reject::EmptyConditions
        );
    }

    #[test]
    fn delete_builds_conditioned_statement() {
        let spec = DeleteSpec {
            table: "cities".into(),
            conditions: obj(&[("id", json!("999"))]),
        };
        let columns = ColumnSet::new(vec![Column { name: "id".into(), data_type: "integer".into() }]);
        let q = build_delete(&spec, &columns).unwrap();
        assert_eq!(q.sql, "DELETE FROM cities WHERE id = $1::integer");
    }

    #[test]
    fn quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
