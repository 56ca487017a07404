//! Per-call query descriptors supplied by resource controllers.
//!
//! Raw SQL extension points (`custom_conditions`, `custom_columns`, `joins`,
//! `group_by`, `having`, `custom_order`) are interpolated verbatim into the
//! statement. They are caller-trusted input: controllers must never place
//! unvalidated request data in them. Everything else is bound through
//! placeholders.

use serde_json::{Map, Value};

/// Classification of condition fields. A `like` field becomes a substring
/// match, a `date` field compares the calendar date only; everything else is
/// exact equality (or `IN` for array values).
#[derive(Clone, Debug, Default)]
pub struct ConditionTypes {
    pub like: Vec<String>,
    pub date: Vec<String>,
}

impl ConditionTypes {
    pub fn is_like(&self, key: &str) -> bool {
        self.like.iter().any(|k| k == key)
    }

    pub fn is_date(&self, key: &str) -> bool {
        self.date.iter().any(|k| k == key)
    }
}

/// Read-many descriptor. `conditions` carries filter fields plus the reserved
/// paging/sort keys (`order`, `sort`, `page`, `limit`).
#[derive(Clone, Debug, Default)]
pub struct QuerySpec {
    pub table: String,
    pub conditions: Map<String, Value>,
    pub condition_types: ConditionTypes,
    pub custom_conditions: Vec<String>,
    pub column_select: Vec<String>,
    pub column_deselect: Vec<String>,
    pub custom_columns: Vec<String>,
    pub attribute_column: Option<String>,
    pub joins: Vec<String>,
    pub group_by: Vec<String>,
    pub having: Vec<String>,
    pub custom_order: Option<String>,
}

/// Single-row insert descriptor.
#[derive(Clone, Debug, Default)]
pub struct InsertSpec {
    pub table: String,
    pub data: Map<String, Value>,
    pub attribute_column: Option<String>,
    pub protected_columns: Vec<String>,
}

/// Bulk insert / upsert descriptor. `conflict_columns` names the unique key
/// for the upsert variant (PostgreSQL requires an explicit conflict target).
#[derive(Clone, Debug, Default)]
pub struct BulkSpec {
    pub table: String,
    pub rows: Vec<Map<String, Value>>,
    pub protected_columns: Vec<String>,
    pub conflict_columns: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateSpec {
    pub table: String,
    pub data: Map<String, Value>,
    pub conditions: Map<String, Value>,
    pub attribute_column: Option<String>,
    pub protected_columns: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DeleteSpec {
    pub table: String,
    pub conditions: Map<String, Value>,
}
