//! Tagged query outcomes and the wire envelope they collapse into.
//!
//! The service layer reports what actually happened (`QueryOutcome`); only at
//! the serialization boundary does "nothing" become the legacy `false`
//! sentinel the clients expect.

use crate::sql::Reject;
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

/// What a query did. `Rejected` means the statement never ran; `Fault` means
/// it ran (or failed to run) against the database and broke.
#[derive(Debug)]
pub enum QueryOutcome {
    /// A read-many result. `limit` 0 means paging was disabled.
    Rows {
        total: u64,
        limit: u64,
        page: u64,
        rows: Vec<Value>,
    },
    /// A read-one result that found its row.
    One(Value),
    /// A write that executed. `echo` carries what the caller gets back (the
    /// new id, the batch, or the matched conditions).
    Written { affected: u64, echo: Value },
    /// A read-one that found nothing.
    Empty,
    /// Refused before any SQL ran.
    Rejected(Reject),
    /// Database-level failure, already logged.
    Fault(String),
}

/// Envelope payload. `Absent` serializes as the literal `false`.
#[derive(Debug)]
pub enum Payload {
    Rows(Vec<Value>),
    Row(Value),
    Absent,
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Rows(rows) => rows.serialize(serializer),
            Payload::Row(row) => row.serialize(serializer),
            Payload::Absent => serializer.serialize_bool(false),
        }
    }
}

impl Payload {
    pub fn is_absent(&self) -> bool {
        matches!(self, Payload::Absent)
    }
}

/// The uniform result envelope: counters plus the data payload.
#[derive(Debug, serde::Serialize)]
pub struct Envelope {
    pub total_data: u64,
    pub limit: u64,
    pub page: u64,
    pub data: Payload,
}

impl Envelope {
    /// The no-result envelope: zero counters and the `false` payload.
    pub fn empty() -> Self {
        Envelope {
            total_data: 0,
            limit: 0,
            page: 1,
            data: Payload::Absent,
        }
    }
}

impl QueryOutcome {
    /// Collapse to the wire envelope. A zero-row read-many keeps its empty
    /// array; everything else that produced nothing becomes the sentinel.
    pub fn into_envelope(self) -> Envelope {
        match self {
            QueryOutcome::Rows { total, limit, page, rows } => Envelope {
                total_data: total,
                limit,
                page,
                data: Payload::Rows(rows),
            },
            QueryOutcome::One(row) => Envelope {
                total_data: 1,
                limit: 0,
                page: 1,
                data: Payload::Row(row),
            },
            QueryOutcome::Written { affected, echo } => {
                if affected == 0 {
                    Envelope::empty()
                } else {
                    Envelope {
                        total_data: affected,
                        limit: 0,
                        page: 1,
                        data: Payload::Row(echo),
                    }
                }
            }
            QueryOutcome::Empty | QueryOutcome::Rejected(_) | QueryOutcome::Fault(_) => {
                Envelope::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_payload_serializes_as_false() {
        let envelope = Envelope::empty();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "total_data": 0, "limit": 0, "page": 1, "data": false })
        );
    }

    #[test]
    fn empty_row_list_keeps_its_array() {
        let outcome = QueryOutcome::Rows { total: 0, limit: 20, page: 1, rows: vec![] };
        let envelope = outcome.into_envelope();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "total_data": 0, "limit": 20, "page": 1, "data": [] })
        );
    }

    #[test]
    fn empty_read_one_collapses_to_sentinel() {
        assert!(QueryOutcome::Empty.into_envelope().data.is_absent());
        assert!(QueryOutcome::Rejected(Reject::EmptyConditions)
            .into_envelope()
            .data
            .is_absent());
        assert!(QueryOutcome::Fault("boom".into()).into_envelope().data.is_absent());
    }

    #[test]
    fn zero_affected_write_collapses_to_sentinel() {
        let outcome = QueryOutcome::Written { affected: 0, echo: json!({ "id": 1 }) };
        assert!(outcome.into_envelope().data.is_absent());

        let outcome = QueryOutcome::Written { affected: 1, echo: json!({ "id": 1 }) };
        let envelope = outcome.into_envelope();
        assert_eq!(envelope.total_data, 1);
        assert!(!envelope.data.is_absent());
    }
}
