//! SQL statement construction and parameter binding.

pub mod builder;
pub mod descriptor;
pub mod params;

pub use builder::{
    build_delete, build_detail, build_insert, build_insert_many, build_list, build_update,
    build_upsert_many, format_timestamp, parse_list_controls, quote_literal, ListControls,
    ListQuery, QueryBuf, Reject, DEFAULT_LIMIT, RESERVED_KEYS,
};
pub use descriptor::{BulkSpec, ConditionTypes, DeleteSpec, InsertSpec, QuerySpec, UpdateSpec};
pub use params::PgBindValue;
