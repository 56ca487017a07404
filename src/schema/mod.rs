//! Live schema introspection.
//!
//! Column sets and custom field definitions are read from the database on
//! every operation so the query layer always reflects the live schema.
//! Nothing here is cached.

mod column_set;
mod custom_field;

pub use column_set::{Column, ColumnSet, DESELECT_ALL};
pub use custom_field::{
    CustomField, DropdownValue, FieldKind, DROPDOWN_SEPARATOR, DROPDOWN_TYPE_ID,
};

use sqlx::PgPool;
use sqlx::Row;

/// Schema holding application tables. From env `DB_SCHEMA`, default `public`.
pub fn db_schema() -> String {
    std::env::var("DB_SCHEMA").unwrap_or_else(|_| "public".into())
}

pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Fetch a table's columns from `information_schema.columns`, in ordinal
    /// order. An unknown table yields an empty set.
    pub async fn table_columns(
        pool: &PgPool,
        schema: &str,
        table: &str,
    ) -> Result<ColumnSet, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(pool)
        .await?;

        let columns = rows
            .iter()
            .map(|r| {
                Ok(Column {
                    name: r.try_get::<String, _>("column_name")?,
                    data_type: r.try_get::<String, _>("data_type")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(ColumnSet::new(columns))
    }

    /// Fetch the active custom field definitions for a table.
    pub async fn custom_fields(
        pool: &PgPool,
        table: &str,
    ) -> Result<Vec<CustomField>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT field_key, field_type_id FROM custom_fields \
             WHERE is_active AND source_table = $1",
        )
        .bind(table)
        .fetch_all(pool)
        .await?;

        let fields = rows
            .iter()
            .map(|r| {
                Ok(CustomField {
                    key: r.try_get::<String, _>("field_key")?,
                    kind: FieldKind::from_type_id(r.try_get::<i32, _>("field_type_id")?),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(fields)
    }
}
