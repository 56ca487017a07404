//! Custom field definitions and the dropdown `id||value` wire format.
//!
//! Custom fields are schemaless attributes stored in a designated jsonb
//! column instead of native table columns. A dropdown field holds a compound
//! `{id, value}` pair that travels over the wire as `id||value`; the encoding
//! rules live here and nowhere else.

/// `field_type_id` value marking a dropdown field in the metadata table.
pub const DROPDOWN_TYPE_ID: i32 = 5;

/// Separator for the dropdown wire format.
pub const DROPDOWN_SEPARATOR: &str = "||";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Dropdown,
}

impl FieldKind {
    pub fn from_type_id(field_type_id: i32) -> Self {
        if field_type_id == DROPDOWN_TYPE_ID {
            FieldKind::Dropdown
        } else {
            FieldKind::Scalar
        }
    }
}

/// One active custom field definition for a table.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomField {
    pub key: String,
    pub kind: FieldKind,
}

impl CustomField {
    pub fn is_dropdown(&self) -> bool {
        self.kind == FieldKind::Dropdown
    }
}

/// Decoded dropdown value. Only well-formed pairs exist: a positive id and a
/// non-empty label.
#[derive(Clone, Debug, PartialEq)]
pub struct DropdownValue {
    pub id: i64,
    pub value: String,
}

impl DropdownValue {
    /// Parse the `id||value` wire format. Returns `None` for anything that is
    /// not a positive integer id followed by a non-empty label; callers drop
    /// such values silently.
    pub fn decode(raw: &str) -> Option<Self> {
        let (id, value) = raw.split_once(DROPDOWN_SEPARATOR)?;
        let id: i64 = id.trim().parse().ok()?;
        if id <= 0 || value.is_empty() {
            return None;
        }
        Some(DropdownValue {
            id,
            value: value.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.id, DROPDOWN_SEPARATOR, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_positive_id_and_label() {
        let v = DropdownValue::decode("3||Blue").unwrap();
        assert_eq!(v.id, 3);
        assert_eq!(v.value, "Blue");
    }

    #[test]
    fn decode_round_trips_through_encode() {
        let v = DropdownValue::decode("3||Blue").unwrap();
        assert_eq!(v.encode(), "3||Blue");
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert_eq!(DropdownValue::decode("Blue"), None);
        assert_eq!(DropdownValue::decode("0||Blue"), None);
        assert_eq!(DropdownValue::decode("-2||Blue"), None);
        assert_eq!(DropdownValue::decode("3||"), None);
        assert_eq!(DropdownValue::decode("x||Blue"), None);
    }

    #[test]
    fn type_id_five_is_dropdown() {
        assert_eq!(FieldKind::from_type_id(5), FieldKind::Dropdown);
        assert_eq!(FieldKind::from_type_id(1), FieldKind::Scalar);
    }
}
