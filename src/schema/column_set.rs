//! Ordered column metadata for one table.

/// One real column as reported by `information_schema.columns`. The
/// `data_type` is kept so placeholders can be cast (`$n::integer`) when
/// binding values that arrive as strings from the HTTP layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

/// The live column set of a table, in ordinal order. Fetched fresh on every
/// operation; never cached.
#[derive(Clone, Debug, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

/// Deny-list wildcard meaning "all columns".
pub const DESELECT_ALL: &str = "*";

impl ColumnSet {
    pub fn new(columns: Vec<Column>) -> Self {
        ColumnSet { columns }
    }

    /// Build from bare names with an unknown data type. Handy in tests and
    /// for tables whose types are irrelevant to the caller.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSet {
            columns: names
                .into_iter()
                .map(|n| Column {
                    name: n.into(),
                    data_type: String::new(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// First column in ordinal order; the silent fallback for invalid sort
    /// fields.
    pub fn first_name(&self) -> Option<&str> {
        self.columns.first().map(|c| c.name.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Declared SQL type for a column, if known. Empty types (from
    /// `from_names`) count as unknown.
    pub fn data_type(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.data_type.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Resolve the projected column names: start from all real columns,
    /// intersect with the allow-list when given, then subtract the deny-list
    /// (a `*` entry clears everything).
    pub fn project(&self, select: &[String], deselect: &[String]) -> Vec<String> {
        let mut names = self.names();
        if !select.is_empty() {
            names.retain(|n| select.iter().any(|s| s == n));
        }
        if !deselect.is_empty() {
            if deselect.iter().any(|d| d == DESELECT_ALL) {
                names.clear();
            } else {
                names.retain(|n| !deselect.iter().any(|d| d == n));
            }
        }
        names
    }
}
