//! Table and column metadata.

use serde::{Deserialize, Serialize};

/// A database table or view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Schema name
    pub schema: String,
    /// Table/view name
    pub name: String,
    /// Whether this is a view (vs a table)
    pub is_view: bool,
    /// Primary key column names
    pub pk_cols: Vec<String>,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
}

impl Table {
    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table has a column.
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A table column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// PostgreSQL data type
    pub data_type: String,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Column position (1-based)
    pub position: i32,
    /// Whether this is part of the primary key
    pub is_pk: bool,
}

impl Column {
    /// Check if this is a JSON/JSONB column.
    pub fn is_json(&self) -> bool {
        self.data_type == "json" || self.data_type == "jsonb"
    }

    /// Check if this is an array type.
    pub fn is_array(&self) -> bool {
        self.data_type.starts_with('_') || self.data_type.ends_with("[]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table {
            schema: "public".into(),
            name: "users".into(),
            is_view: false,
            pk_cols: vec!["id".into()],
            columns: vec![
                Column {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    nullable: false,
                    position: 1,
                    is_pk: true,
                },
                Column {
                    name: "profile".into(),
                    data_type: "jsonb".into(),
                    nullable: true,
                    position: 2,
                    is_pk: false,
                },
            ],
        }
    }

    #[test]
    fn test_get_column() {
        let table = sample_table();
        assert!(table.has_column("id"));
        assert!(!table.has_column("missing"));
        assert!(table.get_column("profile").unwrap().is_json());
    }

    #[test]
    fn test_column_names_in_order() {
        let table = sample_table();
        let names: Vec<_> = table.column_names().collect();
        assert_eq!(names, vec!["id", "profile"]);
    }
}
