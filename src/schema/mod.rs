//! Reflected table metadata, produced fresh from the live database on every startup.

pub mod inspector;

pub use inspector::*;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type as the database prints it (e.g. "character varying(255)", "integer").
    pub declared_type: String,
    pub nullable: bool,
    /// Whether the column has a DB default (serial, NOW(), ...).
    pub has_default: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        ColumnDescriptor {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            has_default: false,
        }
    }

    /// Upper-cased type tag used for classification.
    pub fn type_tag(&self) -> String {
        self.declared_type.to_uppercase()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key column names in key order. Empty when the table has none.
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == column)
    }
}
