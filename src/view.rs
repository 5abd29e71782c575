//! View auto-configuration: list, search, filter and sort columns derived from a reflected table.

use crate::error::ViewConfigError;
use crate::schema::{ColumnDescriptor, TableDescriptor};
use serde::Serialize;

pub const MAX_LIST_COLUMNS: usize = 10;
pub const MAX_SEARCHABLE_COLUMNS: usize = 5;
pub const MAX_FILTERABLE_COLUMNS: usize = 5;

const TEXT_TYPE_TAGS: &[&str] = &["TEXT", "VARCHAR", "CHAR", "STRING"];
const FILTER_TYPE_TAGS: &[&str] = &["DATE", "TIMESTAMP", "BOOLEAN", "INTEGER", "FLOAT", "NUMERIC"];

/// Per-table overrides supplied at registration time.
#[derive(Clone, Debug, Default)]
pub struct ViewOptions {
    pub display_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xls,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xls" => Some(ExportFormat::Xls),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xls => "xls",
        }
    }
}

/// What every auto-generated view allows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewCapabilities {
    pub page_size: u32,
    pub can_view_details: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_export: bool,
    pub export_types: Vec<ExportFormat>,
}

impl Default for ViewCapabilities {
    fn default() -> Self {
        ViewCapabilities {
            page_size: 50,
            can_view_details: true,
            can_create: true,
            can_edit: true,
            can_delete: true,
            can_export: true,
            export_types: vec![ExportFormat::Csv, ExportFormat::Xls],
        }
    }
}

impl ViewCapabilities {
    pub fn allows_export(&self, format: ExportFormat) -> bool {
        self.can_export && self.export_types.contains(&format)
    }
}

/// Derived view settings. `None` fields fall back to the UI default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewConfig {
    pub display_name: String,
    pub list_columns: Option<Vec<String>>,
    pub searchable_columns: Option<Vec<String>>,
    pub filterable_columns: Option<Vec<String>>,
    pub sortable_columns: Option<Vec<String>>,
    /// Derivation failures that left a field unset.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ViewConfig {
    pub fn is_searchable(&self) -> bool {
        self.searchable_columns.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn can_filter(&self, column: &str) -> bool {
        self.filterable_columns
            .as_ref()
            .is_some_and(|c| c.iter().any(|n| n == column))
    }

    pub fn can_sort(&self, column: &str) -> bool {
        self.sortable_columns
            .as_ref()
            .is_some_and(|c| c.iter().any(|n| n == column))
    }
}

/// Derive the view config for `table`. A failing field is logged and left unset.
pub fn configure(table: &TableDescriptor, options: &ViewOptions) -> ViewConfig {
    let mut warnings = Vec::new();
    let mut settle = |field: &str, result: Result<Vec<String>, ViewConfigError>| match result {
        Ok(cols) if cols.is_empty() => None,
        Ok(cols) => Some(cols),
        Err(e) => {
            tracing::warn!(table = %table.name, field, error = %e, "could not derive view field, using default");
            warnings.push(format!("{}: {}", field, e));
            None
        }
    };

    let list_columns = settle("list_columns", list_columns(&table.columns));
    let searchable_columns = settle("searchable_columns", searchable_columns(&table.columns));
    let filterable_columns = settle("filterable_columns", filterable_columns(&table.columns));
    let sortable_columns = settle("sortable_columns", sortable_columns(&table.columns));

    ViewConfig {
        display_name: options
            .display_name
            .clone()
            .unwrap_or_else(|| table.name.clone()),
        list_columns,
        searchable_columns,
        filterable_columns,
        sortable_columns,
        warnings,
    }
}

fn checked_name(index: usize, column: &ColumnDescriptor) -> Result<&str, ViewConfigError> {
    if column.name.is_empty() {
        return Err(ViewConfigError::EmptyColumnName { index });
    }
    Ok(&column.name)
}

fn checked_tag(column: &ColumnDescriptor) -> Result<String, ViewConfigError> {
    let tag = column.type_tag();
    if tag.trim().is_empty() {
        return Err(ViewConfigError::MissingType {
            column: column.name.clone(),
        });
    }
    Ok(tag)
}

/// Every column except "id", in schema order, capped at ten.
pub fn list_columns(columns: &[ColumnDescriptor]) -> Result<Vec<String>, ViewConfigError> {
    let mut out = Vec::new();
    for (i, c) in columns.iter().enumerate() {
        let name = checked_name(i, c)?;
        if name != "id" && out.len() < MAX_LIST_COLUMNS {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

fn columns_with_tags(
    columns: &[ColumnDescriptor],
    tags: &[&str],
    cap: usize,
) -> Result<Vec<String>, ViewConfigError> {
    let mut out = Vec::new();
    for (i, c) in columns.iter().enumerate() {
        let name = checked_name(i, c)?;
        let tag = checked_tag(c)?;
        if tags.iter().any(|t| tag.contains(t)) {
            out.push(name.to_string());
        }
    }
    out.truncate(cap);
    Ok(out)
}

/// Text-like columns: type tag contains TEXT, VARCHAR, CHAR or STRING.
pub fn searchable_columns(columns: &[ColumnDescriptor]) -> Result<Vec<String>, ViewConfigError> {
    columns_with_tags(columns, TEXT_TYPE_TAGS, MAX_SEARCHABLE_COLUMNS)
}

/// Scalar, date and boolean columns.
pub fn filterable_columns(columns: &[ColumnDescriptor]) -> Result<Vec<String>, ViewConfigError> {
    columns_with_tags(columns, FILTER_TYPE_TAGS, MAX_FILTERABLE_COLUMNS)
}

pub fn sortable_columns(columns: &[ColumnDescriptor]) -> Result<Vec<String>, ViewConfigError> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| checked_name(i, c).map(str::to_string))
        .collect()
}
