//! Turns submitted form fields into typed column assignments.

use crate::error::AppError;
use crate::schema::TableDescriptor;
use std::collections::HashMap;

fn is_text_like(declared_type: &str) -> bool {
    let tag = declared_type.to_uppercase();
    tag.contains("TEXT") || tag.contains("CHAR")
}

pub struct FormReader;

impl FormReader {
    /// Assignments for the columns present in `form`, in schema order.
    ///
    /// An empty field becomes NULL on nullable columns, is omitted on create when the
    /// column has a default, stays an empty string on NOT NULL text columns, and is
    /// otherwise a validation error.
    pub fn assignments(
        table: &TableDescriptor,
        form: &HashMap<String, String>,
        creating: bool,
    ) -> Result<Vec<(String, Option<String>)>, AppError> {
        let mut out = Vec::new();
        for c in &table.columns {
            let Some(raw) = form.get(&c.name) else { continue };
            if !creating && table.is_primary_key(&c.name) {
                continue;
            }
            if !raw.is_empty() {
                out.push((c.name.clone(), Some(raw.clone())));
                continue;
            }
            if creating && c.has_default {
                continue;
            }
            if c.nullable {
                out.push((c.name.clone(), None));
            } else if is_text_like(&c.declared_type) {
                out.push((c.name.clone(), Some(String::new())));
            } else {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDescriptor;

    fn table() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", "integer");
        id.nullable = false;
        id.has_default = true;
        let mut name = ColumnDescriptor::new("name", "text");
        name.nullable = false;
        let mut age = ColumnDescriptor::new("age", "integer");
        age.nullable = false;
        let note = ColumnDescriptor::new("note", "text");
        TableDescriptor {
            name: "people".into(),
            columns: vec![id, name, age, note],
            primary_key: vec!["id".into()],
        }
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn create_omits_defaulted_empty_columns() {
        let out = FormReader::assignments(
            &table(),
            &form(&[("id", ""), ("name", ""), ("age", "3"), ("note", ""), ("csrf_token", "t")]),
            true,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                ("name".to_string(), Some(String::new())),
                ("age".to_string(), Some("3".to_string())),
                ("note".to_string(), None),
            ]
        );
    }

    #[test]
    fn required_non_text_column_is_rejected() {
        let err = FormReader::assignments(&table(), &form(&[("age", "")]), true).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "age is required"));
    }

    #[test]
    fn edit_never_assigns_primary_key() {
        let out = FormReader::assignments(&table(), &form(&[("id", "9"), ("age", "4")]), false).unwrap();
        assert_eq!(out, vec![("age".to_string(), Some("4".to_string()))]);
    }
}
