//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE for a reflected table.
//! Every column is read back as text; every value is bound as text and cast to the column type.

use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::view::ViewConfig;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Option<String>) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// List-page request, already parsed from the query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub search: Option<String>,
    /// Equality filters; only filterable columns are honoured.
    pub filters: Vec<(String, String)>,
    pub sort: Option<String>,
    pub desc: bool,
}

fn cast_placeholder(n: usize, column: &ColumnDescriptor) -> String {
    format!("${}::{}", n, column.declared_type)
}

/// SELECT list: each column as text so any type reads back uniformly.
fn select_column_list(table: &TableDescriptor) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            format!("{}::text AS {}", q, q)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

const ID_SEPARATOR: char = ',';

/// Row id for a composite key: values joined by `,`, with `.` and `,` inside a value
/// escaped as `.2E` and `.2C`. Single-column keys use the raw value.
pub fn encode_row_id(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| v.replace('.', ".2E").replace(',', ".2C"))
        .collect::<Vec<_>>()
        .join(&ID_SEPARATOR.to_string())
}

pub fn decode_row_id(id: &str) -> Vec<String> {
    id.split(ID_SEPARATOR)
        .map(|part| part.replace(".2C", ",").replace(".2E", "."))
        .collect()
}

/// Id of a row given its column values; None when the table has no key or a key value is NULL.
pub fn row_id<'a>(table: &TableDescriptor, value: impl Fn(&str) -> Option<&'a str>) -> Option<String> {
    let values = table
        .primary_key
        .iter()
        .map(|pk| value(pk.as_str()))
        .collect::<Option<Vec<&str>>>()?;
    match values.as_slice() {
        [] => None,
        [single] => Some(single.to_string()),
        _ => Some(encode_row_id(&values)),
    }
}

/// `k1 = $n::t1 AND k2 = $m::t2` over every key column. None when the table has no
/// key or `id` does not carry one value per key column.
fn key_predicate(q: &mut QueryBuf, table: &TableDescriptor, id: &str) -> Option<String> {
    let columns = table
        .primary_key
        .iter()
        .map(|pk| table.column(pk))
        .collect::<Option<Vec<&ColumnDescriptor>>>()?;
    let values = match columns.len() {
        0 => return None,
        1 => vec![id.to_string()],
        _ => decode_row_id(id),
    };
    if values.len() != columns.len() {
        return None;
    }
    let parts: Vec<String> = columns
        .iter()
        .zip(values)
        .map(|(c, v)| {
            let n = q.push_param(Some(v));
            format!("{} = {}", quoted(&c.name), cast_placeholder(n, c))
        })
        .collect();
    Some(parts.join(" AND "))
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn where_clause(q: &mut QueryBuf, table: &TableDescriptor, view: &ViewConfig, params: &ListParams) -> String {
    let mut where_parts = Vec::new();

    if let (Some(term), Some(cols)) = (
        params.search.as_deref().map(str::trim).filter(|t| !t.is_empty()),
        view.searchable_columns.as_ref(),
    ) {
        let n = q.push_param(Some(like_pattern(term)));
        let ors: Vec<String> = cols
            .iter()
            .map(|c| format!("{}::text ILIKE ${}", quoted(c), n))
            .collect();
        if !ors.is_empty() {
            where_parts.push(format!("({})", ors.join(" OR ")));
        }
    }

    for (col, val) in &params.filters {
        if !view.can_filter(col) {
            continue;
        }
        let Some(c) = table.column(col) else { continue };
        let n = q.push_param(Some(val.clone()));
        where_parts.push(format!("{} = {}", quoted(col), cast_placeholder(n, c)));
    }

    if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    }
}

fn order_clause(table: &TableDescriptor, view: &ViewConfig, params: &ListParams) -> String {
    let mut keys = Vec::new();
    if let Some(col) = params.sort.as_deref().filter(|c| view.can_sort(c)) {
        keys.push(format!("{} {}", quoted(col), if params.desc { "DESC" } else { "ASC" }));
    }
    for pk in &table.primary_key {
        if params.sort.as_deref() != Some(pk.as_str()) || keys.is_empty() {
            keys.push(quoted(pk));
        }
    }
    if keys.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", keys.join(", "))
    }
}

/// One page of rows with search, filters and sort applied.
pub fn select_page(
    schema: &str,
    table: &TableDescriptor,
    view: &ViewConfig,
    params: &ListParams,
    limit: u32,
    offset: u64,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, table, view, params);
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(table),
        qualified_table(schema, &table.name),
        where_sql,
        order_clause(table, view, params),
        limit,
        offset
    );
    q
}

/// Row count under the same search and filters as `select_page`.
pub fn count(schema: &str, table: &TableDescriptor, view: &ViewConfig, params: &ListParams) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, table, view, params);
    q.sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        qualified_table(schema, &table.name),
        where_sql
    );
    q
}

/// SELECT by primary key. Returns None for tables without a key or a malformed id.
pub fn select_by_pk(schema: &str, table: &TableDescriptor, id: &str) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let predicate = key_predicate(&mut q, table, id)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_column_list(table),
        qualified_table(schema, &table.name),
        predicate
    );
    Some(q)
}

/// INSERT with the given assignments; DEFAULT VALUES when there are none.
pub fn insert(schema: &str, table: &TableDescriptor, values: &[(String, Option<String>)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, val) in values {
        let Some(c) = table.column(name) else { continue };
        let n = q.push_param(val.clone());
        cols.push(quoted(name));
        placeholders.push(cast_placeholder(n, c));
    }
    let target = qualified_table(schema, &table.name);
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", target, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by primary key: SET only known, non-key columns. Falls back to a plain SELECT when nothing changes.
pub fn update(
    schema: &str,
    table: &TableDescriptor,
    id: &str,
    values: &[(String, Option<String>)],
) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (name, val) in values {
        if table.is_primary_key(name) {
            continue;
        }
        let Some(c) = table.column(name) else { continue };
        let n = q.push_param(val.clone());
        sets.push(format!("{} = {}", quoted(name), cast_placeholder(n, c)));
    }
    if sets.is_empty() {
        return select_by_pk(schema, table, id);
    }
    let predicate = key_predicate(&mut q, table, id)?;
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified_table(schema, &table.name),
        sets.join(", "),
        predicate,
        select_column_list(table)
    );
    Some(q)
}

/// DELETE by primary key; every key column must match.
pub fn delete(schema: &str, table: &TableDescriptor, id: &str) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let predicate = key_predicate(&mut q, table, id)?;
    q.sql = format!(
        "DELETE FROM {} WHERE {}",
        qualified_table(schema, &table.name),
        predicate
    );
    Some(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{configure, ViewOptions};

    fn people() -> TableDescriptor {
        TableDescriptor {
            name: "people".into(),
            columns: vec![
                ColumnDescriptor::new("id", "integer"),
                ColumnDescriptor::new("name", "character varying(80)"),
                ColumnDescriptor::new("age", "integer"),
                ColumnDescriptor::new("bio", "text"),
            ],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn quoting_escapes_double_quotes() {
        assert_eq!(quoted("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified_table("public", "my.table"), "\"public\".\"my.table\"");
    }

    #[test]
    fn plain_page_orders_by_pk() {
        let table = people();
        let view = configure(&table, &ViewOptions::default());
        let q = select_page("public", &table, &view, &ListParams::default(), 50, 100);
        assert_eq!(
            q.sql,
            "SELECT \"id\"::text AS \"id\", \"name\"::text AS \"name\", \"age\"::text AS \"age\", \"bio\"::text AS \"bio\" \
             FROM \"public\".\"people\" ORDER BY \"id\" LIMIT 50 OFFSET 100"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn search_filters_and_sort() {
        let table = people();
        let view = configure(&table, &ViewOptions::default());
        let params = ListParams {
            search: Some(" 50%_off ".into()),
            filters: vec![("age".into(), "42".into()), ("bio".into(), "ignored".into())],
            sort: Some("name".into()),
            desc: true,
        };
        let q = count("public", &table, &view, &params);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"public\".\"people\" WHERE (\"name\"::text ILIKE $1 OR \"bio\"::text ILIKE $1) AND \"age\" = $2::integer"
        );
        assert_eq!(q.params, vec![Some("%50\\%\\_off%".into()), Some("42".into())]);

        let page = select_page("public", &table, &view, &params, 10, 0);
        assert!(page.sql.ends_with("ORDER BY \"name\" DESC, \"id\" LIMIT 10 OFFSET 0"));
    }

    #[test]
    fn unsortable_column_falls_back_to_pk() {
        let table = people();
        let view = configure(&table, &ViewOptions::default());
        let params = ListParams {
            sort: Some("nope; DROP TABLE people".into()),
            ..ListParams::default()
        };
        let q = select_page("public", &table, &view, &params, 10, 0);
        assert!(q.sql.contains("ORDER BY \"id\" LIMIT"));
        assert!(!q.sql.contains("DROP"));
    }

    #[test]
    fn sort_by_pk_is_not_repeated() {
        let table = people();
        let view = configure(&table, &ViewOptions::default());
        let params = ListParams {
            sort: Some("id".into()),
            desc: true,
            ..ListParams::default()
        };
        let q = select_page("public", &table, &view, &params, 10, 0);
        assert!(q.sql.contains("ORDER BY \"id\" DESC LIMIT"));
    }

    #[test]
    fn insert_casts_each_value() {
        let table = people();
        let q = insert(
            "public",
            &table,
            &[("name".into(), Some("Ada".into())), ("age".into(), None), ("ghost".into(), Some("x".into()))],
        );
        assert!(q.sql.starts_with(
            "INSERT INTO \"public\".\"people\" (\"name\", \"age\") VALUES ($1::character varying(80), $2::integer) RETURNING "
        ));
        assert_eq!(q.params, vec![Some("Ada".into()), None]);
    }

    #[test]
    fn empty_insert_uses_defaults() {
        let q = insert("public", &people(), &[]);
        assert!(q.sql.starts_with("INSERT INTO \"public\".\"people\" DEFAULT VALUES RETURNING"));
    }

    #[test]
    fn update_skips_primary_key() {
        let table = people();
        let q = update(
            "public",
            &table,
            "7",
            &[("id".into(), Some("8".into())), ("age".into(), Some("43".into()))],
        )
        .unwrap();
        assert!(q.sql.starts_with("UPDATE \"public\".\"people\" SET \"age\" = $1::integer WHERE \"id\" = $2::integer RETURNING"));
        assert_eq!(q.params, vec![Some("43".into()), Some("7".into())]);
    }

    #[test]
    fn update_without_changes_reads_row() {
        let q = update("public", &people(), "7", &[]).unwrap();
        assert!(q.sql.starts_with("SELECT "));
        assert_eq!(q.params, vec![Some("7".into())]);
    }

    #[test]
    fn delete_needs_primary_key() {
        let mut table = people();
        let q = delete("public", &table, "3").unwrap();
        assert_eq!(q.sql, "DELETE FROM \"public\".\"people\" WHERE \"id\" = $1::integer");
        table.primary_key.clear();
        assert!(delete("public", &table, "3").is_none());
        assert!(select_by_pk("public", &table, "3").is_none());
    }

    fn enrollments() -> TableDescriptor {
        TableDescriptor {
            name: "enrollments".into(),
            columns: vec![
                ColumnDescriptor::new("student_id", "integer"),
                ColumnDescriptor::new("course_id", "text"),
                ColumnDescriptor::new("grade", "text"),
            ],
            primary_key: vec!["student_id".into(), "course_id".into()],
        }
    }

    #[test]
    fn composite_key_matches_every_key_column() {
        let table = enrollments();
        let id = encode_row_id(&["1", "math,1.0"]);
        assert_eq!(id, "1,math.2C1.2E0");

        let q = delete("public", &table, &id).unwrap();
        assert_eq!(
            q.sql,
            "DELETE FROM \"public\".\"enrollments\" WHERE \"student_id\" = $1::integer AND \"course_id\" = $2::text"
        );
        assert_eq!(q.params, vec![Some("1".into()), Some("math,1.0".into())]);

        let q = update("public", &table, &id, &[("grade".into(), Some("A".into()))]).unwrap();
        assert!(q.sql.contains("WHERE \"student_id\" = $2::integer AND \"course_id\" = $3::text RETURNING"));

        let q = select_by_pk("public", &table, &id).unwrap();
        assert!(q.sql.ends_with("WHERE \"student_id\" = $1::integer AND \"course_id\" = $2::text"));
    }

    #[test]
    fn composite_key_rejects_partial_ids() {
        let table = enrollments();
        assert!(delete("public", &table, "1").is_none());
        assert!(update("public", &table, "1", &[("grade".into(), Some("A".into()))]).is_none());
        assert!(select_by_pk("public", &table, "1,2,3").is_none());
    }

    #[test]
    fn row_ids_round_trip_through_escaping() {
        let table = enrollments();
        let cells = [("student_id", "7"), ("course_id", "a.2C,b"), ("grade", "B")];
        let lookup = |c: &str| cells.iter().find(|(n, _)| *n == c).map(|(_, v)| *v);
        let id = row_id(&table, lookup).unwrap();
        assert_eq!(decode_row_id(&id), vec!["7".to_string(), "a.2C,b".to_string()]);

        assert_eq!(row_id(&people(), |c: &str| (c == "id").then_some("a,b")), Some("a,b".into()));
        assert_eq!(row_id(&table, |c: &str| (c == "student_id").then_some("7")), None);
    }
}
