//! Generic CRUD execution for registered model views.

use crate::error::AppError;
use crate::registry::ModelView;
use crate::service::FormReader;
use crate::sql::{count, delete, insert, row_id, select_by_pk, select_page, update, ListParams, QueryBuf};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::collections::HashMap;

/// Rows an export may contain.
pub const EXPORT_LIMIT: u32 = 10_000;

/// One row of any reflected table: every cell read as text, in column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: Option<String>,
    pub cells: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Values for `columns`, NULL as None.
    pub fn values<'a>(&'a self, columns: &[&str]) -> Vec<Option<&'a str>> {
        columns.iter().map(|c| self.get(c)).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .cells
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    v.clone().map(serde_json::Value::String).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: u64,
    /// Zero-based page index.
    pub page: u64,
    pub page_count: u64,
}

pub struct AdminService;

impl AdminService {
    /// One page of the list view. `page` is zero-based and clamped to the last page.
    pub async fn list(
        pool: &PgPool,
        schema: &str,
        view: &ModelView,
        params: &ListParams,
        page: u64,
    ) -> Result<Page, AppError> {
        let page_size = view.capabilities.page_size.max(1);
        let cq = count(schema, &view.table, &view.config, params);
        let total = Self::fetch_count(pool, &cq).await?;
        let page_count = total.div_ceil(page_size as u64).max(1);
        let page = page.min(page_count - 1);
        let q = select_page(
            schema,
            &view.table,
            &view.config,
            params,
            page_size,
            page * page_size as u64,
        );
        let records = Self::fetch_all(pool, view, &q).await?;
        Ok(Page {
            records,
            total,
            page,
            page_count,
        })
    }

    /// All rows matching `params`, up to `EXPORT_LIMIT`.
    pub async fn export_rows(
        pool: &PgPool,
        schema: &str,
        view: &ModelView,
        params: &ListParams,
    ) -> Result<Vec<Record>, AppError> {
        let q = select_page(schema, &view.table, &view.config, params, EXPORT_LIMIT, 0);
        Self::fetch_all(pool, view, &q).await
    }

    pub async fn read(pool: &PgPool, schema: &str, view: &ModelView, id: &str) -> Result<Option<Record>, AppError> {
        let q = select_by_pk(schema, &view.table, id).ok_or_else(|| Self::bad_id(view, id))?;
        Self::fetch_optional(pool, view, &q).await
    }

    pub async fn create(
        pool: &PgPool,
        schema: &str,
        view: &ModelView,
        form: &HashMap<String, String>,
    ) -> Result<Record, AppError> {
        let values = FormReader::assignments(&view.table, form, true)?;
        let q = insert(schema, &view.table, &values);
        Self::fetch_optional(pool, view, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    pub async fn update(
        pool: &PgPool,
        schema: &str,
        view: &ModelView,
        id: &str,
        form: &HashMap<String, String>,
    ) -> Result<Option<Record>, AppError> {
        let values = FormReader::assignments(&view.table, form, false)?;
        let q = update(schema, &view.table, id, &values).ok_or_else(|| Self::bad_id(view, id))?;
        Self::fetch_optional(pool, view, &q).await
    }

    /// Returns whether a row was deleted.
    pub async fn delete(pool: &PgPool, schema: &str, view: &ModelView, id: &str) -> Result<bool, AppError> {
        let q = delete(schema, &view.table, id).ok_or_else(|| Self::bad_id(view, id))?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        let result = query.execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    fn bad_id(view: &ModelView, id: &str) -> AppError {
        AppError::BadRequest(format!("{} is not a row id of {}", id, view.table.name))
    }

    async fn fetch_count(pool: &PgPool, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        let n = query.fetch_one(pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn fetch_all(pool: &PgPool, view: &ModelView, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        let rows = query.fetch_all(pool).await?;
        rows.iter().map(|r| row_to_record(view, r)).collect()
    }

    async fn fetch_optional(pool: &PgPool, view: &ModelView, q: &QueryBuf) -> Result<Option<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        let row = query.fetch_optional(pool).await?;
        row.map(|r| row_to_record(view, &r)).transpose()
    }
}

fn row_to_record(view: &ModelView, row: &PgRow) -> Result<Record, AppError> {
    use sqlx::Row;
    let mut cells = Vec::with_capacity(view.table.columns.len());
    for (i, c) in view.table.columns.iter().enumerate() {
        let v: Option<String> = row.try_get(i)?;
        cells.push((c.name.clone(), v));
    }
    let id = row_id(&view.table, |column| {
        cells
            .iter()
            .find(|(n, _)| n == column)
            .and_then(|(_, v)| v.as_deref())
    });
    Ok(Record { id, cells })
}
