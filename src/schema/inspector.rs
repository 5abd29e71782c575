//! Schema introspection seam. `PgInspector` reads pg_catalog; `MemoryInspector` serves a fixed schema.

use crate::error::DiscoveryError;
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::sql::qualified_table;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;

#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// All table names visible to the admin, in any order.
    async fn table_names(&self) -> Result<Vec<String>, DiscoveryError>;

    /// Reflect one table: columns in declaration order plus its primary key.
    async fn reflect_table(&self, name: &str) -> Result<TableDescriptor, DiscoveryError>;
}

const TABLES_QUERY: &str = r#"
SELECT c.relname
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relkind IN ('r', 'p')
ORDER BY c.relname
"#;

const COLUMNS_QUERY: &str = r#"
SELECT a.attname::text,
       pg_catalog.format_type(a.atttypid, a.atttypmod),
       NOT a.attnotnull,
       a.atthasdef
FROM pg_catalog.pg_attribute a
WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum
"#;

const PRIMARY_KEY_QUERY: &str = r#"
SELECT a.attname::text
FROM pg_catalog.pg_index i
JOIN pg_catalog.pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
WHERE i.indrelid = to_regclass($1) AND i.indisprimary
ORDER BY array_position(i.indkey::int2[], a.attnum)
"#;

/// Introspects one PostgreSQL schema through a shared pool.
#[derive(Clone)]
pub struct PgInspector {
    pool: PgPool,
    schema: String,
}

impl PgInspector {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgInspector {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl SchemaInspector for PgInspector {
    async fn table_names(&self) -> Result<Vec<String>, DiscoveryError> {
        tracing::debug!(sql = %TABLES_QUERY.trim(), schema = %self.schema, "query");
        sqlx::query_scalar::<_, String>(TABLES_QUERY)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DiscoveryError::Listing(e.to_string()))
    }

    async fn reflect_table(&self, name: &str) -> Result<TableDescriptor, DiscoveryError> {
        let reflection = |e: sqlx::Error| DiscoveryError::Reflection {
            table: name.to_string(),
            message: e.to_string(),
        };
        let regclass = qualified_table(&self.schema, name);

        let rows = sqlx::query_as::<_, (String, String, bool, bool)>(COLUMNS_QUERY)
            .bind(&regclass)
            .fetch_all(&self.pool)
            .await
            .map_err(reflection)?;
        if rows.is_empty() {
            return Err(DiscoveryError::Reflection {
                table: name.to_string(),
                message: "table has no columns or no longer exists".into(),
            });
        }
        let columns = rows
            .into_iter()
            .map(|(name, declared_type, nullable, has_default)| ColumnDescriptor {
                name,
                declared_type,
                nullable,
                has_default,
            })
            .collect();

        let primary_key = sqlx::query_scalar::<_, String>(PRIMARY_KEY_QUERY)
            .bind(&regclass)
            .fetch_all(&self.pool)
            .await
            .map_err(reflection)?;

        Ok(TableDescriptor {
            name: name.to_string(),
            columns,
            primary_key,
        })
    }
}

/// Fixed in-memory schema. Tables can be marked as failing reflection.
#[derive(Clone, Debug, Default)]
pub struct MemoryInspector {
    tables: BTreeMap<String, Result<TableDescriptor, String>>,
}

impl MemoryInspector {
    pub fn new() -> Self {
        MemoryInspector::default()
    }

    pub fn with_table(mut self, table: TableDescriptor) -> Self {
        self.tables.insert(table.name.clone(), Ok(table));
        self
    }

    /// A table that is listed but whose reflection fails with `message`.
    pub fn with_broken_table(mut self, name: &str, message: &str) -> Self {
        self.tables.insert(name.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl SchemaInspector for MemoryInspector {
    async fn table_names(&self) -> Result<Vec<String>, DiscoveryError> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn reflect_table(&self, name: &str) -> Result<TableDescriptor, DiscoveryError> {
        match self.tables.get(name) {
            Some(Ok(table)) => Ok(table.clone()),
            Some(Err(message)) => Err(DiscoveryError::Reflection {
                table: name.to_string(),
                message: message.clone(),
            }),
            None => Err(DiscoveryError::Reflection {
                table: name.to_string(),
                message: "no such table".into(),
            }),
        }
    }
}
