//! Schema discovery: which reflected tables are eligible for administration.

use crate::error::DiscoveryError;
use crate::schema::{SchemaInspector, TableDescriptor};
use std::fmt;

/// Framework and database bookkeeping tables that are never administered.
pub const SYSTEM_TABLES: &[&str] = &[
    "alembic_version",
    "auth_group",
    "auth_group_permissions",
    "auth_permission",
    "auth_user",
    "auth_user_groups",
    "auth_user_user_permissions",
    "django_admin_log",
    "django_content_type",
    "django_migrations",
    "django_session",
    "pg_stat_statements",
    "pg_stat_statements_info",
];

pub const SYSTEM_PREFIXES: &[&str] = &["auth_", "django_", "pg_", "sql_", "alembic_", "information_schema"];

/// Longest error text kept for a reflection failure.
const ERROR_SNIPPET_LEN: usize = 80;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    SystemTable,
    NoPrimaryKey,
    ReflectionFailed(String),
    /// Accepted by discovery but rejected when building its view.
    RegistrationFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SystemTable => write!(f, "system table"),
            SkipReason::NoPrimaryKey => write!(f, "no primary key found (cannot edit without PK)"),
            SkipReason::ReflectionFailed(msg) => write!(f, "reflection failed: {}", msg),
            SkipReason::RegistrationFailed(msg) => write!(f, "registration failed: {}", msg),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedTable {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Number of tables the inspector listed.
    pub total_found: usize,
    /// Eligible tables in alphabetical order.
    pub tables: Vec<TableDescriptor>,
    pub skipped: Vec<SkippedTable>,
}

impl DiscoveryReport {
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

pub fn is_system_table(name: &str) -> bool {
    SYSTEM_TABLES.contains(&name) || SYSTEM_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Cut an error message to a short single-line snippet on a char boundary.
pub fn truncate_message(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default();
    match line.char_indices().nth(ERROR_SNIPPET_LEN) {
        Some((idx, _)) => line[..idx].to_string(),
        None => line.to_string(),
    }
}

/// Enumerate, filter and reflect tables. Never fails: every problem becomes a logged skip.
pub async fn discover(inspector: &dyn SchemaInspector) -> DiscoveryReport {
    let mut names = match inspector.table_names().await {
        Ok(names) => names,
        Err(e) => {
            tracing::error!(error = %e, "could not list database tables");
            return DiscoveryReport::default();
        }
    };
    names.sort();
    names.dedup();
    tracing::info!(count = names.len(), "found tables in database");

    let mut report = DiscoveryReport {
        total_found: names.len(),
        ..DiscoveryReport::default()
    };

    for name in names {
        if is_system_table(&name) {
            tracing::info!(table = %name, "skipped system table");
            report.skipped.push(SkippedTable {
                name,
                reason: SkipReason::SystemTable,
            });
            continue;
        }

        let table = match inspector.reflect_table(&name).await {
            Ok(table) => table,
            Err(e) => {
                let message = match e {
                    DiscoveryError::Reflection { message, .. } => message,
                    other => other.to_string(),
                };
                let snippet = truncate_message(&message);
                tracing::warn!(table = %name, error = %snippet, "skipped table: reflection failed");
                report.skipped.push(SkippedTable {
                    name,
                    reason: SkipReason::ReflectionFailed(snippet),
                });
                continue;
            }
        };

        if !table.has_primary_key() {
            tracing::warn!(table = %name, "skipped table: no primary key found (cannot edit without PK)");
            report.skipped.push(SkippedTable {
                name,
                reason: SkipReason::NoPrimaryKey,
            });
            continue;
        }

        tracing::debug!(table = %name, columns = table.columns.len(), "reflected table");
        report.tables.push(table);
    }
    report
}
