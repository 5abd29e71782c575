//! Registration driver: turns discovered tables into model views held by an explicit registry.

use crate::discovery::{discover, SkipReason, SkippedTable};
use crate::error::RegistrationError;
use crate::schema::{SchemaInspector, TableDescriptor};
use crate::view::{configure, ViewCapabilities, ViewConfig, ViewOptions};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Characters that cannot appear in an endpoint name.
fn endpoint_unsafe() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ .\-]").expect("static regex"))
}

/// URL-safe endpoint: spaces, hyphens and dots become underscores.
pub fn sanitize_endpoint(table_name: &str) -> String {
    endpoint_unsafe().replace_all(table_name, "_").into_owned()
}

/// Canonical UpperCamelCase model name, e.g. "order_items" -> "OrderItems".
pub fn model_name(table_name: &str) -> String {
    table_name
        .split(|c: char| c == '_' || c == ' ' || c == '-' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// A registered admin view over one reflected table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelView {
    pub endpoint: String,
    pub model_name: String,
    pub table: TableDescriptor,
    pub config: ViewConfig,
    pub capabilities: ViewCapabilities,
}

impl ModelView {
    pub fn new(table: TableDescriptor, options: &ViewOptions) -> Result<Self, RegistrationError> {
        if !table.has_primary_key() {
            return Err(RegistrationError::NoPrimaryKey(table.name.clone()));
        }
        let config = configure(&table, options);
        Ok(ModelView {
            endpoint: sanitize_endpoint(&table.name),
            model_name: model_name(&table.name),
            table,
            config,
            capabilities: ViewCapabilities::default(),
        })
    }

    /// Columns shown on the list page: the configured list or every column.
    pub fn list_columns(&self) -> Vec<&str> {
        match &self.config.list_columns {
            Some(cols) => cols.iter().map(String::as_str).collect(),
            None => self.table.column_names().collect(),
        }
    }
}

/// Application context holding every registered view, in registration order.
#[derive(Clone, Debug, Default)]
pub struct AdminRegistry {
    views: Vec<ModelView>,
    by_endpoint: HashMap<String, usize>,
}

impl AdminRegistry {
    pub fn new() -> Self {
        AdminRegistry::default()
    }

    pub fn add_view(&mut self, view: ModelView) -> Result<(), RegistrationError> {
        if let Some(&idx) = self.by_endpoint.get(&view.endpoint) {
            return Err(RegistrationError::DuplicateEndpoint {
                endpoint: view.endpoint,
                existing: self.views[idx].table.name.clone(),
            });
        }
        self.by_endpoint.insert(view.endpoint.clone(), self.views.len());
        self.views.push(view);
        Ok(())
    }

    pub fn view(&self, endpoint: &str) -> Option<&ModelView> {
        self.by_endpoint.get(endpoint).map(|&i| &self.views[i])
    }

    pub fn views(&self) -> &[ModelView] {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub registered: usize,
    pub skipped: usize,
    pub skipped_no_primary_key: usize,
    pub skipped_tables: Vec<SkippedTable>,
}

impl RegistrationSummary {
    fn skip(&mut self, table: SkippedTable) {
        if table.reason == SkipReason::NoPrimaryKey {
            self.skipped_no_primary_key += 1;
        }
        self.skipped += 1;
        self.skipped_tables.push(table);
    }

    /// Emit the end-of-startup summary.
    pub fn log(&self) {
        tracing::info!(
            registered = self.registered,
            skipped = self.skipped,
            "table registration finished"
        );
        if self.skipped_no_primary_key > 0 {
            tracing::info!(
                count = self.skipped_no_primary_key,
                "some tables were skipped because they lack primary keys; rows cannot be edited without one. \
                 Add a primary key column to include them"
            );
        }
    }
}

/// Discover every eligible table and register a view for each. Per-table failures are skips.
pub async fn register_all(
    inspector: &dyn SchemaInspector,
    registry: &mut AdminRegistry,
    overrides: &HashMap<String, ViewOptions>,
) -> RegistrationSummary {
    tracing::info!("discovering database tables");
    let report = discover(inspector).await;

    let mut summary = RegistrationSummary::default();
    for skipped in report.skipped {
        summary.skip(skipped);
    }

    let default_options = ViewOptions::default();
    for table in report.tables {
        let name = table.name.clone();
        let options = overrides.get(&name).unwrap_or(&default_options);
        let result = ModelView::new(table, options).and_then(|view| {
            let endpoint = view.endpoint.clone();
            registry.add_view(view).map(|_| endpoint)
        });
        match result {
            Ok(endpoint) => {
                tracing::info!(table = %name, endpoint = %endpoint, "registered table");
                summary.registered += 1;
            }
            Err(e) => {
                tracing::warn!(table = %name, error = %e, "failed to register table");
                let reason = match e {
                    RegistrationError::NoPrimaryKey(_) => SkipReason::NoPrimaryKey,
                    other => SkipReason::RegistrationFailed(other.to_string()),
                };
                summary.skip(SkippedTable { name, reason });
            }
        }
    }

    summary.log();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, MemoryInspector};

    fn table(name: &str, pk: bool) -> TableDescriptor {
        TableDescriptor {
            name: name.into(),
            columns: vec![ColumnDescriptor::new("id", "integer"), ColumnDescriptor::new("title", "text")],
            primary_key: if pk { vec!["id".into()] } else { vec![] },
        }
    }

    #[test]
    fn endpoints_are_url_safe() {
        assert_eq!(sanitize_endpoint("order_items"), "order_items");
        assert_eq!(sanitize_endpoint("my.table"), "my_table");
        assert_eq!(sanitize_endpoint("my table-2.v1"), "my_table_2_v1");
    }

    #[test]
    fn model_names_use_one_canonical_rule() {
        assert_eq!(model_name("order_items"), "OrderItems");
        assert_eq!(model_name("my table"), "MyTable");
        assert_eq!(model_name("API_keys"), "ApiKeys");
        assert_eq!(model_name("a..b"), "AB");
    }

    #[test]
    fn view_without_pk_is_rejected() {
        let err = ModelView::new(table("log", false), &ViewOptions::default()).unwrap_err();
        assert_eq!(err, RegistrationError::NoPrimaryKey("log".into()));
    }

    #[test]
    fn duplicate_endpoint_is_rejected() {
        let mut registry = AdminRegistry::new();
        registry
            .add_view(ModelView::new(table("my.table", true), &ViewOptions::default()).unwrap())
            .unwrap();
        let err = registry
            .add_view(ModelView::new(table("my_table", true), &ViewOptions::default()).unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateEndpoint {
                endpoint: "my_table".into(),
                existing: "my.table".into()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn registers_eligible_tables_and_counts_skips() {
        let inspector = MemoryInspector::new()
            .with_table(table("order_items", true))
            .with_table(table("my.table", true))
            .with_table(table("my_table", true))
            .with_table(table("audit_trail", false))
            .with_table(table("django_migrations", true))
            .with_broken_table("broken", "permission denied for table broken");

        let mut registry = AdminRegistry::new();
        let summary = register_all(&inspector, &mut registry, &HashMap::new()).await;

        assert_eq!(summary.registered, 2);
        assert_eq!(summary.skipped, 4);
        assert_eq!(summary.skipped_no_primary_key, 1);

        let endpoints: Vec<&str> = registry.views().iter().map(|v| v.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["my_table", "order_items"]);
        assert_eq!(registry.view("my_table").unwrap().table.name, "my.table");
        assert!(registry.view("django_migrations").is_none());
        assert!(registry.view("audit_trail").is_none());

        let dup = summary.skipped_tables.iter().find(|s| s.name == "my_table").unwrap();
        assert!(matches!(dup.reason, SkipReason::RegistrationFailed(_)));
    }

    #[tokio::test]
    async fn overrides_set_display_name() {
        let inspector = MemoryInspector::new().with_table(table("order_items", true));
        let mut overrides = HashMap::new();
        overrides.insert(
            "order_items".to_string(),
            ViewOptions {
                display_name: Some("Order Items".into()),
            },
        );
        let mut registry = AdminRegistry::new();
        register_all(&inspector, &mut registry, &overrides).await;
        assert_eq!(registry.view("order_items").unwrap().config.display_name, "Order Items");
    }

    #[tokio::test]
    async fn registration_is_repeatable() {
        let inspector = MemoryInspector::new()
            .with_table(table("a", true))
            .with_table(table("b", true));
        let mut first = AdminRegistry::new();
        let mut second = AdminRegistry::new();
        let s1 = register_all(&inspector, &mut first, &HashMap::new()).await;
        let s2 = register_all(&inspector, &mut second, &HashMap::new()).await;
        assert_eq!(s1, s2);
        assert_eq!(first.views(), second.views());
    }

    #[test]
    fn list_columns_fall_back_to_all_columns() {
        let mut view = ModelView::new(table("t", true), &ViewOptions::default()).unwrap();
        assert_eq!(view.list_columns(), vec!["title"]);
        view.config.list_columns = None;
        assert_eq!(view.list_columns(), vec!["id", "title"]);
    }
}
