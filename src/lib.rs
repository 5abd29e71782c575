//! Automap admin: a CRUD admin panel generated from whatever tables an existing
//! PostgreSQL schema already has.

pub mod config;
pub mod csrf;
pub mod discovery;
pub mod error;
pub mod export;
pub mod handlers;
pub mod registry;
pub mod render;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod view;

pub use config::AdminConfig;
pub use discovery::{discover, DiscoveryReport, SkipReason, SkippedTable};
pub use error::{AppError, ConfigError, DiscoveryError, RegistrationError, ViewConfigError};
pub use registry::{register_all, AdminRegistry, ModelView, RegistrationSummary};
pub use render::Templates;
pub use response::{success_many, success_page};
pub use routes::{admin_routes, common_routes};
pub use schema::{ColumnDescriptor, MemoryInspector, PgInspector, SchemaInspector, TableDescriptor};
pub use service::{AdminService, Record};
pub use state::AppState;
pub use view::{configure, ViewCapabilities, ViewConfig, ViewOptions};

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted form body.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise this crate logs at info,
/// or debug (including every SQL statement) in development.
pub fn init_tracing(development: bool) {
    let default = if development {
        "automap_admin=debug,tower_http=debug"
    } else {
        "automap_admin=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();
}

/// Connect, discover every table and register a view for each one that qualifies.
/// Discovery problems are logged and skipped; only a bad pool or template set fails startup.
pub async fn bootstrap(config: AdminConfig) -> Result<AppState, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!(schema = %config.schema, "connected, discovering tables");

    let inspector = PgInspector::new(pool.clone(), config.schema.clone());
    let registry = build_registry(&inspector).await;

    Ok(AppState {
        pool,
        registry: Arc::new(registry),
        templates: Arc::new(Templates::new()?),
        config: Arc::new(config),
    })
}

/// Registry of every eligible table with default view options. Registration logs its own summary.
pub async fn build_registry(inspector: &dyn SchemaInspector) -> AdminRegistry {
    let mut registry = AdminRegistry::new();
    register_all(inspector, &mut registry, &HashMap::new()).await;
    registry
}

/// The full application router: landing page, admin views, health endpoints.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(admin_routes(state.clone()))
        .merge(common_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn test_config() -> AdminConfig {
        AdminConfig::from_lookup(|k: &str| match k {
            "DATABASE_URL" => Some("postgres://admin@127.0.0.1:1/none".to_string()),
            "SECRET_KEY" => Some("test-secret".to_string()),
            _ => None,
        })
        .unwrap()
    }

    /// State over a lazy pool that never connects; fine for routes that skip the database.
    fn test_state() -> AppState {
        let config = test_config();
        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        let mut registry = AdminRegistry::new();
        let table = TableDescriptor {
            name: "order items".into(),
            columns: vec![
                ColumnDescriptor::new("id", "integer"),
                ColumnDescriptor::new("sku", "character varying(20)"),
                ColumnDescriptor::new("qty", "integer"),
            ],
            primary_key: vec!["id".into()],
        };
        registry
            .add_view(ModelView::new(table, &ViewOptions::default()).unwrap())
            .unwrap();
        AppState {
            pool,
            registry: Arc::new(registry),
            templates: Arc::new(Templates::new().unwrap()),
            config: Arc::new(config),
        }
    }

    async fn send(req: Request<Body>) -> (StatusCode, String) {
        let resp = build_app(test_state()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn registration_summary_is_logged_once() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let inspector = MemoryInspector::new()
            .with_table(TableDescriptor {
                name: "books".into(),
                columns: vec![ColumnDescriptor::new("id", "integer")],
                primary_key: vec!["id".into()],
            })
            .with_table(TableDescriptor {
                name: "audit".into(),
                columns: vec![ColumnDescriptor::new("line", "text")],
                primary_key: vec![],
            });
        let registry = build_registry(&inspector).await;
        assert_eq!(registry.len(), 1);

        let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out.matches("table registration finished").count(), 1);
        assert_eq!(out.matches("lack primary keys").count(), 1);
    }

    #[tokio::test]
    async fn landing_page_counts_tables() {
        let (status, body) = send(get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("1 tables available"));
    }

    #[tokio::test]
    async fn admin_index_links_sanitized_endpoint() {
        let (status, body) = send(get("/admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/admin/order_items\""));
        assert!(body.contains("order items"));
    }

    #[tokio::test]
    async fn unknown_view_is_404_json() {
        let (status, body) = send(get("/admin/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn api_views_lists_registered_views() {
        let (status, body) = send(get("/admin/api/views")).await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["meta"]["count"], 1);
        assert_eq!(v["data"][0]["endpoint"], "order_items");
        assert_eq!(v["data"][0]["model_name"], "OrderItems");
        assert_eq!(v["data"][0]["config"]["searchable_columns"][0], "sku");
    }

    #[tokio::test]
    async fn new_form_carries_csrf_token() {
        let (status, body) = send(get("/admin/order_items/new")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&csrf::csrf_token("test-secret", "order_items")));
    }

    #[tokio::test]
    async fn post_without_valid_csrf_is_forbidden() {
        let req = Request::builder()
            .method("POST")
            .uri("/admin/order_items/delete/1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("csrf_token=forged"))
            .unwrap();
        let (status, _) = send(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_export_format_is_rejected() {
        let (status, _) = send(get("/admin/order_items/export/pdf")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_and_script() {
        let (status, body) = send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"tables\":1"));
        let (status, body) = send(get("/admin/static/admin.js")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("searchTables"));
    }
}
