//! Shared application state for all routes. The registry is built once at startup and never changes.

use crate::config::AdminConfig;
use crate::registry::AdminRegistry;
use crate::render::Templates;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<AdminRegistry>,
    pub templates: Arc<Templates>,
    pub config: Arc<AdminConfig>,
}
