//! Admin server: discovers the configured database and serves the admin panel.
//!
//! Development: `cargo run -p admin-server` listens on 0.0.0.0:5000 with debug logging.
//! Production: set `ADMIN_ENV=production` and `PORT`.

use automap_admin::{bootstrap, build_app, init_tracing, AdminConfig};
use tokio::net::TcpListener;

const DEV_PORT: u16 = 5000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let production = std::env::var("ADMIN_ENV").is_ok_and(|v| v.eq_ignore_ascii_case("production"));
    init_tracing(!production);
    let config = AdminConfig::from_env()?;

    let port = if production { config.port } else { DEV_PORT };
    let state = bootstrap(config).await?;
    let tables = state.registry.len();
    let app = build_app(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(
        tables,
        production,
        "admin panel listening on http://{}/admin",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
