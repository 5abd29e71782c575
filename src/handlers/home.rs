//! Landing page at `/`.

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::Html};
use minijinja::context;

pub async fn home(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let html = state.templates.render(
        "home.html",
        context! { title => &state.config.title, table_count => state.registry.len() },
    )?;
    Ok(Html(html))
}
