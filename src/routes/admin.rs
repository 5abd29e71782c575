//! Admin routes. Every generated view lives under `/admin/:endpoint`; handlers resolve the
//! view from the registry by that segment.

use crate::handlers::admin::{
    admin_js, api_list, api_views, create, delete as delete_handler, details, edit, edit_form, export, index,
    list, new_form,
};
use crate::handlers::home::home;
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/admin", get(index))
        .route("/admin/static/admin.js", get(admin_js))
        .route("/admin/api/views", get(api_views))
        .route("/admin/api/:endpoint", get(api_list))
        .route("/admin/:endpoint", get(list))
        .route("/admin/:endpoint/new", get(new_form).post(create))
        .route("/admin/:endpoint/details/:id", get(details))
        .route("/admin/:endpoint/edit/:id", get(edit_form).post(edit))
        .route("/admin/:endpoint/delete/:id", post(delete_handler))
        .route("/admin/:endpoint/export/:format", get(export))
        .with_state(state)
}
