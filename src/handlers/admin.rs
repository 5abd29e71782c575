//! Admin HTML and JSON handlers: list, details, create, edit, delete, export.

use crate::csrf::{csrf_token, verify_csrf};
use crate::error::AppError;
use crate::export::render_export;
use crate::handlers::query::{page_links, percent_encode, ListQuery};
use crate::registry::ModelView;
use crate::render::{menu, MenuItem, ViewContext, ADMIN_JS};
use crate::response::{success_many, success_page};
use crate::schema::ColumnDescriptor;
use crate::service::{AdminService, Record};
use crate::state::AppState;
use crate::view::ExportFormat;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use std::collections::HashMap;

const CSRF_FIELD: &str = "csrf_token";

/// Keys every page template extending base.html reads.
#[derive(Serialize)]
struct Layout {
    title: String,
    theme: String,
    menu: Vec<MenuItem>,
    active: String,
}

fn layout(state: &AppState, active: &str) -> Layout {
    Layout {
        title: state.config.title.clone(),
        theme: state.config.theme.clone(),
        menu: menu(&state.registry),
        active: active.to_string(),
    }
}

fn find_view<'a>(state: &'a AppState, endpoint: &str) -> Result<&'a ModelView, AppError> {
    state
        .registry
        .view(endpoint)
        .ok_or_else(|| AppError::NotFound(format!("no admin view named {}", endpoint)))
}

/// Pulls the token out of a submitted form and checks it against the endpoint.
fn take_csrf(state: &AppState, endpoint: &str, form: &mut HashMap<String, String>) -> Result<(), AppError> {
    let token = form.remove(CSRF_FIELD).unwrap_or_default();
    if verify_csrf(&state.config.secret_key, endpoint, &token) {
        Ok(())
    } else {
        tracing::warn!(endpoint, "rejected form with bad csrf token");
        Err(AppError::Forbidden("invalid csrf token".into()))
    }
}

fn list_url(endpoint: &str) -> String {
    format!("/admin/{}", endpoint)
}

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let html = state.templates.render("index.html", layout(&state, ""))?;
    Ok(Html(html))
}

#[derive(Serialize)]
struct ColumnHeader<'a> {
    name: &'a str,
    sortable: bool,
    sort_query: String,
    sorted: bool,
}

#[derive(Serialize)]
struct Row<'a> {
    id: Option<&'a str>,
    /// Path segment for the row's details/edit/delete routes.
    link: Option<String>,
    cells: Vec<Option<&'a str>>,
}

impl<'a> Row<'a> {
    fn new(record: &'a Record, columns: &[&str]) -> Self {
        Row {
            id: record.id.as_deref(),
            link: record.id.as_deref().map(percent_encode),
            cells: record.values(columns),
        }
    }
}

#[derive(Serialize)]
struct SearchState<'a> {
    search: Option<&'a str>,
    desc: bool,
}

#[derive(Serialize)]
struct PageInfo {
    total: u64,
    page_count: u64,
}

#[derive(Serialize)]
struct ListPage<'a> {
    #[serde(flatten)]
    layout: Layout,
    view: ViewContext,
    page: PageInfo,
    query: String,
    params: SearchState<'a>,
    filters: HashMap<String, String>,
    columns: Vec<ColumnHeader<'a>>,
    rows: Vec<Row<'a>>,
    pages: Vec<crate::handlers::query::PageLink>,
    csrf_token: String,
}

pub async fn list(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Html<String>, AppError> {
    let view = find_view(&state, &endpoint)?;
    let mut query = ListQuery::parse(view, &raw);
    let page = AdminService::list(&state.pool, &state.config.schema, view, &query.params, query.page).await?;
    query.page = page.page;

    let cols = view.list_columns();
    let columns = cols
        .iter()
        .map(|&name| ColumnHeader {
            name,
            sortable: view.config.can_sort(name),
            sort_query: query.sort_link(name),
            sorted: query.params.sort.as_deref() == Some(name),
        })
        .collect();
    let rows = page
        .records
        .iter()
        .map(|r| Row::new(r, &cols))
        .collect();

    let mut export_query = query.clone();
    export_query.page = 0;
    let ctx = ListPage {
        layout: layout(&state, &endpoint),
        view: ViewContext::from_view(view),
        page: PageInfo {
            total: page.total,
            page_count: page.page_count,
        },
        query: export_query.to_query_string(),
        params: SearchState {
            search: query.params.search.as_deref(),
            desc: query.params.desc,
        },
        filters: query.filter_values(),
        columns,
        rows,
        pages: page_links(&query, page.page, page.page_count),
        csrf_token: csrf_token(&state.config.secret_key, &endpoint),
    };
    Ok(Html(state.templates.render("list.html", ctx)?))
}

pub async fn export(
    State(state): State<AppState>,
    Path((endpoint, format)): Path<(String, String)>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let view = find_view(&state, &endpoint)?;
    let format = ExportFormat::parse(&format)
        .ok_or_else(|| AppError::BadRequest(format!("unknown export format {}", format)))?;
    if !view.capabilities.allows_export(format) {
        return Err(AppError::BadRequest(format!(
            "{} export is disabled for {}",
            format.extension(),
            endpoint
        )));
    }
    let query = ListQuery::parse(view, &raw);
    let records = AdminService::export_rows(&state.pool, &state.config.schema, view, &query.params).await?;
    let cols = view.list_columns();
    let file = render_export(format, &view.table.name, &cols, &records, chrono::Utc::now());
    tracing::info!(endpoint = %endpoint, rows = records.len(), file = %file.filename, "export");
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.body,
    )
        .into_response())
}

#[derive(Serialize)]
struct DetailCell<'a> {
    name: &'a str,
    value: Option<&'a str>,
}

#[derive(Serialize)]
struct DetailsPage<'a> {
    #[serde(flatten)]
    layout: Layout,
    view: ViewContext,
    record_id: &'a str,
    record_link: String,
    cells: Vec<DetailCell<'a>>,
    csrf_token: String,
}

pub async fn details(
    State(state): State<AppState>,
    Path((endpoint, id)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    let view = find_view(&state, &endpoint)?;
    if !view.capabilities.can_view_details {
        return Err(AppError::NotFound(format!("details disabled for {}", endpoint)));
    }
    let record = AdminService::read(&state.pool, &state.config.schema, view, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", endpoint, id)))?;
    let ctx = DetailsPage {
        layout: layout(&state, &endpoint),
        view: ViewContext::from_view(view),
        record_id: &id,
        record_link: percent_encode(&id),
        cells: view
            .table
            .columns
            .iter()
            .map(|c| DetailCell {
                name: &c.name,
                value: record.get(&c.name),
            })
            .collect(),
        csrf_token: csrf_token(&state.config.secret_key, &endpoint),
    };
    Ok(Html(state.templates.render("details.html", ctx)?))
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct Field<'a> {
    name: &'a str,
    declared_type: &'a str,
    nullable: bool,
    has_default: bool,
    value: Option<String>,
    readonly: bool,
    boolean: bool,
    multiline: bool,
}

fn field<'a>(column: &'a ColumnDescriptor, value: Option<String>, readonly: bool) -> Field<'a> {
    let tag = column.type_tag();
    Field {
        name: &column.name,
        declared_type: &column.declared_type,
        nullable: column.nullable,
        has_default: column.has_default,
        value,
        readonly,
        boolean: tag.starts_with("BOOL"),
        multiline: tag == "TEXT" || tag.contains("JSON"),
    }
}

/// Form fields for `view`, valued from a stored record or from a resubmitted form.
fn form_fields<'a>(
    view: &'a ModelView,
    record: Option<&Record>,
    submitted: Option<&HashMap<String, String>>,
    creating: bool,
) -> Vec<Field<'a>> {
    view.table
        .columns
        .iter()
        .map(|c| {
            let stored = record.and_then(|r| r.get(&c.name)).map(str::to_string);
            let value = submitted
                .and_then(|f| f.get(&c.name).cloned())
                .or(stored);
            let readonly = !creating && view.table.is_primary_key(&c.name);
            field(c, value, readonly)
        })
        .collect()
}

#[derive(Serialize)]
struct FormPage<'a> {
    #[serde(flatten)]
    layout: Layout,
    view: ViewContext,
    heading: String,
    action: String,
    creating: bool,
    fields: Vec<Field<'a>>,
    csrf_token: String,
    error: Option<String>,
}

struct FormSpec<'a> {
    view: &'a ModelView,
    creating: bool,
    id: Option<&'a str>,
}

impl<'a> FormSpec<'a> {
    fn heading(&self) -> String {
        match self.id {
            Some(id) => format!("Edit {} #{}", self.view.config.display_name, id),
            None => format!("New {}", self.view.config.display_name),
        }
    }

    fn action(&self) -> String {
        match self.id {
            Some(id) => format!(
                "/admin/{}/edit/{}",
                self.view.endpoint,
                percent_encode(id)
            ),
            None => format!("/admin/{}/new", self.view.endpoint),
        }
    }

    fn render(
        &self,
        state: &AppState,
        fields: Vec<Field<'a>>,
        error: Option<String>,
    ) -> Result<String, AppError> {
        let ctx = FormPage {
            layout: layout(state, &self.view.endpoint),
            view: ViewContext::from_view(self.view),
            heading: self.heading(),
            action: self.action(),
            creating: self.creating,
            fields,
            csrf_token: csrf_token(&state.config.secret_key, &self.view.endpoint),
            error,
        };
        state.templates.render("form.html", ctx)
    }
}

/// Errors the user can fix by changing the form; anything else propagates.
fn form_error(err: AppError) -> Result<String, AppError> {
    match err {
        AppError::Validation(message) => Ok(message),
        AppError::Db(sqlx::Error::Database(db)) => {
            tracing::warn!(error = %db, "write rejected by database");
            Ok(db.message().to_string())
        }
        other => Err(other),
    }
}

fn rerender(
    state: &AppState,
    spec: &FormSpec<'_>,
    form: &HashMap<String, String>,
    err: AppError,
) -> Result<Response, AppError> {
    let message = form_error(err)?;
    let fields = form_fields(spec.view, None, Some(form), spec.creating);
    let html = spec.render(state, fields, Some(message))?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response())
}

pub async fn new_form(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<Html<String>, AppError> {
    let view = find_view(&state, &endpoint)?;
    if !view.capabilities.can_create {
        return Err(AppError::Forbidden(format!("create disabled for {}", endpoint)));
    }
    let spec = FormSpec {
        view,
        creating: true,
        id: None,
    };
    Ok(Html(spec.render(&state, form_fields(view, None, None, true), None)?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Form(mut form): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let view = find_view(&state, &endpoint)?;
    take_csrf(&state, &endpoint, &mut form)?;
    if !view.capabilities.can_create {
        return Err(AppError::Forbidden(format!("create disabled for {}", endpoint)));
    }
    match AdminService::create(&state.pool, &state.config.schema, view, &form).await {
        Ok(record) => {
            tracing::info!(endpoint = %endpoint, id = ?record.id, "record created");
            Ok(Redirect::to(&list_url(&endpoint)).into_response())
        }
        Err(err) => {
            let spec = FormSpec {
                view,
                creating: true,
                id: None,
            };
            rerender(&state, &spec, &form, err)
        }
    }
}

pub async fn edit_form(
    State(state): State<AppState>,
    Path((endpoint, id)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    let view = find_view(&state, &endpoint)?;
    if !view.capabilities.can_edit {
        return Err(AppError::Forbidden(format!("edit disabled for {}", endpoint)));
    }
    let record = AdminService::read(&state.pool, &state.config.schema, view, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", endpoint, id)))?;
    let spec = FormSpec {
        view,
        creating: false,
        id: Some(&id),
    };
    let fields = form_fields(view, Some(&record), None, false);
    Ok(Html(spec.render(&state, fields, None)?))
}

pub async fn edit(
    State(state): State<AppState>,
    Path((endpoint, id)): Path<(String, String)>,
    Form(mut form): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let view = find_view(&state, &endpoint)?;
    take_csrf(&state, &endpoint, &mut form)?;
    if !view.capabilities.can_edit {
        return Err(AppError::Forbidden(format!("edit disabled for {}", endpoint)));
    }
    match AdminService::update(&state.pool, &state.config.schema, view, &id, &form).await {
        Ok(Some(_)) => {
            tracing::info!(endpoint = %endpoint, id = %id, "record updated");
            Ok(Redirect::to(&list_url(&endpoint)).into_response())
        }
        Ok(None) => Err(AppError::NotFound(format!("{} {}", endpoint, id))),
        Err(err) => {
            let spec = FormSpec {
                view,
                creating: false,
                id: Some(&id),
            };
            rerender(&state, &spec, &form, err)
        }
    }
}

pub async fn delete(
    State(state): State<AppState>,
    Path((endpoint, id)): Path<(String, String)>,
    Form(mut form): Form<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let view = find_view(&state, &endpoint)?;
    take_csrf(&state, &endpoint, &mut form)?;
    if !view.capabilities.can_delete {
        return Err(AppError::Forbidden(format!("delete disabled for {}", endpoint)));
    }
    if !AdminService::delete(&state.pool, &state.config.schema, view, &id).await? {
        return Err(AppError::NotFound(format!("{} {}", endpoint, id)));
    }
    tracing::info!(endpoint = %endpoint, id = %id, "record deleted");
    Ok(Redirect::to(&list_url(&endpoint)))
}

/// GET /admin/api/views: every registered view with its derived configuration.
pub async fn api_views(State(state): State<AppState>) -> impl IntoResponse {
    success_many(state.registry.views().to_vec())
}

/// GET /admin/api/:endpoint: one page of rows as JSON objects.
pub async fn api_list(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let view = find_view(&state, &endpoint)?;
    let query = ListQuery::parse(view, &raw);
    let page = AdminService::list(&state.pool, &state.config.schema, view, &query.params, query.page).await?;
    let data = page.records.iter().map(Record::to_json).collect();
    Ok(success_page(data, page.total, page.page, page.page_count))
}

pub async fn admin_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], ADMIN_JS)
}
