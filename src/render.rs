//! HTML rendering: embedded minijinja templates and the view summaries they consume.

use crate::error::AppError;
use crate::registry::{AdminRegistry, ModelView};
use minijinja::Environment;
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("list.html", include_str!("../templates/list.html")),
    ("details.html", include_str!("../templates/details.html")),
    ("form.html", include_str!("../templates/form.html")),
    ("home.html", include_str!("../templates/home.html")),
];

pub const ADMIN_JS: &str = include_str!("../static/admin.js");

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Templates { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, AppError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

/// Sidebar and index entry for one registered view.
#[derive(Serialize)]
pub struct MenuItem {
    pub endpoint: String,
    pub name: String,
    pub column_count: usize,
    pub searchable: Vec<String>,
    pub filterable: Vec<String>,
}

pub fn menu(registry: &AdminRegistry) -> Vec<MenuItem> {
    registry
        .views()
        .iter()
        .map(|v| MenuItem {
            endpoint: v.endpoint.clone(),
            name: v.config.display_name.clone(),
            column_count: v.table.columns.len(),
            searchable: v.config.searchable_columns.clone().unwrap_or_default(),
            filterable: v.config.filterable_columns.clone().unwrap_or_default(),
        })
        .collect()
}

/// What a page template needs to know about the current view.
#[derive(Serialize)]
pub struct ViewContext {
    pub endpoint: String,
    pub name: String,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view_details: bool,
    pub export_types: Vec<&'static str>,
    pub searchable: Vec<String>,
    pub filterable: Vec<String>,
}

impl ViewContext {
    pub fn from_view(view: &ModelView) -> Self {
        let caps = &view.capabilities;
        ViewContext {
            endpoint: view.endpoint.clone(),
            name: view.config.display_name.clone(),
            can_create: caps.can_create,
            can_edit: caps.can_edit,
            can_delete: caps.can_delete,
            can_view_details: caps.can_view_details,
            export_types: if caps.can_export {
                caps.export_types.iter().map(|f| f.extension()).collect()
            } else {
                Vec::new()
            },
            searchable: view.config.searchable_columns.clone().unwrap_or_default(),
            filterable: view.config.filterable_columns.clone().unwrap_or_default(),
        }
    }
}
