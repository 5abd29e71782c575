//! HTTP handlers for the landing page and the generated admin views.

pub mod admin;
pub mod home;
pub mod query;
pub use admin::*;
pub use home::home;
pub use query::{percent_encode, ListQuery};
