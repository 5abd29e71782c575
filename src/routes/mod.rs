//! Router assembly.

pub mod admin;
pub mod common;
pub use admin::admin_routes;
pub use common::common_routes;
