//! AdminService: generic CRUD over reflected tables using the safe SQL builder.

mod crud;
mod forms;
pub use crud::{AdminService, Page, Record, EXPORT_LIMIT};
pub use forms::FormReader;
