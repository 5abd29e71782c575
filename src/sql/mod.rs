//! Safe SQL builder: identifiers from reflection only, values as parameters.

mod builder;
pub use builder::*;
