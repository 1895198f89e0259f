//! History storage for check results.

mod models;
mod store;

pub use models::*;
pub use store::*;
