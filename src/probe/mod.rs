//! Probes: one HTTP check per site, plus the connectivity preflight.

mod connectivity;
mod http;

pub use connectivity::*;
pub use http::*;
