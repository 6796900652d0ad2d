//! HTTP transport.

pub mod routes;
mod runtime;

pub use routes::{AppState, build_router};
pub use runtime::run;
