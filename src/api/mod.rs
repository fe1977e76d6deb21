//! HTTP surface: `/formats`, `/download` and health.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, serve, AppState};
