//! HTTP surface: bearer extraction, error rendering and the `/auth` routes.

mod auth;
mod error;
mod routes;

pub use auth::{AuthState, Authenticated};
pub use error::{ApiError, codes};
pub use routes::{auth_routes, health};
