pub mod config;
pub mod http;
pub mod observability;
pub mod server;
pub mod store;

pub use server::{AppState, MentorServer, ServerBuilder, build_app};
