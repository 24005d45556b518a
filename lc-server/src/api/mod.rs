//! HTTP API handlers for lc-server

pub mod admin;
pub mod auth;
pub mod buildinfo;
pub mod curricula;
pub mod error;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod sse;
pub mod teams;
pub mod youtube;

pub use auth::{auth_middleware, CurrentSession};
pub use error::ApiError;
pub use health::health_routes;
