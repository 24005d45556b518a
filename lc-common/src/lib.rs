//! # LifeCurriculum Common Library
//!
//! Shared code for the LifeCurriculum service including:
//! - Domain models (curricula, notifications, profiles, teams)
//! - Access control (role checks and permission requirements)
//! - Change event types (LcEvent enum) and EventBus
//! - Configuration loading
//! - Common error types

pub mod access;
pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use access::{evaluate_access, AccessDecision, AccessRequirement, Role, SessionIdentity};
pub use error::{Error, Result};
