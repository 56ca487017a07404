//! Reflection-driven CRUD service over PostgreSQL.
//!
//! The query core introspects table columns on every call and builds
//! parameterized SQL from declarative per-resource descriptors; results come
//! back in a uniform envelope with paging. A JWT layer (access + refresh
//! pairs with a persisted refresh store) guards the resource routes.

pub mod auth;
pub mod config;
pub mod error;
pub mod resource;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;

pub use config::AppConfig;
pub use error::AppError;
pub use response::ApiResponse;
pub use routes::app_router;
pub use service::{Envelope, Payload, QueryOutcome, QueryService};
pub use state::AppState;
