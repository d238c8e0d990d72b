//! Service plumbing shared by every route: configuration, database pool,
//! error type, request state, the auth gate and startup helpers.

pub mod aliases;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod middleware;
pub mod swagger;
