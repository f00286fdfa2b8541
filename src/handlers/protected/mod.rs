// handlers/protected/mod.rs - endpoints behind a bearer token
//
// Security Level: JWT + live user (validate_user_middleware)
// Route Prefix: /api/*
//
// Every handler receives `ValidatedUser` and `DbPool` as extensions. Role
// gates and scoping happen in the services; handlers extract and wrap.

pub mod activities;
pub mod attendance;
pub mod auth;
pub mod branches;
pub mod content;
pub mod finance;
pub mod prayer_requests;
pub mod reports;
pub mod small_groups;
pub mod users;

pub use auth::*;
