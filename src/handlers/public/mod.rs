// handlers/public/mod.rs - endpoints that need no token
//
// Security Level: None
// Route Prefix: none (/, /health, /auth/*)

pub mod auth;
pub mod info;

pub use auth::*;
pub use info::{health_get, root_get};
