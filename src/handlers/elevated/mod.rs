// handlers/elevated/mod.rs - superadmin-only endpoints
//
// Security Level: JWT + live user + superadmin role
// Route Prefix: /api/root/*
// Middleware: jwt_auth → validate_user → require_superadmin

pub mod root;

pub use root::*;
