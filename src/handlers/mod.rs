// handlers/mod.rs - three security tiers
//
// Public (no auth) → Protected (JWT + live user) → Elevated (superadmin)
pub mod public;    // /, /health, /auth/*
pub mod protected; // /api/*
pub mod elevated;  // /api/root/*
