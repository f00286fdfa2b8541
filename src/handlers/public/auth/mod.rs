// handlers/public/auth/mod.rs - token acquisition
//
// POST /auth/login   { email, password, church? } → token
// POST /auth/refresh { token }                    → token

use serde::Serialize;
use serde_json::Value;

use crate::access::{sanitize_user, Viewer};
use crate::auth::{generate_jwt, Claims};
use crate::database::models::User;
use crate::error::ApiError;

pub mod login;
pub mod refresh;

pub use login::login_post;
pub use refresh::refresh_post;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    /// Seconds until `exp`
    pub expires_in: i64,
    pub user: Value,
}

/// Sign a fresh token for `user` as currently stored.
pub(crate) fn issue_token(user: &User) -> Result<TokenResponse, ApiError> {
    let claims = Claims::new(user.id, user.church_id, user.branch_id, user.role, user.email.clone());
    let token = generate_jwt(&claims)?;
    let own = Viewer {
        id: user.id,
        church_id: user.church_id,
        branch_id: user.branch_id,
        role: user.role,
    };

    Ok(TokenResponse {
        token,
        expires_in: claims.expires_in(),
        user: sanitize_user(user, &own),
    })
}
