// handlers/public/auth/login.rs - POST /auth/login

use serde::Deserialize;

use super::{issue_token, TokenResponse};
use crate::database::DatabaseManager;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::{FieldErrors, UserService};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Church slug; needed only when the email is registered in more than one church
    pub church: Option<String>,
}

/// Authenticate with email and password.
///
/// ```json
/// { "email": "pastor@grace.org", "password": "...", "church": "grace" }
/// ```
///
/// Responds with `{ token, expires_in, user }`, where `user` is the caller's
/// own record as they are allowed to see it.
pub async fn login_post(ApiJson(payload): ApiJson<LoginRequest>) -> ApiResult<TokenResponse> {
    let mut errors = FieldErrors::new();
    errors.require_text("email", &payload.email);
    errors.require_text("password", &payload.password);
    errors.into_result()?;

    let pool = DatabaseManager::pool().await?;
    let user = UserService::new(pool)
        .authenticate(&payload.email, &payload.password, payload.church.as_deref())
        .await?;

    tracing::info!("User {} logged in as {}", user.id, user.role);
    Ok(ApiResponse::success(issue_token(&user)?))
}
