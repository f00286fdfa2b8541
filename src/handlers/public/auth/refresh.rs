// handlers/public/auth/refresh.rs - POST /auth/refresh

use chrono::Utc;
use serde::Deserialize;

use super::{issue_token, TokenResponse};
use crate::auth::decode_jwt_allow_expired;
use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::UserService;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub token: String,
}

/// Whether a token that expired at `exp` is still inside the refresh window.
pub(crate) fn within_refresh_window(exp: i64, now: i64, window_days: i64) -> bool {
    now - exp <= window_days * 24 * 60 * 60
}

/// Exchange a correctly signed token, expired for at most the configured
/// window, for a new one. Claims are rebuilt from the stored user, so role
/// and branch changes since the last login take effect here.
pub async fn refresh_post(ApiJson(payload): ApiJson<RefreshRequest>) -> ApiResult<TokenResponse> {
    let claims = decode_jwt_allow_expired(payload.token.trim())?;

    let window_days = config::config().security.refresh_window_days;
    if !within_refresh_window(claims.exp, Utc::now().timestamp(), window_days) {
        tracing::warn!("Refresh refused for {}: token expired more than {} days ago", claims.sub, window_days);
        return Err(ApiError::unauthorized("Token is too old to refresh; sign in again"));
    }

    let pool = DatabaseManager::pool().await?;
    let user = UserService::new(pool).session_user(claims.sub).await?;

    tracing::debug!("Refreshed token for {}", user.id);
    Ok(ApiResponse::success(issue_token(&user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60;

    #[test]
    fn refresh_window_bounds() {
        let now = 1_700_000_000;
        assert!(within_refresh_window(now + DAY, now, 7));
        assert!(within_refresh_window(now - 7 * DAY, now, 7));
        assert!(!within_refresh_window(now - 7 * DAY - 1, now, 7));
    }
}
