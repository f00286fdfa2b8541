use axum::Extension;
use serde_json::{json, Value};

use crate::middleware::{ApiJson, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::user_service::ChangePassword;
use crate::services::UserService;

/// GET /api/auth/whoami - the caller's own record, minus pastoral notes
pub async fn whoami(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
) -> ApiResult<Value> {
    let me = UserService::new(pool).whoami(&user.viewer()).await?;
    Ok(ApiResponse::success(me))
}

/// PUT /api/auth/password - `{ current_password, new_password }`
pub async fn password_put(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<ChangePassword>,
) -> ApiResult<Value> {
    UserService::new(pool).change_password(&user.viewer(), payload).await?;
    Ok(ApiResponse::success(json!({ "message": "Password updated" })))
}
