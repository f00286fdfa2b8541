use axum::{extract::Path, Extension};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::user_service::{CreateUser, UserFilter, UserUpdate};
use crate::services::UserService;
use crate::types::{ListQuery, Page};

// Users always leave the service already sanitized for the caller, so these
// handlers deal in `Value` rather than the `User` row.

/// GET /api/users?role=pastor&include_deleted=true
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> ApiResult<Page<Value>> {
    let page = UserService::new(pool).list(&user.viewer(), &query, &filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/users/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let found = UserService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(found))
}

/// POST /api/users
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateUser>,
) -> ApiResult<Value> {
    let created = UserService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/users/:id - transactional merge update
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UserUpdate>,
) -> ApiResult<Value> {
    let updated = UserService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/users/:id
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let deleted = UserService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(deleted))
}

/// POST /api/users/:id/restore
pub async fn restore(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let restored = UserService::new(pool).restore(&user.viewer(), id).await?;
    Ok(ApiResponse::success(restored))
}
