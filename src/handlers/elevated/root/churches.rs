use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::Church;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::church_service::{ChurchFilter, CreateChurch, UpdateChurch};
use crate::services::ChurchService;
use crate::types::{ListQuery, Page};

/// GET /api/root/churches?include_deleted=true
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<ChurchFilter>,
) -> ApiResult<Page<Church>> {
    let page = ChurchService::new(pool).list(&user.viewer(), &query, &filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/root/churches/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Church> {
    let church = ChurchService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(church))
}

/// POST /api/root/churches - `{ name, slug, email?, phone?, address? }`
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateChurch>,
) -> ApiResult<Church> {
    let church = ChurchService::new(pool).create(&user.viewer(), payload).await?;
    tracing::info!("Superadmin {} created church {} ({})", user.id, church.slug, church.id);
    Ok(ApiResponse::created(church))
}

/// PUT /api/root/churches/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateChurch>,
) -> ApiResult<Church> {
    let church = ChurchService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(church))
}

/// DELETE /api/root/churches/:id - soft delete; members can no longer sign in
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Church> {
    let church = ChurchService::new(pool).delete(&user.viewer(), id).await?;
    tracing::info!("Superadmin {} deleted church {}", user.id, church.id);
    Ok(ApiResponse::success(church))
}

/// POST /api/root/churches/:id/restore
pub async fn restore(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Church> {
    let church = ChurchService::new(pool).restore(&user.viewer(), id).await?;
    Ok(ApiResponse::success(church))
}
