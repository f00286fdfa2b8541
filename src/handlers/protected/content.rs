use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::Content;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::content_service::{ContentFilter, CreateContent, UpdateContent};
use crate::services::ContentService;
use crate::types::{ListQuery, Page};

/// GET /api/content?content_type=sermon
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<ContentFilter>,
) -> ApiResult<Page<Content>> {
    let page = ContentService::new(pool).list(&user.viewer(), &query, &filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/content/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Content> {
    let content = ContentService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(content))
}

/// POST /api/content
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateContent>,
) -> ApiResult<Content> {
    let content = ContentService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(content))
}

/// PUT /api/content/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateContent>,
) -> ApiResult<Content> {
    let content = ContentService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(content))
}

/// DELETE /api/content/:id
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Content> {
    let content = ContentService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(content))
}
