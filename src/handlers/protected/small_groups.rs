use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::SmallGroup;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::small_group_service::{CreateSmallGroup, UpdateSmallGroup};
use crate::services::SmallGroupService;
use crate::types::{ListQuery, Page};

/// GET /api/small-groups
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<SmallGroup>> {
    let page = SmallGroupService::new(pool).list(&user.viewer(), &query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/small-groups/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<SmallGroup> {
    let group = SmallGroupService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(group))
}

/// POST /api/small-groups
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateSmallGroup>,
) -> ApiResult<SmallGroup> {
    let group = SmallGroupService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(group))
}

/// PUT /api/small-groups/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateSmallGroup>,
) -> ApiResult<SmallGroup> {
    let group = SmallGroupService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(group))
}

/// DELETE /api/small-groups/:id
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<SmallGroup> {
    let group = SmallGroupService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(group))
}

/// POST /api/small-groups/:id/members/:user_id
pub async fn member_add(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<SmallGroup> {
    let group = SmallGroupService::new(pool).add_member(&user.viewer(), id, member_id).await?;
    Ok(ApiResponse::success(group))
}

/// DELETE /api/small-groups/:id/members/:user_id
pub async fn member_remove(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<SmallGroup> {
    let group = SmallGroupService::new(pool).remove_member(&user.viewer(), id, member_id).await?;
    Ok(ApiResponse::success(group))
}
