use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::Branch;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::branch_service::{CreateBranch, UpdateBranch};
use crate::services::BranchService;
use crate::types::{ListQuery, Page};

/// GET /api/branches
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<Branch>> {
    let page = BranchService::new(pool).list(&user.viewer(), &query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/branches/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Branch> {
    let branch = BranchService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(branch))
}

/// POST /api/branches
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateBranch>,
) -> ApiResult<Branch> {
    let branch = BranchService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(branch))
}

/// PUT /api/branches/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateBranch>,
) -> ApiResult<Branch> {
    let branch = BranchService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(branch))
}

/// DELETE /api/branches/:id - soft delete; refused while members are attached
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Branch> {
    let branch = BranchService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(branch))
}
