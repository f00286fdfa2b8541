use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::PrayerRequest;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::prayer_service::{CreatePrayerRequest, PrayerFilter, UpdatePrayerRequest};
use crate::services::PrayerService;
use crate::types::{ListQuery, Page};

/// GET /api/prayer-requests?status=open
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(filter): ApiQuery<PrayerFilter>,
) -> ApiResult<Page<PrayerRequest>> {
    let page = PrayerService::new(pool).list(&user.viewer(), &query, &filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/prayer-requests/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<PrayerRequest> {
    let request = PrayerService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(request))
}

/// POST /api/prayer-requests
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreatePrayerRequest>,
) -> ApiResult<PrayerRequest> {
    let request = PrayerService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(request))
}

/// PUT /api/prayer-requests/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdatePrayerRequest>,
) -> ApiResult<PrayerRequest> {
    let request = PrayerService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(request))
}

/// DELETE /api/prayer-requests/:id
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<PrayerRequest> {
    let request = PrayerService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(request))
}
