use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::{Activity, Attendance};
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::activity_service::{CreateActivity, UpdateActivity};
use crate::services::attendance_service::RecordAttendance;
use crate::services::{ActivityService, AttendanceService};
use crate::types::{DateWindow, ListQuery, Page};

/// GET /api/activities?from=2024-01-01&to=2024-01-31
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(window): ApiQuery<DateWindow>,
) -> ApiResult<Page<Activity>> {
    let page = ActivityService::new(pool).list(&user.viewer(), &query, &window).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/activities/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Activity> {
    let activity = ActivityService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(activity))
}

/// POST /api/activities
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateActivity>,
) -> ApiResult<Activity> {
    let activity = ActivityService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(activity))
}

/// PUT /api/activities/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateActivity>,
) -> ApiResult<Activity> {
    let activity = ActivityService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(activity))
}

/// DELETE /api/activities/:id
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Activity> {
    let activity = ActivityService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(activity))
}

/// GET /api/activities/:id/attendance
pub async fn attendance_list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<Attendance>> {
    let page = AttendanceService::new(pool).list_for_activity(&user.viewer(), id, &query).await?;
    Ok(ApiResponse::success(page))
}

/// POST /api/activities/:id/attendance - `{ entries: [...] }`, upserted per member
pub async fn attendance_record(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<RecordAttendance>,
) -> ApiResult<Vec<Attendance>> {
    let rows = AttendanceService::new(pool).record(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::created(rows))
}
