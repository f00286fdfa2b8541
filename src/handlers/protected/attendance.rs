use axum::Extension;

use crate::database::models::Attendance;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::AttendanceService;
use crate::types::{ListQuery, Page};

/// GET /api/attendance/me - the caller's own attendance history
pub async fn mine(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<Attendance>> {
    let page = AttendanceService::new(pool).list_mine(&user.viewer(), &query).await?;
    Ok(ApiResponse::success(page))
}
