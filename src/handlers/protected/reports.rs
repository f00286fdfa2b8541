use axum::Extension;

use crate::middleware::{ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::report_service::DashboardSummary;
use crate::services::ReportService;
use crate::types::{DateWindow, ListQuery};

/// GET /api/reports/summary?branch_id=...&from=...&to=...
pub async fn summary(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(window): ApiQuery<DateWindow>,
) -> ApiResult<DashboardSummary> {
    let summary = ReportService::new(pool).summary(&user.viewer(), &query, &window).await?;
    Ok(ApiResponse::success(summary))
}
