use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::database::models::FinanceTransaction;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, DbPool, ValidatedUser};
use crate::services::finance_service::{CreateTransaction, FinanceFilter, FinanceSummary, UpdateTransaction};
use crate::services::FinanceService;
use crate::types::{DateWindow, ListQuery, Page};

/// GET /api/finance?kind=income&from=...&to=...
pub async fn list(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(window): ApiQuery<DateWindow>,
    ApiQuery(filter): ApiQuery<FinanceFilter>,
) -> ApiResult<Page<FinanceTransaction>> {
    let page = FinanceService::new(pool).list(&user.viewer(), &query, &window, &filter).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/finance/summary - income, expense and per-category totals
pub async fn summary(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiQuery(query): ApiQuery<ListQuery>,
    ApiQuery(window): ApiQuery<DateWindow>,
) -> ApiResult<FinanceSummary> {
    let summary = FinanceService::new(pool).summary(&user.viewer(), &query, &window).await?;
    Ok(ApiResponse::success(summary))
}

/// GET /api/finance/:id
pub async fn show(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<FinanceTransaction> {
    let transaction = FinanceService::new(pool).get(&user.viewer(), id).await?;
    Ok(ApiResponse::success(transaction))
}

/// POST /api/finance
pub async fn create(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    ApiJson(payload): ApiJson<CreateTransaction>,
) -> ApiResult<FinanceTransaction> {
    let transaction = FinanceService::new(pool).create(&user.viewer(), payload).await?;
    Ok(ApiResponse::created(transaction))
}

/// PUT /api/finance/:id
pub async fn update(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateTransaction>,
) -> ApiResult<FinanceTransaction> {
    let transaction = FinanceService::new(pool).update(&user.viewer(), id, payload).await?;
    Ok(ApiResponse::success(transaction))
}

/// DELETE /api/finance/:id
pub async fn delete(
    Extension(user): Extension<ValidatedUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<FinanceTransaction> {
    let transaction = FinanceService::new(pool).delete(&user.viewer(), id).await?;
    Ok(ApiResponse::success(transaction))
}
