use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;
use crate::types::Page;

/// Typed reads over one table. Writes live in the services, which need
/// explicit SQL and transactions.
pub struct Repository<T> {
    table_name: String,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize,
{
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            table_name: table_name.into(),
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .select_optional(&self.pool)
            .await
    }

    /// Like [`select_one`](Self::select_one) but a miss is a `NotFound` error.
    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, DatabaseError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} record not found", self.entity_name())))
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .count(&self.pool)
            .await
    }

    /// One page of rows plus the unpaginated total for the same WHERE.
    pub async fn page(&self, filter_data: FilterData, page: i64, limit: i64) -> Result<Page<T>, DatabaseError> {
        let count_filter = FilterData {
            where_clause: filter_data.where_clause.clone(),
            include_deleted: filter_data.include_deleted,
            ..Default::default()
        };
        let page_filter = FilterData {
            limit: Some(limit),
            offset: Some(page_offset(page, limit)?),
            ..filter_data
        };

        let (items, total) = futures::try_join!(self.select_any(page_filter), self.count(count_filter))?;
        Ok(Page { items, total, page, limit })
    }

    fn entity_name(&self) -> &str {
        self.table_name.trim_end_matches('s')
    }
}

/// Row offset of a 1-based page. Pages past the addressable range are a
/// client error rather than an overflow.
pub(crate) fn page_offset(page: i64, limit: i64) -> Result<i64, DatabaseError> {
    page.max(1)
        .saturating_sub(1)
        .checked_mul(limit.max(0))
        .ok_or_else(|| DatabaseError::QueryError(format!("Page {} is out of range", page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_counts_from_page_one() {
        assert_eq!(page_offset(1, 20).unwrap(), 0);
        assert_eq!(page_offset(3, 20).unwrap(), 40);
    }

    #[test]
    fn huge_page_is_rejected_not_overflowed() {
        let err = page_offset(i64::MAX, 20).unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError(_)));
        // QueryError surfaces as a 400
        let api: crate::error::ApiError = err.into();
        assert_eq!(api.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
