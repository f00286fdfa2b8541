use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::ServiceError;
use crate::access::{Scope, Viewer};
use crate::auth::Role;
use crate::types::{DateWindow, ListQuery};

pub const REPORT_READERS: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor];

/// Dashboard aggregates for one church (optionally one branch)
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub church_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub members_by_role: BTreeMap<String, i64>,
    pub total_members: i64,
    pub branches: i64,
    pub small_groups: i64,
    pub activities: i64,
    pub attendance_by_status: BTreeMap<String, i64>,
    pub income: Decimal,
    pub expense: Decimal,
    pub open_prayer_requests: i64,
}

pub struct ReportService {
    pool: PgPool,
}

impl ReportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn summary(&self, viewer: &Viewer, query: &ListQuery, window: &DateWindow) -> Result<DashboardSummary, ServiceError> {
        viewer.require(&REPORT_READERS)?;
        if !window.is_ordered() {
            return Err(ServiceError::invalid("from", "from must not be after to"));
        }
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?.confine_pastor(viewer)?;
        let (from, to) = window.closed();

        let (members, branches, small_groups, activities, attendance, finance, prayers) = futures::try_join!(
            self.members_by_role(scope),
            self.branch_count(scope),
            self.count_in_scope("small_groups", scope),
            self.activity_count(scope, from, to),
            self.attendance_by_status(scope, from, to),
            self.finance_totals(scope, from, to),
            self.open_prayer_requests(scope),
        )?;

        let members_by_role: BTreeMap<String, i64> = members.into_iter().collect();
        let total_members = members_by_role.values().sum();
        let (income, expense) = finance;

        Ok(DashboardSummary {
            church_id: scope.church_id,
            branch_id: scope.branch_id,
            from,
            to,
            members_by_role,
            total_members,
            branches,
            small_groups,
            activities,
            attendance_by_status: attendance.into_iter().collect(),
            income,
            expense,
            open_prayer_requests: prayers,
        })
    }

    async fn members_by_role(&self, scope: Scope) -> Result<Vec<(String, i64)>, ServiceError> {
        Ok(sqlx::query_as(
            "SELECT role, COUNT(*) FROM users \
             WHERE church_id = $1 AND ($2::uuid IS NULL OR branch_id = $2) AND is_deleted = false \
             GROUP BY role",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn branch_count(&self, scope: Scope) -> Result<i64, ServiceError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM branches WHERE church_id = $1 AND ($2::uuid IS NULL OR id = $2) AND is_deleted = false",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// `table` is one of our own constants, never client input.
    async fn count_in_scope(&self, table: &'static str, scope: Scope) -> Result<i64, ServiceError> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE church_id = $1 AND ($2::uuid IS NULL OR branch_id = $2) AND is_deleted = false",
            table
        ))
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn activity_count(&self, scope: Scope, from: NaiveDate, to: NaiveDate) -> Result<i64, ServiceError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM activities \
             WHERE church_id = $1 AND ($2::uuid IS NULL OR branch_id = $2) AND is_deleted = false \
             AND starts_at >= $3::date AND starts_at < ($4::date + 1)",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn attendance_by_status(&self, scope: Scope, from: NaiveDate, to: NaiveDate) -> Result<Vec<(String, i64)>, ServiceError> {
        Ok(sqlx::query_as(
            "SELECT a.status, COUNT(*) FROM attendance a \
             JOIN activities act ON act.id = a.activity_id AND act.is_deleted = false \
             WHERE a.church_id = $1 AND ($2::uuid IS NULL OR a.branch_id = $2) AND a.is_deleted = false \
             AND act.starts_at >= $3::date AND act.starts_at < ($4::date + 1) \
             GROUP BY a.status",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn finance_totals(&self, scope: Scope, from: NaiveDate, to: NaiveDate) -> Result<(Decimal, Decimal), ServiceError> {
        let totals: (Decimal, Decimal) = sqlx::query_as(
            "SELECT \
               COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0), \
               COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) \
             FROM finance_transactions \
             WHERE church_id = $1 AND ($2::uuid IS NULL OR branch_id = $2) AND is_deleted = false \
             AND transaction_date BETWEEN $3 AND $4",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    async fn open_prayer_requests(&self, scope: Scope) -> Result<i64, ServiceError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM prayer_requests \
             WHERE church_id = $1 AND ($2::uuid IS NULL OR branch_id = $2) AND is_deleted = false \
             AND status IN ('open', 'praying')",
        )
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
