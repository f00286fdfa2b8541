//! Business operations per entity. Services hold the SQL; handlers only
//! extract, gate and wrap.

pub mod activity_service;
pub mod attendance_service;
pub mod branch_service;
pub mod church_service;
pub mod content_service;
pub mod error;
pub mod finance_service;
pub mod prayer_service;
pub mod report_service;
pub mod small_group_service;
pub mod user_service;

pub use activity_service::ActivityService;
pub use attendance_service::AttendanceService;
pub use branch_service::BranchService;
pub use church_service::ChurchService;
pub use content_service::ContentService;
pub use error::{FieldErrors, ServiceError};
pub use finance_service::FinanceService;
pub use prayer_service::PrayerService;
pub use report_service::ReportService;
pub use small_group_service::SmallGroupService;
pub use user_service::UserService;

use serde_json::{json, Map, Value};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::access::Viewer;
use crate::config;
use crate::filter::FilterData;

/// Privileged writes, on the `flock::audit` target when audit logging is on.
pub(crate) fn audit(viewer: &Viewer, action: &str, entity: &str, id: Uuid) {
    if config::config().security.enable_audit_logging {
        tracing::info!(target: "flock::audit", actor = %viewer.id, role = %viewer.role, action, entity, %id);
    }
}

/// The branch must exist, be live and belong to `church_id`.
pub(crate) async fn ensure_branch<'e, E>(executor: E, church_id: Uuid, branch_id: Uuid) -> Result<(), ServiceError>
where
    E: PgExecutor<'e>,
{
    let found: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM branches WHERE id = $1 AND church_id = $2 AND is_deleted = false")
            .bind(branch_id)
            .bind(church_id)
            .fetch_optional(executor)
            .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(ServiceError::invalid("branch_id", "Branch does not exist in this church")),
    }
}

/// The user must be a live member of `church_id`; `field` names the payload
/// key in the error.
pub(crate) async fn ensure_church_user<'e, E>(
    executor: E,
    church_id: Uuid,
    user_id: Uuid,
    field: &str,
) -> Result<(), ServiceError>
where
    E: PgExecutor<'e>,
{
    let found: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE id = $1 AND church_id = $2 AND is_deleted = false")
            .bind(user_id)
            .bind(church_id)
            .fetch_optional(executor)
            .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(ServiceError::invalid(field, "User does not exist in this church")),
    }
}

/// Filter for one page of a scoped list
pub(crate) fn list_filter(clause: Map<String, Value>, order: &str) -> FilterData {
    FilterData {
        where_clause: Some(Value::Object(clause)),
        order: Some(json!(order)),
        ..Default::default()
    }
}

/// `$or` of ILIKE matches of `pattern` over `columns`
pub(crate) fn search_clause(pattern: &str, columns: &[&str]) -> Value {
    Value::Array(
        columns
            .iter()
            .map(|column| {
                let mut condition = Map::new();
                condition.insert(column.to_string(), json!({ "$ilike": pattern }));
                Value::Object(condition)
            })
            .collect(),
    )
}

/// Trimmed text, or None when blank
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_clause_spans_columns() {
        let clause = search_clause("%jo%", &["first_name", "email"]);
        assert_eq!(clause, json!([{ "first_name": { "$ilike": "%jo%" } }, { "email": { "$ilike": "%jo%" } }]));
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some("  x ".into())), Some("x".to_string()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
