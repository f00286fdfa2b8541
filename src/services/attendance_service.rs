use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::activity_service::ActivityService;
use super::{ensure_church_user, list_filter, non_blank, ServiceError};
use crate::access::Viewer;
use crate::database::models::attendance::AttendanceStatus;
use crate::database::models::Attendance;
use crate::database::Repository;
use crate::types::{ListQuery, Page};

const ATTENDANCE_COLUMNS: &str = "id, church_id, branch_id, activity_id, user_id, visitor_name, status, \
     checked_in_at, recorded_by, is_deleted, created_at, updated_at";

/// One line of a roll call: a member by id, or a visitor by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttendanceEntry {
    pub user_id: Option<Uuid>,
    pub visitor_name: Option<String>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordAttendance {
    pub entries: Vec<AttendanceEntry>,
}

impl AttendanceEntry {
    fn subject(&self) -> Result<(Option<Uuid>, Option<String>), ServiceError> {
        match (self.user_id, non_blank(self.visitor_name.clone())) {
            (Some(user_id), None) => Ok((Some(user_id), None)),
            (None, Some(name)) => Ok((None, Some(name))),
            (Some(_), Some(_)) => Err(ServiceError::invalid("entries", "Give either user_id or visitor_name, not both")),
            (None, None) => Err(ServiceError::invalid("entries", "Each entry needs a user_id or a visitor_name")),
        }
    }
}

pub struct AttendanceService {
    pool: PgPool,
}

impl AttendanceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<Attendance> {
        Repository::new("attendance", self.pool.clone())
    }

    /// Upserts member rows per (activity, user); visitor rows are appended.
    /// All entries land or none do.
    pub async fn record(&self, viewer: &Viewer, activity_id: Uuid, input: RecordAttendance) -> Result<Vec<Attendance>, ServiceError> {
        let activity = ActivityService::new(self.pool.clone()).get_writable(viewer, activity_id).await?;
        if input.entries.is_empty() {
            return Err(ServiceError::invalid("entries", "At least one entry is required"));
        }
        let subjects = input
            .entries
            .iter()
            .map(AttendanceEntry::subject)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        let mut recorded = Vec::with_capacity(subjects.len());
        for (entry, (user_id, visitor_name)) in input.entries.iter().zip(subjects) {
            if let Some(user_id) = user_id {
                ensure_church_user(&mut *tx, activity.church_id, user_id, "user_id").await?;
            }
            let checked_in_at = (entry.status == AttendanceStatus::Present).then(chrono::Utc::now);

            let row: Attendance = sqlx::query_as(&format!(
                "INSERT INTO attendance (id, church_id, branch_id, activity_id, user_id, visitor_name, status, \
                 checked_in_at, recorded_by) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (activity_id, user_id) WHERE user_id IS NOT NULL AND NOT is_deleted \
                 DO UPDATE SET status = EXCLUDED.status, checked_in_at = EXCLUDED.checked_in_at, \
                 recorded_by = EXCLUDED.recorded_by, updated_at = now() \
                 RETURNING {}",
                ATTENDANCE_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(activity.church_id)
            .bind(activity.branch_id)
            .bind(activity.id)
            .bind(user_id)
            .bind(visitor_name)
            .bind(entry.status.as_str())
            .bind(checked_in_at)
            .bind(viewer.id)
            .fetch_one(&mut *tx)
            .await?;
            recorded.push(row);
        }
        tx.commit().await?;

        tracing::info!("Recorded {} attendance entries for activity {}", recorded.len(), activity.id);
        Ok(recorded)
    }

    pub async fn list_for_activity(&self, viewer: &Viewer, activity_id: Uuid, query: &ListQuery) -> Result<Page<Attendance>, ServiceError> {
        let activity = ActivityService::new(self.pool.clone()).get_writable(viewer, activity_id).await?;
        let mut clause = serde_json::Map::new();
        clause.insert("activity_id".to_string(), json!(activity.id));
        Ok(self
            .repository()
            .page(list_filter(clause, "created_at asc"), query.page(), query.limit())
            .await?)
    }

    /// The caller's own attendance history, newest first
    pub async fn list_mine(&self, viewer: &Viewer, query: &ListQuery) -> Result<Page<Attendance>, ServiceError> {
        let mut clause = serde_json::Map::new();
        clause.insert("user_id".to_string(), json!(viewer.id));
        Ok(self
            .repository()
            .page(list_filter(clause, "created_at desc"), query.page(), query.limit())
            .await?)
    }
}
