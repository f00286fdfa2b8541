use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ensure_branch, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::{Scope, Viewer};
use crate::auth::Role;
use crate::database::models::Activity;
use crate::database::Repository;
use crate::filter::FilterData;
use crate::types::{double_option, DateWindow, ListQuery, Page};

const ACTIVITY_COLUMNS: &str = "id, church_id, branch_id, title, description, activity_type, starts_at, ends_at, \
     location, created_by, is_deleted, created_at, updated_at";

pub const ACTIVITY_MANAGERS: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateActivity {
    pub church_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateActivity {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub activity_type: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
}

fn check_window(errors: &mut FieldErrors, starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) {
    if let Some(ends_at) = ends_at {
        if ends_at < starts_at {
            errors.add("ends_at", "Activity cannot end before it starts");
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// `starts_at` bounds for an inclusive date window
pub(crate) fn starts_at_clause(window: &DateWindow) -> Option<Value> {
    let mut bounds = Map::new();
    if let Some(from) = window.from {
        bounds.insert("$gte".to_string(), json!(start_of_day(from)));
    }
    if let Some(to) = window.to.and_then(|to| to.succ_opt()) {
        bounds.insert("$lt".to_string(), json!(start_of_day(to)));
    }
    (!bounds.is_empty()).then_some(Value::Object(bounds))
}

pub struct ActivityService {
    pool: PgPool,
}

impl ActivityService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<Activity> {
        Repository::new("activities", self.pool.clone())
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery, window: &DateWindow) -> Result<Page<Activity>, ServiceError> {
        if !window.is_ordered() {
            return Err(ServiceError::invalid("from", "from must not be after to"));
        }
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?;
        let mut clause = scope.where_clause();
        if let Some(bounds) = starts_at_clause(window) {
            clause.insert("starts_at".to_string(), bounds);
        }
        if let Some(pattern) = query.search_pattern() {
            clause.insert("$or".to_string(), search_clause(&pattern, &["title", "location", "activity_type"]));
        }
        Ok(self
            .repository()
            .page(list_filter(clause, "starts_at desc"), query.page(), query.limit())
            .await?)
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<Activity, ServiceError> {
        let activity = self
            .repository()
            .select_one(FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Activity not found"))?;
        viewer.ensure_readable("Activity", activity.church_id)?;
        Ok(activity)
    }

    pub(crate) async fn get_writable(&self, viewer: &Viewer, id: Uuid) -> Result<Activity, ServiceError> {
        viewer.require(&ACTIVITY_MANAGERS)?;
        let activity = self.get(viewer, id).await?;
        viewer.ensure_writable("Activity", activity.church_id, Some(activity.branch_id))?;
        Ok(activity)
    }

    pub async fn create(&self, viewer: &Viewer, input: CreateActivity) -> Result<Activity, ServiceError> {
        viewer.require(&ACTIVITY_MANAGERS)?;
        let scope = Scope::resolve(viewer, input.church_id, Some(input.branch_id))?;
        viewer.ensure_writable("Branch", scope.church_id, scope.branch_id)?;

        let mut errors = FieldErrors::new();
        errors.require_text("title", &input.title);
        check_window(&mut errors, input.starts_at, input.ends_at);
        errors.into_result()?;

        ensure_branch(&self.pool, scope.church_id, input.branch_id).await?;

        let activity: Activity = sqlx::query_as(&format!(
            "INSERT INTO activities (id, church_id, branch_id, title, description, activity_type, starts_at, \
             ends_at, location, created_by) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            ACTIVITY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(input.branch_id)
        .bind(input.title.trim())
        .bind(non_blank(input.description))
        .bind(non_blank(input.activity_type).unwrap_or_else(|| "service".to_string()))
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(non_blank(input.location))
        .bind(viewer.id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Scheduled activity {} for {}", activity.id, activity.starts_at);
        Ok(activity)
    }

    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdateActivity) -> Result<Activity, ServiceError> {
        let mut activity = self.get_writable(viewer, id).await?;

        let mut errors = FieldErrors::new();
        if let Some(title) = patch.title {
            errors.require_text("title", &title);
            activity.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            activity.description = non_blank(description);
        }
        if let Some(activity_type) = patch.activity_type {
            errors.require_text("activity_type", &activity_type);
            activity.activity_type = activity_type.trim().to_string();
        }
        if let Some(starts_at) = patch.starts_at {
            activity.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            activity.ends_at = ends_at;
        }
        if let Some(location) = patch.location {
            activity.location = non_blank(location);
        }
        check_window(&mut errors, activity.starts_at, activity.ends_at);
        errors.into_result()?;

        let activity: Activity = sqlx::query_as(&format!(
            "UPDATE activities SET title = $2, description = $3, activity_type = $4, starts_at = $5, ends_at = $6, \
             location = $7, updated_at = now() WHERE id = $1 RETURNING {}",
            ACTIVITY_COLUMNS
        ))
        .bind(id)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.activity_type)
        .bind(activity.starts_at)
        .bind(activity.ends_at)
        .bind(&activity.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(activity)
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<Activity, ServiceError> {
        let activity = self.get_writable(viewer, id).await?;
        let activity: Activity = sqlx::query_as(&format!(
            "UPDATE activities SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            ACTIVITY_COLUMNS
        ))
        .bind(activity.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_day_aligned() {
        let window = DateWindow {
            from: NaiveDate::from_ymd_opt(2024, 6, 1),
            to: NaiveDate::from_ymd_opt(2024, 6, 30),
        };
        let bounds = starts_at_clause(&window).unwrap();
        assert_eq!(bounds["$gte"], json!("2024-06-01T00:00:00Z"));
        assert_eq!(bounds["$lt"], json!("2024-07-01T00:00:00Z"));
        assert!(starts_at_clause(&DateWindow::default()).is_none());
    }

    #[test]
    fn end_before_start_is_invalid() {
        let start = start_of_day(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        let mut errors = FieldErrors::new();
        check_window(&mut errors, start, Some(start - chrono::Duration::hours(1)));
        assert!(errors.into_result().is_err());
    }
}
