use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ensure_branch, ensure_church_user, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::{Scope, Viewer};
use crate::auth::Role;
use crate::database::models::SmallGroup;
use crate::database::Repository;
use crate::filter::FilterData;
use crate::types::{double_option, ListQuery, Page};

const GROUP_COLUMNS: &str = "id, church_id, branch_id, name, description, leader_id, meeting_day, meeting_time, \
     location, member_ids, is_deleted, created_at, updated_at";

/// Roles that run small groups
pub const GROUP_MANAGERS: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSmallGroup {
    pub church_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub leader_id: Option<Uuid>,
    pub meeting_day: Option<String>,
    pub meeting_time: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSmallGroup {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub leader_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub meeting_day: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub meeting_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
}

/// The leader always counts as a member.
pub(crate) fn with_leader(mut members: Vec<Uuid>, leader_id: Option<Uuid>) -> Vec<Uuid> {
    if let Some(leader_id) = leader_id {
        if !members.contains(&leader_id) {
            members.push(leader_id);
        }
    }
    members
}

pub struct SmallGroupService {
    pool: PgPool,
}

impl SmallGroupService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<SmallGroup> {
        Repository::new("small_groups", self.pool.clone())
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery) -> Result<Page<SmallGroup>, ServiceError> {
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?;
        let mut clause = scope.where_clause();
        if let Some(pattern) = query.search_pattern() {
            clause.insert("$or".to_string(), search_clause(&pattern, &["name", "location"]));
        }
        Ok(self
            .repository()
            .page(list_filter(clause, "name asc"), query.page(), query.limit())
            .await?)
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<SmallGroup, ServiceError> {
        let group = self
            .repository()
            .select_one(FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Small group not found"))?;
        viewer.ensure_readable("Small group", group.church_id)?;
        Ok(group)
    }

    async fn get_writable(&self, viewer: &Viewer, id: Uuid) -> Result<SmallGroup, ServiceError> {
        viewer.require(&GROUP_MANAGERS)?;
        let group = self.get(viewer, id).await?;
        viewer.ensure_writable("Small group", group.church_id, Some(group.branch_id))?;
        Ok(group)
    }

    pub async fn create(&self, viewer: &Viewer, input: CreateSmallGroup) -> Result<SmallGroup, ServiceError> {
        viewer.require(&GROUP_MANAGERS)?;
        let scope = Scope::resolve(viewer, input.church_id, Some(input.branch_id))?;
        viewer.ensure_writable("Branch", scope.church_id, scope.branch_id)?;

        let mut errors = FieldErrors::new();
        errors.require_text("name", &input.name);
        errors.into_result()?;

        ensure_branch(&self.pool, scope.church_id, input.branch_id).await?;
        if let Some(leader_id) = input.leader_id {
            ensure_church_user(&self.pool, scope.church_id, leader_id, "leader_id").await?;
        }
        let members = with_leader(Vec::new(), input.leader_id);

        let group: SmallGroup = sqlx::query_as(&format!(
            "INSERT INTO small_groups (id, church_id, branch_id, name, description, leader_id, meeting_day, \
             meeting_time, location, member_ids) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(input.branch_id)
        .bind(input.name.trim())
        .bind(non_blank(input.description))
        .bind(input.leader_id)
        .bind(non_blank(input.meeting_day))
        .bind(non_blank(input.meeting_time))
        .bind(non_blank(input.location))
        .bind(&members)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created small group {} in branch {}", group.id, group.branch_id);
        Ok(group)
    }

    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdateSmallGroup) -> Result<SmallGroup, ServiceError> {
        let mut group = self.get_writable(viewer, id).await?;

        if let Some(name) = patch.name {
            let mut errors = FieldErrors::new();
            errors.require_text("name", &name);
            errors.into_result()?;
            group.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            group.description = non_blank(description);
        }
        if let Some(leader_id) = patch.leader_id {
            if let Some(leader_id) = leader_id {
                ensure_church_user(&self.pool, group.church_id, leader_id, "leader_id").await?;
            }
            group.leader_id = leader_id;
        }
        if let Some(meeting_day) = patch.meeting_day {
            group.meeting_day = non_blank(meeting_day);
        }
        if let Some(meeting_time) = patch.meeting_time {
            group.meeting_time = non_blank(meeting_time);
        }
        if let Some(location) = patch.location {
            group.location = non_blank(location);
        }

        let group: SmallGroup = sqlx::query_as(&format!(
            "UPDATE small_groups SET name = $2, description = $3, leader_id = $4, meeting_day = $5, \
             meeting_time = $6, location = $7, member_ids = CASE WHEN $4::uuid IS NULL OR $4 = ANY(member_ids) \
             THEN member_ids ELSE array_append(member_ids, $4) END, updated_at = now() WHERE id = $1 RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.leader_id)
        .bind(&group.meeting_day)
        .bind(&group.meeting_time)
        .bind(&group.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<SmallGroup, ServiceError> {
        let group = self.get_writable(viewer, id).await?;
        let group: SmallGroup = sqlx::query_as(&format!(
            "UPDATE small_groups SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    /// Idempotent: adding an existing member changes nothing.
    pub async fn add_member(&self, viewer: &Viewer, id: Uuid, user_id: Uuid) -> Result<SmallGroup, ServiceError> {
        let group = self.get_writable(viewer, id).await?;
        ensure_church_user(&self.pool, group.church_id, user_id, "user_id").await?;

        let group: SmallGroup = sqlx::query_as(&format!(
            "UPDATE small_groups SET member_ids = CASE WHEN $2 = ANY(member_ids) THEN member_ids \
             ELSE array_append(member_ids, $2) END, updated_at = now() WHERE id = $1 RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    pub async fn remove_member(&self, viewer: &Viewer, id: Uuid, user_id: Uuid) -> Result<SmallGroup, ServiceError> {
        let group = self.get_writable(viewer, id).await?;
        if !group.member_ids.contains(&user_id) {
            return Err(ServiceError::not_found("User is not a member of this group"));
        }

        let group: SmallGroup = sqlx::query_as(&format!(
            "UPDATE small_groups SET member_ids = array_remove(member_ids, $2), \
             leader_id = CASE WHEN leader_id = $2 THEN NULL ELSE leader_id END, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_joins_members_once() {
        let leader = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(with_leader(Vec::new(), Some(leader)), vec![leader]);
        assert_eq!(with_leader(vec![other, leader], Some(leader)), vec![other, leader]);
        assert_eq!(with_leader(vec![other], None), vec![other]);
    }
}
