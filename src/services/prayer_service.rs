use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{list_filter, search_clause, FieldErrors, ServiceError};
use crate::access::{Scope, Viewer};
use crate::database::models::prayer_request::PrayerStatus;
use crate::database::models::PrayerRequest;
use crate::database::Repository;
use crate::filter::FilterData;
use crate::types::{ListQuery, Page};

const PRAYER_COLUMNS: &str = "id, church_id, branch_id, requested_by, title, body, is_private, is_anonymous, status, \
     is_deleted, created_at, updated_at";

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PrayerFilter {
    pub status: Option<PrayerStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePrayerRequest {
    /// Superadmins only
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrayerRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub is_private: Option<bool>,
    pub is_anonymous: Option<bool>,
    pub status: Option<PrayerStatus>,
}

/// Private requests are visible to pastoral staff and their author only.
fn can_see(request: &PrayerRequest, viewer: &Viewer) -> bool {
    viewer.can_reach_church(request.church_id)
        && (!request.is_private || viewer.role.is_pastoral() || request.requested_by == Some(viewer.id))
}

/// Anonymous requests keep their author from everyone but pastoral staff.
pub fn present(mut request: PrayerRequest, viewer: &Viewer) -> PrayerRequest {
    let own = request.requested_by == Some(viewer.id);
    if request.is_anonymous && !own && !viewer.role.is_pastoral() {
        request.requested_by = None;
    }
    request
}

pub struct PrayerService {
    pool: PgPool,
}

impl PrayerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<PrayerRequest> {
        Repository::new("prayer_requests", self.pool.clone())
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery, filter: &PrayerFilter) -> Result<Page<PrayerRequest>, ServiceError> {
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?;
        let mut clause = scope.where_clause();
        if let Some(status) = filter.status {
            clause.insert("status".to_string(), json!(status.as_str()));
        }

        let mut all_of = Vec::new();
        if !viewer.role.is_pastoral() {
            all_of.push(json!({ "$or": [{ "is_private": false }, { "requested_by": viewer.id }] }));
        }
        if let Some(pattern) = query.search_pattern() {
            all_of.push(json!({ "$or": search_clause(&pattern, &["title", "body"]) }));
        }
        if !all_of.is_empty() {
            clause.insert("$and".to_string(), Value::Array(all_of));
        }

        let page = self
            .repository()
            .page(list_filter(clause, "created_at desc"), query.page(), query.limit())
            .await?;
        Ok(page.map(|request| present(request, viewer)))
    }

    async fn find(&self, viewer: &Viewer, id: Uuid) -> Result<PrayerRequest, ServiceError> {
        let request = self
            .repository()
            .select_one(FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?
            .filter(|request| can_see(request, viewer))
            .ok_or_else(|| ServiceError::not_found("Prayer request not found"))?;
        Ok(request)
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<PrayerRequest, ServiceError> {
        Ok(present(self.find(viewer, id).await?, viewer))
    }

    pub async fn create(&self, viewer: &Viewer, input: CreatePrayerRequest) -> Result<PrayerRequest, ServiceError> {
        let scope = Scope::resolve(viewer, input.church_id, input.branch_id.or(viewer.branch_id))?;

        let mut errors = FieldErrors::new();
        errors.require_text("title", &input.title);
        errors.require_text("body", &input.body);
        errors.into_result()?;

        if let Some(branch_id) = scope.branch_id {
            super::ensure_branch(&self.pool, scope.church_id, branch_id).await?;
        }

        let request: PrayerRequest = sqlx::query_as(&format!(
            "INSERT INTO prayer_requests (id, church_id, branch_id, requested_by, title, body, is_private, is_anonymous) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            PRAYER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(viewer.id)
        .bind(input.title.trim())
        .bind(input.body.trim())
        .bind(input.is_private)
        .bind(input.is_anonymous)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    /// Authors edit their words; pastoral staff move the status along.
    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdatePrayerRequest) -> Result<PrayerRequest, ServiceError> {
        let mut request = self.find(viewer, id).await?;
        let own = request.requested_by == Some(viewer.id);

        let edits_text =
            patch.title.is_some() || patch.body.is_some() || patch.is_private.is_some() || patch.is_anonymous.is_some();
        if edits_text && !own {
            return Err(ServiceError::forbidden("Only the author may edit a prayer request"));
        }
        if patch.status.is_some() && !viewer.role.is_pastoral() {
            return Err(ServiceError::forbidden("Only pastoral staff may change the status"));
        }

        let mut errors = FieldErrors::new();
        if let Some(title) = patch.title {
            errors.require_text("title", &title);
            request.title = title.trim().to_string();
        }
        if let Some(body) = patch.body {
            errors.require_text("body", &body);
            request.body = body.trim().to_string();
        }
        errors.into_result()?;
        if let Some(is_private) = patch.is_private {
            request.is_private = is_private;
        }
        if let Some(is_anonymous) = patch.is_anonymous {
            request.is_anonymous = is_anonymous;
        }
        if let Some(status) = patch.status {
            request.status = status.as_str().to_string();
        }

        let request: PrayerRequest = sqlx::query_as(&format!(
            "UPDATE prayer_requests SET title = $2, body = $3, is_private = $4, is_anonymous = $5, status = $6, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            PRAYER_COLUMNS
        ))
        .bind(id)
        .bind(&request.title)
        .bind(&request.body)
        .bind(request.is_private)
        .bind(request.is_anonymous)
        .bind(&request.status)
        .fetch_one(&self.pool)
        .await?;
        Ok(present(request, viewer))
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<PrayerRequest, ServiceError> {
        let request = self.find(viewer, id).await?;
        let own = request.requested_by == Some(viewer.id);
        if !own && !viewer.role.is_admin() {
            return Err(ServiceError::forbidden("Only the author or an administrator may delete this request"));
        }

        let request: PrayerRequest = sqlx::query_as(&format!(
            "UPDATE prayer_requests SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            PRAYER_COLUMNS
        ))
        .bind(request.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(present(request, viewer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use chrono::Utc;

    fn request(author: Uuid, church: Uuid, private: bool, anonymous: bool) -> PrayerRequest {
        let now = Utc::now();
        PrayerRequest {
            id: Uuid::new_v4(),
            church_id: church,
            branch_id: None,
            requested_by: Some(author),
            title: "Healing".to_string(),
            body: "For my mother".to_string(),
            is_private: private,
            is_anonymous: anonymous,
            status: "open".to_string(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn viewer(role: Role, church: Uuid) -> Viewer {
        Viewer { id: Uuid::new_v4(), church_id: Some(church), branch_id: None, role }
    }

    #[test]
    fn anonymous_author_hidden_from_members_only() {
        let church = Uuid::new_v4();
        let author = viewer(Role::Member, church);
        let req = request(author.id, church, false, true);

        assert_eq!(present(req.clone(), &viewer(Role::Member, church)).requested_by, None);
        assert_eq!(present(req.clone(), &viewer(Role::Pastor, church)).requested_by, Some(author.id));
        assert_eq!(present(req, &author).requested_by, Some(author.id));
    }

    #[test]
    fn private_requests_need_pastoral_role_or_authorship() {
        let church = Uuid::new_v4();
        let author = viewer(Role::Member, church);
        let req = request(author.id, church, true, false);

        assert!(can_see(&req, &author));
        assert!(can_see(&req, &viewer(Role::Bishop, church)));
        assert!(!can_see(&req, &viewer(Role::Member, church)));
        assert!(!can_see(&req, &viewer(Role::Pastor, Uuid::new_v4())));
    }
}
