use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ensure_branch, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::{Scope, Viewer};
use crate::auth::Role;
use crate::database::models::content::ContentType;
use crate::database::models::Content;
use crate::database::Repository;
use crate::filter::FilterData;
use crate::types::{double_option, ListQuery, Page};

const CONTENT_COLUMNS: &str = "id, church_id, branch_id, title, body, content_type, author_id, media_url, \
     is_published, published_at, is_deleted, created_at, updated_at";

pub const CONTENT_MANAGERS: [Role; 4] = [Role::Superadmin, Role::Admin, Role::Bishop, Role::Pastor];

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ContentFilter {
    pub content_type: Option<ContentType>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContent {
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub content_type: ContentType,
    pub media_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateContent {
    pub title: Option<String>,
    pub body: Option<String>,
    pub content_type: Option<ContentType>,
    #[serde(default, deserialize_with = "double_option")]
    pub media_url: Option<Option<String>>,
    pub is_published: Option<bool>,
}

/// `published_at` follows the publish flag: stamped when first published,
/// cleared when withdrawn.
pub fn published_at(
    was_published: bool,
    current: Option<DateTime<Utc>>,
    now_published: bool,
) -> Option<DateTime<Utc>> {
    match (was_published, now_published) {
        (false, true) => Some(Utc::now()),
        (true, true) => current.or_else(|| Some(Utc::now())),
        (_, false) => None,
    }
}

fn is_manager(viewer: &Viewer) -> bool {
    CONTENT_MANAGERS.contains(&viewer.role)
}

pub struct ContentService {
    pool: PgPool,
}

impl ContentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<Content> {
        Repository::new("contents", self.pool.clone())
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery, filter: &ContentFilter) -> Result<Page<Content>, ServiceError> {
        let scope = Scope::resolve(viewer, query.church_id, query.branch_id)?;
        let mut clause = scope.where_clause();
        if !is_manager(viewer) {
            clause.insert("is_published".to_string(), json!(true));
        }
        if let Some(content_type) = filter.content_type {
            clause.insert("content_type".to_string(), json!(content_type.as_str()));
        }
        if let Some(pattern) = query.search_pattern() {
            clause.insert("$or".to_string(), search_clause(&pattern, &["title", "body"]));
        }
        Ok(self
            .repository()
            .page(list_filter(clause, "published_at desc, created_at desc"), query.page(), query.limit())
            .await?)
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<Content, ServiceError> {
        let content = self
            .repository()
            .select_one(FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?
            .filter(|content| viewer.can_reach_church(content.church_id))
            .filter(|content| content.is_published || is_manager(viewer))
            .ok_or_else(|| ServiceError::not_found("Content not found"))?;
        Ok(content)
    }

    async fn get_writable(&self, viewer: &Viewer, id: Uuid) -> Result<Content, ServiceError> {
        viewer.require(&CONTENT_MANAGERS)?;
        let content = self.get(viewer, id).await?;
        viewer.ensure_writable("Content", content.church_id, content.branch_id)?;
        Ok(content)
    }

    pub async fn create(&self, viewer: &Viewer, input: CreateContent) -> Result<Content, ServiceError> {
        viewer.require(&CONTENT_MANAGERS)?;
        let branch_id = match viewer.role {
            Role::Pastor => input.branch_id.or(viewer.branch_id),
            _ => input.branch_id,
        };
        let scope = Scope::resolve(viewer, input.church_id, branch_id)?;
        viewer.ensure_writable("Branch", scope.church_id, scope.branch_id)?;

        let mut errors = FieldErrors::new();
        errors.require_text("title", &input.title);
        errors.require_text("body", &input.body);
        errors.into_result()?;

        if let Some(branch_id) = scope.branch_id {
            ensure_branch(&self.pool, scope.church_id, branch_id).await?;
        }

        let content: Content = sqlx::query_as(&format!(
            "INSERT INTO contents (id, church_id, branch_id, title, body, content_type, author_id, media_url, \
             is_published, published_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            CONTENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(scope.branch_id)
        .bind(input.title.trim())
        .bind(input.body.trim())
        .bind(input.content_type.as_str())
        .bind(viewer.id)
        .bind(non_blank(input.media_url))
        .bind(input.is_published)
        .bind(published_at(false, None, input.is_published))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("{} {} created by {}", content.content_type, content.id, viewer.id);
        Ok(content)
    }

    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdateContent) -> Result<Content, ServiceError> {
        let mut content = self.get_writable(viewer, id).await?;

        let mut errors = FieldErrors::new();
        if let Some(title) = patch.title {
            errors.require_text("title", &title);
            content.title = title.trim().to_string();
        }
        if let Some(body) = patch.body {
            errors.require_text("body", &body);
            content.body = body.trim().to_string();
        }
        errors.into_result()?;
        if let Some(content_type) = patch.content_type {
            content.content_type = content_type.as_str().to_string();
        }
        if let Some(media_url) = patch.media_url {
            content.media_url = non_blank(media_url);
        }
        if let Some(is_published) = patch.is_published {
            content.published_at = published_at(content.is_published, content.published_at, is_published);
            content.is_published = is_published;
        }

        let content: Content = sqlx::query_as(&format!(
            "UPDATE contents SET title = $2, body = $3, content_type = $4, media_url = $5, is_published = $6, \
             published_at = $7, updated_at = now() WHERE id = $1 RETURNING {}",
            CONTENT_COLUMNS
        ))
        .bind(id)
        .bind(&content.title)
        .bind(&content.body)
        .bind(&content.content_type)
        .bind(&content.media_url)
        .bind(content.is_published)
        .bind(content.published_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(content)
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<Content, ServiceError> {
        let content = self.get_writable(viewer, id).await?;
        let content: Content = sqlx::query_as(&format!(
            "UPDATE contents SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            CONTENT_COLUMNS
        ))
        .bind(content.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_toggle_stamps_and_clears() {
        assert!(published_at(false, None, true).is_some());
        assert!(published_at(true, Some(Utc::now()), false).is_none());

        let first = Utc::now() - chrono::Duration::days(3);
        assert_eq!(published_at(true, Some(first), true), Some(first));
        assert_eq!(published_at(false, None, false), None);
    }
}
