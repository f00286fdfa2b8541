use serde::Deserialize;
use serde_json::Map;
use sqlx::PgPool;
use uuid::Uuid;

use super::{audit, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::Viewer;
use crate::auth::Role;
use crate::database::models::Church;
use crate::database::Repository;
use crate::types::{double_option, ListQuery, Page};

const CHURCH_COLUMNS: &str = "id, name, slug, email, phone, address, is_active, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChurchFilter {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChurch {
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateChurch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Slugs appear in login requests: lowercase letters, digits and hyphens.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.len() < 2 || slug.len() > 64 {
        return Err("Slug must be between 2 and 64 characters".to_string());
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("Slug can only contain lowercase letters, numbers and hyphens".to_string());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("Slug cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

pub struct ChurchService {
    pool: PgPool,
}

impl ChurchService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery, filter: &ChurchFilter) -> Result<Page<Church>, ServiceError> {
        viewer.require(&[Role::Superadmin])?;
        let mut clause = Map::new();
        if let Some(pattern) = query.search_pattern() {
            clause.insert("$or".to_string(), search_clause(&pattern, &["name", "slug"]));
        }
        let mut data = list_filter(clause, "name asc");
        data.include_deleted = filter.include_deleted;

        Ok(Repository::<Church>::new("churches", self.pool.clone())
            .page(data, query.page(), query.limit())
            .await?)
    }

    /// Superadmins read any church; admins read their own.
    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<Church, ServiceError> {
        viewer.require(&Role::ADMINS)?;
        viewer.ensure_readable("Church", id)?;
        let church: Option<Church> =
            sqlx::query_as(&format!("SELECT {} FROM churches WHERE id = $1 AND is_deleted = false", CHURCH_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        church.ok_or_else(|| ServiceError::not_found("Church not found"))
    }

    pub async fn create(&self, viewer: &Viewer, input: CreateChurch) -> Result<Church, ServiceError> {
        viewer.require(&[Role::Superadmin])?;
        let slug = input.slug.trim().to_lowercase();
        let email = non_blank(input.email).map(|e| e.to_lowercase());

        let mut errors = FieldErrors::new();
        errors.require_text("name", &input.name);
        if let Err(problem) = validate_slug(&slug) {
            errors.add("slug", problem);
        }
        if let Some(email) = &email {
            errors.check_email("email", email);
        }
        errors.into_result()?;

        let church: Church = sqlx::query_as(&format!(
            "INSERT INTO churches (id, name, slug, email, phone, address) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            CHURCH_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(&slug)
        .bind(email)
        .bind(non_blank(input.phone))
        .bind(non_blank(input.address))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created church {} ({})", church.slug, church.id);
        Ok(church)
    }

    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdateChurch) -> Result<Church, ServiceError> {
        viewer.require(&[Role::Superadmin])?;
        let mut church = self.get(viewer, id).await?;

        let mut errors = FieldErrors::new();
        if let Some(name) = patch.name {
            errors.require_text("name", &name);
            church.name = name.trim().to_string();
        }
        if let Some(slug) = patch.slug {
            let slug = slug.trim().to_lowercase();
            if let Err(problem) = validate_slug(&slug) {
                errors.add("slug", problem);
            }
            church.slug = slug;
        }
        if let Some(email) = patch.email {
            church.email = non_blank(email).map(|e| e.to_lowercase());
            if let Some(email) = &church.email {
                errors.check_email("email", email);
            }
        }
        if let Some(phone) = patch.phone {
            church.phone = non_blank(phone);
        }
        if let Some(address) = patch.address {
            church.address = non_blank(address);
        }
        if let Some(active) = patch.is_active {
            church.is_active = active;
        }
        errors.into_result()?;

        let church: Church = sqlx::query_as(&format!(
            "UPDATE churches SET name = $2, slug = $3, email = $4, phone = $5, address = $6, is_active = $7, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            CHURCH_COLUMNS
        ))
        .bind(id)
        .bind(&church.name)
        .bind(&church.slug)
        .bind(&church.email)
        .bind(&church.phone)
        .bind(&church.address)
        .bind(church.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(church)
    }

    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<Church, ServiceError> {
        self.set_deleted(viewer, id, true).await
    }

    pub async fn restore(&self, viewer: &Viewer, id: Uuid) -> Result<Church, ServiceError> {
        self.set_deleted(viewer, id, false).await
    }

    async fn set_deleted(&self, viewer: &Viewer, id: Uuid, deleted: bool) -> Result<Church, ServiceError> {
        viewer.require(&[Role::Superadmin])?;
        let church: Option<Church> = sqlx::query_as(&format!(
            "UPDATE churches SET is_deleted = $2, updated_at = now() WHERE id = $1 AND is_deleted = $3 RETURNING {}",
            CHURCH_COLUMNS
        ))
        .bind(id)
        .bind(deleted)
        .bind(!deleted)
        .fetch_optional(&self.pool)
        .await?;

        let church = church.ok_or_else(|| {
            let state = if deleted { "active" } else { "deleted" };
            ServiceError::not_found(format!("No {} church with id {}", state, id))
        })?;
        tracing::info!("Church {} {}", church.slug, if deleted { "deleted" } else { "restored" });
        audit(viewer, if deleted { "delete" } else { "restore" }, "church", church.id);
        Ok(church)
    }
}
