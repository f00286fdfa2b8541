use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ensure_church_user, list_filter, non_blank, search_clause, FieldErrors, ServiceError};
use crate::access::{Scope, Viewer};
use crate::auth::Role;
use crate::database::models::Branch;
use crate::database::Repository;
use crate::filter::FilterData;
use crate::types::{double_option, ListQuery, Page};

const BRANCH_COLUMNS: &str = "id, church_id, name, address, city, phone, email, pastor_id, is_deleted, created_at, updated_at";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBranch {
    /// Superadmins only
    pub church_id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub pastor_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBranch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub pastor_id: Option<Option<Uuid>>,
}

pub struct BranchService {
    pool: PgPool,
}

impl BranchService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repository(&self) -> Repository<Branch> {
        Repository::new("branches", self.pool.clone())
    }

    pub async fn list(&self, viewer: &Viewer, query: &ListQuery) -> Result<Page<Branch>, ServiceError> {
        let scope = Scope::resolve(viewer, query.church_id, None)?;
        let mut clause = scope.where_clause();
        if let Some(pattern) = query.search_pattern() {
            clause.insert("$or".to_string(), search_clause(&pattern, &["name", "city"]));
        }
        Ok(self
            .repository()
            .page(list_filter(clause, "name asc"), query.page(), query.limit())
            .await?)
    }

    pub async fn get(&self, viewer: &Viewer, id: Uuid) -> Result<Branch, ServiceError> {
        let branch = self
            .repository()
            .select_one(FilterData {
                where_clause: Some(json!({ "id": id })),
                ..Default::default()
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("Branch not found"))?;
        viewer.ensure_readable("Branch", branch.church_id)?;
        Ok(branch)
    }

    pub async fn create(&self, viewer: &Viewer, input: CreateBranch) -> Result<Branch, ServiceError> {
        viewer.require(&Role::ADMINS)?;
        let scope = Scope::resolve(viewer, input.church_id, None)?;

        let email = non_blank(input.email).map(|e| e.to_lowercase());
        let mut errors = FieldErrors::new();
        errors.require_text("name", &input.name);
        if let Some(email) = &email {
            errors.check_email("email", email);
        }
        errors.into_result()?;

        if let Some(pastor_id) = input.pastor_id {
            ensure_church_user(&self.pool, scope.church_id, pastor_id, "pastor_id").await?;
        }

        let branch: Branch = sqlx::query_as(&format!(
            "INSERT INTO branches (id, church_id, name, address, city, phone, email, pastor_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            BRANCH_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(scope.church_id)
        .bind(input.name.trim())
        .bind(non_blank(input.address))
        .bind(non_blank(input.city))
        .bind(non_blank(input.phone))
        .bind(email)
        .bind(input.pastor_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created branch {} in church {}", branch.id, branch.church_id);
        Ok(branch)
    }

    pub async fn update(&self, viewer: &Viewer, id: Uuid, patch: UpdateBranch) -> Result<Branch, ServiceError> {
        viewer.require(&Role::ADMINS)?;
        let mut branch = self.get(viewer, id).await?;

        let mut errors = FieldErrors::new();
        if let Some(name) = patch.name {
            errors.require_text("name", &name);
            branch.name = name.trim().to_string();
        }
        if let Some(address) = patch.address {
            branch.address = non_blank(address);
        }
        if let Some(city) = patch.city {
            branch.city = non_blank(city);
        }
        if let Some(phone) = patch.phone {
            branch.phone = non_blank(phone);
        }
        if let Some(email) = patch.email {
            branch.email = non_blank(email).map(|e| e.to_lowercase());
            if let Some(email) = &branch.email {
                errors.check_email("email", email);
            }
        }
        errors.into_result()?;

        if let Some(pastor_id) = patch.pastor_id {
            if let Some(pastor_id) = pastor_id {
                ensure_church_user(&self.pool, branch.church_id, pastor_id, "pastor_id").await?;
            }
            branch.pastor_id = pastor_id;
        }

        let branch: Branch = sqlx::query_as(&format!(
            "UPDATE branches SET name = $2, address = $3, city = $4, phone = $5, email = $6, pastor_id = $7, \
             updated_at = now() WHERE id = $1 RETURNING {}",
            BRANCH_COLUMNS
        ))
        .bind(id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.city)
        .bind(&branch.phone)
        .bind(&branch.email)
        .bind(branch.pastor_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(branch)
    }

    /// Refuses while live members are still attached.
    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<Branch, ServiceError> {
        viewer.require(&Role::ADMINS)?;
        let branch = self.get(viewer, id).await?;

        let (attached,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE branch_id = $1 AND is_deleted = false")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if attached > 0 {
            return Err(ServiceError::Conflict {
                field: None,
                message: format!("Branch still has {} members; move them first", attached),
            });
        }

        let branch: Branch = sqlx::query_as(&format!(
            "UPDATE branches SET is_deleted = true, updated_at = now() WHERE id = $1 RETURNING {}",
            BRANCH_COLUMNS
        ))
        .bind(branch.id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Branch {} deleted by {}", branch.id, viewer.id);
        Ok(branch)
    }
}
