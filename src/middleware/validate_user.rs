use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::access::Viewer;
use crate::auth::Role;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::services::UserService;

/// Shared pool handed to handlers as a request extension
#[derive(Clone)]
pub struct DbPool(pub PgPool);

/// The caller as currently stored: live, active, in an active church, and
/// still holding the role and church the token claims.
#[derive(Clone, Debug)]
pub struct ValidatedUser {
    pub id: Uuid,
    pub church_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub role: Role,
    pub email: String,
    pub name: String,
}

impl ValidatedUser {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            id: self.id,
            church_id: self.church_id,
            branch_id: self.branch_id,
            role: self.role,
        }
    }
}

/// Middleware that checks the JWT subject against the users table
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let pool = DatabaseManager::pool().await.map_err(ApiError::from)?;

    let user = UserService::new(pool.clone())
        .session_user(auth_user.user_id)
        .await
        .map_err(|e| {
            tracing::warn!("User validation failed for {}: {}", auth_user.user_id, e);
            ApiError::from(e)
        })?;

    if user.role != auth_user.role || user.church_id != auth_user.church_id {
        tracing::warn!(
            "User validation failed: token for {} claims {} but stored role is {}",
            user.id,
            auth_user.role,
            user.role
        );
        return Err(ApiError::forbidden("Account changed since login; sign in again"));
    }

    let validated_user = ValidatedUser {
        id: user.id,
        church_id: user.church_id,
        // Branch moves take effect without a new token
        branch_id: user.branch_id,
        role: user.role,
        email: user.email.clone(),
        name: user.full_name(),
    };

    tracing::debug!("User validation successful: {} ({}) as {}", validated_user.name, validated_user.email, validated_user.role);

    request.extensions_mut().insert(validated_user);
    request.extensions_mut().insert(DbPool(pool));

    Ok(next.run(request).await)
}

/// Gate for `/api/root/*`
pub async fn require_superadmin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let role = request
        .extensions()
        .get::<ValidatedUser>()
        .map(|user| user.role)
        .ok_or_else(|| ApiError::unauthorized("User validation required before superadmin check"))?;

    if role != Role::Superadmin {
        tracing::warn!("Denied {} access to {}", role, request.uri().path());
        return Err(ApiError::forbidden("Superadmin access required"));
    }

    Ok(next.run(request).await)
}
