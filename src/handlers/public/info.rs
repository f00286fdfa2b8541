use serde_json::{json, Value};

use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET / - service name, version and environment
pub async fn root_get() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config::config().environment,
        "endpoints": {
            "auth": "/auth/login, /auth/refresh",
            "api": "/api/*",
            "root": "/api/root/*",
        }
    })))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health_get() -> ApiResult<Value> {
    match DatabaseManager::health_check().await {
        Ok(()) => Ok(ApiResponse::success(json!({ "status": "ok", "database": "connected" }))),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            Err(ApiError::service_unavailable("Database unavailable"))
        }
    }
}
