pub mod auth;
pub mod extract;
pub mod response;
pub mod validate_user;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use extract::{ApiJson, ApiQuery};
pub use response::{ApiResponse, ApiResult};
pub use validate_user::{require_superadmin_middleware, validate_user_middleware, DbPool, ValidatedUser};
