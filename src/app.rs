use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_superadmin_middleware, validate_user_middleware};

/// The full HTTP surface: public routes, `/api/*` behind a bearer token and
/// `/api/root/*` for superadmins.
pub fn app() -> Router {
    let settings = config::config();

    let mut router = Router::new()
        // Public
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .merge(auth_public_routes())
        // Protected
        .merge(api_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.api.max_request_size_bytes));

    if settings.security.enable_cors {
        router = router.layer(cors_layer(&settings.security.cors_origins));
    }
    if settings.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

fn auth_public_routes() -> Router {
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login_post))
        .route("/auth/refresh", post(auth::refresh_post))
}

/// Everything under `/api`. Layers run bottom-up: the token is checked, then
/// the user row, then (for `/api/root`) the superadmin gate.
fn api_routes() -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(branch_routes())
        .merge(user_routes())
        .merge(small_group_routes())
        .merge(activity_routes())
        .merge(finance_routes())
        .merge(prayer_routes())
        .merge(content_routes())
        .route("/api/reports/summary", get(protected::reports::summary))
        .merge(root_routes())
        .route_layer(middleware::from_fn(validate_user_middleware))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

fn auth_routes() -> Router {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::session_whoami))
        .route("/api/auth/password", put(auth::session_password))
}

fn branch_routes() -> Router {
    use protected::branches;

    Router::new()
        .route("/api/branches", get(branches::list).post(branches::create))
        .route(
            "/api/branches/:id",
            get(branches::show).put(branches::update).delete(branches::delete),
        )
}

fn user_routes() -> Router {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", get(users::show).put(users::update).delete(users::delete))
        .route("/api/users/:id/restore", post(users::restore))
}

fn small_group_routes() -> Router {
    use protected::small_groups;

    Router::new()
        .route("/api/small-groups", get(small_groups::list).post(small_groups::create))
        .route(
            "/api/small-groups/:id",
            get(small_groups::show)
                .put(small_groups::update)
                .delete(small_groups::delete),
        )
        .route(
            "/api/small-groups/:id/members/:user_id",
            post(small_groups::member_add).delete(small_groups::member_remove),
        )
}

fn activity_routes() -> Router {
    use protected::{activities, attendance};

    Router::new()
        .route("/api/activities", get(activities::list).post(activities::create))
        .route(
            "/api/activities/:id",
            get(activities::show).put(activities::update).delete(activities::delete),
        )
        .route(
            "/api/activities/:id/attendance",
            get(activities::attendance_list).post(activities::attendance_record),
        )
        .route("/api/attendance/me", get(attendance::mine))
}

fn finance_routes() -> Router {
    use protected::finance;

    Router::new()
        .route("/api/finance", get(finance::list).post(finance::create))
        .route("/api/finance/summary", get(finance::summary))
        .route("/api/finance/:id", get(finance::show).put(finance::update).delete(finance::delete))
}

fn prayer_routes() -> Router {
    use protected::prayer_requests;

    Router::new()
        .route("/api/prayer-requests", get(prayer_requests::list).post(prayer_requests::create))
        .route(
            "/api/prayer-requests/:id",
            get(prayer_requests::show)
                .put(prayer_requests::update)
                .delete(prayer_requests::delete),
        )
}

fn content_routes() -> Router {
    use protected::content;

    Router::new()
        .route("/api/content", get(content::list).post(content::create))
        .route("/api/content/:id", get(content::show).put(content::update).delete(content::delete))
}

fn root_routes() -> Router {
    use elevated::root;

    Router::new()
        .route("/api/root/churches", get(root::church_list).post(root::church_create))
        .route(
            "/api/root/churches/:id",
            get(root::church_show).put(root::church_update).delete(root::church_delete),
        )
        .route("/api/root/churches/:id/restore", post(root::church_restore))
        .route_layer(middleware::from_fn(require_superadmin_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
