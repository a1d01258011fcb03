use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// User and grant administration. The admin role is checked inside the service layer
/// after the `AuthUser` extractor has authenticated the request.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        // Every user with direct modules and resolved permissions.
        .route("/users", get(handlers::list_users))
        // GET /admin/users/{id}
        .route("/users/{id}", get(handlers::get_user_access))
        // PUT /admin/users/{id}/modules
        // Replaces the user's direct grants; unknown module ids are rejected with 404.
        .route("/users/{id}/modules", put(handlers::update_user_modules))
}
