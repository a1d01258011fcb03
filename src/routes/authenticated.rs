use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. Every handler receives a validated `AuthUser`, whose
/// admin flag and grants drive the permission checks in the service layer.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me/permissions
        // Every module id the caller may act on (grants expanded to descendants).
        .route("/me/permissions", get(handlers::get_my_permissions))
        // GET /me/modules/options?path=...
        // Cascading selector options limited to the caller's permission set.
        .route("/me/modules/options", get(handlers::get_my_module_options))
        // POST /modules
        // Root modules are admin-only; others need permission on the parent.
        .route("/modules", post(handlers::create_module))
        // PUT/DELETE /modules/{id}
        // Updates need permission on the module (and the new parent when moving it).
        // Deletes are admin-only and refuse modules with submodules or FAQ entries.
        .route(
            "/modules/{id}",
            put(handlers::update_module).delete(handlers::delete_module),
        )
}
