use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only endpoints open to any client. They expose the hierarchy as projections
/// (listing, children, breadcrumbs, selector options) and never authorize anything.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // GET /modules
        // The whole module table, ascending by id.
        .route("/modules", get(handlers::list_modules))
        // GET /modules/options?path=1,4
        // Children of the last selected id, or the roots for an empty path.
        .route("/modules/options", get(handlers::get_module_options))
        // GET /modules/{id}
        .route("/modules/{id}", get(handlers::get_module))
        // GET /modules/{id}/children
        // Direct submodules only, no recursion.
        .route("/modules/{id}/children", get(handlers::get_children))
        // GET /modules/{id}/descendants
        // Everything under a module, breadth-first, for "all submodules" filters.
        .route("/modules/{id}/descendants", get(handlers::get_descendants))
        // GET /modules/{id}/ancestors
        // Root-first ancestors, depth and display labels for breadcrumbs.
        .route("/modules/{id}/ancestors", get(handlers::get_ancestors))
}
