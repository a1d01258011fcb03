use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// The module hierarchy and permission engine.
pub mod hierarchy;

// Application services around the engine.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, HierarchyError};
pub use hierarchy::{ModuleTree, PermissionSet};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::ModuleService;

/// ApiDoc
///
/// OpenAPI documentation aggregated from the `#[utoipa::path]` handlers and the
/// `ToSchema` models, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_modules, handlers::get_module, handlers::get_children,
        handlers::get_descendants,
        handlers::get_ancestors, handlers::get_module_options, handlers::get_my_module_options,
        handlers::get_my_permissions, handlers::create_module, handlers::update_module,
        handlers::delete_module, handlers::list_users, handlers::get_user_access,
        handlers::update_user_modules
    ),
    components(
        schemas(
            models::Module, models::CreateModuleRequest, models::UpdateModuleRequest,
            models::UpdateGrantsRequest, models::UserAccess, models::PermissionSummary,
            models::Breadcrumb,
        )
    ),
    tags(
        (name = "faq-portal", description = "FAQ module hierarchy and permissions API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of shared services and configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: module rows, grants and users.
    pub repo: RepositoryState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the authenticated routes: if `AuthUser` cannot be
/// extracted the request is rejected with 401 before reaching the handler.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, scoped middleware, observability layers and state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin role is checked in the service layer; the extractor still authenticates.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id`, so every log line of
/// one request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
