use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{
        Breadcrumb, CreateModuleRequest, Module, ModuleId, PermissionSummary, UpdateGrantsRequest,
        UpdateModuleRequest, UserAccess, UserId,
    },
    service::ModuleService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

// --- Filter Structs ---

/// OptionsQuery
///
/// Query parameters for the cascading selector endpoints. `path` is the comma-separated
/// chain of ids already selected, e.g. `?path=1,4`; empty or absent means "roots".
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OptionsQuery {
    pub path: Option<String>,
}

impl OptionsQuery {
    /// Parses the selected path. Blank segments are ignored.
    pub fn ids(&self) -> Result<Vec<ModuleId>, ApiError> {
        let Some(raw) = self.path.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                segment
                    .parse::<ModuleId>()
                    .map_err(|_| ApiError::Validation(format!("invalid module id '{segment}'")))
            })
            .collect()
    }
}

fn service(state: &AppState) -> ModuleService {
    ModuleService::new(state.repo.clone())
}

// --- Public Handlers ---

/// list_modules
///
/// [Public Route] Every module, ascending by id. Fails with 500 if the stored hierarchy is
/// corrupt (cycle or dangling parent).
#[utoipa::path(
    get,
    path = "/modules",
    responses((status = 200, description = "All modules", body = [Module]))
)]
pub async fn list_modules(State(state): State<AppState>) -> Result<Json<Vec<Module>>, ApiError> {
    Ok(Json(service(&state).list_modules().await?))
}

/// get_module
///
/// [Public Route] A single module by id.
#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(("id" = i64, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Found", body = Module),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_module(
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<Json<Module>, ApiError> {
    Ok(Json(service(&state).get_module(id).await?))
}

/// get_children
///
/// [Public Route] Direct submodules of a module, in id order.
#[utoipa::path(
    get,
    path = "/modules/{id}/children",
    params(("id" = i64, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Direct children", body = [Module]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<Json<Vec<Module>>, ApiError> {
    Ok(Json(service(&state).children_of(id).await?))
}

/// get_descendants
///
/// [Public Route] The whole subtree under a module, breadth-first, the module itself first.
#[utoipa::path(
    get,
    path = "/modules/{id}/descendants",
    params(("id" = i64, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Subtree", body = [Module]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_descendants(
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<Json<Vec<Module>>, ApiError> {
    Ok(Json(service(&state).subtree_of(id).await?))
}

/// get_ancestors
///
/// [Public Route] Breadcrumb of a module: its ancestors root first, depth and labels.
#[utoipa::path(
    get,
    path = "/modules/{id}/ancestors",
    params(("id" = i64, Path, description = "Module ID")),
    responses(
        (status = 200, description = "Breadcrumb", body = Breadcrumb),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_ancestors(
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<Json<Breadcrumb>, ApiError> {
    Ok(Json(service(&state).breadcrumb(id).await?))
}

/// get_module_options
///
/// [Public Route] Options for the next cascading selector level, unfiltered.
#[utoipa::path(
    get,
    path = "/modules/options",
    params(OptionsQuery),
    responses(
        (status = 200, description = "Options", body = [Module]),
        (status = 400, description = "Malformed path"),
        (status = 404, description = "Unknown module in path")
    )
)]
pub async fn get_module_options(
    State(state): State<AppState>,
    Query(query): Query<OptionsQuery>,
) -> Result<Json<Vec<Module>>, ApiError> {
    let path = query.ids()?;
    Ok(Json(service(&state).options_at(&path, None).await?))
}

// --- Authenticated Handlers ---

/// get_my_module_options
///
/// [Authenticated Route] Cascading selector options restricted to the modules the caller
/// may act on. Admins see everything.
#[utoipa::path(
    get,
    path = "/me/modules/options",
    params(OptionsQuery),
    responses((status = 200, description = "Permitted options", body = [Module]))
)]
pub async fn get_my_module_options(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<OptionsQuery>,
) -> Result<Json<Vec<Module>>, ApiError> {
    let path = query.ids()?;
    Ok(Json(service(&state).options_at(&path, Some(&user)).await?))
}

/// get_my_permissions
///
/// [Authenticated Route] The caller's resolved permission set.
#[utoipa::path(
    get,
    path = "/me/permissions",
    responses((status = 200, description = "Permission set", body = PermissionSummary))
)]
pub async fn get_my_permissions(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PermissionSummary>, ApiError> {
    Ok(Json(service(&state).my_permissions(&user).await?))
}

/// create_module
///
/// [Authenticated Route] Creates a module. Root modules are admin-only; non-admins need
/// permission on the parent.
#[utoipa::path(
    post,
    path = "/modules",
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Created", body = Module),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "No permission on parent"),
        (status = 404, description = "Parent not found")
    )
)]
pub async fn create_module(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Module>), ApiError> {
    let module = service(&state).create_module(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// update_module
///
/// [Authenticated Route] Partial update, including reparenting. Rejects moves that would
/// make a module its own ancestor with 409.
#[utoipa::path(
    put,
    path = "/modules/{id}",
    params(("id" = i64, Path, description = "Module ID")),
    request_body = UpdateModuleRequest,
    responses(
        (status = 200, description = "Updated", body = Module),
        (status = 403, description = "No permission"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Cycle would form")
    )
)]
pub async fn update_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
    Json(payload): Json<UpdateModuleRequest>,
) -> Result<Json<Module>, ApiError> {
    Ok(Json(service(&state).update_module(&user, id, payload).await?))
}

/// delete_module
///
/// [Authenticated Route] Admin-only delete of a leaf module without dependent content.
#[utoipa::path(
    delete,
    path = "/modules/{id}",
    params(("id" = i64, Path, description = "Module ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Has submodules or dependent content")
    )
)]
pub async fn delete_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ModuleId>,
) -> Result<StatusCode, ApiError> {
    service(&state).delete_module(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Handlers ---

/// list_users
///
/// [Admin Route] Every user with their direct modules and resolved permissions.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "Users", body = [UserAccess]),
        (status = 403, description = "Not Admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserAccess>>, ApiError> {
    Ok(Json(service(&state).list_user_access(&user).await?))
}

/// get_user_access
///
/// [Admin Route] One user with their direct modules and resolved permissions.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserAccess),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user_access(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserAccess>, ApiError> {
    Ok(Json(service(&state).user_access(&user, id).await?))
}

/// update_user_modules
///
/// [Admin Route] Replaces a user's direct grants.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/modules",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateGrantsRequest,
    responses(
        (status = 200, description = "Grants replaced", body = UserAccess),
        (status = 403, description = "Not Admin"),
        (status = 404, description = "Unknown user or module")
    )
)]
pub async fn update_user_modules(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(payload): Json<UpdateGrantsRequest>,
) -> Result<Json<UserAccess>, ApiError> {
    Ok(Json(
        service(&state)
            .replace_user_grants(&user, id, payload)
            .await?,
    ))
}
