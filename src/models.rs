use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

/// Identifier of a row in the `modules` table.
pub type ModuleId = i64;
/// Identifier of a row in the `users` table.
pub type UserId = i64;

// --- Core Schemas (Mapped to Database) ---

/// Module
///
/// A node of the FAQ hierarchy (category, module or submodule; same entity at any depth)
/// stored in the `modules` table. `parent_id = None` marks a root.
///
/// Legacy payloads spell the fields `nombre`, `descripcion`, `idpadre`/`id_padre`/`idPADRE`
/// and `icono`; those spellings are accepted on input only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Module {
    pub id: ModuleId,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "descripcion")]
    pub description: Option<String>,
    #[serde(alias = "idpadre", alias = "id_padre", alias = "idPADRE")]
    pub parent_id: Option<ModuleId>,
    // Opaque reference to the stored icon file.
    #[serde(alias = "icono")]
    pub icon: Option<String>,
}

/// User
///
/// The minimal identity record resolved during authentication.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: UserId,
    pub email: String,
    // Admins act on every module without needing grants.
    pub is_admin: bool,
}

/// Grant
///
/// A direct, admin-assigned link between a user and one module (`module_user` table).
/// The pair is the whole identity; grants are inherited downward by the permission resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Grant {
    pub user_id: UserId,
    pub module_id: ModuleId,
}

// --- Store Mutations ---

/// Fields of a module about to be inserted. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModule {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<ModuleId>,
    pub icon: Option<String>,
}

/// Partial update of a module. `None` leaves a column untouched. For the nullable
/// columns `Some(None)` clears them; `parent_id: Some(None)` moves the module to the
/// root level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<ModuleId>>,
    pub icon: Option<Option<String>>,
}

/// ModuleMutation
///
/// A write against the module store. Every mutation is validated by the integrity guard
/// against a fresh snapshot before `Repository::apply_mutation` runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleMutation {
    Insert(NewModule),
    Update { id: ModuleId, changes: ModuleChanges },
    Delete(ModuleId),
}

// --- Request Payloads (Input Schemas) ---

/// CreateModuleRequest
///
/// Input payload for POST /modules.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateModuleRequest {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "descripcion")]
    pub description: Option<String>,
    #[serde(default, alias = "idpadre", alias = "id_padre", alias = "idPADRE")]
    pub parent_id: Option<ModuleId>,
    #[serde(default, alias = "icono")]
    pub icon: Option<String>,
}

/// UpdateModuleRequest
///
/// Partial update payload for PUT /modules/{id}. An absent field is left untouched. An
/// explicit `null` clears `description` or `icon`, and moves the module to the root level
/// for `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateModuleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "nombre")]
    pub name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null",
        alias = "descripcion"
    )]
    #[ts(optional)]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null",
        alias = "idpadre",
        alias = "id_padre",
        alias = "idPADRE"
    )]
    #[ts(optional)]
    #[schema(value_type = Option<i64>)]
    pub parent_id: Option<Option<ModuleId>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null",
        alias = "icono"
    )]
    #[ts(optional)]
    #[schema(value_type = Option<String>)]
    pub icon: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from an absent field: only called when the key is present.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// UpdateGrantsRequest
///
/// Replaces a user's direct module grants (PUT /admin/users/{id}/modules).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateGrantsRequest {
    #[serde(alias = "modulos")]
    pub module_ids: Vec<ModuleId>,
}

// --- Output Schemas ---

/// UserAccess
///
/// Admin view of a user: the directly granted modules plus every module id the user
/// may act on once grants are expanded to descendants.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserAccess {
    pub id: UserId,
    pub email: String,
    pub is_admin: bool,
    pub modules: Vec<Module>,
    pub permitted_modules: Vec<ModuleId>,
}

/// PermissionSummary
///
/// The caller's own resolved permission set (GET /me/permissions), ids in ascending order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PermissionSummary {
    pub user_id: UserId,
    pub is_admin: bool,
    pub permitted_modules: Vec<ModuleId>,
}

/// Breadcrumb
///
/// Root-to-node path of a module (GET /modules/{id}/ancestors).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Breadcrumb {
    pub module_id: ModuleId,
    // Depth of the module, roots are 0.
    pub depth: usize,
    // Strict ancestors, root first.
    pub ancestors: Vec<Module>,
    // Display labels; a category + first-level pair collapses to the module name.
    pub labels: Vec<String>,
}
