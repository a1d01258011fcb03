use crate::models::{Grant, Module, ModuleId, ModuleMutation, User, UserId};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

/// Result type of every store call.
pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// The storage boundary of the application: the Module Store (module rows and dependent
/// content probes) and the User/Grant store. The hierarchy engine never talks to it
/// directly; the service layer loads a snapshot here, validates, then writes back.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Module Store ---
    async fn list_modules(&self) -> StoreResult<Vec<Module>>;
    async fn get_module(&self, id: ModuleId) -> StoreResult<Option<Module>>;
    // True if any module row names `id` as its parent.
    async fn has_children(&self, id: ModuleId) -> StoreResult<bool>;
    // True if FAQ entries still reference `id`.
    async fn has_dependent_content(&self, id: ModuleId) -> StoreResult<bool>;
    /// Applies an already validated mutation. Inserts and updates return the stored row;
    /// `None` means the row vanished (update) or the mutation was a delete.
    async fn apply_mutation(&self, mutation: ModuleMutation) -> StoreResult<Option<Module>>;

    // --- User/Grant Store ---
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn is_admin(&self, id: UserId) -> StoreResult<bool>;
    async fn direct_grants_for(&self, user_id: UserId) -> StoreResult<HashSet<ModuleId>>;
    /// Replaces the user's direct grants with exactly `module_ids`.
    async fn replace_grants(&self, user_id: UserId, module_ids: &[ModuleId]) -> StoreResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Tables: `modules`, `users`, `module_user` (grants)
/// and `questions` (FAQ entries, the dependent content of a module).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_modules(&self) -> StoreResult<Vec<Module>> {
        sqlx::query_as::<_, Module>(
            "SELECT id, name, description, parent_id, icon FROM modules ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_module(&self, id: ModuleId) -> StoreResult<Option<Module>> {
        sqlx::query_as::<_, Module>(
            "SELECT id, name, description, parent_id, icon FROM modules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn has_children(&self, id: ModuleId) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM modules WHERE parent_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    async fn has_dependent_content(&self, id: ModuleId) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM questions WHERE module_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    /// apply_mutation
    ///
    /// `name` is updated through `COALESCE`. The nullable columns are driven by an explicit
    /// flag each, since `NULL` is a value they can be set to.
    async fn apply_mutation(&self, mutation: ModuleMutation) -> StoreResult<Option<Module>> {
        match mutation {
            ModuleMutation::Insert(new) => sqlx::query_as::<_, Module>(
                r#"
                INSERT INTO modules (name, description, parent_id, icon)
                VALUES ($1, $2, $3, $4)
                RETURNING id, name, description, parent_id, icon
                "#,
            )
            .bind(new.name)
            .bind(new.description)
            .bind(new.parent_id)
            .bind(new.icon)
            .fetch_one(&self.pool)
            .await
            .map(Some),
            ModuleMutation::Update { id, changes } => {
                let set_description = changes.description.is_some();
                let reparent = changes.parent_id.is_some();
                let set_icon = changes.icon.is_some();
                sqlx::query_as::<_, Module>(
                    r#"
                    UPDATE modules
                    SET name = COALESCE($2, name),
                        description = CASE WHEN $3 THEN $4 ELSE description END,
                        parent_id = CASE WHEN $5 THEN $6 ELSE parent_id END,
                        icon = CASE WHEN $7 THEN $8 ELSE icon END
                    WHERE id = $1
                    RETURNING id, name, description, parent_id, icon
                    "#,
                )
                .bind(id)
                .bind(changes.name)
                .bind(set_description)
                .bind(changes.description.flatten())
                .bind(reparent)
                .bind(changes.parent_id.flatten())
                .bind(set_icon)
                .bind(changes.icon.flatten())
                .fetch_optional(&self.pool)
                .await
            }
            ModuleMutation::Delete(id) => {
                sqlx::query("DELETE FROM modules WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            }
        }
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, is_admin FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, is_admin FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    async fn is_admin(&self, id: UserId) -> StoreResult<bool> {
        let flag = sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(flag.unwrap_or(false))
    }

    async fn direct_grants_for(&self, user_id: UserId) -> StoreResult<HashSet<ModuleId>> {
        let grants = sqlx::query_as::<_, Grant>(
            "SELECT user_id, module_id FROM module_user WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(grants.into_iter().map(|g| g.module_id).collect())
    }

    /// replace_grants
    ///
    /// Delete-then-insert inside one transaction, so readers never see a half-synced list.
    async fn replace_grants(&self, user_id: UserId, module_ids: &[ModuleId]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM module_user WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for module_id in module_ids {
            sqlx::query(
                "INSERT INTO module_user (user_id, module_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(module_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

// --- In-Memory Implementation (tests and local demos) ---

#[derive(Default)]
struct MemoryTables {
    modules: BTreeMap<ModuleId, Module>,
    users: BTreeMap<UserId, User>,
    grants: BTreeSet<(UserId, ModuleId)>,
    // module id -> number of FAQ entries referencing it
    content: BTreeMap<ModuleId, usize>,
    next_id: ModuleId,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in memory. Ids are assigned sequentially after the
/// largest seeded id. Unlike Postgres it does not enforce foreign keys, so tests can
/// seed corrupt tables on purpose.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<MemoryTables>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the module table.
    pub fn with_modules(modules: impl IntoIterator<Item = Module>) -> Self {
        let repo = Self::new();
        for module in modules {
            repo.insert_module(module);
        }
        repo
    }

    pub fn insert_module(&self, module: Module) {
        let mut tables = self.write();
        tables.next_id = tables.next_id.max(module.id);
        tables.modules.insert(module.id, module);
    }

    pub fn insert_user(&self, user: User) {
        self.write().users.insert(user.id, user);
    }

    pub fn grant(&self, user_id: UserId, module_id: ModuleId) {
        self.write().grants.insert((user_id, module_id));
    }

    /// Registers one FAQ entry under `module_id`.
    pub fn add_content(&self, module_id: ModuleId) {
        *self.write().content.entry(module_id).or_default() += 1;
    }

    pub fn remove_content(&self, module_id: ModuleId) {
        self.write().content.remove(&module_id);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryTables> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryTables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_modules(&self) -> StoreResult<Vec<Module>> {
        Ok(self.read().modules.values().cloned().collect())
    }

    async fn get_module(&self, id: ModuleId) -> StoreResult<Option<Module>> {
        Ok(self.read().modules.get(&id).cloned())
    }

    async fn has_children(&self, id: ModuleId) -> StoreResult<bool> {
        Ok(self
            .read()
            .modules
            .values()
            .any(|m| m.parent_id == Some(id)))
    }

    async fn has_dependent_content(&self, id: ModuleId) -> StoreResult<bool> {
        Ok(self.read().content.get(&id).is_some_and(|count| *count > 0))
    }

    async fn apply_mutation(&self, mutation: ModuleMutation) -> StoreResult<Option<Module>> {
        let mut tables = self.write();
        match mutation {
            ModuleMutation::Insert(new) => {
                tables.next_id += 1;
                let module = Module {
                    id: tables.next_id,
                    name: new.name,
                    description: new.description,
                    parent_id: new.parent_id,
                    icon: new.icon,
                };
                tables.modules.insert(module.id, module.clone());
                Ok(Some(module))
            }
            ModuleMutation::Update { id, changes } => {
                let Some(module) = tables.modules.get_mut(&id) else {
                    return Ok(None);
                };
                if let Some(name) = changes.name {
                    module.name = name;
                }
                if let Some(description) = changes.description {
                    module.description = description;
                }
                if let Some(parent_id) = changes.parent_id {
                    module.parent_id = parent_id;
                }
                if let Some(icon) = changes.icon {
                    module.icon = icon;
                }
                Ok(Some(module.clone()))
            }
            ModuleMutation::Delete(id) => {
                tables.modules.remove(&id);
                // Mirrors the ON DELETE CASCADE on module_user.
                tables.grants.retain(|(_, module_id)| *module_id != id);
                Ok(None)
            }
        }
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read().users.values().cloned().collect())
    }

    async fn is_admin(&self, id: UserId) -> StoreResult<bool> {
        Ok(self.read().users.get(&id).is_some_and(|u| u.is_admin))
    }

    async fn direct_grants_for(&self, user_id: UserId) -> StoreResult<HashSet<ModuleId>> {
        Ok(self
            .read()
            .grants
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, module_id)| *module_id)
            .collect())
    }

    async fn replace_grants(&self, user_id: UserId, module_ids: &[ModuleId]) -> StoreResult<()> {
        let mut tables = self.write();
        tables.grants.retain(|(uid, _)| *uid != user_id);
        tables
            .grants
            .extend(module_ids.iter().map(|module_id| (user_id, *module_id)));
        Ok(())
    }
}
