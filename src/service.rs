use crate::{
    auth::AuthUser,
    error::{ApiError, HierarchyError},
    hierarchy::{
        self, DeletionFacts, ModuleTree, PermissionSet, breadcrumb_labels, can_act,
        permitted_children_at,
    },
    models::{
        Breadcrumb, CreateModuleRequest, Module, ModuleChanges, ModuleId, ModuleMutation,
        NewModule, PermissionSummary, UpdateGrantsRequest, UpdateModuleRequest, User, UserAccess,
        UserId,
    },
    repository::RepositoryState,
};
use std::collections::BTreeSet;

const MAX_NAME_LEN: usize = 255;

/// ModuleService
///
/// Orchestrates every hierarchy operation as read → authorize → validate → write.
/// Each call loads its own snapshot from the store, so two requests never share a
/// tree and a write is always validated against the topology it will change.
#[derive(Clone)]
pub struct ModuleService {
    repo: RepositoryState,
}

impl ModuleService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// Loads the module table and builds a fresh snapshot.
    pub async fn snapshot(&self) -> Result<ModuleTree, ApiError> {
        let modules = self.repo.list_modules().await?;
        Ok(ModuleTree::build(modules)?)
    }

    /// Resolves the permission set of `user` against `tree`. The admin flag and the
    /// grants are both read from the user/grant store at call time.
    pub async fn permissions_for(
        &self,
        user: &AuthUser,
        tree: &ModuleTree,
    ) -> Result<PermissionSet, ApiError> {
        let is_admin = self.repo.is_admin(user.id).await?;
        let grants = if is_admin {
            Default::default()
        } else {
            self.repo.direct_grants_for(user.id).await?
        };
        Ok(hierarchy::resolve(is_admin, &grants, tree))
    }

    // --- Read Projections ---

    pub async fn list_modules(&self) -> Result<Vec<Module>, ApiError> {
        let tree = self.snapshot().await?;
        let mut modules: Vec<Module> = tree.ids().filter_map(|id| tree.get(id).cloned()).collect();
        modules.sort_by_key(|m| m.id);
        Ok(modules)
    }

    pub async fn get_module(&self, id: ModuleId) -> Result<Module, ApiError> {
        self.repo
            .get_module(id)
            .await?
            .ok_or(ApiError::Hierarchy(HierarchyError::NotFound(id)))
    }

    pub async fn children_of(&self, id: ModuleId) -> Result<Vec<Module>, ApiError> {
        let tree = self.snapshot().await?;
        Ok(tree.direct_children_of(id)?.into_iter().cloned().collect())
    }

    /// The subtree under `id`, breadth-first and starting with `id` itself.
    pub async fn subtree_of(&self, id: ModuleId) -> Result<Vec<Module>, ApiError> {
        let tree = self.snapshot().await?;
        Ok(tree
            .descendants_ordered(id)?
            .into_iter()
            .filter_map(|child| tree.get(child).cloned())
            .collect())
    }

    pub async fn breadcrumb(&self, id: ModuleId) -> Result<Breadcrumb, ApiError> {
        let tree = self.snapshot().await?;
        let ancestors: Vec<Module> = tree.ancestors_of(id)?.into_iter().cloned().collect();
        Ok(Breadcrumb {
            module_id: id,
            depth: ancestors.len(),
            labels: breadcrumb_labels(&tree, id)?,
            ancestors,
        })
    }

    /// Next-level selector options under `path`. With a user, only modules they may act
    /// on are listed; without one the full projection is returned.
    pub async fn options_at(
        &self,
        path: &[ModuleId],
        user: Option<&AuthUser>,
    ) -> Result<Vec<Module>, ApiError> {
        let tree = self.snapshot().await?;
        let permissions = match user {
            Some(user) if !user.is_admin => Some(self.permissions_for(user, &tree).await?),
            _ => None,
        };
        Ok(permitted_children_at(&tree, path, permissions.as_ref())?
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn my_permissions(&self, user: &AuthUser) -> Result<PermissionSummary, ApiError> {
        let tree = self.snapshot().await?;
        let permissions = self.permissions_for(user, &tree).await?;
        Ok(PermissionSummary {
            user_id: user.id,
            is_admin: user.is_admin,
            permitted_modules: permissions.to_sorted_vec(),
        })
    }

    // --- Module Mutations ---

    /// create_module
    ///
    /// Root modules are admin-only. A non-admin may add a child under any module in their
    /// permission set.
    pub async fn create_module(
        &self,
        actor: &AuthUser,
        req: CreateModuleRequest,
    ) -> Result<Module, ApiError> {
        let name = validate_name(&req.name)?;
        let tree = self.snapshot().await?;

        if !actor.is_admin {
            let Some(parent_id) = req.parent_id else {
                return Err(ApiError::Forbidden(
                    "only administrators can create root modules".to_string(),
                ));
            };
            self.require_permission(actor, &tree, parent_id).await?;
        }

        let mutation = ModuleMutation::Insert(NewModule {
            name,
            description: req.description,
            parent_id: req.parent_id,
            icon: req.icon,
        });
        hierarchy::validate_mutation(&tree, &mutation, DeletionFacts::default())?;

        let created = self
            .repo
            .apply_mutation(mutation)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tracing::info!(module_id = created.id, actor = actor.id, "module created");
        Ok(created)
    }

    /// update_module
    ///
    /// A non-admin needs the module in their permission set and, when reparenting, the
    /// new parent as well. Moving a module to the root level is admin-only. A `parent_id`
    /// equal to the current parent is not a move.
    pub async fn update_module(
        &self,
        actor: &AuthUser,
        id: ModuleId,
        req: UpdateModuleRequest,
    ) -> Result<Module, ApiError> {
        let name = req.name.as_deref().map(validate_name).transpose()?;
        let tree = self.snapshot().await?;
        let current_parent = tree
            .get(id)
            .ok_or(HierarchyError::NotFound(id))?
            .parent_id;
        let parent_change = req.parent_id.filter(|parent| *parent != current_parent);

        if !actor.is_admin {
            let permissions = self.permissions_for(actor, &tree).await?;
            if !can_act(&permissions, id) {
                return Err(ApiError::Forbidden(format!("no permission on module {id}")));
            }
            match parent_change {
                Some(None) => {
                    return Err(ApiError::Forbidden(
                        "only administrators can move modules to the root level".to_string(),
                    ));
                }
                Some(Some(parent_id)) if !can_act(&permissions, parent_id) => {
                    return Err(ApiError::Forbidden(format!(
                        "no permission on parent module {parent_id}"
                    )));
                }
                _ => {}
            }
        }

        let mutation = ModuleMutation::Update {
            id,
            changes: ModuleChanges {
                name,
                description: req.description,
                parent_id: parent_change,
                icon: req.icon,
            },
        };
        hierarchy::validate_mutation(&tree, &mutation, DeletionFacts::default())?;

        let updated = self
            .repo
            .apply_mutation(mutation)
            .await?
            .ok_or(HierarchyError::NotFound(id))?;
        tracing::info!(module_id = id, actor = actor.id, "module updated");
        Ok(updated)
    }

    /// delete_module
    ///
    /// Admin-only. The module must be a leaf without dependent content.
    pub async fn delete_module(&self, actor: &AuthUser, id: ModuleId) -> Result<(), ApiError> {
        if !actor.is_admin {
            return Err(ApiError::Forbidden(
                "only administrators can delete modules".to_string(),
            ));
        }

        let tree = self.snapshot().await?;
        if !tree.contains(id) {
            return Err(HierarchyError::NotFound(id).into());
        }
        let facts = DeletionFacts {
            has_children: self.repo.has_children(id).await?,
            has_dependent_content: self.repo.has_dependent_content(id).await?,
        };

        let mutation = ModuleMutation::Delete(id);
        hierarchy::validate_mutation(&tree, &mutation, facts)?;
        self.repo.apply_mutation(mutation).await?;
        tracing::info!(module_id = id, actor = actor.id, "module deleted");
        Ok(())
    }

    // --- Grant Administration ---

    pub async fn list_user_access(&self, actor: &AuthUser) -> Result<Vec<UserAccess>, ApiError> {
        require_admin(actor)?;
        let tree = self.snapshot().await?;
        let mut result = Vec::new();
        for user in self.repo.list_users().await? {
            result.push(self.access_of(user, &tree).await?);
        }
        Ok(result)
    }

    pub async fn user_access(
        &self,
        actor: &AuthUser,
        user_id: UserId,
    ) -> Result<UserAccess, ApiError> {
        require_admin(actor)?;
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or(ApiError::UserNotFound(user_id))?;
        let tree = self.snapshot().await?;
        self.access_of(user, &tree).await
    }

    /// replace_user_grants
    ///
    /// Replaces the user's direct grants. Every id must exist in a fresh snapshot;
    /// duplicates collapse.
    pub async fn replace_user_grants(
        &self,
        actor: &AuthUser,
        user_id: UserId,
        req: UpdateGrantsRequest,
    ) -> Result<UserAccess, ApiError> {
        require_admin(actor)?;
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or(ApiError::UserNotFound(user_id))?;

        let tree = self.snapshot().await?;
        let module_ids: BTreeSet<ModuleId> = req.module_ids.into_iter().collect();
        if let Some(missing) = module_ids.iter().find(|id| !tree.contains(**id)) {
            return Err(HierarchyError::NotFound(*missing).into());
        }

        let module_ids: Vec<ModuleId> = module_ids.into_iter().collect();
        self.repo.replace_grants(user_id, &module_ids).await?;
        tracing::info!(user_id, grants = module_ids.len(), actor = actor.id, "grants replaced");

        self.access_of(user, &tree).await
    }

    /// The admin projection of a user: direct modules plus the resolved permission ids.
    async fn access_of(&self, user: User, tree: &ModuleTree) -> Result<UserAccess, ApiError> {
        let grants = self.repo.direct_grants_for(user.id).await?;

        let mut modules: Vec<Module> = grants
            .iter()
            .filter_map(|id| tree.get(*id).cloned())
            .collect();
        modules.sort_by_key(|m| m.id);

        let permitted = hierarchy::resolve(user.is_admin, &grants, tree);
        Ok(UserAccess {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            modules,
            permitted_modules: permitted.to_sorted_vec(),
        })
    }

    async fn require_permission(
        &self,
        actor: &AuthUser,
        tree: &ModuleTree,
        target: ModuleId,
    ) -> Result<(), ApiError> {
        let permissions = self.permissions_for(actor, tree).await?;
        if can_act(&permissions, target) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("no permission on module {target}")))
        }
    }
}

fn require_admin(actor: &AuthUser) -> Result<(), ApiError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "only administrators can manage users".to_string(),
        ))
    }
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}
