//! Structural validation of module mutations.
//!
//! Every check here is pure and runs against a snapshot taken immediately before the
//! write. Nothing is written by the guard.

use super::tree::ModuleTree;
use crate::{
    error::HierarchyError,
    models::{ModuleId, ModuleMutation},
};

/// Facts about a module that live outside the module table, gathered from the store
/// right before a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionFacts {
    // The store's own view of child rows, checked alongside the snapshot.
    pub has_children: bool,
    // FAQ entries or other content still referencing the module.
    pub has_dependent_content: bool,
}

/// A new module may hang under any existing module, or be a root.
pub fn validate_insert(tree: &ModuleTree, parent_id: Option<ModuleId>) -> Result<(), HierarchyError> {
    match parent_id {
        Some(parent_id) if !tree.contains(parent_id) => Err(HierarchyError::NotFound(parent_id)),
        _ => Ok(()),
    }
}

/// validate_reparent
///
/// Moving `id` under `proposed_parent` is rejected when the parent is `id` itself or
/// currently sits below `id`: either way `id` would become its own ancestor.
pub fn validate_reparent(
    tree: &ModuleTree,
    id: ModuleId,
    proposed_parent: Option<ModuleId>,
) -> Result<(), HierarchyError> {
    if !tree.contains(id) {
        return Err(HierarchyError::NotFound(id));
    }
    let Some(parent_id) = proposed_parent else {
        return Ok(());
    };
    if !tree.contains(parent_id) {
        return Err(HierarchyError::NotFound(parent_id));
    }
    if parent_id == id || tree.is_ancestor_of(id, parent_id) {
        return Err(HierarchyError::CycleWouldForm { id, parent_id });
    }
    Ok(())
}

/// validate_delete
///
/// Deletion requires a leaf with no dependent content. Children are checked first.
pub fn validate_delete(
    tree: &ModuleTree,
    id: ModuleId,
    facts: DeletionFacts,
) -> Result<(), HierarchyError> {
    let children = tree.direct_children_of(id)?;
    if !children.is_empty() || facts.has_children {
        return Err(HierarchyError::HasChildren(id));
    }
    if facts.has_dependent_content {
        return Err(HierarchyError::HasDependentContent(id));
    }
    Ok(())
}

/// Dispatches a mutation to the matching check. `facts` only matters for deletes.
pub fn validate_mutation(
    tree: &ModuleTree,
    mutation: &ModuleMutation,
    facts: DeletionFacts,
) -> Result<(), HierarchyError> {
    let result = match mutation {
        ModuleMutation::Insert(new) => validate_insert(tree, new.parent_id),
        ModuleMutation::Update { id, changes } => match changes.parent_id {
            Some(parent_id) => validate_reparent(tree, *id, parent_id),
            None if tree.contains(*id) => Ok(()),
            None => Err(HierarchyError::NotFound(*id)),
        },
        ModuleMutation::Delete(id) => validate_delete(tree, *id, facts),
    };

    if let Err(err) = &result {
        tracing::warn!(error = %err, "module mutation rejected");
    }
    result
}
