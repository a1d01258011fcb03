//! Read-only projections for cascading selectors and breadcrumbs.
//! These never authorize anything; they only shape what a UI shows.

use super::{permission::PermissionSet, tree::ModuleTree};
use crate::{
    error::HierarchyError,
    models::{Module, ModuleId},
};

/// Options for the next selector level: the children of the last id in `path`, or the
/// roots when `path` is empty.
pub fn children_at<'a>(
    tree: &'a ModuleTree,
    path: &[ModuleId],
) -> Result<Vec<&'a Module>, HierarchyError> {
    match path.last() {
        Some(&id) => tree.direct_children_of(id),
        None => Ok(tree.roots()),
    }
}

/// Same as [`children_at`], keeping only modules in `permissions`. `None` means the
/// caller is an admin and sees everything.
pub fn permitted_children_at<'a>(
    tree: &'a ModuleTree,
    path: &[ModuleId],
    permissions: Option<&PermissionSet>,
) -> Result<Vec<&'a Module>, HierarchyError> {
    let options = children_at(tree, path)?;
    Ok(match permissions {
        Some(set) => options.into_iter().filter(|m| set.contains(m.id)).collect(),
        None => options,
    })
}

/// breadcrumb_labels
///
/// Module names along the root-to-node path. A category followed by a single
/// first-level module shows only the module name; deeper paths are shown in full.
pub fn breadcrumb_labels(tree: &ModuleTree, id: ModuleId) -> Result<Vec<String>, HierarchyError> {
    let mut labels: Vec<String> = tree
        .path_of(id)?
        .into_iter()
        .map(|m| m.name.clone())
        .collect();

    if labels.len() == 2 {
        labels.remove(0);
    }
    Ok(labels)
}
