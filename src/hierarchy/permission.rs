//! Permission resolution.
//!
//! A user may act on every module they were granted directly and on everything below
//! those modules. Admins may act on every module in the snapshot.

use std::collections::HashSet;

use super::tree::ModuleTree;
use crate::models::ModuleId;

/// PermissionSet
///
/// The resolved set of module ids a user may act on. Derived per request from the
/// current snapshot and the user's grants; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    ids: HashSet<ModuleId>,
}

impl PermissionSet {
    pub fn contains(&self, id: ModuleId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.ids.iter().copied()
    }

    /// Ids in ascending order, for responses.
    pub fn to_sorted_vec(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<ModuleId> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = ModuleId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// resolve
///
/// Expands direct grants into the full permission set.
///
/// Resolution order:
/// 1. Admins get every id in the tree, grants are ignored.
/// 2. Otherwise the union of `descendants_inclusive(g)` over each grant `g`.
///
/// Grants pointing at modules no longer in the tree are skipped. Resolution never fails;
/// an empty set means "no access".
pub fn resolve(
    is_admin: bool,
    direct_grants: &HashSet<ModuleId>,
    tree: &ModuleTree,
) -> PermissionSet {
    if is_admin {
        return tree.ids().collect();
    }

    let mut ids = HashSet::new();
    for &grant in direct_grants {
        // Already covered by an ancestor grant processed earlier.
        if ids.contains(&grant) {
            continue;
        }
        match tree.descendants_inclusive(grant) {
            Ok(subtree) => ids.extend(subtree),
            Err(_) => tracing::debug!(module_id = grant, "skipping stale grant"),
        }
    }
    PermissionSet { ids }
}

/// can_act
///
/// Authorization check for a single target module: plain set membership.
pub fn can_act(permissions: &PermissionSet, target: ModuleId) -> bool {
    permissions.contains(target)
}
