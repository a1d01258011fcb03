//! Ancestor and descendant closures over a built [`ModuleTree`].
//!
//! Every traversal is iterative and visits each module at most once, so deep or wide
//! trees cannot exhaust the stack. The cycle check in `ModuleTree::build` has already
//! run by the time any of these are called.

use std::collections::{HashSet, VecDeque};

use super::tree::ModuleTree;
use crate::{
    error::HierarchyError,
    models::{Module, ModuleId},
};

impl ModuleTree {
    /// Strict ancestors of `id`, root first, ending at the immediate parent.
    /// Empty for a root.
    pub fn ancestors_of(&self, id: ModuleId) -> Result<Vec<&Module>, HierarchyError> {
        let module = self.get(id).ok_or(HierarchyError::NotFound(id))?;

        let mut chain = Vec::new();
        let mut current = module.parent_id;
        while let Some(parent_id) = current {
            if chain.len() >= self.len() {
                return Err(HierarchyError::CycleDetected(id));
            }
            let parent = self.get(parent_id).ok_or(HierarchyError::MissingParent {
                id,
                parent_id,
            })?;
            chain.push(parent);
            current = parent.parent_id;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Root-to-node path: `ancestors_of(id)` followed by the module itself.
    pub fn path_of(&self, id: ModuleId) -> Result<Vec<&Module>, HierarchyError> {
        let mut path = self.ancestors_of(id)?;
        path.extend(self.get(id));
        Ok(path)
    }

    /// Number of edges between `id` and its root; roots are at depth 0.
    pub fn depth_of(&self, id: ModuleId) -> Result<usize, HierarchyError> {
        self.ancestors_of(id).map(|chain| chain.len())
    }

    /// Direct children of `id` in id order. Index lookup, no traversal.
    pub fn direct_children_of(&self, id: ModuleId) -> Result<Vec<&Module>, HierarchyError> {
        if !self.contains(id) {
            return Err(HierarchyError::NotFound(id));
        }
        Ok(self
            .child_ids(id)
            .iter()
            .filter_map(|child| self.get(*child))
            .collect())
    }

    /// Breadth-first listing of the subtree rooted at `id`, starting with `id`.
    pub fn descendants_ordered(&self, id: ModuleId) -> Result<Vec<ModuleId>, HierarchyError> {
        if !self.contains(id) {
            return Err(HierarchyError::NotFound(id));
        }

        let mut visited: HashSet<ModuleId> = HashSet::from([id]);
        let mut order = vec![id];
        let mut queue: VecDeque<ModuleId> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for &child in self.child_ids(current) {
                if visited.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        Ok(order)
    }

    /// Subtree of `id` including `id` itself. This is the permission closure.
    pub fn descendants_inclusive(&self, id: ModuleId) -> Result<HashSet<ModuleId>, HierarchyError> {
        self.descendants_ordered(id)
            .map(|order| order.into_iter().collect())
    }

    /// Subtree of `id` without `id` itself.
    pub fn descendants_exclusive(&self, id: ModuleId) -> Result<HashSet<ModuleId>, HierarchyError> {
        let mut set = self.descendants_inclusive(id)?;
        set.remove(&id);
        Ok(set)
    }

    /// True when `ancestor` lies strictly above `id`. Unknown ids are never ancestors.
    pub fn is_ancestor_of(&self, ancestor: ModuleId, id: ModuleId) -> bool {
        let mut hops = 0;
        let mut current = self.parent_of(id);
        while let Some(parent_id) = current {
            if parent_id == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.len() {
                return false;
            }
            current = self.parent_of(parent_id);
        }
        false
    }
}
