use std::collections::{HashMap, HashSet};

use crate::{
    error::HierarchyError,
    models::{Module, ModuleId},
};

/// ModuleTree
///
/// Immutable snapshot of the module table as an indexed forest: id → module and
/// id → ordered child ids. Built fresh for every logical operation; any write to the
/// store invalidates it.
///
/// Children (and roots) are kept in ascending id order, so two builds of the same
/// snapshot expose identical ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTree {
    nodes: HashMap<ModuleId, Module>,
    children: HashMap<ModuleId, Vec<ModuleId>>,
    roots: Vec<ModuleId>,
}

impl ModuleTree {
    /// build
    ///
    /// Converts the flat parent-pointer rows into the indexed forest.
    ///
    /// # Errors
    /// - `DuplicateId` if two rows share an id.
    /// - `MissingParent` if a `parent_id` references no row in the snapshot.
    /// - `CycleDetected` if walking up from some module does not reach a root within
    ///   `modules.len()` hops.
    pub fn build(mut modules: Vec<Module>) -> Result<Self, HierarchyError> {
        modules.sort_by_key(|m| m.id);

        let mut nodes = HashMap::with_capacity(modules.len());
        for module in modules {
            let id = module.id;
            if nodes.insert(id, module).is_some() {
                return Err(HierarchyError::DuplicateId(id));
            }
        }

        let mut ordered: Vec<ModuleId> = nodes.keys().copied().collect();
        ordered.sort_unstable();

        let mut children: HashMap<ModuleId, Vec<ModuleId>> = HashMap::new();
        let mut roots = Vec::new();
        for &id in &ordered {
            match nodes[&id].parent_id {
                None => roots.push(id),
                Some(parent_id) if !nodes.contains_key(&parent_id) => {
                    return Err(HierarchyError::MissingParent { id, parent_id });
                }
                Some(parent_id) => children.entry(parent_id).or_default().push(id),
            }
        }

        let tree = Self {
            nodes,
            children,
            roots,
        };
        tree.ensure_acyclic(&ordered)?;

        tracing::debug!(
            modules = tree.len(),
            roots = tree.roots.len(),
            "module tree built"
        );
        Ok(tree)
    }

    /// Walks up from every module, remembering modules already proven to reach a root.
    /// Each module is visited a bounded number of times, so a corrupt table cannot
    /// make this loop forever.
    fn ensure_acyclic(&self, ordered: &[ModuleId]) -> Result<(), HierarchyError> {
        let limit = self.nodes.len();
        let mut rooted: HashSet<ModuleId> = HashSet::with_capacity(limit);

        for &start in ordered {
            let mut trail = Vec::new();
            let mut current = Some(start);
            while let Some(id) = current {
                if rooted.contains(&id) {
                    break;
                }
                if trail.len() > limit {
                    return Err(HierarchyError::CycleDetected(start));
                }
                trail.push(id);
                current = self.parent_of(id);
            }
            rooted.extend(trail);
        }
        Ok(())
    }

    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every module id in the snapshot, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.nodes.keys().copied()
    }

    /// Modules without a parent, ascending by id.
    pub fn roots(&self) -> Vec<&Module> {
        self.roots.iter().map(|id| &self.nodes[id]).collect()
    }

    pub(crate) fn parent_of(&self, id: ModuleId) -> Option<ModuleId> {
        self.nodes.get(&id).and_then(|m| m.parent_id)
    }

    pub(crate) fn child_ids(&self, id: ModuleId) -> &[ModuleId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }
}
