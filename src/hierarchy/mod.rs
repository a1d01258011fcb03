//! Module Hierarchy Engine
//!
//! Turns the flat `modules` table into an indexed forest and answers every structural
//! question the rest of the application asks about it:
//!
//! - `tree`: snapshot construction and forest invariants.
//! - `closure`: ancestors, descendants, depth.
//! - `permission`: expansion of direct grants into permission sets.
//! - `guard`: validation of inserts, reparenting and deletes.
//! - `filter`: cascading selector options and breadcrumb labels.
//!
//! All of it is synchronous and pure over an immutable `ModuleTree`; loading the rows
//! and applying writes belong to the repository layer.
pub mod closure;
pub mod filter;
pub mod guard;
pub mod permission;
pub mod tree;

pub use filter::{breadcrumb_labels, children_at, permitted_children_at};
pub use guard::{DeletionFacts, validate_delete, validate_insert, validate_mutation, validate_reparent};
pub use permission::{PermissionSet, can_act, resolve};
pub use tree::ModuleTree;
