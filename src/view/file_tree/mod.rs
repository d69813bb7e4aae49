// Remote tree module for lazily listed folder hierarchies
//
// This module provides a tree structure for representing a remote namespace
// where folders are only listed when expanded, and a listing replaces the
// folder's children wholesale.

pub mod node;
pub mod tree;

pub use node::{NodeId, NodeState, TreeChild, TreeNode};
pub use tree::{EntryFilter, RemoteTree, VisibleRow};
