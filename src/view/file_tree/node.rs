use crate::services::remote::{RemoteEntry, ROOT_PATH};
use std::fmt;

/// Unique identifier for a tree node
///
/// Ids are never reused, so an id held across a refresh simply stops
/// resolving instead of pointing at a different entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// One slot in a node's child list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChild {
    /// Stand-in that lets a shell draw an expand affordance before listing
    Placeholder,
    Node(NodeId),
}

/// Represents a node in the remote tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Unique identifier
    pub id: NodeId,
    /// Listing snapshot (None only for the synthetic root)
    pub entry: Option<RemoteEntry>,
    /// Parent node ID (None for root)
    pub parent: Option<NodeId>,
    /// Children in listing order
    pub children: Vec<TreeChild>,
    /// Current state of the node
    pub state: NodeState,
}

impl TreeNode {
    /// Create a node for a listed entry
    ///
    /// Folders start unexpanded with a placeholder child, files are leaves.
    pub fn new(id: NodeId, entry: RemoteEntry, parent: Option<NodeId>) -> Self {
        let (state, children) = if entry.is_folder() {
            (NodeState::Unexpanded, vec![TreeChild::Placeholder])
        } else {
            (NodeState::Leaf, Vec::new())
        };

        Self {
            id,
            entry: Some(entry),
            parent,
            children,
            state,
        }
    }

    /// Create the synthetic namespace root
    pub fn root(id: NodeId) -> Self {
        Self {
            id,
            entry: None,
            parent: None,
            children: vec![TreeChild::Placeholder],
            state: NodeState::Unexpanded,
        }
    }

    pub fn is_root(&self) -> bool {
        self.entry.is_none()
    }

    /// Remote path (the root is the empty path)
    pub fn path(&self) -> &str {
        self.entry.as_ref().map(|e| e.path()).unwrap_or(ROOT_PATH)
    }

    /// Display name (empty for the root)
    pub fn name(&self) -> &str {
        self.entry.as_ref().map(|e| e.name()).unwrap_or("")
    }

    /// The root counts as a folder
    pub fn is_folder(&self) -> bool {
        self.entry.as_ref().map(|e| e.is_folder()).unwrap_or(true)
    }

    pub fn is_file(&self) -> bool {
        !self.is_folder()
    }

    /// Tombstoned entry still present in the listing
    pub fn is_deleted(&self) -> bool {
        self.entry.as_ref().map(|e| e.is_deleted()).unwrap_or(false)
    }

    pub fn is_unexpanded(&self) -> bool {
        self.state == NodeState::Unexpanded
    }

    pub fn is_expanding(&self) -> bool {
        self.state == NodeState::Expanding
    }

    pub fn is_expanded(&self) -> bool {
        self.state == NodeState::Expanded
    }

    pub fn is_leaf(&self) -> bool {
        self.state == NodeState::Leaf
    }

    pub fn has_placeholder(&self) -> bool {
        self.children.contains(&TreeChild::Placeholder)
    }

    /// Real child nodes, skipping the placeholder
    pub fn child_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().filter_map(|child| match child {
            TreeChild::Node(id) => Some(*id),
            TreeChild::Placeholder => None,
        })
    }
}

/// State of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Folder not listed yet (shows a placeholder child)
    Unexpanded,
    /// Listing in flight
    Expanding,
    /// Children loaded
    Expanded,
    /// File (cannot be expanded)
    Leaf,
}
