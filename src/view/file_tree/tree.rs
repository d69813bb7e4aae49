use super::node::{NodeId, NodeState, TreeChild, TreeNode};
use crate::error::{ExplorerError, Result};
use crate::services::remote::{parent_path, BackendError, RemoteEntry, RemoteManager, ROOT_PATH};
use std::collections::HashMap;
use std::sync::Arc;

/// Which listed entries become nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryFilter {
    #[default]
    All,
    /// Destination pickers only show folders
    FoldersOnly,
}

impl EntryFilter {
    fn accepts(self, entry: &RemoteEntry) -> bool {
        match self {
            EntryFilter::All => true,
            EntryFilter::FoldersOnly => entry.is_folder(),
        }
    }
}

/// One row a shell draws for the visible part of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleRow {
    Node { id: NodeId, depth: usize },
    /// The expand affordance under an unexpanded folder
    Placeholder { parent: NodeId, depth: usize },
}

/// Reverts an `Expanding` node if its listing is never delivered
struct PendingExpand<'a> {
    tree: &'a mut RemoteTree,
    id: NodeId,
}

impl PendingExpand<'_> {
    fn finish(
        self,
        listing: std::result::Result<Vec<RemoteEntry>, BackendError>,
    ) -> Result<Vec<NodeId>> {
        self.tree.finish_expand(self.id, listing)
    }
}

impl Drop for PendingExpand<'_> {
    fn drop(&mut self) {
        self.tree.abandon_expand(self.id);
    }
}

/// Remote tree with lazy loading support
///
/// The tree starts with just the synthetic root. Folders are only listed
/// when explicitly expanded. A listing always replaces a node's children
/// wholesale: old child nodes (and everything below them) are dropped and
/// fresh ones are built from the new snapshot.
#[derive(Debug)]
pub struct RemoteTree {
    /// All nodes indexed by ID
    nodes: HashMap<NodeId, TreeNode>,
    /// Path to node ID mapping for quick lookups
    path_to_node: HashMap<String, NodeId>,
    root_id: NodeId,
    next_id: usize,
    filter: EntryFilter,
    manager: Arc<RemoteManager>,
}

impl RemoteTree {
    pub fn new(manager: Arc<RemoteManager>) -> Self {
        Self::with_filter(manager, EntryFilter::All)
    }

    pub fn with_filter(manager: Arc<RemoteManager>, filter: EntryFilter) -> Self {
        let root_id = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root_id, TreeNode::root(root_id));

        let mut path_to_node = HashMap::new();
        path_to_node.insert(ROOT_PATH.to_string(), root_id);

        Self {
            nodes,
            path_to_node,
            root_id,
            next_id: 1,
            filter,
            manager,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    fn get_node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&id)
    }

    pub fn get_node_by_path(&self, path: &str) -> Option<&TreeNode> {
        self.node_id_for_path(path).and_then(|id| self.get_node(id))
    }

    pub fn node_id_for_path(&self, path: &str) -> Option<NodeId> {
        self.path_to_node.get(path).copied()
    }

    /// Get number of nodes currently in memory (root included)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Real child nodes of `id`, in listing order
    pub fn children_of(&self, id: NodeId) -> Vec<&TreeNode> {
        self.get_node(id)
            .map(|node| node.child_ids().filter_map(|c| self.get_node(c)).collect())
            .unwrap_or_default()
    }

    /// List the namespace root and rebuild the top level
    ///
    /// Returns the new top-level node ids. On failure the tree is left as
    /// it was; retrying is up to the caller.
    pub async fn build_root(&mut self) -> Result<Vec<NodeId>> {
        let root_id = self.root_id;
        let entries = self.manager.list(ROOT_PATH).await?;
        Ok(self.replace_children(root_id, entries))
    }

    /// Mark a folder as expanding and return the path to list
    ///
    /// Fails with `AlreadyExpanding` when a listing for the node is already
    /// in flight; no second listing is issued in that case.
    pub fn begin_expand(&mut self, id: NodeId) -> Result<String> {
        let node = self.get_node(id).ok_or(ExplorerError::NodeNotFound(id))?;

        if !node.is_folder() {
            return Err(ExplorerError::NotAFolder(node.path().to_string()));
        }
        if node.is_expanding() {
            return Err(ExplorerError::AlreadyExpanding(node.path().to_string()));
        }

        let path = node.path().to_string();
        let children = self.take_children(id);
        self.remove_subtrees(children);
        if let Some(node) = self.get_node_mut(id) {
            node.state = NodeState::Expanding;
        }
        tracing::debug!("Expanding {:?}", path);
        Ok(path)
    }

    /// Attach a listing result to a node started with `begin_expand`
    ///
    /// If the node was discarded while the listing was in flight, the
    /// result is dropped. A failed listing puts the node back to
    /// unexpanded (placeholder restored) and returns the error.
    pub fn finish_expand(
        &mut self,
        id: NodeId,
        listing: std::result::Result<Vec<RemoteEntry>, BackendError>,
    ) -> Result<Vec<NodeId>> {
        let node = self.get_node(id).ok_or(ExplorerError::NodeNotFound(id))?;
        if !node.is_expanding() {
            tracing::debug!("Dropping stale listing for {:?}", node.path());
            return Ok(node.child_ids().collect());
        }

        match listing {
            Ok(entries) => Ok(self.replace_children(id, entries)),
            Err(e) => {
                if let Some(node) = self.get_node_mut(id) {
                    node.children = vec![TreeChild::Placeholder];
                    node.state = NodeState::Unexpanded;
                }
                Err(e.into())
            }
        }
    }

    /// Put a node left in `Expanding` back to unexpanded
    ///
    /// Used when the listing started by `begin_expand` will never arrive.
    /// Does nothing for nodes in any other state.
    pub fn abandon_expand(&mut self, id: NodeId) {
        if let Some(node) = self.get_node_mut(id) {
            if node.is_expanding() {
                tracing::debug!("Expand of {:?} abandoned", node.path());
                node.children = vec![TreeChild::Placeholder];
                node.state = NodeState::Unexpanded;
            }
        }
    }

    /// Expand a folder node (list its children)
    ///
    /// Expanding an already expanded folder re-lists it. Dropping the
    /// returned future mid-listing leaves the folder unexpanded.
    pub async fn expand_node(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let path = self.begin_expand(id)?;
        let manager = Arc::clone(&self.manager);
        let pending = PendingExpand { tree: self, id };
        let listing = manager.list(&path).await;
        pending.finish(listing)
    }

    /// Collapse a folder, dropping its loaded children
    ///
    /// They will be listed again if the folder is expanded again.
    pub fn collapse_node(&mut self, id: NodeId) {
        match self.get_node(id) {
            Some(node) if node.is_expanded() && !node.is_root() => {}
            _ => return,
        }
        let children = self.take_children(id);
        self.remove_subtrees(children);
        if let Some(node) = self.get_node_mut(id) {
            node.children = vec![TreeChild::Placeholder];
            node.state = NodeState::Unexpanded;
        }
    }

    /// Re-list the folder at `path` and replace its children
    ///
    /// A file path refreshes its folder. A path not present in the tree
    /// refreshes its nearest loaded ancestor. Unexpanded folders have
    /// nothing cached and are left alone. Returns the refreshed node.
    pub async fn refresh_subtree(&mut self, path: &str) -> Result<NodeId> {
        let id = self.nearest_loaded_folder(path);
        let node = self.get_node(id).ok_or(ExplorerError::NodeNotFound(id))?;

        match node.state {
            NodeState::Expanding => {
                return Err(ExplorerError::AlreadyExpanding(node.path().to_string()))
            }
            NodeState::Unexpanded | NodeState::Leaf => return Ok(id),
            NodeState::Expanded => {}
        }

        let folder = node.path().to_string();
        tracing::debug!("Refreshing {:?} (requested {:?})", folder, path);
        let entries = self.manager.list(&folder).await?;
        self.replace_children(id, entries);
        Ok(id)
    }

    /// The node a refresh of `path` applies to
    fn nearest_loaded_folder(&self, path: &str) -> NodeId {
        let mut current = path;
        loop {
            if let Some(node) = self.get_node_by_path(current) {
                if node.is_folder() {
                    return node.id;
                }
            }
            if current == ROOT_PATH {
                return self.root_id;
            }
            current = parent_path(current);
        }
    }

    /// Flattened rows for the expanded part of the tree (root excluded)
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        if let Some(root) = self.get_node(self.root_id) {
            self.collect_rows(root, 0, &mut rows);
        }
        rows
    }

    fn collect_rows(&self, node: &TreeNode, depth: usize, rows: &mut Vec<VisibleRow>) {
        if node.is_unexpanded() && !node.is_root() {
            rows.push(VisibleRow::Placeholder {
                parent: node.id,
                depth,
            });
            return;
        }
        for child in node.child_ids().filter_map(|id| self.get_node(id)) {
            rows.push(VisibleRow::Node {
                id: child.id,
                depth,
            });
            if child.is_folder() {
                self.collect_rows(child, depth + 1, rows);
            }
        }
    }

    /// Get the parent chain for a node (from root to node)
    pub fn get_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = Some(id);

        while let Some(node_id) = current {
            ancestors.push(node_id);
            current = self.get_node(node_id).and_then(|n| n.parent);
        }

        ancestors.reverse();
        ancestors
    }

    /// Get the depth of a node (root is 0)
    pub fn get_depth(&self, id: NodeId) -> usize {
        self.get_ancestors(id).len().saturating_sub(1)
    }

    /// Drop the current children of `id` and build new ones from `entries`
    fn replace_children(&mut self, id: NodeId, entries: Vec<RemoteEntry>) -> Vec<NodeId> {
        let old = self.take_children(id);
        self.remove_subtrees(old);

        let filter = self.filter;
        let child_ids: Vec<NodeId> = entries
            .into_iter()
            .filter(|entry| filter.accepts(entry))
            .map(|entry| self.add_node(entry, id))
            .collect();

        if let Some(node) = self.get_node_mut(id) {
            node.children = child_ids.iter().copied().map(TreeChild::Node).collect();
            node.state = NodeState::Expanded;
        }
        tracing::debug!("{} now has {} children", id, child_ids.len());
        child_ids
    }

    fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        match self.get_node_mut(id) {
            Some(node) => {
                let children = std::mem::take(&mut node.children);
                children
                    .into_iter()
                    .filter_map(|child| match child {
                        TreeChild::Node(id) => Some(id),
                        TreeChild::Placeholder => None,
                    })
                    .collect()
            }
            None => Vec::new(),
        }
    }

    fn add_node(&mut self, entry: RemoteEntry, parent: NodeId) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.path_to_node.insert(entry.path().to_string(), id);
        self.nodes.insert(id, TreeNode::new(id, entry, Some(parent)));

        id
    }

    fn remove_subtrees(&mut self, ids: Vec<NodeId>) {
        for id in ids {
            self.remove_node_recursive(id);
        }
    }

    /// Remove a node and all its descendants
    fn remove_node_recursive(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if self.path_to_node.get(node.path()) == Some(&id) {
            self.path_to_node.remove(node.path());
        }
        for child in node.child_ids() {
            self.remove_node_recursive(child);
        }
    }
}
