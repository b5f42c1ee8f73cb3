use crate::document::Document;
use indextree::NodeId;

/// Pre-order traversal over a subtree, the same visit order the template
/// compiler assigns hole indices in.
///
/// The walker holds plain ids, so the tree may be mutated between steps as
/// long as the node it is parked on stays in place.
pub struct TreeWalker {
    root: NodeId,
    next: Option<NodeId>,
}

impl TreeWalker {
    /// Walk the subtree rooted at `root`, including `root` itself.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            next: Some(root),
        }
    }

    /// Walk only the descendants of `root`.
    pub fn descendants(document: &Document, root: NodeId) -> Self {
        Self {
            root,
            next: document.first_child(root),
        }
    }

    pub fn next(&mut self, document: &Document) -> Option<NodeId> {
        let current = self.next?;
        self.next = document.next_in_tree(current, self.root);
        Some(current)
    }
}
