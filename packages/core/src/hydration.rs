use crate::error::HydrationError;
use weft_dom::{Document, NodeId, NodeType};

/// A structured walker over a pre-rendered subtree.
///
/// Template instances hydrate by walking their plan and the live tree in
/// lockstep; every step states the node type it expects and a mismatch is a
/// [`HydrationError`] carrying what was found instead.
pub struct HydrationWalker {
    root: NodeId,
    /// The node the walker is parked on; `None` before the first step.
    current: Option<NodeId>,
    last_visited: Option<NodeId>,
    finished: bool,
}

impl HydrationWalker {
    /// Walk the children of `container` in pre-order.
    pub fn new(document: &Document, container: NodeId) -> Self {
        Self {
            root: container,
            current: document.first_child(container),
            last_visited: None,
            finished: false,
        }
    }

    /// Mark the walker exhausted: content rendered after this point is
    /// created fresh instead of adopted.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Materialize a node the serialized markup could not represent (an
    /// empty text slice): insert an empty text node just before the
    /// walker's position and hand it to the caller without advancing.
    pub fn insert_text_here(&mut self, document: &mut Document) -> NodeId {
        let node = document.create_text("");
        match self.current {
            Some(current) => document.insert_before(current, node),
            None => document.append(self.root, node),
        }
        node
    }

    fn describe(document: &Document, node: Option<NodeId>) -> String {
        match node {
            Some(node) => match document.node_type(node) {
                NodeType::Element => format!(
                    "<{}> element",
                    document.tag_name(node).unwrap_or("unknown")
                ),
                NodeType::Text => format!("text {:?}", document.text(node).unwrap_or("")),
                NodeType::Comment => {
                    format!("comment {:?}", document.comment_data(node).unwrap_or(""))
                }
                other => format!("{other:?} node"),
            },
            None => "end of children".to_string(),
        }
    }

    /// Advance one node in pre-order, asserting its type.
    pub fn next_node(
        &mut self,
        document: &Document,
        expected: NodeType,
    ) -> Result<NodeId, HydrationError> {
        let node = self.peek_node(document, expected)?;
        self.last_visited = Some(node);
        self.current = document.next_in_tree(node, self.root);
        Ok(node)
    }

    /// Look at the next node without advancing.
    pub fn peek_node(
        &mut self,
        document: &Document,
        expected: NodeType,
    ) -> Result<NodeId, HydrationError> {
        match self.current {
            Some(node) if document.node_type(node) == expected => Ok(node),
            Some(node) => Err(HydrationError::Mismatch {
                expected,
                found: Self::describe(document, Some(node)),
            }),
            None => Err(HydrationError::OutOfNodes {
                expected,
                last: Self::describe(document, self.last_visited),
            }),
        }
    }

    /// Materialize an in-text part: insert an empty text node after the
    /// text node the walker is parked on and park on the insertion.
    ///
    /// Server rendering merges adjacent text; this splits the merged node
    /// back apart so each text part gets a dedicated node.
    pub fn split_text(&mut self, document: &mut Document) -> Result<NodeId, HydrationError> {
        let current = self.peek_node(document, NodeType::Text)?;
        let split = document.create_text("");
        document.insert_after(current, split);
        self.last_visited = Some(current);
        self.current = Some(split);
        Ok(split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_dom::{parse_fragment_into, FragmentContext};

    #[test]
    fn walks_pre_order_with_expectations() {
        let mut doc = Document::new();
        let fragment =
            parse_fragment_into(&mut doc, "<div><span>a</span></div>text", FragmentContext::Body);

        let mut walker = HydrationWalker::new(&doc, fragment);
        let div = walker.next_node(&doc, NodeType::Element).unwrap();
        assert_eq!(doc.tag_name(div), Some("div"));
        let span = walker.next_node(&doc, NodeType::Element).unwrap();
        assert_eq!(doc.tag_name(span), Some("span"));
        walker.next_node(&doc, NodeType::Text).unwrap();
        let text = walker.next_node(&doc, NodeType::Text).unwrap();
        assert_eq!(doc.text(text), Some("text"));
    }

    #[test]
    fn mismatch_reports_found_node() {
        let mut doc = Document::new();
        let fragment = parse_fragment_into(&mut doc, "<div></div>", FragmentContext::Body);
        let mut walker = HydrationWalker::new(&doc, fragment);
        let err = walker.next_node(&doc, NodeType::Comment).unwrap_err();
        assert!(matches!(err, HydrationError::Mismatch { .. }));
        assert!(err.to_string().contains("<div>"));
    }

    #[test]
    fn split_text_inserts_empty_node() {
        let mut doc = Document::new();
        let fragment = parse_fragment_into(&mut doc, "merged", FragmentContext::Body);
        let mut walker = HydrationWalker::new(&doc, fragment);
        let split = walker.split_text(&mut doc).unwrap();
        assert_eq!(doc.text(split), Some(""));
        assert_eq!(doc.children(fragment).len(), 2);
    }
}
