use crate::event::ListenerCallback;
use indextree::{Arena, NodeId};
use smallvec::SmallVec;
use std::rc::Rc;

/// The markup namespace a node was created in.
///
/// Template modes map directly onto these: `svg`/`math` templates produce
/// foreign-content subtrees, everything else is plain HTML.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
}

/// A JS-style element property, kept separately from attributes.
///
/// Property and live-property parts write these; attributes never observe
/// them and serialization ignores them, matching how a browser treats
/// `input.value` vs the `value` attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

#[derive(Clone)]
pub struct ListenerEntry {
    pub name: String,
    pub callback: ListenerCallback,
    pub options: ListenerOptions,
}

/// Coarse node classification, used by walkers and hydration to state
/// expectations without matching on the full [`NodeKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Fragment,
    Element,
    Text,
    Comment,
}

pub enum NodeKind {
    Document,
    Fragment,
    Element {
        tag: String,
        namespace: Namespace,
        attrs: SmallVec<[(String, String); 4]>,
        props: Vec<(String, PropertyValue)>,
        listeners: Vec<ListenerEntry>,
    },
    Text {
        data: String,
    },
    Comment {
        data: String,
    },
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Document => NodeType::Document,
            NodeKind::Fragment => NodeType::Fragment,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text { .. } => NodeType::Text,
            NodeKind::Comment { .. } => NodeType::Comment,
        }
    }
}

/// The retained tree. All mutation goes through these methods; detached
/// subtrees stay in the arena until the document is dropped (passive
/// reclamation, the slab strategy).
pub struct Document {
    arena: Arena<NodeKind>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Document);
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ------------------------------------------------------------------
    // Node construction
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, tag: impl Into<String>, namespace: Namespace) -> NodeId {
        self.arena.new_node(NodeKind::Element {
            tag: tag.into(),
            namespace,
            attrs: SmallVec::new(),
            props: Vec::new(),
            listeners: Vec::new(),
        })
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        self.arena.new_node(NodeKind::Text { data: data.into() })
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        self.arena.new_node(NodeKind::Comment { data: data.into() })
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.arena.new_node(NodeKind::Fragment)
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Append `child` to `parent`, detaching it from any previous parent
    /// first (moves are plain re-insertions).
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.append(child, &mut self.arena);
    }

    /// Insert `new` as the previous sibling of `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        new.detach(&mut self.arena);
        reference.insert_before(new, &mut self.arena);
    }

    /// Insert `new` as the next sibling of `reference`.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) {
        new.detach(&mut self.arena);
        reference.insert_after(new, &mut self.arena);
    }

    /// Detach a subtree from its parent. The nodes remain alive and can be
    /// re-inserted elsewhere (list moves rely on this).
    pub fn detach(&mut self, node: NodeId) {
        node.detach(&mut self.arena);
    }

    pub fn reparent_children(&mut self, from: NodeId, to: NodeId) {
        let children: Vec<_> = from.children(&self.arena).collect();
        for child in children {
            child.detach(&mut self.arena);
            to.append(child, &mut self.arena);
        }
    }

    /// Deep-copy a subtree. Attributes and text travel with the copy;
    /// listeners and properties do not, matching `cloneNode` semantics.
    pub fn clone_subtree(&mut self, source: NodeId) -> NodeId {
        let copy = match self.kind(source) {
            NodeKind::Document | NodeKind::Fragment => self.create_fragment(),
            NodeKind::Element {
                tag,
                namespace,
                attrs,
                ..
            } => {
                let (tag, namespace, attrs) = (tag.clone(), *namespace, attrs.clone());
                let id = self.create_element(tag, namespace);
                if let NodeKind::Element { attrs: dst, .. } = self.kind_mut(id) {
                    *dst = attrs;
                }
                id
            }
            NodeKind::Text { data } => {
                let data = data.clone();
                self.create_text(data)
            }
            NodeKind::Comment { data } => {
                let data = data.clone();
                self.create_comment(data)
            }
        };

        let children: Vec<_> = source.children(&self.arena).collect();
        for child in children {
            let child_copy = self.clone_subtree(child);
            copy.append(child_copy, &mut self.arena);
        }
        copy
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        self.arena[node].get()
    }

    pub(crate) fn kind_mut(&mut self, node: NodeId) -> &mut NodeKind {
        self.arena[node].get_mut()
    }

    pub fn node_type(&self, node: NodeId) -> NodeType {
        self.kind(node).node_type()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn namespace(&self, node: NodeId) -> Option<Namespace> {
        match self.kind(node) {
            NodeKind::Element { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].parent()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].first_child()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].last_child()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].next_sibling()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].previous_sibling()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        node.children(&self.arena).collect()
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        node.children(&self.arena).count()
    }

    /// Pre-order successor within the subtree rooted at `root`.
    pub fn next_in_tree(&self, current: NodeId, root: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(current) {
            return Some(child);
        }
        let mut node = current;
        while node != root {
            if let Some(sibling) = self.next_sibling(node) {
                return Some(sibling);
            }
            node = self.parent(node)?;
        }
        None
    }

    /// Ancestor chain from `node` up to the tree root, target first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            out.push(id);
            current = self.parent(id);
        }
        out
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text { data } => Some(data),
            _ => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, value: impl Into<String>) {
        if let NodeKind::Text { data } = self.kind_mut(node) {
            *data = value.into();
        }
    }

    pub fn comment_data(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Comment { data } => Some(data),
            _ => None,
        }
    }

    pub fn set_comment_data(&mut self, node: NodeId, value: impl Into<String>) {
        if let NodeKind::Comment { data } = self.kind_mut(node) {
            *data = value.into();
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        match self.kind(node) {
            NodeKind::Element { attrs, .. } => attrs.to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = self.kind_mut(node) {
            if let Some((_, slot)) = attrs.iter_mut().find(|(key, _)| key == name) {
                value.clone_into(slot);
            } else {
                attrs.push((name.to_owned(), value.to_owned()));
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = self.kind_mut(node) {
            attrs.retain(|(key, _)| key != name);
        }
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<&PropertyValue> {
        match self.kind(node) {
            NodeKind::Element { props, .. } => props
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn set_property(&mut self, node: NodeId, name: &str, value: PropertyValue) {
        if let NodeKind::Element { props, .. } = self.kind_mut(node) {
            if let Some((_, slot)) = props.iter_mut().find(|(key, _)| key == name) {
                *slot = value;
            } else {
                props.push((name.to_owned(), value));
            }
        }
    }

    pub fn remove_property(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { props, .. } = self.kind_mut(node) {
            props.retain(|(key, _)| key != name);
        }
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_event_listener(&mut self, node: NodeId, entry: ListenerEntry) {
        if let NodeKind::Element { listeners, .. } = self.kind_mut(node) {
            listeners.push(entry);
        }
    }

    /// Remove a listener by name, callback identity and capture flag, the
    /// same triple `removeEventListener` keys on.
    pub fn remove_event_listener(
        &mut self,
        node: NodeId,
        name: &str,
        callback: &ListenerCallback,
        capture: bool,
    ) {
        if let NodeKind::Element { listeners, .. } = self.kind_mut(node) {
            listeners.retain(|entry| {
                !(entry.name == name
                    && entry.options.capture == capture
                    && Rc::ptr_eq(&entry.callback, callback))
            });
        }
    }

    pub fn listeners(&self, node: NodeId, name: &str) -> Vec<ListenerEntry> {
        match self.kind(node) {
            NodeKind::Element { listeners, .. } => listeners
                .iter()
                .filter(|entry| entry.name == name)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

}
