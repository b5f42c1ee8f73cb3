use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use weft_dom::{Namespace, NodeId, PropertyValue};

/// A typed handle on one position in the live tree.
///
/// Parts are cheap to clone; `ChildNode` parts share their anchor cell
/// across clones so every holder observes the current head of the range.
#[derive(Clone)]
pub enum Part {
    /// An HTML attribute addressed by name.
    Attribute { node: NodeId, name: Rc<str> },

    /// A JS-style property assignment. `default` is what rollback restores.
    Property {
        node: NodeId,
        name: Rc<str>,
        default: PropertyValue,
    },

    /// A property whose current reading is authoritative; the binding
    /// compares against the live value, not the last written one.
    Live {
        node: NodeId,
        name: Rc<str>,
        default: PropertyValue,
    },

    /// An event listener registration.
    Event { node: NodeId, name: Rc<str> },

    /// The whole element; the bound value is a mapping of micro-bindings.
    Element { node: NodeId },

    /// A reserved comment marker. The owned range is
    /// `[anchor.unwrap_or(node), node]`.
    ChildNode {
        node: NodeId,
        anchor: Rc<Cell<Option<NodeId>>>,
        namespace: Namespace,
    },

    /// A slice of a text node whose content is
    /// `preceding ++ value ++ following`.
    Text {
        node: NodeId,
        preceding: Rc<str>,
        following: Rc<str>,
    },
}

impl Part {
    pub fn child_node(node: NodeId, namespace: Namespace) -> Self {
        Part::ChildNode {
            node,
            anchor: Rc::new(Cell::new(None)),
            namespace,
        }
    }

    pub fn node(&self) -> NodeId {
        match self {
            Part::Attribute { node, .. }
            | Part::Property { node, .. }
            | Part::Live { node, .. }
            | Part::Event { node, .. }
            | Part::Element { node }
            | Part::ChildNode { node, .. }
            | Part::Text { node, .. } => *node,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Part::Attribute { .. } => "attribute",
            Part::Property { .. } => "property",
            Part::Live { .. } => "live",
            Part::Event { .. } => "event",
            Part::Element { .. } => "element",
            Part::ChildNode { .. } => "child-node",
            Part::Text { .. } => "text",
        }
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Attribute { node, name } => {
                write!(f, "AttributePart({node:?}, {name:?})")
            }
            Part::Property { node, name, .. } => {
                write!(f, "PropertyPart({node:?}, {name:?})")
            }
            Part::Live { node, name, .. } => write!(f, "LivePart({node:?}, {name:?})"),
            Part::Event { node, name } => write!(f, "EventPart({node:?}, {name:?})"),
            Part::Element { node } => write!(f, "ElementPart({node:?})"),
            Part::ChildNode { node, anchor, .. } => {
                write!(f, "ChildNodePart({node:?}, anchor: {:?})", anchor.get())
            }
            Part::Text {
                node,
                preceding,
                following,
            } => write!(f, "TextPart({node:?}, {preceding:?}..{following:?})"),
        }
    }
}
