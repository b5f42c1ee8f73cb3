//! An arena-backed retained DOM.
//!
//! `weft-dom` owns the tree that `weft-core` binds into: nodes live in an
//! [`indextree`] arena and are addressed by [`NodeId`]. The crate also carries
//! the pieces of the platform a template runtime needs but a virtual tree
//! does not: event listeners and dispatch, HTML fragment parsing, and
//! serialization back to markup.

mod document;
mod event;
mod parser;
mod serialize;
mod walker;

pub use document::{
    Document, ListenerEntry, ListenerOptions, Namespace, NodeKind, NodeType, PropertyValue,
};
pub use event::{dispatch_event, DomEvent, ListenerCallback};
pub use indextree::NodeId;
pub use parser::{parse_fragment_into, FragmentContext};
pub use serialize::{inner_html, outer_html};
pub use walker::TreeWalker;
