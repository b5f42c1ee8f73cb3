use crate::document::{Document, Namespace, NodeType};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{parse_fragment, Attribute, ParseOpts};
use indextree::NodeId;
use markup5ever::{local_name, namespace_url, ns, ExpandedName, QualName};
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// The fragment-parsing context element.
///
/// This is how template modes reach the HTML parser: the context element
/// selects the insertion mode (and, for `Textarea`, the RCDATA tokenizer
/// state), so `<path>` inside an svg template lands in the SVG namespace
/// and markup inside a textarea template stays text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentContext {
    Body,
    Svg,
    MathMl,
    Textarea,
}

impl FragmentContext {
    fn qual_name(self) -> QualName {
        match self {
            FragmentContext::Body => QualName::new(None, ns!(html), local_name!("body")),
            FragmentContext::Svg => QualName::new(None, ns!(svg), local_name!("svg")),
            FragmentContext::MathMl => QualName::new(None, ns!(mathml), local_name!("math")),
            FragmentContext::Textarea => QualName::new(None, ns!(html), local_name!("textarea")),
        }
    }
}

/// Parse an HTML fragment into `document`, returning a fragment node that
/// holds the parsed children.
///
/// html5ever is error-recovering, so this never fails; malformed input
/// produces whatever tree a browser would build for it. Semantic
/// validation of template markup happens above this layer.
pub fn parse_fragment_into(
    document: &mut Document,
    source: &str,
    context: FragmentContext,
) -> NodeId {
    let holder = document.create_fragment();
    let sink = ArenaSink {
        document,
        holder,
        names: FxHashMap::default(),
        template_contents: FxHashMap::default(),
    };
    let parser = parse_fragment(sink, ParseOpts::default(), context.qual_name(), Vec::new());
    let holder = parser.one(source);

    // The fragment tree builder nests all content under a synthetic <html>
    // root; unwrap it into a fresh fragment node.
    let fragment = document.create_fragment();
    let synthetic_root = document
        .children(holder)
        .into_iter()
        .find(|id| document.node_type(*id) == NodeType::Element);
    if let Some(root) = synthetic_root {
        document.reparent_children(root, fragment);
    }
    document.detach(holder);
    fragment
}

/// html5ever `TreeSink` that builds directly into the arena document.
struct ArenaSink<'a> {
    document: &'a mut Document,
    holder: NodeId,
    names: FxHashMap<NodeId, QualName>,
    template_contents: FxHashMap<NodeId, NodeId>,
}

impl<'a> ArenaSink<'a> {
    fn append_text(&mut self, previous: Option<NodeId>, parent_or_sibling: (NodeId, bool), text: StrTendril) {
        // html5ever expects sinks to merge adjacent text nodes.
        if let Some(prev) = previous {
            if self.document.node_type(prev) == NodeType::Text {
                let merged = format!("{}{}", self.document.text(prev).unwrap_or(""), text);
                self.document.set_text(prev, merged);
                return;
            }
        }
        let node = self.document.create_text(text.to_string());
        let (anchor, as_sibling) = parent_or_sibling;
        if as_sibling {
            self.document.insert_before(anchor, node);
        } else {
            self.document.append(anchor, node);
        }
    }
}

impl<'a> TreeSink for ArenaSink<'a> {
    type Handle = NodeId;
    type Output = NodeId;

    fn finish(self) -> Self::Output {
        self.holder
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        tracing::trace!("html parse error: {msg}");
    }

    fn get_document(&mut self) -> Self::Handle {
        self.holder
    }

    fn elem_name<'b>(&'b self, target: &'b Self::Handle) -> ExpandedName<'b> {
        self.names
            .get(target)
            .expect("elem_name called on a non-element node")
            .expanded()
    }

    fn create_element(
        &mut self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle {
        let namespace = if name.ns == ns!(svg) {
            Namespace::Svg
        } else if name.ns == ns!(mathml) {
            Namespace::MathMl
        } else {
            Namespace::Html
        };
        let id = self.document.create_element(name.local.to_string(), namespace);
        for attr in attrs {
            let attr_name = match &attr.name.prefix {
                Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                None => attr.name.local.to_string(),
            };
            self.document.set_attribute(id, &attr_name, &attr.value);
        }
        if flags.template {
            let contents = self.document.create_fragment();
            self.template_contents.insert(id, contents);
        }
        self.names.insert(id, name);
        id
    }

    fn create_comment(&mut self, text: StrTendril) -> Self::Handle {
        self.document.create_comment(text.to_string())
    }

    fn create_pi(&mut self, _target: StrTendril, data: StrTendril) -> Self::Handle {
        self.document.create_comment(data.to_string())
    }

    fn append(&mut self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => self.document.append(*parent, node),
            NodeOrText::AppendText(text) => {
                let previous = self.document.last_child(*parent);
                self.append_text(previous, (*parent, false), text);
            }
        }
    }

    fn append_based_on_parent_node(
        &mut self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if self.document.parent(*element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &mut self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&mut self, target: &Self::Handle) -> Self::Handle {
        match self.template_contents.get(target) {
            Some(contents) => *contents,
            None => {
                let contents = self.document.create_fragment();
                self.template_contents.insert(*target, contents);
                contents
            }
        }
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&mut self, _mode: QuirksMode) {}

    fn append_before_sibling(&mut self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        match new_node {
            NodeOrText::AppendNode(node) => self.document.insert_before(*sibling, node),
            NodeOrText::AppendText(text) => {
                let previous = self.document.previous_sibling(*sibling);
                self.append_text(previous, (*sibling, true), text);
            }
        }
    }

    fn add_attrs_if_missing(&mut self, target: &Self::Handle, attrs: Vec<Attribute>) {
        for attr in attrs {
            let attr_name = attr.name.local.to_string();
            if self.document.attribute(*target, &attr_name).is_none() {
                self.document.set_attribute(*target, &attr_name, &attr.value);
            }
        }
    }

    fn remove_from_parent(&mut self, target: &Self::Handle) {
        self.document.detach(*target);
    }

    fn reparent_children(&mut self, node: &Self::Handle, new_parent: &Self::Handle) {
        self.document.reparent_children(*node, *new_parent);
    }
}
