use crate::document::{Document, NodeKind};
use indextree::NodeId;

// https://html.spec.whatwg.org/#void-elements
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

// Elements whose text children serialize without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "plaintext"];

/// Serialize a node and its subtree to markup. The oracle the end-to-end
/// tests compare against.
pub fn outer_html(document: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(document, node, &mut out, false);
    out
}

/// Serialize only the children of a node.
pub fn inner_html(document: &Document, node: NodeId) -> String {
    let mut out = String::new();
    let raw = is_raw_text(document, node);
    for child in document.children(node) {
        write_node(document, child, &mut out, raw);
    }
    out
}

fn is_raw_text(document: &Document, node: NodeId) -> bool {
    document
        .tag_name(node)
        .map(|tag| RAW_TEXT_ELEMENTS.contains(&tag))
        .unwrap_or(false)
}

fn write_node(document: &Document, node: NodeId, out: &mut String, raw_text: bool) {
    match document.kind(node) {
        NodeKind::Document | NodeKind::Fragment => {
            for child in document.children(node) {
                write_node(document, child, out, false);
            }
        }
        NodeKind::Element { tag, attrs, .. } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs.iter() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, out, true);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
            for child in document.children(node) {
                write_node(document, child, out, raw);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeKind::Text { data } => {
            if raw_text {
                out.push_str(data);
            } else {
                escape_into(data, out, false);
            }
        }
        NodeKind::Comment { data } => {
            out.push_str("<!--");
            out.push_str(data);
            out.push_str("-->");
        }
    }
}

fn escape_into(value: &str, out: &mut String, attribute: bool) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
