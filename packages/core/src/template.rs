use crate::error::TemplateError;
use crate::part::Part;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use weft_dom::{
    parse_fragment_into, Document, FragmentContext, Namespace, NodeId, NodeType, PropertyValue,
    TreeWalker,
};

/// The parser insertion mode a template is compiled under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TemplateMode {
    Html,
    Svg,
    MathMl,
    Textarea,
}

impl TemplateMode {
    fn fragment_context(self) -> FragmentContext {
        match self {
            TemplateMode::Html => FragmentContext::Body,
            TemplateMode::Svg => FragmentContext::Svg,
            TemplateMode::MathMl => FragmentContext::MathMl,
            TemplateMode::Textarea => FragmentContext::Textarea,
        }
    }

    fn namespace(self) -> Namespace {
        match self {
            TemplateMode::Svg => Namespace::Svg,
            TemplateMode::MathMl => Namespace::MathMl,
            TemplateMode::Html | TemplateMode::Textarea => Namespace::Html,
        }
    }
}

/// The value produced by a tagged template call: the raw literal pieces
/// plus the dynamic binds. Compilation is deferred until the value reaches
/// a binding with access to a document, and cached by source.
pub struct TemplateValue {
    pub mode: TemplateMode,
    pub strings: Rc<Vec<Box<str>>>,
    pub binds: Vec<Value>,
}

impl TemplateValue {
    pub fn same_source(&self, other: &TemplateValue) -> bool {
        self.mode == other.mode
            && (Rc::ptr_eq(&self.strings, &other.strings) || self.strings == other.strings)
    }
}

/// A dynamic-template argument: either a bound value or a literal spliced
/// into the strings before compilation.
pub enum TemplateArg {
    Bind(Value),
    Literal(String),
}

fn template_value(mode: TemplateMode, strings: &[&str], binds: Vec<Value>) -> Value {
    Value::Template(Rc::new(TemplateValue {
        mode,
        strings: Rc::new(strings.iter().map(|s| Box::from(*s)).collect()),
        binds,
    }))
}

/// `` html`…` `` — an HTML template literal.
pub fn html(strings: &[&str], binds: Vec<Value>) -> Value {
    template_value(TemplateMode::Html, strings, binds)
}

/// `` svg`…` `` — parsed with SVG foreign-content rules.
pub fn svg(strings: &[&str], binds: Vec<Value>) -> Value {
    template_value(TemplateMode::Svg, strings, binds)
}

/// `` math`…` `` — parsed with MathML foreign-content rules.
pub fn math(strings: &[&str], binds: Vec<Value>) -> Value {
    template_value(TemplateMode::MathMl, strings, binds)
}

/// `` text`…` `` — parsed in the textarea insertion mode; markup stays
/// text.
pub fn text(strings: &[&str], binds: Vec<Value>) -> Value {
    template_value(TemplateMode::Textarea, strings, binds)
}

fn dynamic(mode: TemplateMode, strings: &[&str], args: Vec<TemplateArg>) -> Value {
    // Literal arguments are resolved before compilation: spliced into the
    // strings, their positions skipped in the binds.
    let mut out_strings: Vec<String> = vec![strings.first().map(|s| s.to_string()).unwrap_or_default()];
    let mut binds = Vec::new();
    for (index, arg) in args.into_iter().enumerate() {
        let next = strings.get(index + 1).copied().unwrap_or("");
        match arg {
            TemplateArg::Literal(literal) => {
                let last = out_strings.last_mut().expect("strings are never empty");
                last.push_str(&literal);
                last.push_str(next);
            }
            TemplateArg::Bind(value) => {
                binds.push(value);
                out_strings.push(next.to_string());
            }
        }
    }
    Value::Template(Rc::new(TemplateValue {
        mode,
        strings: Rc::new(out_strings.into_iter().map(Box::from).collect()),
        binds,
    }))
}

/// `` dynamicHTML`…` `` — like [`html`] but allowing [`TemplateArg::Literal`]
/// pieces inside tag and attribute names.
pub fn dynamic_html(strings: &[&str], args: Vec<TemplateArg>) -> Value {
    dynamic(TemplateMode::Html, strings, args)
}

pub fn dynamic_svg(strings: &[&str], args: Vec<TemplateArg>) -> Value {
    dynamic(TemplateMode::Svg, strings, args)
}

pub fn dynamic_math(strings: &[&str], args: Vec<TemplateArg>) -> Value {
    dynamic(TemplateMode::MathMl, strings, args)
}

/// The typed description of one dynamic position in a compiled template.
#[derive(Clone, Debug)]
pub enum HoleKind {
    Attribute { name: Rc<str> },
    Property { name: Rc<str> },
    Live { name: Rc<str> },
    Event { name: Rc<str> },
    Element,
    ChildNode,
    Text { preceding: Rc<str>, following: Rc<str> },
}

#[derive(Clone, Debug)]
pub struct Hole {
    /// Pre-order index of the target node within the compiled fragment.
    pub index: usize,
    pub kind: HoleKind,
}

/// A compiled template: a cloneable fragment plus the ordered hole plan.
/// Holes appear in source order of the `${…}` positions.
#[derive(Debug)]
pub struct Template {
    mode: TemplateMode,
    fragment: NodeId,
    holes: Vec<Hole>,
}

/// One freshly stamped copy of a template: the root nodes (still parented
/// by a detached fragment until mounted) and one part per hole.
pub struct TemplateInstance {
    pub roots: Vec<NodeId>,
    pub parts: Vec<Part>,
}

enum Plan {
    Attr { node: NodeId, kind: AttrHoleKind, name: Rc<str> },
    Element { node: NodeId },
    ChildNode { node: NodeId },
    Text { node: NodeId, nth: usize, preceding: Rc<str>, following: Rc<str> },
}

#[derive(Clone, Copy)]
enum AttrHoleKind {
    Attribute,
    Property,
    Live,
    Event,
}

impl Template {
    /// Compile a tagged template into a reusable plan.
    ///
    /// The strings are joined with the `??placeholder??` marker, parsed in
    /// the mode's insertion context, and the resulting tree is scanned for
    /// markers in attribute values, attribute names, comments and text.
    pub fn compile(
        doc: &mut Document,
        strings: &[&str],
        num_binds: usize,
        placeholder: &str,
        mode: TemplateMode,
    ) -> Result<Template, TemplateError> {
        if placeholder.is_empty()
            || !placeholder
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(TemplateError::InvalidPlaceholder {
                placeholder: placeholder.to_owned(),
            });
        }
        let marker = format!("??{placeholder}??");
        let source = strings.join(&marker);
        let fragment = parse_fragment_into(doc, &source, mode.fragment_context());

        let (plans, removals, comment_clears, text_splits) =
            scan(doc, fragment, strings, &marker)?;

        // Apply the planned mutations: holes leave no trace of the marker
        // in the compiled fragment.
        for (node, name) in &removals {
            doc.remove_attribute(*node, name);
        }
        for node in &comment_clears {
            doc.set_comment_data(*node, "");
        }
        // Text markers get dedicated, initially empty text nodes; the
        // surrounding literal fragments live on the holes themselves.
        let mut split_nodes: FxHashMap<(NodeId, usize), NodeId> = FxHashMap::default();
        for (node, count) in &text_splits {
            doc.set_text(*node, "");
            split_nodes.insert((*node, 0), *node);
            let mut previous = *node;
            for nth in 1..*count {
                let extra = doc.create_text("");
                doc.insert_after(previous, extra);
                split_nodes.insert((*node, nth), extra);
                previous = extra;
            }
        }

        // Final pass: assign pre-order indices over the settled tree.
        let mut index_of: FxHashMap<NodeId, usize> = FxHashMap::default();
        let mut walker = TreeWalker::descendants(doc, fragment);
        let mut index = 0;
        while let Some(node) = walker.next(doc) {
            index_of.insert(node, index);
            index += 1;
        }

        let holes: Vec<Hole> = plans
            .into_iter()
            .map(|plan| match plan {
                Plan::Attr { node, kind, name } => Hole {
                    index: index_of[&node],
                    kind: match kind {
                        AttrHoleKind::Attribute => HoleKind::Attribute { name },
                        AttrHoleKind::Property => HoleKind::Property { name },
                        AttrHoleKind::Live => HoleKind::Live { name },
                        AttrHoleKind::Event => HoleKind::Event { name },
                    },
                },
                Plan::Element { node } => Hole {
                    index: index_of[&node],
                    kind: HoleKind::Element,
                },
                Plan::ChildNode { node } => Hole {
                    index: index_of[&node],
                    kind: HoleKind::ChildNode,
                },
                Plan::Text {
                    node,
                    nth,
                    preceding,
                    following,
                } => Hole {
                    index: index_of[&split_nodes[&(node, nth)]],
                    kind: HoleKind::Text {
                        preceding,
                        following,
                    },
                },
            })
            .collect();

        if holes.len() != num_binds {
            return Err(TemplateError::BindCountMismatch {
                holes: holes.len(),
                binds: num_binds,
            });
        }

        Ok(Template {
            mode,
            fragment,
            holes,
        })
    }

    pub fn mode(&self) -> TemplateMode {
        self.mode
    }

    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    pub(crate) fn fragment(&self) -> NodeId {
        self.fragment
    }

    pub fn namespace(&self) -> Namespace {
        self.mode.namespace()
    }

    /// Stamp a fresh instance: clone the fragment, walk it once, and
    /// resolve every hole to a part on the cloned nodes.
    pub fn instantiate(&self, doc: &mut Document) -> TemplateInstance {
        let clone = doc.clone_subtree(self.fragment);
        let mut nodes = Vec::with_capacity(self.holes.len());
        let mut walker = TreeWalker::descendants(doc, clone);
        while let Some(node) = walker.next(doc) {
            nodes.push(node);
        }
        let parts = self
            .holes
            .iter()
            .map(|hole| self.part_for(hole, nodes[hole.index]))
            .collect();
        TemplateInstance {
            roots: doc.children(clone),
            parts,
        }
    }

    pub(crate) fn part_for(&self, hole: &Hole, node: NodeId) -> Part {
        match &hole.kind {
            HoleKind::Attribute { name } => Part::Attribute {
                node,
                name: name.clone(),
            },
            HoleKind::Property { name } => Part::Property {
                node,
                name: name.clone(),
                default: PropertyValue::Null,
            },
            HoleKind::Live { name } => Part::Live {
                node,
                name: name.clone(),
                default: PropertyValue::Null,
            },
            HoleKind::Event { name } => Part::Event {
                node,
                name: name.clone(),
            },
            HoleKind::Element => Part::Element { node },
            HoleKind::ChildNode => Part::child_node(node, self.namespace()),
            HoleKind::Text {
                preceding,
                following,
            } => Part::Text {
                node,
                preceding: preceding.clone(),
                following: following.clone(),
            },
        }
    }
}

type ScanOutput = (
    Vec<Plan>,
    Vec<(NodeId, String)>,
    Vec<NodeId>,
    Vec<(NodeId, usize)>,
);

fn scan(
    doc: &Document,
    fragment: NodeId,
    strings: &[&str],
    marker: &str,
) -> Result<ScanOutput, TemplateError> {
    let mut plans = Vec::new();
    let mut removals = Vec::new();
    let mut comment_clears = Vec::new();
    let mut text_splits = Vec::new();

    let mut walker = TreeWalker::descendants(doc, fragment);
    while let Some(node) = walker.next(doc) {
        match doc.node_type(node) {
            NodeType::Element => {
                let tag = doc.tag_name(node).unwrap_or_default().to_owned();
                if tag.contains(marker) {
                    return Err(TemplateError::InvalidHolePosition {
                        detail: format!("marker inside tag name <{tag}>"),
                    });
                }
                // Snapshot: holes remove their attributes as they resolve.
                for (attr_name, attr_value) in doc.attributes(node) {
                    if attr_name == marker {
                        plans.push(Plan::Element { node });
                        removals.push((node, attr_name));
                    } else if attr_name.contains(marker) {
                        return Err(TemplateError::InvalidHolePosition {
                            detail: format!("marker inside attribute name {attr_name:?}"),
                        });
                    } else if attr_value == marker {
                        let (kind, name) =
                            recover_attribute_name(strings, plans.len(), &attr_name)?;
                        plans.push(Plan::Attr { node, kind, name });
                        removals.push((node, attr_name));
                    } else if attr_value.contains(marker) {
                        return Err(TemplateError::InvalidHolePosition {
                            detail: format!(
                                "marker inside attribute value {attr_value:?} with surrounding text"
                            ),
                        });
                    }
                }
            }
            NodeType::Comment => {
                let data = doc.comment_data(node).unwrap_or_default();
                if is_marker_comment(data, marker) {
                    plans.push(Plan::ChildNode { node });
                    comment_clears.push(node);
                } else if data.contains(marker) {
                    return Err(TemplateError::InvalidHolePosition {
                        detail: format!("partial marker in comment {data:?}"),
                    });
                }
            }
            NodeType::Text => {
                let data = doc.text(node).unwrap_or_default().to_owned();
                if data.contains(marker) {
                    let fragments: Vec<&str> = data.split(marker).collect();
                    let count = fragments.len() - 1;
                    for nth in 0..count {
                        let preceding: Rc<str> = Rc::from(fragments[nth]);
                        let following: Rc<str> = if nth == count - 1 {
                            Rc::from(fragments[count])
                        } else {
                            Rc::from("")
                        };
                        plans.push(Plan::Text {
                            node,
                            nth,
                            preceding,
                            following,
                        });
                    }
                    text_splits.push((node, count));
                }
            }
            _ => {}
        }
    }
    Ok((plans, removals, comment_clears, text_splits))
}

/// A marker comment is a child-node hole. The optional trailing slash
/// covers the `<${…}/>` mount-point form, which the tokenizer turns into a
/// bogus comment carrying the marker plus a slash.
fn is_marker_comment(data: &str, marker: &str) -> bool {
    let stripped = data.trim();
    let stripped = match stripped.strip_suffix('/') {
        Some(rest) => rest.trim_end(),
        None => stripped,
    };
    stripped == marker
}

/// Recover the case-sensitive attribute name from the literal chunk before
/// hole `index` and classify it by its sigil.
fn recover_attribute_name(
    strings: &[&str],
    index: usize,
    parsed_name: &str,
) -> Result<(AttrHoleKind, Rc<str>), TemplateError> {
    let err = |chunk: &str| TemplateError::UnnamedAttributeHole {
        index,
        chunk: chunk.to_owned(),
    };
    let chunk = strings.get(index).copied().ok_or_else(|| err(""))?;

    // The chunk ends with `name=`, optionally followed by an opening quote.
    let rest = chunk.strip_suffix(&['"', '\''][..]).unwrap_or(chunk).trim_end();
    let rest = rest.strip_suffix('=').ok_or_else(|| err(chunk))?.trim_end();

    let name_start = rest
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .map(|at| at + 1)
        .unwrap_or(0);
    let name = &rest[name_start..];
    if name.is_empty() {
        return Err(err(chunk));
    }
    let sigil = rest[..name_start].chars().next_back();
    let (kind, full) = match sigil {
        Some('@') => (AttrHoleKind::Event, format!("@{name}")),
        Some('.') => (AttrHoleKind::Property, format!(".{name}")),
        Some('$') => (AttrHoleKind::Live, format!("${name}")),
        _ => (AttrHoleKind::Attribute, name.to_owned()),
    };

    // The recovered name must agree with what the parser saw, modulo the
    // tokenizer's lowercasing and foreign-content case adjustment.
    if !full.eq_ignore_ascii_case(parsed_name) {
        return Err(err(chunk));
    }
    Ok((kind, Rc::from(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(strings: &[&str], binds: usize, mode: TemplateMode) -> Result<Template, TemplateError> {
        let mut doc = Document::new();
        Template::compile(&mut doc, strings, binds, "test", mode)
    }

    #[test]
    fn attribute_hole_kinds_follow_sigils() {
        let template = compile(
            &[
                "<input class=\"",
                "\" .fooBar=\"",
                "\" $value=\"",
                "\" @click=\"",
                "\">",
            ],
            4,
            TemplateMode::Html,
        )
        .unwrap();

        let kinds: Vec<String> = template
            .holes()
            .iter()
            .map(|hole| format!("{:?}", hole.kind))
            .collect();
        assert!(kinds[0].starts_with("Attribute"), "{kinds:?}");
        assert!(kinds[1].starts_with("Property"), "{kinds:?}");
        assert!(kinds[2].starts_with("Live"), "{kinds:?}");
        assert!(kinds[3].starts_with("Event"), "{kinds:?}");

        // Case-sensitive source names survive the parser's lowercasing.
        match &template.holes()[1].kind {
            HoleKind::Property { name } => assert_eq!(&**name, "fooBar"),
            other => panic!("expected property hole, got {other:?}"),
        }
    }

    #[test]
    fn comment_and_text_holes() {
        let template = compile(
            &["<div><!-- ", " -->", "tail</div>"],
            2,
            TemplateMode::Html,
        )
        .unwrap();
        assert_eq!(template.holes().len(), 2);
        assert!(matches!(template.holes()[0].kind, HoleKind::ChildNode));
        match &template.holes()[1].kind {
            HoleKind::Text {
                preceding,
                following,
            } => {
                assert_eq!(&**preceding, "");
                assert_eq!(&**following, "tail");
            }
            other => panic!("expected text hole, got {other:?}"),
        }
    }

    #[test]
    fn text_holes_get_dedicated_nodes() {
        let mut doc = Document::new();
        let template =
            Template::compile(&mut doc, &["<p>a", "b", "c</p>"], 2, "x", TemplateMode::Html)
                .unwrap();
        let instance = template.instantiate(&mut doc);
        assert_eq!(instance.parts.len(), 2);
        match (&instance.parts[0], &instance.parts[1]) {
            (
                Part::Text {
                    preceding: p0,
                    following: f0,
                    ..
                },
                Part::Text {
                    preceding: p1,
                    following: f1,
                    ..
                },
            ) => {
                assert_eq!((&**p0, &**f0), ("a", ""));
                assert_eq!((&**p1, &**f1), ("b", "c"));
            }
            other => panic!("expected two text parts, got {other:?}"),
        }
    }

    #[test]
    fn element_hole_from_marker_attribute_name() {
        let template = compile(&["<div ", ">inner</div>"], 1, TemplateMode::Html).unwrap();
        assert!(matches!(template.holes()[0].kind, HoleKind::Element));
    }

    #[test]
    fn mount_point_tag_becomes_child_node_hole() {
        let template = compile(&["<section><", "/></section>"], 1, TemplateMode::Html).unwrap();
        assert!(matches!(template.holes()[0].kind, HoleKind::ChildNode));
    }

    #[test]
    fn rejects_marker_in_tag_name() {
        let err = compile(&["<div", "></div", ">"], 2, TemplateMode::Html).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidHolePosition { .. }));
    }

    #[test]
    fn rejects_partial_marker_in_attribute_value() {
        let err = compile(&["<div class=\"big ", "\"></div>"], 1, TemplateMode::Html).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidHolePosition { .. }));
    }

    #[test]
    fn rejects_marker_affix_in_attribute_name() {
        let err = compile(&["<div data-", "=\"x\"></div>"], 1, TemplateMode::Html).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidHolePosition { .. }));
    }

    #[test]
    fn rejects_partial_marker_comment() {
        let err = compile(&["<!-- before ", " after -->"], 1, TemplateMode::Html).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidHolePosition { .. }));
    }

    #[test]
    fn rejects_invalid_placeholder() {
        let mut doc = Document::new();
        let err = Template::compile(&mut doc, &["<p></p>"], 0, "Bad Placeholder", TemplateMode::Html)
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidPlaceholder { .. }));
    }

    #[test]
    fn bind_count_must_match_holes() {
        let err = compile(&["<p>", "</p>"], 3, TemplateMode::Html).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::BindCountMismatch { holes: 1, binds: 3 }
        ));
    }

    #[test]
    fn svg_templates_compile_in_svg_namespace() {
        let mut doc = Document::new();
        let template = Template::compile(
            &mut doc,
            &["<circle r=\"", "\"></circle>"],
            1,
            "x",
            TemplateMode::Svg,
        )
        .unwrap();
        let instance = template.instantiate(&mut doc);
        let circle = instance.roots[0];
        assert_eq!(doc.namespace(circle), Some(Namespace::Svg));
        assert_eq!(template.namespace(), Namespace::Svg);
    }

    #[test]
    fn literal_splicing_skips_binds() {
        let value = dynamic_html(
            &["<", " title=\"", "\"></", ">"],
            vec![
                TemplateArg::Literal("h1".into()),
                TemplateArg::Bind(Value::from("hello")),
                TemplateArg::Literal("h1".into()),
            ],
        );
        match value {
            Value::Template(tv) => {
                assert_eq!(tv.binds.len(), 1);
                assert_eq!(&*tv.strings[0], "<h1 title=\"");
                assert_eq!(&*tv.strings[1], "\"></h1>");
            }
            other => panic!("expected template value, got {other:?}"),
        }
    }

    #[test]
    fn instances_are_independent_clones() {
        let mut doc = Document::new();
        let template = Template::compile(
            &mut doc,
            &["<div class=\"", "\"></div>"],
            1,
            "x",
            TemplateMode::Html,
        )
        .unwrap();
        let a = template.instantiate(&mut doc);
        let b = template.instantiate(&mut doc);
        assert_ne!(a.roots[0], b.roots[0]);
        assert_ne!(a.parts[0].node(), b.parts[0].node());
    }
}
