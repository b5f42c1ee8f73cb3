use std::cell::RefCell;
use std::rc::Rc;
use weft_dom::{
    dispatch_event, inner_html, outer_html, parse_fragment_into, Document, DomEvent,
    FragmentContext, ListenerEntry, ListenerOptions, Namespace, NodeType, TreeWalker,
};

#[test]
fn build_and_serialize() {
    let mut doc = Document::new();
    let div = doc.create_element("div", Namespace::Html);
    doc.set_attribute(div, "class", "greeting");
    let text = doc.create_text("hello & <world>");
    doc.append(div, text);
    let root = doc.root();
    doc.append(root, div);

    assert_eq!(
        outer_html(&doc, div),
        "<div class=\"greeting\">hello &amp; &lt;world&gt;</div>"
    );
    assert_eq!(inner_html(&doc, root), outer_html(&doc, div));
}

#[test]
fn attribute_values_escape_quotes() {
    let mut doc = Document::new();
    let div = doc.create_element("div", Namespace::Html);
    doc.set_attribute(div, "title", "say \"hi\"");
    assert_eq!(outer_html(&doc, div), "<div title=\"say &quot;hi&quot;\"></div>");
}

#[test]
fn parse_simple_fragment() {
    let mut doc = Document::new();
    let fragment = parse_fragment_into(&mut doc, "<p class=\"a\">one</p><p>two</p>", FragmentContext::Body);
    assert_eq!(
        inner_html(&doc, fragment),
        "<p class=\"a\">one</p><p>two</p>"
    );
}

#[test]
fn parse_preserves_comments() {
    let mut doc = Document::new();
    let fragment = parse_fragment_into(&mut doc, "<div><!--marker--></div>", FragmentContext::Body);
    assert_eq!(inner_html(&doc, fragment), "<div><!--marker--></div>");
}

#[test]
fn parse_svg_fragment_uses_svg_namespace() {
    let mut doc = Document::new();
    let fragment = parse_fragment_into(&mut doc, "<circle r=\"4\"></circle>", FragmentContext::Svg);
    let circle = doc.first_child(fragment).unwrap();
    assert_eq!(doc.tag_name(circle), Some("circle"));
    assert_eq!(doc.namespace(circle), Some(Namespace::Svg));
}

#[test]
fn parse_textarea_fragment_is_text() {
    let mut doc = Document::new();
    let fragment = parse_fragment_into(&mut doc, "<b>not markup</b>", FragmentContext::Textarea);
    let child = doc.first_child(fragment).unwrap();
    assert_eq!(doc.node_type(child), NodeType::Text);
    assert_eq!(doc.text(child), Some("<b>not markup</b>"));
}

#[test]
fn walker_visits_in_pre_order() {
    let mut doc = Document::new();
    let fragment =
        parse_fragment_into(&mut doc, "<div><span>a</span>b</div><p></p>", FragmentContext::Body);

    let mut walker = TreeWalker::descendants(&doc, fragment);
    let mut tags = Vec::new();
    while let Some(node) = walker.next(&doc) {
        match doc.node_type(node) {
            NodeType::Element => tags.push(doc.tag_name(node).unwrap().to_string()),
            NodeType::Text => tags.push(format!("#{}", doc.text(node).unwrap())),
            other => panic!("unexpected node type {other:?}"),
        }
    }
    assert_eq!(tags, ["div", "span", "#a", "#b", "p"]);
}

#[test]
fn listeners_dispatch_and_bubble() {
    let doc = Rc::new(RefCell::new(Document::new()));
    let (outer, inner) = {
        let mut d = doc.borrow_mut();
        let outer = d.create_element("div", Namespace::Html);
        let inner = d.create_element("button", Namespace::Html);
        d.append(outer, inner);
        let root = d.root();
        d.append(root, outer);
        (outer, inner)
    };

    let calls = Rc::new(RefCell::new(Vec::new()));

    let record = |tag: &'static str, calls: &Rc<RefCell<Vec<&'static str>>>| {
        let calls = calls.clone();
        Rc::new(move |_event: &DomEvent| calls.borrow_mut().push(tag)) as Rc<dyn Fn(&DomEvent)>
    };

    {
        let mut d = doc.borrow_mut();
        d.add_event_listener(
            inner,
            ListenerEntry {
                name: "click".into(),
                callback: record("target", &calls),
                options: ListenerOptions::default(),
            },
        );
        d.add_event_listener(
            outer,
            ListenerEntry {
                name: "click".into(),
                callback: record("bubble", &calls),
                options: ListenerOptions::default(),
            },
        );
        d.add_event_listener(
            outer,
            ListenerEntry {
                name: "click".into(),
                callback: record("capture", &calls),
                options: ListenerOptions {
                    capture: true,
                    ..Default::default()
                },
            },
        );
    }

    let event = DomEvent::new("click", Rc::new(()));
    dispatch_event(&doc, inner, &event);
    assert_eq!(*calls.borrow(), ["capture", "target", "bubble"]);
}

#[test]
fn once_listener_fires_once() {
    let doc = Rc::new(RefCell::new(Document::new()));
    let button = {
        let mut d = doc.borrow_mut();
        let button = d.create_element("button", Namespace::Html);
        let root = d.root();
        d.append(root, button);
        button
    };

    let count = Rc::new(RefCell::new(0));
    {
        let count = count.clone();
        doc.borrow_mut().add_event_listener(
            button,
            ListenerEntry {
                name: "click".into(),
                callback: Rc::new(move |_| *count.borrow_mut() += 1),
                options: ListenerOptions {
                    once: true,
                    ..Default::default()
                },
            },
        );
    }

    let event = DomEvent::new("click", Rc::new(()));
    dispatch_event(&doc, button, &event);
    dispatch_event(&doc, button, &event);
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn stop_propagation_halts_bubbling() {
    let doc = Rc::new(RefCell::new(Document::new()));
    let (outer, inner) = {
        let mut d = doc.borrow_mut();
        let outer = d.create_element("div", Namespace::Html);
        let inner = d.create_element("span", Namespace::Html);
        d.append(outer, inner);
        (outer, inner)
    };

    let reached_outer = Rc::new(RefCell::new(false));
    {
        let mut d = doc.borrow_mut();
        d.add_event_listener(
            inner,
            ListenerEntry {
                name: "input".into(),
                callback: Rc::new(|event: &DomEvent| event.stop_propagation()),
                options: ListenerOptions::default(),
            },
        );
        let reached_outer = reached_outer.clone();
        d.add_event_listener(
            outer,
            ListenerEntry {
                name: "input".into(),
                callback: Rc::new(move |_| *reached_outer.borrow_mut() = true),
                options: ListenerOptions::default(),
            },
        );
    }

    dispatch_event(&doc, inner, &DomEvent::new("input", Rc::new(())));
    assert!(!*reached_outer.borrow());
}

#[test]
fn clone_subtree_copies_structure_not_listeners() {
    let mut doc = Document::new();
    let div = doc.create_element("div", Namespace::Html);
    doc.set_attribute(div, "id", "original");
    let text = doc.create_text("content");
    doc.append(div, text);
    doc.add_event_listener(
        div,
        ListenerEntry {
            name: "click".into(),
            callback: Rc::new(|_| {}),
            options: ListenerOptions::default(),
        },
    );

    let copy = doc.clone_subtree(div);
    assert_eq!(outer_html(&doc, copy), "<div id=\"original\">content</div>");
    assert!(doc.listeners(copy, "click").is_empty());
    assert_eq!(doc.listeners(div, "click").len(), 1);
}

#[test]
fn properties_are_invisible_to_serialization() {
    use weft_dom::PropertyValue;
    let mut doc = Document::new();
    let input = doc.create_element("input", Namespace::Html);
    doc.set_property(input, "value", PropertyValue::Str("draft".into()));
    assert_eq!(outer_html(&doc, input), "<input>");
    assert_eq!(
        doc.property(input, "value"),
        Some(&PropertyValue::Str("draft".into()))
    );
}
