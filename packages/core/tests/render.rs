//! End-to-end rendering through the runtime: templates in, committed DOM
//! out.

use weft_core::prelude::*;
use weft_dom::{inner_html, outer_html, NodeType, PropertyValue};

fn first_element(runtime: &Runtime, container: NodeId) -> NodeId {
    let doc = runtime.document();
    let doc = doc.borrow();
    doc.children(container)
        .into_iter()
        .find(|node| doc.node_type(*node) == NodeType::Element)
        .expect("container holds an element")
}

fn element_html(runtime: &Runtime, node: NodeId) -> String {
    let doc = runtime.document();
    let doc = doc.borrow();
    outer_html(&doc, node)
}

fn container_html(runtime: &Runtime, container: NodeId) -> String {
    let doc = runtime.document();
    let doc = doc.borrow();
    inner_html(&doc, container)
}

fn class_template(value: Value) -> Value {
    html(&["<div class=\"", "\"></div>"], vec![value])
}

#[test]
fn attribute_toggle() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let mut root = runtime.mount(class_template("a".into()), container).unwrap();
    let div = first_element(&runtime, container);

    assert_eq!(element_html(&runtime, div), "<div class=\"a\"></div>");

    runtime.update(&mut root, class_template("b".into())).unwrap();
    assert_eq!(element_html(&runtime, div), "<div class=\"b\"></div>");

    runtime.update(&mut root, class_template(Value::Null)).unwrap();
    assert_eq!(element_html(&runtime, div), "<div></div>");

    runtime.update(&mut root, class_template("c".into())).unwrap();
    assert_eq!(element_html(&runtime, div), "<div class=\"c\"></div>");
}

#[test]
fn boolean_attributes_toggle_presence() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = |on: bool| html(&["<input disabled=\"", "\">"], vec![Value::Bool(on)]);

    let mut root = runtime.mount(template(true), container).unwrap();
    let input = first_element(&runtime, container);
    assert_eq!(element_html(&runtime, input), "<input disabled=\"\">");

    runtime.update(&mut root, template(false)).unwrap();
    assert_eq!(element_html(&runtime, input), "<input>");
}

#[test]
fn text_holes_keep_surrounding_slices() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = |n: i64| html(&["<p>count: ", " items</p>"], vec![Value::Int(n)]);

    let mut root = runtime.mount(template(3), container).unwrap();
    let p = first_element(&runtime, container);
    assert_eq!(element_html(&runtime, p), "<p>count: 3 items</p>");

    runtime.update(&mut root, template(4)).unwrap();
    assert_eq!(element_html(&runtime, p), "<p>count: 4 items</p>");
}

#[test]
fn property_holes_do_not_touch_attributes() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = html(&["<input .title=\"", "\">"], vec!["tip".into()]);
    runtime.mount(template, container).unwrap();

    let input = first_element(&runtime, container);
    assert_eq!(element_html(&runtime, input), "<input>");
    let doc = runtime.document();
    let doc = doc.borrow();
    assert_eq!(
        doc.property(input, "title"),
        Some(&PropertyValue::Str("tip".into()))
    );
}

#[test]
fn live_holes_read_before_writing() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = |v: &str| html(&["<input $value=\"", "\">"], vec![v.into()]);

    let mut root = runtime.mount(template("draft"), container).unwrap();
    let input = first_element(&runtime, container);
    {
        let doc = runtime.document();
        let doc = doc.borrow();
        assert_eq!(doc.property(input, "value"), Some(&PropertyValue::Str("draft".into())));
    }

    // The user typed; the live reading is now authoritative.
    {
        let doc = runtime.document();
        doc.borrow_mut()
            .set_property(input, "value", PropertyValue::Str("typed".into()));
    }
    runtime.update(&mut root, template("draft")).unwrap();
    let doc = runtime.document();
    let doc = doc.borrow();
    assert_eq!(doc.property(input, "value"), Some(&PropertyValue::Str("draft".into())));
}

#[test]
fn element_spread_applies_and_removes_microbindings() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let spread = |entries: Vec<(&str, Value)>| {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<Vec<_>>();
        html(
            &["<div ", "></div>"],
            vec![Value::Properties(std::rc::Rc::new(entries))],
        )
    };

    let mut root = runtime
        .mount(
            spread(vec![("id", "box".into()), ("data-kind", "demo".into())]),
            container,
        )
        .unwrap();
    let div = first_element(&runtime, container);
    assert_eq!(
        element_html(&runtime, div),
        "<div id=\"box\" data-kind=\"demo\"></div>"
    );

    // Dropping a key rolls its micro-binding back.
    runtime
        .update(&mut root, spread(vec![("id", "box".into())]))
        .unwrap();
    assert_eq!(element_html(&runtime, div), "<div id=\"box\"></div>");
}

#[test]
fn nested_templates_render_through_comment_holes() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let inner = html(&["<em>", "</em>"], vec!["deep".into()]);
    let outer = html(&["<section><!--", "--></section>"], vec![inner]);

    runtime.mount(outer, container).unwrap();
    let section = first_element(&runtime, container);
    assert_eq!(
        element_html(&runtime, section),
        "<section><em>deep</em><!----></section>"
    );
}

#[test]
fn null_content_renders_nothing_and_swaps_back() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = |value: Value| html(&["<div><!--", "--></div>"], vec![value]);

    let mut root = runtime.mount(template(Value::Null), container).unwrap();
    let div = first_element(&runtime, container);
    assert_eq!(element_html(&runtime, div), "<div><!----></div>");

    // null -> text swaps the binding through the flexible slot
    runtime.update(&mut root, template("shown".into())).unwrap();
    assert_eq!(element_html(&runtime, div), "<div>shown<!----></div>");

    runtime.update(&mut root, template(Value::Null)).unwrap();
    assert_eq!(element_html(&runtime, div), "<div><!----></div>");
}

#[test]
fn svg_templates_build_foreign_content() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = svg(&["<circle r=\"", "\"></circle>"], vec!["7".into()]);
    runtime.mount(template, container).unwrap();

    let circle = first_element(&runtime, container);
    let doc = runtime.document();
    let doc = doc.borrow();
    assert_eq!(doc.namespace(circle), Some(weft_dom::Namespace::Svg));
    assert_eq!(doc.attribute(circle, "r"), Some("7"));
}

#[test]
fn textarea_templates_treat_markup_as_text() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = text(&["<not-a-tag> ", ""], vec!["content".into()]);
    runtime.mount(template, container).unwrap();

    assert_eq!(
        container_html(&runtime, container),
        "&lt;not-a-tag&gt; content<!---->"
    );
}

// Commit convergence: an update sequence ends in the same DOM as a fresh
// render of the final value.
#[test]
fn update_sequence_converges_with_fresh_render() {
    let values = ["a", "b", "c"];

    let mut stepped = Runtime::new();
    let container = stepped.create_container();
    let mut root = stepped.mount(class_template(values[0].into()), container).unwrap();
    for value in &values[1..] {
        stepped.update(&mut root, class_template((*value).into())).unwrap();
    }

    let mut fresh = Runtime::new();
    let fresh_container = fresh.create_container();
    fresh
        .mount(class_template(values[values.len() - 1].into()), fresh_container)
        .unwrap();

    assert_eq!(
        container_html(&stepped, container),
        container_html(&fresh, fresh_container)
    );
}

// Reversibility: unmounting rolls the tree back to its pre-mount state.
#[test]
fn unmount_restores_the_container() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    assert_eq!(container_html(&runtime, container), "");

    let value = html(
        &["<article class=\"", "\"><p>", "</p></article>"],
        vec!["post".into(), "body".into()],
    );
    let mut root = runtime.mount(value, container).unwrap();
    assert_ne!(container_html(&runtime, container), "");

    runtime.unmount(&mut root).unwrap();
    assert_eq!(container_html(&runtime, container), "");
}

#[test]
fn structured_values_in_text_holes_are_rejected() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let inner = html(&["<em></em>"], vec![]);
    let bad = html(&["<p>", "</p>"], vec![inner]);

    let err = runtime.mount(bad, container).unwrap_err();
    assert!(matches!(err, RenderError::Directive(_)), "{err}");
}
