//! Adopting pre-rendered markup: render → serialize → parse → hydrate.

use std::rc::Rc;
use weft_core::prelude::*;
use weft_dom::{inner_html, parse_fragment_into, FragmentContext, Namespace, NodeType};

fn container_inner(runtime: &Runtime, container: NodeId) -> String {
    let doc = runtime.document();
    let doc = doc.borrow();
    inner_html(&doc, container)
}

/// Parse serialized markup into a fresh container inside `runtime`'s
/// document, standing in for a server-rendered page.
fn transplant(markup: &str, runtime: &Runtime) -> NodeId {
    let doc = runtime.document();
    let mut doc = doc.borrow_mut();
    let container = doc.create_element("div", Namespace::Html);
    let root = doc.root();
    doc.append(root, container);
    let fragment = parse_fragment_into(&mut doc, markup, FragmentContext::Body);
    doc.reparent_children(fragment, container);
    container
}

fn page(class: &str, text_value: &str, inner_text: &str) -> Value {
    html(
        &["<section class=\"", "\"><p>", "</p><!--", "--></section>"],
        vec![
            class.into(),
            text_value.into(),
            html(&["<em>", "</em>"], vec![inner_text.into()]),
        ],
    )
}

// Hydrating a DOM produced by render from the same template and binds
// raises no error and leaves the markup untouched.
#[test]
fn render_then_hydrate_round_trip() {
    let mut source = Runtime::new();
    let source_container = source.create_container();
    source.mount(page("blue", "hi", "deep"), source_container).unwrap();
    let markup = container_inner(&source, source_container);

    let mut target = Runtime::new();
    let target_container = transplant(&markup, &target);
    let mut root = target.hydrate(page("blue", "hi", "deep"), target_container).unwrap();
    assert_eq!(container_inner(&target, target_container), markup);

    // Updates flow through the adopted tree.
    target
        .update(&mut root, page("green", "yo", "deeper"))
        .unwrap();
    let after = container_inner(&target, target_container);
    assert!(after.contains("class=\"green\""), "{after}");
    assert!(after.contains("<p>yo</p>"), "{after}");
    assert!(after.contains("<em>deeper</em>"), "{after}");
}

#[test]
fn mismatched_markup_raises_hydration_error() {
    let mut target = Runtime::new();
    // The nested <em> is missing.
    let container = transplant("<section class=\"blue\"><p>hi</p><!----></section><!---->", &target);

    let err = target.hydrate(page("blue", "hi", "deep"), container).unwrap_err();
    assert!(matches!(err, RenderError::Hydration(_)), "{err}");
}

fn counter(_props: (), cx: &mut RenderContext<'_>) -> Result<Value, RenderError> {
    let (count, increment, _pending) = cx.use_reducer(|count: &i64, _action: ()| count + 1, || 0i64)?;
    let on_click = {
        let increment = increment.clone();
        EventHandler::new(move |_| increment.dispatch(()))
    };
    Ok(html(
        &["<button @click=\"", "\">", "</button>"],
        vec![on_click.into(), Value::Int(count)],
    ))
}

// Components hydrate through the scope chain's walker boundary, and the
// adopted tree is live: listeners work and state updates commit.
#[test]
fn hydrated_component_is_interactive() {
    let mut source = Runtime::new();
    let source_container = source.create_container();
    source.mount(component(counter, ()), source_container).unwrap();
    let markup = container_inner(&source, source_container);

    let mut target = Runtime::new();
    let container = transplant(&markup, &target);
    target.hydrate(component(counter, ()), container).unwrap();
    assert_eq!(container_inner(&target, container), markup);

    let button = {
        let doc = target.document();
        let doc = doc.borrow();
        doc.children(container)
            .into_iter()
            .find(|node| doc.node_type(*node) == NodeType::Element)
            .expect("button was adopted")
    };
    target.handle_event(button, &DomEvent::new("click", Rc::new(())));
    target.poll_work().unwrap();

    let after = container_inner(&target, container);
    assert!(after.contains(">1<"), "{after}");
}

fn badge(_props: (), cx: &mut RenderContext<'_>) -> Result<Value, RenderError> {
    let _ = cx;
    Ok(html(&["<span>", "</span>"], vec!["inner".into()]))
}

fn shell(_props: (), cx: &mut RenderContext<'_>) -> Result<Value, RenderError> {
    let _ = cx;
    Ok(html(
        &["<div><!--", "--></div>"],
        vec![component(badge, ())],
    ))
}

// A component nested inside a hydrating template consumes its range before
// the surrounding walk reaches the marker.
#[test]
fn nested_components_hydrate_in_place() {
    let mut source = Runtime::new();
    let source_container = source.create_container();
    source.mount(component(shell, ()), source_container).unwrap();
    let markup = container_inner(&source, source_container);

    let mut target = Runtime::new();
    let container = transplant(&markup, &target);
    target.hydrate(component(shell, ()), container).unwrap();
    assert_eq!(container_inner(&target, container), markup);
}

fn pair(left: &str, right: &str) -> Value {
    html(&["<p>", "", "</p>"], vec![left.into(), right.into()])
}

// Two adjacent text holes share one text run with no separating literal.
// Serialization writes their nodes back to back and parsing re-merges
// them; hydration must split the merged node so each hole keeps its own.
#[test]
fn adjacent_text_holes_split_the_merged_node() {
    let mut source = Runtime::new();
    let source_container = source.create_container();
    source.mount(pair("left", "right"), source_container).unwrap();
    let markup = container_inner(&source, source_container);
    assert!(markup.contains("<p>leftright</p>"), "{markup}");

    let mut target = Runtime::new();
    let container = transplant(&markup, &target);
    let mut root = target.hydrate(pair("left", "right"), container).unwrap();
    assert_eq!(container_inner(&target, container), markup);

    // Each hole owns a dedicated node: updating one leaves the other's
    // text in place.
    target.update(&mut root, pair("L2", "right")).unwrap();
    let after = container_inner(&target, container);
    assert!(after.contains("<p>L2right</p>"), "{after}");

    target.update(&mut root, pair("L2", "R2")).unwrap();
    let after = container_inner(&target, container);
    assert!(after.contains("<p>L2R2</p>"), "{after}");
}
