//! Keyed children driven through the full runtime.

use weft_core::prelude::*;
use weft_dom::{inner_html, NodeType};

fn item(label: &str) -> Value {
    html(&["<li>", "</li>"], vec![label.into()])
}

fn list_of(labels: &[&str]) -> Value {
    html(
        &["<ul><!--", "--></ul>"],
        vec![keyed(labels.iter().map(|label| (*label, item(label))))],
    )
}

fn find_ul(runtime: &Runtime, container: NodeId) -> NodeId {
    let doc = runtime.document();
    let doc = doc.borrow();
    doc.children(container)
        .into_iter()
        .find(|node| doc.tag_name(*node) == Some("ul"))
        .expect("list renders a <ul>")
}

fn li_nodes(runtime: &Runtime, ul: NodeId) -> Vec<(String, NodeId)> {
    let doc = runtime.document();
    let doc = doc.borrow();
    doc.children(ul)
        .into_iter()
        .filter(|node| doc.node_type(*node) == NodeType::Element)
        .map(|node| {
            let label = doc
                .first_child(node)
                .and_then(|text| doc.text(text).map(str::to_owned))
                .unwrap_or_default();
            (label, node)
        })
        .collect()
}

#[test]
fn initial_render_keeps_source_order() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    runtime.mount(list_of(&["a", "b", "c"]), container).unwrap();

    let ul = find_ul(&runtime, container);
    let labels: Vec<String> = li_nodes(&runtime, ul).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, ["a", "b", "c"]);
}

#[test]
fn rotate_reuses_every_node() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let mut root = runtime.mount(list_of(&["a", "b", "c", "d"]), container).unwrap();

    let ul = find_ul(&runtime, container);
    let before = li_nodes(&runtime, ul);

    runtime.update(&mut root, list_of(&["d", "a", "b", "c"])).unwrap();
    let after = li_nodes(&runtime, ul);

    let labels: Vec<&str> = after.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, ["d", "a", "b", "c"]);

    // No node is re-created: every <li> keeps its identity.
    for (label, node) in &after {
        let original = before
            .iter()
            .find(|(old_label, _)| old_label == label)
            .map(|(_, old_node)| *old_node)
            .expect("label existed before");
        assert_eq!(*node, original, "node for {label} was re-created");
    }
}

#[test]
fn removal_and_insertion() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let mut root = runtime.mount(list_of(&["a", "b", "c"]), container).unwrap();
    let ul = find_ul(&runtime, container);

    runtime.update(&mut root, list_of(&["a", "x", "c"])).unwrap();
    let labels: Vec<String> = li_nodes(&runtime, ul).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, ["a", "x", "c"]);

    runtime.update(&mut root, list_of(&[])).unwrap();
    assert!(li_nodes(&runtime, ul).is_empty());

    runtime.update(&mut root, list_of(&["z"])).unwrap();
    let labels: Vec<String> = li_nodes(&runtime, ul).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, ["z"]);
}

#[test]
fn value_updates_flow_into_kept_items() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let with_values = |pairs: &[(&str, &str)]| {
        html(
            &["<ul><!--", "--></ul>"],
            vec![keyed(pairs.iter().map(|(key, label)| (*key, item(label))))],
        )
    };

    let mut root = runtime
        .mount(with_values(&[("a", "one"), ("b", "two")]), container)
        .unwrap();
    let ul = find_ul(&runtime, container);

    runtime
        .update(&mut root, with_values(&[("a", "uno"), ("b", "two")]))
        .unwrap();
    let labels: Vec<String> = li_nodes(&runtime, ul).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, ["uno", "two"]);
}

// A reordered list converges with a fresh render of the same sequence.
#[test]
fn reorder_converges_with_fresh_render() {
    let mut stepped = Runtime::new();
    let container = stepped.create_container();
    let mut root = stepped.mount(list_of(&["a", "b", "c", "d"]), container).unwrap();
    stepped.update(&mut root, list_of(&["c", "d", "b", "a"])).unwrap();

    let mut fresh = Runtime::new();
    let fresh_container = fresh.create_container();
    fresh.mount(list_of(&["c", "d", "b", "a"]), fresh_container).unwrap();

    let stepped_html = {
        let doc = stepped.document();
        let doc = doc.borrow();
        inner_html(&doc, container)
    };
    let fresh_html = {
        let doc = fresh.document();
        let doc = doc.borrow();
        inner_html(&doc, fresh_container)
    };
    assert_eq!(stepped_html, fresh_html);
}
