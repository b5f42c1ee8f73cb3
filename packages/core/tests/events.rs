//! Event parts: the binding is the listener dispatcher.

use std::cell::RefCell;
use std::rc::Rc;
use weft_core::prelude::*;
use weft_dom::NodeType;

fn first_element(runtime: &Runtime, container: NodeId) -> NodeId {
    let doc = runtime.document();
    let doc = doc.borrow();
    doc.children(container)
        .into_iter()
        .find(|node| doc.node_type(*node) == NodeType::Element)
        .expect("container holds an element")
}

fn click(runtime: &Runtime, target: NodeId) {
    runtime.handle_event(target, &DomEvent::new("click", Rc::new(())));
}

#[test]
fn listener_replacement_rebinds_without_leaking_calls() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let calls: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let handler = |tag: &'static str, calls: &Rc<RefCell<Vec<&'static str>>>| {
        let calls = calls.clone();
        EventHandler::new(move |_| calls.borrow_mut().push(tag))
    };
    let template = |h: EventHandler| html(&["<button @click=\"", "\"></button>"], vec![h.into()]);

    let f1 = handler("f1", &calls);
    let f2 = handler("f2", &calls);

    let mut root = runtime.mount(template(f1), container).unwrap();
    let button = first_element(&runtime, container);

    click(&runtime, button);
    assert_eq!(*calls.borrow(), ["f1"]);

    runtime.update(&mut root, template(f2)).unwrap();
    click(&runtime, button);
    assert_eq!(*calls.borrow(), ["f1", "f2"]);
}

#[test]
fn rebinding_the_same_listener_is_clean() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let count = Rc::new(RefCell::new(0));
    let handler = {
        let count = count.clone();
        EventHandler::new(move |_| *count.borrow_mut() += 1)
    };
    let template = |h: EventHandler| html(&["<button @click=\"", "\"></button>"], vec![h.into()]);

    let mut root = runtime.mount(template(handler.clone()), container).unwrap();
    let button = first_element(&runtime, container);
    runtime.update(&mut root, template(handler)).unwrap();

    // One registration, one call.
    {
        let doc = runtime.document();
        let doc = doc.borrow();
        assert_eq!(doc.listeners(button, "click").len(), 1);
    }
    click(&runtime, button);
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn option_changes_reregister_the_dispatcher() {
    use weft_dom::ListenerOptions;

    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let template = |h: EventHandler| html(&["<div @input=\"", "\"></div>"], vec![h.into()]);

    let plain = EventHandler::new(|_| {});
    let capturing = EventHandler::with_options(
        |_| {},
        ListenerOptions {
            capture: true,
            ..Default::default()
        },
    );

    let mut root = runtime.mount(template(plain), container).unwrap();
    let div = first_element(&runtime, container);
    {
        let doc = runtime.document();
        let doc = doc.borrow();
        assert!(!doc.listeners(div, "input")[0].options.capture);
    }

    runtime.update(&mut root, template(capturing)).unwrap();
    let doc = runtime.document();
    let doc = doc.borrow();
    let listeners = doc.listeners(div, "input");
    assert_eq!(listeners.len(), 1);
    assert!(listeners[0].options.capture);
}

#[test]
fn null_listener_unregisters() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let count = Rc::new(RefCell::new(0));
    let handler = {
        let count = count.clone();
        EventHandler::new(move |_| *count.borrow_mut() += 1)
    };
    let template = |v: Value| html(&["<button @click=\"", "\"></button>"], vec![v]);

    let mut root = runtime.mount(template(handler.into()), container).unwrap();
    let button = first_element(&runtime, container);
    click(&runtime, button);

    runtime.update(&mut root, template(Value::Null)).unwrap();
    click(&runtime, button);
    assert_eq!(*count.borrow(), 1);
    let doc = runtime.document();
    let doc = doc.borrow();
    assert!(doc.listeners(button, "click").is_empty());
}
