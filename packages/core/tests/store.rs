//! External stores and deferred values.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use weft_core::prelude::*;
use weft_dom::{inner_html, NodeType};

fn first_element(runtime: &Runtime, container: NodeId) -> NodeId {
    let doc = runtime.document();
    let doc = doc.borrow();
    doc.children(container)
        .into_iter()
        .find(|node| doc.node_type(*node) == NodeType::Element)
        .expect("container holds an element")
}

fn element_text(runtime: &Runtime, node: NodeId) -> String {
    let doc = runtime.document();
    let doc = doc.borrow();
    inner_html(&doc, node)
}

struct Store {
    value: Cell<i64>,
    subscribers: RefCell<Vec<Rc<dyn Fn()>>>,
}

impl Store {
    fn new(value: i64) -> Rc<Self> {
        Rc::new(Self {
            value: Cell::new(value),
            subscribers: RefCell::new(Vec::new()),
        })
    }

    fn set(&self, value: i64) {
        self.value.set(value);
        for subscriber in self.subscribers.borrow().iter() {
            subscriber();
        }
    }
}

#[derive(Clone)]
struct StoreProps(Rc<Store>);

impl PartialEq for StoreProps {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

fn store_view(props: StoreProps, cx: &mut RenderContext<'_>) -> Result<Value, RenderError> {
    let store = props.0;
    let subscribe = {
        let store = store.clone();
        move |notify: Rc<dyn Fn()>| {
            store.subscribers.borrow_mut().push(notify);
            Box::new(|| {}) as Box<dyn FnOnce()>
        }
    };
    let get_snapshot = {
        let store = store.clone();
        move || store.value.get()
    };
    let value = cx.use_sync_external_store(subscribe, get_snapshot)?;
    Ok(html(&["<b>", "</b>"], vec![Value::Int(value)]))
}

// After the subscribe callback fires, the next render sees the snapshot at
// fire time.
#[test]
fn external_store_changes_reach_the_next_render() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let store = Store::new(0);

    runtime
        .mount(component(store_view, StoreProps(store.clone())), container)
        .unwrap();
    let b = first_element(&runtime, container);
    assert_eq!(element_text(&runtime, b), "0");
    assert_eq!(store.subscribers.borrow().len(), 1);

    store.set(7);
    runtime.poll_work().unwrap();
    assert_eq!(element_text(&runtime, b), "7");

    store.set(9);
    store.set(11);
    runtime.poll_work().unwrap();
    assert_eq!(element_text(&runtime, b), "11");
}

#[derive(Clone, PartialEq)]
struct DeferProps(i64);

fn deferred_view(props: DeferProps, cx: &mut RenderContext<'_>) -> Result<Value, RenderError> {
    let shown = cx.use_deferred_value(Value::Int(props.0), None)?;
    Ok(html(&["<i>", "</i>"], vec![shown]))
}

// A changed value first re-renders with the prior value, then a background
// pass adopts the new one.
#[test]
fn deferred_values_lag_one_background_pass() {
    let mut runtime = Runtime::new();
    let container = runtime.create_container();
    let mut root = runtime
        .mount(component(deferred_view, DeferProps(1)), container)
        .unwrap();
    let i = first_element(&runtime, container);
    assert_eq!(element_text(&runtime, i), "1");

    runtime
        .update(&mut root, component(deferred_view, DeferProps(2)))
        .unwrap();
    // The urgent render still shows the previous value.
    assert_eq!(element_text(&runtime, i), "1");

    // The scheduled background pass catches up.
    runtime.poll_work().unwrap();
    assert_eq!(element_text(&runtime, i), "2");
}
