use crate::document::{Document, ListenerEntry, NodeType};
use indextree::NodeId;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type ListenerCallback = Rc<dyn Fn(&DomEvent)>;

/// An event flowing through the tree.
///
/// The payload is opaque to the DOM; callers downcast `data` to whatever
/// event type they dispatched. The `bubbles` cell doubles as the
/// stop-propagation flag: listeners flip it to halt the walk.
#[derive(Clone)]
pub struct DomEvent {
    pub name: String,
    pub data: Rc<dyn Any>,
    bubbles: Rc<Cell<bool>>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, data: Rc<dyn Any>) -> Self {
        Self {
            name: name.into(),
            data,
            bubbles: Rc::new(Cell::new(true)),
        }
    }

    pub fn new_non_bubbling(name: impl Into<String>, data: Rc<dyn Any>) -> Self {
        Self {
            name: name.into(),
            data,
            bubbles: Rc::new(Cell::new(false)),
        }
    }

    pub fn stop_propagation(&self) {
        self.bubbles.set(false);
    }

    pub fn propagates(&self) -> bool {
        self.bubbles.get()
    }
}

/// Dispatch an event at `target`: capture phase down the ancestor chain,
/// the target itself, then bubbling back up while the event still
/// propagates.
///
/// Listener callbacks run with no borrow of the document held, so they are
/// free to schedule work or mutate the tree.
pub fn dispatch_event(document: &Rc<RefCell<Document>>, target: NodeId, event: &DomEvent) {
    let path = {
        let doc = document.borrow();
        if doc.node_type(target) != NodeType::Element {
            tracing::warn!("event {:?} dispatched at a non-element node", event.name);
            return;
        }
        doc.ancestors(target)
    };

    // Capture: root towards target, capture listeners only.
    for node in path.iter().rev() {
        if *node == target {
            break;
        }
        run_listeners(document, *node, event, |entry| entry.options.capture);
        if !event.propagates() {
            return;
        }
    }

    // Target phase: every listener for the event name fires.
    run_listeners(document, target, event, |_| true);
    if !event.propagates() {
        return;
    }

    // Bubble: target towards root, non-capture listeners.
    for node in path.iter().skip(1) {
        run_listeners(document, *node, event, |entry| !entry.options.capture);
        if !event.propagates() {
            return;
        }
    }
}

fn run_listeners(
    document: &Rc<RefCell<Document>>,
    node: NodeId,
    event: &DomEvent,
    filter: impl Fn(&ListenerEntry) -> bool,
) {
    // Snapshot under a short borrow; `once` listeners unregister before the
    // callbacks run so a re-entrant dispatch cannot fire them twice.
    let matching: Vec<ListenerEntry> = {
        let doc = document.borrow();
        doc.listeners(node, &event.name)
            .into_iter()
            .filter(|entry| filter(entry))
            .collect()
    };
    for entry in matching.iter().filter(|entry| entry.options.once) {
        document.borrow_mut().remove_event_listener(
            node,
            &event.name,
            &entry.callback,
            entry.options.capture,
        );
    }
    for entry in matching {
        (entry.callback)(event);
        if !event.propagates() {
            return;
        }
    }
}
