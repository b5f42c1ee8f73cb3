use crate::binding::{Binding, BindingRef};
use crate::directive::{directive_error, Directive};
use crate::error::RenderError;
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::scheduler::{CommitPhase, Effect};
use crate::value::{EventHandler, Value};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use weft_dom::{DomEvent, ListenerEntry, ListenerOptions};

/// Event listener registration. The binding itself is the dispatcher: one
/// stable closure is registered with the tree, and swapping the user's
/// handler only re-registers when the listener options change.
pub struct EventDirective;

impl Directive for EventDirective {
    fn name(&self) -> &'static str {
        "event"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match &part {
            Part::Event { .. } => match value {
                Value::Handler(_) | Value::Null => {
                    Ok(Rc::new(RefCell::new(EventBinding::new(value, part))))
                }
                other => Err(directive_error(other.type_name(), &part)),
            },
            other => Err(directive_error(self.name(), other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct EventBinding {
    part: Part,
    value: Value,
    /// The handler the dispatcher currently forwards to.
    current: Rc<RefCell<Option<EventHandler>>>,
    dispatcher: Rc<dyn Fn(&DomEvent)>,
    /// Options the dispatcher is registered with, if it is registered.
    registered: Option<ListenerOptions>,
    connected: bool,
    committed: bool,
    dirty: bool,
    enqueued: bool,
}

impl EventBinding {
    fn new(value: Value, part: Part) -> Self {
        let current: Rc<RefCell<Option<EventHandler>>> = Rc::new(RefCell::new(None));
        let dispatcher = {
            let current = current.clone();
            Rc::new(move |event: &DomEvent| {
                let handler = current.borrow().clone();
                if let Some(handler) = handler {
                    (handler.callback)(event);
                }
            }) as Rc<dyn Fn(&DomEvent)>
        };
        Self {
            part,
            value,
            current,
            dispatcher,
            registered: None,
            connected: false,
            committed: false,
            dirty: true,
            enqueued: false,
        }
    }

    fn desired(&self) -> Option<EventHandler> {
        match &self.value {
            Value::Handler(handler) => Some(handler.clone()),
            _ => None,
        }
    }

    fn target(&self) -> (weft_dom::NodeId, Rc<str>) {
        match &self.part {
            Part::Event { node, name } => (*node, name.clone()),
            other => unreachable!("event binding on {other:?}"),
        }
    }
}

impl Binding for EventBinding {
    fn directive_name(&self) -> &'static str {
        "event"
    }

    fn part(&self) -> &Part {
        &self.part
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_committed(&self) -> bool {
        self.committed
    }

    fn bind(&mut self, new: Value) {
        self.value = new;
        self.dirty = true;
    }

    fn connect(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        if !self.enqueued {
            self.enqueued = true;
            cx.enqueue(CommitPhase::Mutation, Effect::Commit(this.clone()));
        }
        Ok(())
    }

    fn disconnect(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) {
        if self.connected {
            self.connected = false;
            cx.enqueue(CommitPhase::Mutation, Effect::Rollback(this.clone()));
        }
    }

    fn commit(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        self.enqueued = false;
        if self.committed && !self.dirty {
            return Ok(());
        }
        let (node, name) = self.target();
        let desired = self.desired();
        let desired_options = desired.as_ref().map(|handler| handler.options);
        if self.registered != desired_options {
            let document = cx.document();
            let mut doc = document.borrow_mut();
            if let Some(old) = self.registered.take() {
                doc.remove_event_listener(node, &name, &self.dispatcher, old.capture);
            }
            if let Some(options) = desired_options {
                doc.add_event_listener(
                    node,
                    ListenerEntry {
                        name: name.to_string(),
                        callback: self.dispatcher.clone(),
                        options,
                    },
                );
            }
            self.registered = desired_options;
        }
        *self.current.borrow_mut() = desired;
        self.committed = true;
        self.dirty = false;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        let (node, name) = self.target();
        if let Some(options) = self.registered.take() {
            let document = cx.document();
            document
                .borrow_mut()
                .remove_event_listener(node, &name, &self.dispatcher, options.capture);
        }
        *self.current.borrow_mut() = None;
        self.committed = false;
        self.dirty = true;
        Ok(())
    }

    fn hydrate(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        // Listeners are not part of serialized markup; registration still
        // happens through a normal commit.
        self.connect(this, cx)
    }
}
