use crate::binding::{Binding, BindingRef};
use crate::directive::{directive_error, Directive};
use crate::error::RenderError;
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::slot::Slot;
use crate::value::Value;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use weft_dom::PropertyValue;

/// The whole-element spread: the bound value is a mapping of
/// `"foo" | ".foo" | "@foo" | "$foo"` keys to micro-bindings. Removing a
/// key rolls its micro-binding back.
pub struct ElementDirective;

impl Directive for ElementDirective {
    fn name(&self) -> &'static str {
        "element"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match &part {
            Part::Element { .. } => match value {
                Value::Properties(_) | Value::Null => {
                    Ok(Rc::new(RefCell::new(ElementBinding::new(value, part))))
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

pub struct ElementBinding {
    part: Part,
    value: Value,
    micro: Vec<(String, Slot)>,
    connected: bool,
    committed: bool,
}

impl ElementBinding {
    fn new(value: Value, part: Part) -> Self {
        Self {
            part,
            value,
            micro: Vec::new(),
            connected: false,
            committed: false,
        }
    }

    fn sub_part(&self, key: &str) -> Part {
        let node = self.part.node();
        if let Some(name) = key.strip_prefix('@') {
            return Part::Event {
                node,
                name: Rc::from(name),
            };
        }
        if let Some(name) = key.strip_prefix('.') {
            return Part::Property {
                node,
                name: Rc::from(name),
                default: PropertyValue::Null,
            };
        }
        if let Some(name) = key.strip_prefix('$') {
            return Part::Live {
                node,
                name: Rc::from(name),
                default: PropertyValue::Null,
            };
        }
        Part::Attribute {
            node,
            name: Rc::from(key),
        }
    }

    fn entries(&self) -> Result<Rc<Vec<(String, Value)>>, RenderError> {
        match &self.value {
            Value::Properties(entries) => Ok(entries.clone()),
            Value::Null => Ok(Rc::new(Vec::new())),
            other => Err(directive_error(other.type_name(), &self.part)),
        }
    }
}

impl Binding for ElementBinding {
    fn directive_name(&self) -> &'static str {
        "element"
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
    }

    fn connect(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        let entries = self.entries()?;

        // Keys gone from the mapping roll back their micro-bindings.
        let mut kept = Vec::with_capacity(entries.len());
        for (key, mut slot) in self.micro.drain(..) {
            if entries.iter().any(|(name, _)| *name == key) {
                kept.push((key, slot));
            } else {
                slot.disconnect(cx);
            }
        }
        self.micro = kept;

        for (key, value) in entries.iter() {
            match self.micro.iter_mut().find(|(name, _)| name == key) {
                Some((_, slot)) => {
                    slot.reconcile(value.clone(), cx)?;
                }
                None => {
                    let part = self.sub_part(key);
                    let mut slot = Slot::resolve(value.clone(), part, cx)?;
                    slot.connect(cx)?;
                    self.micro.push((key.clone(), slot));
                }
            }
        }
        self.committed = true;
        Ok(())
    }

    fn disconnect(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) {
        if self.connected {
            self.connected = false;
            for (_, slot) in self.micro.iter_mut() {
                slot.disconnect(cx);
            }
            self.committed = false;
        }
    }

    fn commit(&mut self, _cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        // Micro-bindings commit through their own enqueued effects.
        Ok(())
    }

    fn rollback(&mut self, _cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    fn hydrate(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        let entries = self.entries()?;
        for (key, value) in entries.iter() {
            let part = self.sub_part(key);
            let mut slot = Slot::resolve(value.clone(), part, cx)?;
            slot.hydrate(cx)?;
            self.micro.push((key.clone(), slot));
        }
        self.committed = true;
        Ok(())
    }
}
