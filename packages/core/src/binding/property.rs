use crate::binding::{Binding, BindingRef};
use crate::directive::{directive_error, Directive};
use crate::error::RenderError;
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::scheduler::{CommitPhase, Effect};
use crate::value::Value;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use weft_dom::PropertyValue;

/// HTML attribute assignment: `null` removes, booleans toggle, anything
/// else stringifies.
pub struct AttributeDirective;

impl Directive for AttributeDirective {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match part {
            Part::Attribute { .. } => Ok(Rc::new(RefCell::new(AttributeBinding::new(value, part)))),
            other => Err(directive_error(self.name(), &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct AttributeBinding {
    part: Part,
    value: Value,
    /// Attribute value observed before the first commit; what rollback
    /// restores. `None` means no commit has snapshotted yet.
    saved: Option<Option<String>>,
    connected: bool,
    committed: bool,
    dirty: bool,
    enqueued: bool,
}

impl AttributeBinding {
    fn new(value: Value, part: Part) -> Self {
        Self {
            part,
            value,
            saved: None,
            connected: false,
            committed: false,
            dirty: true,
            enqueued: false,
        }
    }
}

impl Binding for AttributeBinding {
    fn directive_name(&self) -> &'static str {
        "attribute"
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
        let (node, name) = match &self.part {
            Part::Attribute { node, name } => (*node, name.clone()),
            other => return Err(directive_error("attribute", other)),
        };
        let document = cx.document();
        let mut doc = document.borrow_mut();
        if self.saved.is_none() {
            self.saved = Some(doc.attribute(node, &name).map(str::to_owned));
        }
        match &self.value {
            Value::Null | Value::Bool(false) => doc.remove_attribute(node, &name),
            Value::Bool(true) => doc.set_attribute(node, &name, ""),
            other => doc.set_attribute(node, &name, &other.to_display_string()),
        }
        self.committed = true;
        self.dirty = false;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        let (node, name) = match &self.part {
            Part::Attribute { node, name } => (*node, name.clone()),
            other => return Err(directive_error("attribute", other)),
        };
        let document = cx.document();
        let mut doc = document.borrow_mut();
        match self.saved.take().flatten() {
            Some(previous) => doc.set_attribute(node, &name, &previous),
            None => doc.remove_attribute(node, &name),
        }
        self.committed = false;
        self.dirty = true;
        Ok(())
    }

    fn hydrate(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        if let Part::Attribute { node, name } = &self.part {
            let document = cx.document();
            let doc = document.borrow();
            self.saved = Some(doc.attribute(*node, name).map(str::to_owned));
        }
        self.connected = true;
        self.committed = true;
        self.dirty = false;
        Ok(())
    }
}

/// Direct property assignment.
pub struct PropertyDirective;

impl Directive for PropertyDirective {
    fn name(&self) -> &'static str {
        "property"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match part {
            Part::Property { .. } => {
                Ok(Rc::new(RefCell::new(PropertyBinding::new(value, part, false))))
            }
            other => Err(directive_error(self.name(), &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Property assignment where the current reading is authoritative: the
/// binding compares against the live value and skips redundant writes.
pub struct LiveDirective;

impl Directive for LiveDirective {
    fn name(&self) -> &'static str {
        "live"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match part {
            Part::Live { .. } => Ok(Rc::new(RefCell::new(PropertyBinding::new(value, part, true)))),
            other => Err(directive_error(self.name(), &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct PropertyBinding {
    part: Part,
    value: Value,
    live: bool,
    connected: bool,
    committed: bool,
    dirty: bool,
    enqueued: bool,
}

impl PropertyBinding {
    fn new(value: Value, part: Part, live: bool) -> Self {
        Self {
            part,
            value,
            live,
            connected: false,
            committed: false,
            dirty: true,
            enqueued: false,
        }
    }

    fn target(&self) -> (weft_dom::NodeId, Rc<str>, PropertyValue) {
        match &self.part {
            Part::Property { node, name, default } | Part::Live { node, name, default } => {
                (*node, name.clone(), default.clone())
            }
            other => unreachable!("property binding on {other:?}"),
        }
    }
}

impl Binding for PropertyBinding {
    fn directive_name(&self) -> &'static str {
        if self.live {
            "live"
        } else {
            "property"
        }
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

    fn should_bind(&self, new: &Value, cx: &UpdateContext<'_>) -> bool {
        if self.live {
            // The live reading wins over whatever was written last.
            let (node, name, default) = self.target();
            let document = cx.document();
            let doc = document.borrow();
            let current = doc.property(node, &name).cloned().unwrap_or(default);
            return current != new.to_property_value();
        }
        !Value::same(&self.value, new)
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
        let (node, name, default) = self.target();
        let target = self.value.to_property_value();
        let document = cx.document();
        let mut doc = document.borrow_mut();
        if self.live {
            // Read before write; skip the assignment when the live value
            // already matches.
            let current = doc.property(node, &name).cloned().unwrap_or(default);
            if current != target {
                doc.set_property(node, &name, target);
            }
        } else {
            doc.set_property(node, &name, target);
        }
        self.committed = true;
        self.dirty = false;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        let (node, name, default) = self.target();
        let document = cx.document();
        document.borrow_mut().set_property(node, &name, default);
        self.committed = false;
        self.dirty = true;
        Ok(())
    }

    fn hydrate(&mut self, _this: &BindingRef, _cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        self.committed = true;
        self.dirty = false;
        Ok(())
    }
}
