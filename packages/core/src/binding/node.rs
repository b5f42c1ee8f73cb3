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
use weft_dom::{NodeId, NodeType};

/// Text-slice primitive for text parts: the node's content becomes
/// `preceding ++ value ++ following`.
pub struct TextDirective;

impl Directive for TextDirective {
    fn name(&self) -> &'static str {
        "text"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match part {
            Part::Text { .. } => Ok(Rc::new(RefCell::new(TextBinding::new(value, part)))),
            other => Err(directive_error(self.name(), &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct TextBinding {
    part: Part,
    value: Value,
    connected: bool,
    committed: bool,
    dirty: bool,
    enqueued: bool,
}

impl TextBinding {
    fn new(value: Value, part: Part) -> Self {
        Self {
            part,
            value,
            connected: false,
            committed: false,
            dirty: true,
            enqueued: false,
        }
    }
}

impl Binding for TextBinding {
    fn directive_name(&self) -> &'static str {
        "text"
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
        let (node, preceding, following) = match &self.part {
            Part::Text {
                node,
                preceding,
                following,
            } => (*node, preceding.clone(), following.clone()),
            other => return Err(directive_error("text", other)),
        };
        let content = format!("{preceding}{}{following}", self.value.to_display_string());
        let document = cx.document();
        document.borrow_mut().set_text(node, content);
        self.committed = true;
        self.dirty = false;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        let document = cx.document();
        document.borrow_mut().set_text(self.part.node(), "");
        self.committed = false;
        self.dirty = true;
        Ok(())
    }

    fn hydrate(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        let (node, preceding, following) = match &self.part {
            Part::Text {
                node,
                preceding,
                following,
            } => (*node, preceding.clone(), following.clone()),
            other => return Err(directive_error("text", other)),
        };
        // A node carved out of a merged run still carries the whole run's
        // text (or none of it); normalize it to this slice at commit.
        let expected = format!("{preceding}{}{following}", self.value.to_display_string());
        let matches = {
            let document = cx.document();
            let doc = document.borrow();
            doc.text(node).map(|text| text == expected).unwrap_or(false)
        };
        self.connected = true;
        self.committed = true;
        self.dirty = !matches;
        if self.dirty && !self.enqueued {
            self.enqueued = true;
            cx.enqueue(CommitPhase::Mutation, Effect::Commit(this.clone()));
        }
        Ok(())
    }
}

/// Scalar content inside a child-node range: the binding owns one text
/// node inserted before the part's comment marker.
pub struct NodeDirective;

impl Directive for NodeDirective {
    fn name(&self) -> &'static str {
        "node"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match part {
            Part::ChildNode { .. } => Ok(Rc::new(RefCell::new(NodeBinding::new(value, part)))),
            other => Err(directive_error(self.name(), &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The "no value" nothing on a child-node part: commits nothing and keeps
/// the range empty.
pub struct NoValueDirective;

impl Directive for NoValueDirective {
    fn name(&self) -> &'static str {
        "no-value"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match part {
            Part::ChildNode { .. } => Ok(Rc::new(RefCell::new(NodeBinding::new(value, part)))),
            other => Err(directive_error(self.name(), &other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct NodeBinding {
    part: Part,
    value: Value,
    text_node: Option<NodeId>,
    connected: bool,
    committed: bool,
    dirty: bool,
    enqueued: bool,
}

impl NodeBinding {
    fn new(value: Value, part: Part) -> Self {
        Self {
            part,
            value,
            text_node: None,
            connected: false,
            committed: false,
            dirty: true,
            enqueued: false,
        }
    }

    fn anchor(&self) -> &Rc<std::cell::Cell<Option<NodeId>>> {
        match &self.part {
            Part::ChildNode { anchor, .. } => anchor,
            other => unreachable!("node binding on {other:?}"),
        }
    }
}

impl Binding for NodeBinding {
    fn directive_name(&self) -> &'static str {
        "node"
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
        let marker = self.part.node();
        let document = cx.document();
        let mut doc = document.borrow_mut();
        if self.value.is_null() {
            if let Some(text) = self.text_node.take() {
                doc.detach(text);
            }
            self.anchor().set(None);
        } else {
            let content = self.value.to_display_string();
            match self.text_node {
                Some(text) => doc.set_text(text, content),
                None => {
                    let text = doc.create_text(content);
                    doc.insert_before(marker, text);
                    self.text_node = Some(text);
                }
            }
            self.anchor().set(self.text_node);
        }
        self.committed = true;
        self.dirty = false;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        if let Some(text) = self.text_node.take() {
            let document = cx.document();
            document.borrow_mut().detach(text);
        }
        self.anchor().set(None);
        self.committed = false;
        self.dirty = true;
        Ok(())
    }

    fn hydrate(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        self.committed = true;
        self.dirty = false;
        if !self.value.is_null() {
            let walker = cx.hydration_walker()?;
            let document = cx.document();
            let parked_on_text = {
                let doc = document.borrow();
                walker.borrow_mut().peek_node(&doc, NodeType::Text).is_ok()
            };
            let text = if parked_on_text {
                let doc = document.borrow();
                walker.borrow_mut().next_node(&doc, NodeType::Text)?
            } else {
                // The content merged into a neighboring text node during
                // serialization; claim a dedicated node at this position.
                let mut doc = document.borrow_mut();
                walker.borrow_mut().insert_text_here(&mut doc)
            };
            self.text_node = Some(text);
            self.anchor().set(Some(text));

            // Normalize content that was merged away from this node.
            let expected = self.value.to_display_string();
            let matches = {
                let doc = document.borrow();
                doc.text(text).map(|content| content == expected).unwrap_or(false)
            };
            self.dirty = !matches;
            if self.dirty && !self.enqueued {
                self.enqueued = true;
                cx.enqueue(CommitPhase::Mutation, Effect::Commit(this.clone()));
            }
        }
        Ok(())
    }
}
