use crate::binding::{Binding, BindingRef};
use crate::directive::{directive_error, Directive};
use crate::error::{HydrationError, RenderError, TemplateError};
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::scheduler::{CommitPhase, Effect};
use crate::slot::Slot;
use crate::template::{Hole, HoleKind, Template, TemplateValue};
use crate::value::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use weft_dom::{NodeId, NodeType, TreeWalker};

/// Binds a tagged-template value into a child-node range: the compiled
/// plan is stamped once, then only the hole slots are reconciled.
pub struct TemplateDirective;

impl Directive for TemplateDirective {
    fn name(&self) -> &'static str {
        "template"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match &part {
            Part::ChildNode { .. } => match value {
                Value::Template(_) => Ok(Rc::new(RefCell::new(TemplateBinding::new(value, part)))),
                other => Err(directive_error(other.type_name(), &part)),
            },
            other => Err(directive_error(self.name(), other)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct TemplateBinding {
    part: Part,
    value: Value,
    template: Option<Rc<Template>>,
    roots: Vec<NodeId>,
    slots: Vec<Slot>,
    mounted: bool,
    /// Roots of a replaced instance, removed at the next commit.
    retired: Vec<NodeId>,
    connected: bool,
    committed: bool,
    enqueued: bool,
}

impl TemplateBinding {
    fn new(value: Value, part: Part) -> Self {
        Self {
            part,
            value,
            template: None,
            roots: Vec::new(),
            slots: Vec::new(),
            mounted: false,
            retired: Vec::new(),
            connected: false,
            committed: false,
            enqueued: false,
        }
    }

    fn template_value(&self) -> Result<Rc<TemplateValue>, RenderError> {
        match &self.value {
            Value::Template(tv) => Ok(tv.clone()),
            other => Err(directive_error(other.type_name(), &self.part)),
        }
    }

    fn anchor(&self) -> &Rc<Cell<Option<NodeId>>> {
        match &self.part {
            Part::ChildNode { anchor, .. } => anchor,
            other => unreachable!("template binding on {other:?}"),
        }
    }

    fn check_bind_count(
        template: &Template,
        tv: &TemplateValue,
    ) -> Result<(), RenderError> {
        if template.holes().len() != tv.binds.len() {
            return Err(RenderError::Template(TemplateError::BindCountMismatch {
                holes: template.holes().len(),
                binds: tv.binds.len(),
            }));
        }
        Ok(())
    }

    fn teardown(&mut self, cx: &mut UpdateContext<'_>) {
        for slot in self.slots.iter_mut() {
            slot.disconnect(cx);
        }
        self.slots.clear();
        self.retired.append(&mut self.roots);
        self.template = None;
        self.mounted = false;
    }
}

impl Binding for TemplateBinding {
    fn directive_name(&self) -> &'static str {
        "template"
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

    fn connect(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        // First connect under an active hydration boundary adopts the
        // pre-rendered markup instead of stamping a fresh instance.
        if self.template.is_none() {
            let hydrating = cx
                .scope
                .hydration_walker()
                .map(|walker| !walker.borrow().is_finished())
                .unwrap_or(false);
            if hydrating {
                return self.hydrate(this, cx);
            }
        }

        self.connected = true;
        let tv = self.template_value()?;
        let compiled = cx.shared.template(&tv)?;
        Self::check_bind_count(&compiled, &tv)?;

        let fresh = match &self.template {
            Some(current) => !Rc::ptr_eq(current, &compiled),
            None => true,
        };

        if fresh {
            if self.template.is_some() {
                self.teardown(cx);
            }
            // Mount commits before the children's effects so nested
            // content lands in a live range.
            if !self.enqueued {
                self.enqueued = true;
                cx.enqueue(CommitPhase::Mutation, Effect::Commit(this.clone()));
            }
            let instance = {
                let document = cx.document();
                let mut doc = document.borrow_mut();
                compiled.instantiate(&mut doc)
            };
            self.roots = instance.roots;
            self.mounted = false;
            let mut slots = Vec::with_capacity(instance.parts.len());
            for (part, bind) in instance.parts.into_iter().zip(tv.binds.iter()) {
                let mut slot = Slot::resolve(bind.clone(), part, cx)?;
                slot.connect(cx)?;
                slots.push(slot);
            }
            self.slots = slots;
            self.template = Some(compiled);
        } else {
            for (slot, bind) in self.slots.iter_mut().zip(tv.binds.iter()) {
                slot.reconcile(bind.clone(), cx)?;
            }
            if !self.mounted && !self.enqueued {
                self.enqueued = true;
                cx.enqueue(CommitPhase::Mutation, Effect::Commit(this.clone()));
            }
        }
        Ok(())
    }

    fn disconnect(&mut self, this: &BindingRef, cx: &mut UpdateContext<'_>) {
        if self.connected {
            self.connected = false;
            for slot in self.slots.iter_mut() {
                slot.disconnect(cx);
            }
            cx.enqueue(CommitPhase::Mutation, Effect::Rollback(this.clone()));
        }
    }

    fn commit(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        self.enqueued = false;
        let marker = self.part.node();
        let document = cx.document();
        let mut doc = document.borrow_mut();
        for node in self.retired.drain(..) {
            doc.detach(node);
        }
        if !self.mounted {
            for root in &self.roots {
                doc.insert_before(marker, *root);
            }
            self.mounted = true;
        }
        self.anchor().set(self.roots.first().copied());
        self.committed = true;
        Ok(())
    }

    fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        if !self.committed {
            return Ok(());
        }
        let document = cx.document();
        let mut doc = document.borrow_mut();
        for node in self.retired.drain(..) {
            doc.detach(node);
        }
        for root in &self.roots {
            doc.detach(*root);
        }
        self.mounted = false;
        self.anchor().set(None);
        self.committed = false;
        Ok(())
    }

    fn hydrate(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        let tv = self.template_value()?;
        let compiled = cx.shared.template(&tv)?;
        Self::check_bind_count(&compiled, &tv)?;

        let (roots, slots) = hydrate_instance(&compiled, &tv.binds, cx)?;
        self.roots = roots;
        self.slots = slots;
        self.template = Some(compiled);
        self.mounted = true;
        self.connected = true;
        self.committed = true;
        self.anchor().set(self.roots.first().copied());
        Ok(())
    }
}

/// Walk the template plan and the live tree in lockstep, binding every hole
/// onto the pre-rendered nodes.
///
/// Child-node ranges hydrate their content before their marker comment is
/// consumed; the live marker is then swapped for the part's own comment so
/// the part is fully formed before its slot exists.
fn hydrate_instance(
    template: &Rc<Template>,
    binds: &[Value],
    cx: &mut UpdateContext<'_>,
) -> Result<(Vec<NodeId>, Vec<Slot>), RenderError> {
    let walker = cx.hydration_walker()?;
    let document = cx.document();
    let plan_root = template.fragment();
    let holes = template.holes();

    let mut roots: Vec<NodeId> = Vec::new();
    let mut slots: Vec<Slot> = Vec::new();
    let mut hole_cursor = 0usize;
    let mut index = 0usize;

    let mut plan_walker = {
        let doc = document.borrow();
        TreeWalker::descendants(&doc, plan_root)
    };

    loop {
        let plan_node = {
            let doc = document.borrow();
            plan_walker.next(&doc)
        };
        let Some(plan_node) = plan_node else { break };

        let (plan_type, is_root) = {
            let doc = document.borrow();
            (
                doc.node_type(plan_node),
                doc.parent(plan_node) == Some(plan_root),
            )
        };

        // Holes targeting this plan position, paired with their bind index.
        let mut node_holes: Vec<(usize, Hole)> = Vec::new();
        while hole_cursor < holes.len() && holes[hole_cursor].index == index {
            node_holes.push((hole_cursor, holes[hole_cursor].clone()));
            hole_cursor += 1;
        }
        index += 1;

        let child_node_hole = node_holes
            .iter()
            .position(|(_, hole)| matches!(hole.kind, HoleKind::ChildNode));
        if let Some(position) = child_node_hole {
            let (bind_index, hole) = node_holes.remove(position);
            // The part's marker is a fresh comment; it replaces the live
            // one once the range content has been consumed.
            let fresh = document.borrow_mut().create_comment("");
            let part = template.part_for(&hole, fresh);
            let mut slot = Slot::resolve(binds[bind_index].clone(), part, cx)?;
            slot.hydrate(cx)?;
            let live = {
                let doc = document.borrow();
                walker.borrow_mut().next_node(&doc, NodeType::Comment)?
            };
            {
                let mut doc = document.borrow_mut();
                doc.insert_before(live, fresh);
                doc.detach(live);
            }
            slots.push(slot);
            if is_root {
                roots.push(fresh);
            }
            continue;
        }

        let live = match plan_type {
            NodeType::Element => {
                let live = {
                    let doc = document.borrow();
                    walker.borrow_mut().next_node(&doc, NodeType::Element)?
                };
                let doc = document.borrow();
                if doc.tag_name(live) != doc.tag_name(plan_node) {
                    return Err(RenderError::Hydration(HydrationError::Mismatch {
                        expected: NodeType::Element,
                        found: format!("<{}> element", doc.tag_name(live).unwrap_or("unknown")),
                    }));
                }
                live
            }
            NodeType::Text => {
                let parked_on_text = {
                    let doc = document.borrow();
                    walker.borrow_mut().peek_node(&doc, NodeType::Text).is_ok()
                };
                if !parked_on_text {
                    // An empty slice serializes to nothing; materialize it.
                    let mut doc = document.borrow_mut();
                    walker.borrow_mut().insert_text_here(&mut doc)
                } else {
                    let live = {
                        let doc = document.borrow();
                        walker.borrow_mut().peek_node(&doc, NodeType::Text)?
                    };
                    // The plan keeps adjacent text slices as dedicated
                    // sibling nodes; serialization writes them back to
                    // back and parsing re-merges them. When the plan run
                    // continues but the live run does not, carve the next
                    // slice off before claiming this node.
                    let (plan_continues, live_continues) = {
                        let doc = document.borrow();
                        (
                            doc.next_sibling(plan_node)
                                .map(|sibling| doc.node_type(sibling) == NodeType::Text)
                                .unwrap_or(false),
                            doc.next_sibling(live)
                                .map(|sibling| doc.node_type(sibling) == NodeType::Text)
                                .unwrap_or(false),
                        )
                    };
                    if plan_continues && !live_continues {
                        let mut doc = document.borrow_mut();
                        walker.borrow_mut().split_text(&mut doc)?;
                        live
                    } else {
                        let doc = document.borrow();
                        walker.borrow_mut().next_node(&doc, NodeType::Text)?
                    }
                }
            }
            NodeType::Comment => {
                let doc = document.borrow();
                walker.borrow_mut().next_node(&doc, NodeType::Comment)?
            }
            _ => continue,
        };

        if is_root {
            roots.push(live);
        }

        for (bind_index, hole) in node_holes {
            let part = template.part_for(&hole, live);
            let mut slot = Slot::resolve(binds[bind_index].clone(), part, cx)?;
            slot.hydrate(cx)?;
            slots.push(slot);
        }
    }

    Ok((roots, slots))
}
