use crate::binding::{Binding, BindingRef};
use crate::directive::{directive_error, Directive};
use crate::error::RenderError;
use crate::hooks::{Hook, RenderContext};
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::scheduler::{Coroutine, CoroutineId, Effect as FrameEffect, Lanes};
use crate::scope::Scope;
use crate::slot::Slot;
use crate::value::Value;
use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// A component render function: props in, renderable value out.
pub type Component<P> = fn(P, &mut RenderContext<'_>) -> Result<Value, RenderError>;

/// Build a component value from a render function and its props.
pub fn component<P>(render: Component<P>, props: P) -> Value
where
    P: Clone + PartialEq + 'static,
{
    Value::Component(Rc::new(VComponent::new(render, props)))
}

/// A component mount: the render function plus type-erased props.
pub struct VComponent {
    name: &'static str,
    pub(crate) fn_id: usize,
    pub(crate) props: Box<dyn AnyProps>,
}

impl VComponent {
    pub(crate) fn new<P>(render: Component<P>, props: P) -> Self
    where
        P: Clone + PartialEq + 'static,
    {
        Self {
            name: std::any::type_name::<P>(),
            fn_id: render as usize,
            props: Box::new(VProps {
                render_fn: render,
                memo: |a, b| a == b,
                props,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Object-safe erasure over typed props so component values of different
/// prop types can flow through the same binding.
pub(crate) trait AnyProps {
    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Value, RenderError>;
    fn memoize(&self, other: &dyn AnyProps) -> bool;
    fn as_any(&self) -> &dyn Any;
}

struct VProps<P> {
    render_fn: Component<P>,
    memo: fn(&P, &P) -> bool,
    props: P,
}

impl<P: Clone + PartialEq + 'static> AnyProps for VProps<P> {
    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Value, RenderError> {
        let result = catch_unwind(AssertUnwindSafe(|| {
            (self.render_fn)(self.props.clone(), cx)
        }));
        match result {
            Ok(rendered) => rendered,
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("panic while rendering component: {detail}");
                Err(RenderError::message(detail))
            }
        }
    }

    fn memoize(&self, other: &dyn AnyProps) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .map(|other| (self.memo)(&self.props, &other.props))
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Mounts a component into a child-node range. The binding is the
/// component's coroutine: every resume is one render pass.
pub struct ComponentDirective;

impl Directive for ComponentDirective {
    fn name(&self) -> &'static str {
        "component"
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        cx: &mut UpdateContext<'_>,
    ) -> Result<BindingRef, RenderError> {
        match &part {
            Part::ChildNode { .. } => match value {
                Value::Component(_) => {
                    let binding = Rc::new(RefCell::new(ComponentBinding::new(
                        value,
                        part,
                        cx.scope.child(),
                    )));
                    // Register the coroutine under an arena id; dispatchers
                    // hold the id, never the binding.
                    let coroutine: Rc<RefCell<dyn Coroutine>> = binding.clone();
                    let id = cx.shared.register_coroutine(&coroutine);
                    {
                        let mut inner = binding.borrow_mut();
                        inner.coroutine_id = Some(id);
                        inner.self_coroutine = Some(Rc::downgrade(&coroutine));
                    }
                    let binding: BindingRef = binding;
                    Ok(binding)
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

pub struct ComponentBinding {
    part: Part,
    value: Value,
    hooks: Vec<Hook>,
    root_slot: Option<Slot>,
    scope: Rc<Scope>,
    coroutine_id: Option<CoroutineId>,
    self_coroutine: Option<Weak<RefCell<dyn Coroutine>>>,
    /// Identity of the render function the hooks belong to.
    fn_id: usize,
    pending_lanes: Lanes,
    connected: bool,
    enqueued_frame: Option<u64>,
}

impl ComponentBinding {
    fn new(value: Value, part: Part, scope: Rc<Scope>) -> Self {
        Self {
            part,
            value,
            hooks: Vec::new(),
            root_slot: None,
            scope,
            coroutine_id: None,
            self_coroutine: None,
            fn_id: 0,
            pending_lanes: Lanes::NONE,
            connected: false,
            enqueued_frame: None,
        }
    }

    fn vcomponent(&self) -> Result<Rc<VComponent>, RenderError> {
        match &self.value {
            Value::Component(vcomp) => Ok(vcomp.clone()),
            other => Err(directive_error(other.type_name(), &self.part)),
        }
    }

    /// Enqueue one flusher per dirty effect hook, each running the
    /// previous cleanup before the new callback, in hook order.
    fn enqueue_hook_effects(&self, cx: &mut UpdateContext<'_>) {
        for hook in &self.hooks {
            if let Hook::Effect(effect) = hook {
                if effect.state.borrow().callback.is_some() {
                    let state = effect.state.clone();
                    cx.enqueue(
                        effect.phase,
                        FrameEffect::Run(Box::new(move |_cx| {
                            let (callback, cleanup) = {
                                let mut inner = state.borrow_mut();
                                (inner.callback.take(), inner.cleanup.take())
                            };
                            if let Some(cleanup) = cleanup {
                                cleanup();
                            }
                            if let Some(callback) = callback {
                                let next = callback();
                                state.borrow_mut().cleanup = next;
                            }
                            Ok(())
                        })),
                    );
                }
            }
        }
    }

    fn enqueue_cleanups(&self, cx: &mut UpdateContext<'_>) {
        for hook in &self.hooks {
            if let Hook::Effect(effect) = hook {
                let state = effect.state.clone();
                cx.enqueue(
                    effect.phase,
                    FrameEffect::Run(Box::new(move |_cx| {
                        let cleanup = {
                            let mut inner = state.borrow_mut();
                            inner.callback = None;
                            inner.cleanup.take()
                        };
                        if let Some(cleanup) = cleanup {
                            cleanup();
                        }
                        Ok(())
                    })),
                );
            }
        }
    }
}

impl Binding for ComponentBinding {
    fn directive_name(&self) -> &'static str {
        "component"
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
        self.root_slot
            .as_ref()
            .map(|slot| slot.is_committed())
            .unwrap_or(false)
    }

    fn should_bind(&self, new: &Value, _cx: &UpdateContext<'_>) -> bool {
        match (&self.value, new) {
            (Value::Component(old), Value::Component(next)) => {
                if Rc::ptr_eq(old, next) {
                    return false;
                }
                // Memoized props short-circuit the render entirely; any
                // pending hook state is honored by the next render that is
                // not skipped.
                !(old.fn_id == next.fn_id && old.props.memoize(next.props.as_ref()))
            }
            _ => true,
        }
    }

    fn bind(&mut self, new: Value) {
        self.value = new;
    }

    fn connect(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        self.connected = true;
        let vcomp = self.vcomponent()?;

        // A different render function means a different component: its
        // hook state and subtree do not carry over.
        if self.fn_id != 0 && self.fn_id != vcomp.fn_id {
            self.hooks.clear();
            if let Some(mut slot) = self.root_slot.take() {
                slot.disconnect(cx);
            }
        }
        self.fn_id = vcomp.fn_id;

        if self.enqueued_frame != Some(cx.frame.id) {
            self.enqueued_frame = Some(cx.frame.id);
            if let Some(coroutine) = self.self_coroutine.as_ref().and_then(Weak::upgrade) {
                cx.frame.enqueue_coroutine(coroutine);
            }
        }
        Ok(())
    }

    fn disconnect(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) {
        if self.connected {
            self.connected = false;
            if let Some(slot) = &mut self.root_slot {
                slot.disconnect(cx);
            }
            self.enqueue_cleanups(cx);
            if let Some(id) = self.coroutine_id {
                cx.shared.unregister_coroutine(id);
            }
            self.pending_lanes = Lanes::NONE;
        }
    }

    fn commit(&mut self, _cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        // The component's tree commits through its root slot's effects.
        Ok(())
    }

    fn rollback(&mut self, _cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    fn hydrate(&mut self, _this: &BindingRef, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        // Resume synchronously: the surrounding walk needs this range's
        // content consumed before it can match the marker comment. The
        // root slot adopts the pre-rendered markup through the scope's
        // hydration boundary.
        self.connected = true;
        let vcomp = self.vcomponent()?;
        self.fn_id = vcomp.fn_id;
        self.enqueued_frame = Some(cx.frame.id);
        self.resume(cx)
    }
}

impl Coroutine for ComponentBinding {
    fn pending_lanes(&self) -> Lanes {
        self.pending_lanes
    }

    fn add_pending_lanes(&mut self, lanes: Lanes) {
        self.pending_lanes |= lanes;
    }

    fn clear_pending_lanes(&mut self, lanes: Lanes) {
        self.pending_lanes.remove(lanes);
    }

    fn resume(&mut self, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        let vcomp = self.vcomponent()?;
        let scope = self.scope.clone();
        let coroutine = self
            .coroutine_id
            .expect("component coroutine is registered before it resumes");

        let rendered = {
            let mut rcx = RenderContext::new(
                &mut self.hooks,
                cx.shared,
                scope.clone(),
                coroutine,
                cx.frame.lanes,
                cx.frame.id,
            );
            match vcomp.props.render(&mut rcx) {
                Ok(value) => {
                    rcx.finalize()?;
                    Ok(value)
                }
                Err(err) => Err(err),
            }
        };

        let rendered = match rendered {
            Ok(value) => value,
            Err(err) => {
                if scope.handle_error(&err) {
                    // Recovered: the previous committed tree stays up.
                    return Ok(());
                }
                return Err(err);
            }
        };

        let part = self.part.clone();
        let root_slot = &mut self.root_slot;
        cx.with_scope(scope, |cx| -> Result<(), RenderError> {
            match root_slot {
                Some(slot) => {
                    slot.reconcile(rendered, cx)?;
                }
                None => {
                    let mut slot = Slot::resolve(rendered, part, cx)?;
                    slot.connect(cx)?;
                    *root_slot = Some(slot);
                }
            }
            Ok(())
        })?;

        self.enqueue_hook_effects(cx);
        Ok(())
    }
}
