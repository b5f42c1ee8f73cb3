use crate::binding::BindingRef;
use crate::directive::{resolve_directive, Directive};
use crate::error::{DirectiveError, RenderError};
use crate::part::Part;
use crate::runtime::{CommitContext, UpdateContext};
use crate::value::Value;
use std::rc::Rc;

/// How a slot reacts when a value resolves to a different directive than
/// the one it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// The directive must not change; a mismatch is an error.
    Strict,
    /// The old binding is rolled back and a new one is built from the new
    /// directive.
    Flexible,
}

/// A directive-owning wrapper over a binding.
///
/// The slot is the unit the rest of the tree holds: it memoizes the bound
/// value, tracks commit state, and is the only place bindings get swapped.
pub struct Slot {
    kind: SlotKind,
    part: Part,
    directive: Rc<dyn Directive>,
    binding: BindingRef,
}

impl Slot {
    /// Resolve a fresh slot for `value` at `part`. The binding is
    /// constructed bound to `value`; callers follow up with
    /// [`Slot::connect`] or [`Slot::hydrate`].
    pub fn resolve(value: Value, part: Part, cx: &mut UpdateContext<'_>) -> Result<Slot, RenderError> {
        let (directive, kind) = resolve_directive(&value, &part, cx)?;
        let binding = directive.resolve_binding(value, part.clone(), cx)?;
        Ok(Slot {
            kind,
            part,
            directive,
            binding,
        })
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn part(&self) -> &Part {
        &self.part
    }

    pub fn binding(&self) -> &BindingRef {
        &self.binding
    }

    pub fn is_committed(&self) -> bool {
        self.binding.borrow().is_committed()
    }

    /// Reconcile a new value into the slot. Returns the dirty bit: whether
    /// the underlying binding took the value and was (re)connected.
    pub fn reconcile(&mut self, value: Value, cx: &mut UpdateContext<'_>) -> Result<bool, RenderError> {
        let (directive, _) = resolve_directive(&value, &self.part, cx)?;
        if !directive.equals(self.directive.as_ref()) {
            return match self.kind {
                SlotKind::Strict => Err(RenderError::Directive(DirectiveError {
                    directive: directive.name(),
                    part: format!(
                        "{:?} (strict slot already bound to `{}`)",
                        self.part,
                        self.directive.name()
                    ),
                })),
                SlotKind::Flexible => {
                    // Swap: the old binding rolls back in this frame's
                    // commit, the new one takes over the part.
                    let old = self.binding.clone();
                    old.borrow_mut().disconnect(&old, cx);
                    let binding = directive.resolve_binding(value, self.part.clone(), cx)?;
                    self.binding = binding;
                    self.directive = directive;
                    self.connect(cx)?;
                    Ok(true)
                }
            };
        }

        let dirty = self.binding.borrow().should_bind(&value, cx);
        if dirty {
            self.binding.borrow_mut().bind(value);
            self.connect(cx)?;
        }
        Ok(dirty)
    }

    pub fn connect(&mut self, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        let binding = self.binding.clone();
        let mut inner = binding.borrow_mut();
        inner.connect(&binding, cx)
    }

    pub fn disconnect(&mut self, cx: &mut UpdateContext<'_>) {
        let binding = self.binding.clone();
        let mut inner = binding.borrow_mut();
        inner.disconnect(&binding, cx);
    }

    pub fn hydrate(&mut self, cx: &mut UpdateContext<'_>) -> Result<(), RenderError> {
        let binding = self.binding.clone();
        let mut inner = binding.borrow_mut();
        inner.hydrate(&binding, cx)
    }

    /// Manually drive a commit; a no-op when the binding is clean.
    pub fn commit(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        self.binding.borrow_mut().commit(cx)
    }

    /// Manually drive a rollback; a no-op when never committed.
    pub fn rollback(&mut self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        self.binding.borrow_mut().rollback(cx)
    }
}
