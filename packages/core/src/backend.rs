use crate::directive::{self, Directive};
use crate::error::RenderError;
use crate::part::Part;
use crate::runtime::CommitContext;
use crate::scheduler::{CommitPhase, Effect, Priority};
use crate::slot::SlotKind;
use crate::value::Value;
use futures_util::future::{ready, LocalBoxFuture};
use std::rc::Rc;

/// The host-injected contract: primitive resolution, task scheduling and
/// visual-transition wrapping.
///
/// The runtime calls these at well-defined points; a platform back-end can
/// route `request_callback`/`yield_to_main` onto its own task queue and
/// wrap commits in a real view transition. [`CoreBackend`] is the
/// deterministic default.
pub trait Backend {
    /// Map a value/part pair to a built-in directive.
    fn resolve_primitive(&self, value: &Value, part: &Part) -> Result<Rc<dyn Directive>, RenderError> {
        directive::resolve_primitive(value, part)
    }

    /// Decide whether the slot for this position is strict or flexible.
    fn resolve_slot_kind(&self, value: &Value, part: &Part) -> SlotKind {
        directive::resolve_slot_kind(value, part)
    }

    /// The priority of the task currently running, used when a schedule
    /// request does not name one.
    fn current_priority(&self) -> Priority {
        Priority::UserVisible
    }

    /// Arrange a future main-task run at the given priority. The runtime
    /// calls this once per newly pending priority; hosts drive the work
    /// loop from the granted callback.
    fn request_callback(&self, _priority: Priority) -> LocalBoxFuture<'static, ()> {
        Box::pin(ready(()))
    }

    /// Cooperative yield: resolves on the next task slot.
    fn yield_to_main(&self) -> LocalBoxFuture<'static, ()> {
        Box::pin(ready(()))
    }

    /// Whether the work loop should give the main task a turn between
    /// coroutine resumes. Only consulted for concurrent frames.
    fn should_yield(&self) -> bool {
        false
    }

    /// Run `commit` inside a visual-transition boundary
    /// (snapshot → apply → animate). The default applies directly.
    fn start_view_transition(&self, commit: Box<dyn FnOnce() + '_>) {
        commit();
    }

    /// Drain one phase's effects. Hosts may batch or instrument; the
    /// default commits each effect in enqueue order.
    fn commit_effects(
        &self,
        effects: Vec<Effect>,
        _phase: CommitPhase,
        cx: &mut CommitContext<'_>,
    ) -> Result<(), RenderError> {
        for effect in effects {
            effect.run(cx)?;
        }
        Ok(())
    }
}

/// The built-in deterministic back-end: immediate callbacks, no yielding,
/// transitions applied inline.
#[derive(Default)]
pub struct CoreBackend;

impl Backend for CoreBackend {}
