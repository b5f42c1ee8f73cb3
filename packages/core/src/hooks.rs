use crate::error::{HookError, RenderError};
use crate::runtime::RuntimeShared;
use crate::scheduler::{CommitPhase, CoroutineId, Lanes, ScheduleOptions};
use crate::scope::Scope;
use crate::value::{AnyValue, Value};
use futures_channel::oneshot;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

/// An effect destructor. Effect callbacks return `None` when there is
/// nothing to tear down.
pub type Cleanup = Option<Box<dyn FnOnce()>>;

/// Wrap a teardown function as a [`Cleanup`].
pub fn cleanup(f: impl FnOnce() + 'static) -> Cleanup {
    Some(Box::new(f))
}

/// One positional record in a component's hook array.
///
/// The k-th hook call of every render must produce the same record type;
/// `Finalizer` is the sentinel meaning "all hooks in this render have been
/// seen".
pub enum Hook {
    Finalizer,
    Effect(EffectHook),
    Identifier(Rc<str>),
    Memo(MemoHook),
    Reducer(Rc<ReducerCore>),
}

impl Hook {
    fn type_name(&self) -> &'static str {
        match self {
            Hook::Finalizer => "finalizer",
            Hook::Effect(_) => "effect",
            Hook::Identifier(_) => "identifier",
            Hook::Memo(_) => "memo",
            Hook::Reducer(_) => "reducer",
        }
    }
}

pub struct EffectHook {
    pub(crate) phase: CommitPhase,
    pub(crate) state: Rc<RefCell<EffectState>>,
    deps: Option<Rc<dyn AnyValue>>,
}

pub(crate) struct EffectState {
    pub callback: Option<Box<dyn FnOnce() -> Cleanup>>,
    pub cleanup: Option<Box<dyn FnOnce()>>,
}

pub struct MemoHook {
    value: Rc<dyn Any>,
    deps: Rc<dyn AnyValue>,
}

/// The shared half of a reducer hook: the memoized/pending state split and
/// the lanes the pending state is waiting on.
pub struct ReducerCore {
    memoized: RefCell<Rc<dyn Any>>,
    pending: RefCell<Rc<dyn Any>>,
    pending_lanes: Cell<Lanes>,
    same: Box<dyn Fn(&dyn Any, &dyn Any) -> bool>,
}

impl ReducerCore {
    fn new<S: PartialEq + 'static>(initial: S) -> Self {
        let initial: Rc<dyn Any> = Rc::new(initial);
        Self {
            memoized: RefCell::new(initial.clone()),
            pending: RefCell::new(initial),
            pending_lanes: Cell::new(Lanes::NONE),
            same: Box::new(|a, b| {
                match (a.downcast_ref::<S>(), b.downcast_ref::<S>()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        !(self.same)(&**self.memoized.borrow(), &**self.pending.borrow())
    }
}

/// A stable action dispatcher handed out by `use_state`/`use_reducer`.
pub struct Dispatcher<A> {
    inner: Rc<dyn Fn(A, ScheduleOptions)>,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A> Dispatcher<A> {
    pub fn dispatch(&self, action: A) {
        (self.inner)(action, ScheduleOptions::default());
    }

    pub fn dispatch_with(&self, action: A, options: ScheduleOptions) {
        (self.inner)(action, options);
    }
}

/// A reusable hook value: anything that can run against the render context.
pub trait CustomHook {
    type Output;
    fn run(self, cx: &mut RenderContext<'_>) -> Result<Self::Output, RenderError>;
}

impl<F, O> CustomHook for F
where
    F: for<'a, 'b> FnOnce(&'a mut RenderContext<'b>) -> Result<O, RenderError>,
{
    type Output = O;

    fn run(self, cx: &mut RenderContext<'_>) -> Result<O, RenderError> {
        self(cx)
    }
}

/// The disciplined cursor a component renders against.
///
/// Each `use_*` call claims the next position in the hook array; a type
/// mismatch against the record laid down on the first render is a
/// [`HookError`].
pub struct RenderContext<'a> {
    hooks: &'a mut Vec<Hook>,
    cursor: usize,
    finalized: bool,
    shared: &'a Rc<RuntimeShared>,
    scope: Rc<Scope>,
    coroutine: CoroutineId,
    lanes: Lanes,
    frame_id: u64,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        hooks: &'a mut Vec<Hook>,
        shared: &'a Rc<RuntimeShared>,
        scope: Rc<Scope>,
        coroutine: CoroutineId,
        lanes: Lanes,
        frame_id: u64,
    ) -> Self {
        Self {
            hooks,
            cursor: 0,
            finalized: false,
            shared,
            scope,
            coroutine,
            lanes,
            frame_id,
        }
    }

    fn guard(&self) -> Result<(), HookError> {
        if self.finalized {
            return Err(HookError::AfterFinalize);
        }
        Ok(())
    }

    /// Claim the next position. `make` runs only on the first visit.
    fn claim(
        &mut self,
        expected: &'static str,
        make: impl FnOnce(&mut Self) -> Hook,
    ) -> Result<usize, HookError> {
        self.guard()?;
        let position = self.cursor;
        if position == self.hooks.len() {
            let hook = make(self);
            self.hooks.push(hook);
        } else if self.hooks[position].type_name() != expected {
            return Err(HookError::UnexpectedHookType {
                position,
                expected,
                found: self.hooks[position].type_name(),
            });
        }
        self.cursor += 1;
        Ok(position)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn use_state<T: Clone + PartialEq + 'static>(
        &mut self,
        initial: impl FnOnce() -> T,
    ) -> Result<(T, Dispatcher<T>, bool), HookError> {
        self.use_reducer(|_state: &T, action: T| action, initial)
    }

    pub fn use_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + 'static,
        initial: impl FnOnce() -> S,
    ) -> Result<(S, Dispatcher<A>, bool), HookError>
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let position = self.claim("reducer", |_| {
            Hook::Reducer(Rc::new(ReducerCore::new(initial())))
        })?;
        let core = match &self.hooks[position] {
            Hook::Reducer(core) => core.clone(),
            _ => unreachable!("claim checked the hook type"),
        };

        // Commit pending state when this render's lanes cover its lanes;
        // otherwise the memoized state stays visible and `is_pending`
        // keeps reporting true.
        let waiting = core.pending_lanes.get();
        if !waiting.is_empty() && self.lanes.contains(waiting) {
            *core.memoized.borrow_mut() = core.pending.borrow().clone();
            core.pending_lanes.set(Lanes::NONE);
        }

        let state = core
            .memoized
            .borrow()
            .clone()
            .downcast::<S>()
            .ok()
            .expect("reducer state type is stable across renders");
        let is_pending = core.is_pending();

        let dispatcher = {
            let core = core.clone();
            let reducer = Rc::new(reducer);
            let sender = self.shared.sender();
            let backend = self.shared.backend().clone();
            let coroutine = self.coroutine;
            Dispatcher {
                inner: Rc::new(move |action: A, options: ScheduleOptions| {
                    let current = core
                        .pending
                        .borrow()
                        .clone()
                        .downcast::<S>()
                        .ok()
                        .expect("reducer state type is stable across renders");
                    let next = reducer(&current, action);
                    if next != *current {
                        *core.pending.borrow_mut() = Rc::new(next);
                        let lanes = options.schedule_lanes(backend.current_priority());
                        core.pending_lanes.set(core.pending_lanes.get() | lanes);
                        crate::scheduler::send_schedule(&sender, coroutine, options);
                    }
                }),
            }
        };

        Ok(((*state).clone(), dispatcher, is_pending))
    }

    // ------------------------------------------------------------------
    // Memoization
    // ------------------------------------------------------------------

    pub fn use_memo<T, D>(
        &mut self,
        deps: D,
        factory: impl FnOnce(&D) -> T,
    ) -> Result<T, HookError>
    where
        T: Clone + 'static,
        D: PartialEq + 'static,
    {
        self.guard()?;
        let position = self.cursor;
        if position == self.hooks.len() {
            let value = factory(&deps);
            self.hooks.push(Hook::Memo(MemoHook {
                value: Rc::new(value.clone()),
                deps: Rc::new(deps),
            }));
            self.cursor += 1;
            return Ok(value);
        }
        match &mut self.hooks[position] {
            Hook::Memo(memo) => {
                if !deps.any_cmp(memo.deps.as_ref()) {
                    let value = factory(&deps);
                    memo.value = Rc::new(value.clone());
                    memo.deps = Rc::new(deps);
                    self.cursor += 1;
                    return Ok(value);
                }
                let value = memo
                    .value
                    .clone()
                    .downcast::<T>()
                    .ok()
                    .expect("memo value type is stable across renders");
                self.cursor += 1;
                Ok((*value).clone())
            }
            other => Err(HookError::UnexpectedHookType {
                position,
                expected: "memo",
                found: other.type_name(),
            }),
        }
    }

    pub fn use_callback<A, D>(
        &mut self,
        deps: D,
        callback: impl Fn(A) + 'static,
    ) -> Result<Rc<dyn Fn(A)>, HookError>
    where
        A: 'static,
        D: PartialEq + 'static,
    {
        let stored = self.use_memo(deps, move |_| CallbackCell(Rc::new(callback) as Rc<dyn Fn(A)>))?;
        Ok(stored.0)
    }

    /// A memo whose value is a mutable cell and whose dependencies are
    /// empty: the cell is stable across renders.
    pub fn use_ref<T: 'static>(
        &mut self,
        initial: impl FnOnce() -> T,
    ) -> Result<Rc<RefCell<T>>, HookError> {
        self.use_memo((), move |_| Rc::new(RefCell::new(initial())))
    }

    /// A stable identifier: `frame:counter` from the session that first
    /// rendered this position.
    pub fn use_id(&mut self) -> Result<Rc<str>, HookError> {
        let position = self.claim("identifier", |cx| {
            Hook::Identifier(Rc::from(format!("{}:{}", cx.frame_id, cx.shared.next_id())))
        })?;
        match &self.hooks[position] {
            Hook::Identifier(id) => Ok(id.clone()),
            _ => unreachable!("claim checked the hook type"),
        }
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Fires after every render, in the passive phase.
    pub fn use_effect(
        &mut self,
        callback: impl FnOnce() -> Cleanup + 'static,
    ) -> Result<(), HookError> {
        self.effect_hook(CommitPhase::Passive, None, Box::new(callback))
    }

    /// Fires when `deps` differ from the previous render; `()` fires once.
    pub fn use_effect_with<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        callback: impl FnOnce() -> Cleanup + 'static,
    ) -> Result<(), HookError> {
        self.effect_hook(CommitPhase::Passive, Some(Rc::new(deps)), Box::new(callback))
    }

    pub fn use_layout_effect(
        &mut self,
        callback: impl FnOnce() -> Cleanup + 'static,
    ) -> Result<(), HookError> {
        self.effect_hook(CommitPhase::Layout, None, Box::new(callback))
    }

    pub fn use_layout_effect_with<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        callback: impl FnOnce() -> Cleanup + 'static,
    ) -> Result<(), HookError> {
        self.effect_hook(CommitPhase::Layout, Some(Rc::new(deps)), Box::new(callback))
    }

    pub fn use_insertion_effect(
        &mut self,
        callback: impl FnOnce() -> Cleanup + 'static,
    ) -> Result<(), HookError> {
        self.effect_hook(CommitPhase::Mutation, None, Box::new(callback))
    }

    pub fn use_insertion_effect_with<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        callback: impl FnOnce() -> Cleanup + 'static,
    ) -> Result<(), HookError> {
        self.effect_hook(CommitPhase::Mutation, Some(Rc::new(deps)), Box::new(callback))
    }

    fn effect_hook(
        &mut self,
        phase: CommitPhase,
        deps: Option<Rc<dyn AnyValue>>,
        callback: Box<dyn FnOnce() -> Cleanup>,
    ) -> Result<(), HookError> {
        self.guard()?;
        let position = self.cursor;
        if position == self.hooks.len() {
            self.hooks.push(Hook::Effect(EffectHook {
                phase,
                state: Rc::new(RefCell::new(EffectState {
                    callback: Some(callback),
                    cleanup: None,
                })),
                deps,
            }));
            self.cursor += 1;
            return Ok(());
        }
        match &mut self.hooks[position] {
            Hook::Effect(effect) if effect.phase == phase => {
                let fire = match (&effect.deps, &deps) {
                    (Some(old), Some(new)) => !new.any_cmp(old.as_ref()),
                    // No dependency list on either side means "always".
                    _ => true,
                };
                effect.deps = deps;
                if fire {
                    effect.state.borrow_mut().callback = Some(callback);
                }
                self.cursor += 1;
                Ok(())
            }
            other => Err(HookError::UnexpectedHookType {
                position,
                expected: "effect",
                found: other.type_name(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // External stores and deferred values
    // ------------------------------------------------------------------

    /// Subscribe to an external store: the snapshot is re-read on every
    /// render and a store change forces a user-blocking re-render, so the
    /// next render always observes the snapshot at fire time.
    pub fn use_sync_external_store<T>(
        &mut self,
        subscribe: impl FnOnce(Rc<dyn Fn()>) -> Box<dyn FnOnce()> + 'static,
        get_snapshot: impl Fn() -> T + 'static,
    ) -> Result<T, HookError>
    where
        T: Clone + PartialEq + 'static,
    {
        let snapshot = get_snapshot();
        let get_snapshot = Rc::new(get_snapshot);

        let notify: Rc<dyn Fn()> = {
            let sender = self.shared.sender();
            let coroutine = self.coroutine;
            Rc::new(move || {
                crate::scheduler::send_schedule(&sender, coroutine, ScheduleOptions::user_blocking());
            })
        };

        let seen = self.use_ref(|| None::<T>)?;
        *seen.borrow_mut() = Some(snapshot.clone());

        self.use_layout_effect_with((), {
            let seen = seen.clone();
            let get_snapshot = get_snapshot.clone();
            let notify = notify.clone();
            move || {
                let unsubscribe = subscribe(notify.clone());
                // The store may have changed between render and subscribe.
                let fresh = (get_snapshot)();
                if seen.borrow().as_ref() != Some(&fresh) {
                    notify();
                }
                Some(unsubscribe)
            }
        })?;

        Ok(snapshot)
    }

    /// Returns the previous value and schedules a background re-render
    /// that will return the new one.
    pub fn use_deferred_value(
        &mut self,
        value: Value,
        initial: Option<Value>,
    ) -> Result<Value, HookError> {
        let cell = self.use_ref(|| None::<Value>)?;
        let current = cell.borrow().clone();
        match current {
            None => {
                let first = initial.unwrap_or_else(|| value.clone());
                *cell.borrow_mut() = Some(first.clone());
                if !Value::same(&first, &value) {
                    self.force_update(ScheduleOptions::background());
                }
                Ok(first)
            }
            Some(current) if Value::same(&current, &value) => Ok(value),
            Some(current) => {
                if self.lanes.intersects(Lanes::BACKGROUND) {
                    *cell.borrow_mut() = Some(value.clone());
                    Ok(value)
                } else {
                    self.force_update(ScheduleOptions::background());
                    Ok(current)
                }
            }
        }
    }

    /// Evaluate a usable value against this context.
    pub fn run_hook<H: CustomHook>(&mut self, hook: H) -> Result<H::Output, RenderError> {
        hook.run(self)
    }

    // ------------------------------------------------------------------
    // Scheduling and context
    // ------------------------------------------------------------------

    pub fn force_update(&self, options: ScheduleOptions) {
        self.shared.schedule_update(self.coroutine, options);
    }

    /// Resolves when the next scheduled update of this component commits.
    pub fn wait_for_update(&self) -> impl Future<Output = Result<(), Rc<RenderError>>> {
        let (tx, rx) = oneshot::channel();
        self.shared.send_wait(self.coroutine, tx);
        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Ok(()),
            }
        }
    }

    /// True while any reducer hook has uncommitted pending state.
    pub fn is_update_pending(&self) -> bool {
        self.hooks
            .iter()
            .any(|hook| matches!(hook, Hook::Reducer(core) if core.is_pending()))
    }

    pub fn get_context_value<T: 'static>(&self) -> Option<Rc<T>> {
        self.scope.get_context_value::<T>()
    }

    pub fn set_context_value<T: 'static>(&self, value: T) {
        self.scope.set_context_value(value);
    }

    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    /// Append the finalizer sentinel. Hook calls after this throw.
    pub fn finalize(&mut self) -> Result<(), HookError> {
        if self.finalized {
            return Ok(());
        }
        let position = self.cursor;
        if position == self.hooks.len() {
            self.hooks.push(Hook::Finalizer);
        } else if !matches!(self.hooks[position], Hook::Finalizer) {
            return Err(HookError::UnexpectedHookType {
                position,
                expected: "finalizer",
                found: self.hooks[position].type_name(),
            });
        }
        self.cursor += 1;
        self.finalized = true;
        Ok(())
    }
}

struct CallbackCell<A>(Rc<dyn Fn(A)>);

impl<A> Clone for CallbackCell<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
