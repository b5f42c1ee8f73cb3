use crate::backend::{Backend, CoreBackend};
use crate::error::{HydrationError, RenderError, TemplateError};
use crate::hydration::HydrationWalker;
use crate::part::Part;
use crate::scheduler::{
    send_schedule, CommitPhase, Coroutine, CoroutineId, Effect, HandleList, Lanes, Priority,
    ScheduleOptions, SchedulerMsg, UpdateFrame, UpdateHandle, UpdateWaiter,
};
use crate::scope::Scope;
use crate::slot::Slot;
use crate::template::{Template, TemplateMode, TemplateValue};
use crate::value::Value;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{pin_mut, StreamExt};
use rustc_hash::{FxHashMap, FxHashSet};
use slab::Slab;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use weft_dom::{dispatch_event, Document, DomEvent, Namespace, NodeId, NodeType};

#[derive(PartialEq, Eq, Hash)]
struct TemplateKey {
    mode: TemplateMode,
    strings: Vec<Box<str>>,
}

/// State shared between the runtime, its bindings and its dispatchers: the
/// document, the back-end, the scheduler channel, the coroutine arena and
/// the template cache. No process-wide globals; everything is per runtime.
pub struct RuntimeShared {
    document: Rc<RefCell<Document>>,
    backend: Rc<dyn Backend>,
    sender: UnboundedSender<SchedulerMsg>,
    coroutines: RefCell<Slab<Weak<RefCell<dyn Coroutine>>>>,
    templates: RefCell<FxHashMap<TemplateKey, Rc<Template>>>,
    placeholder: Box<str>,
    id_counter: Cell<u64>,
    frame_counter: Cell<u64>,
}

impl RuntimeShared {
    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.document
    }

    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    pub(crate) fn sender(&self) -> UnboundedSender<SchedulerMsg> {
        self.sender.clone()
    }

    /// Raise an update for a registered coroutine. Safe to call from
    /// anywhere on the main task; the runtime folds it in before its next
    /// pass.
    pub fn schedule_update(&self, coroutine: CoroutineId, options: ScheduleOptions) {
        send_schedule(&self.sender, coroutine, options);
    }

    pub(crate) fn send_wait(&self, coroutine: CoroutineId, waiter: UpdateWaiter) {
        let _ = self
            .sender
            .unbounded_send(SchedulerMsg::Wait { coroutine, waiter });
    }

    /// The coroutine arena holds weak entries, so a dropped binding simply
    /// turns its queued handles into no-ops.
    pub fn register_coroutine(&self, coroutine: &Rc<RefCell<dyn Coroutine>>) -> CoroutineId {
        CoroutineId(self.coroutines.borrow_mut().insert(Rc::downgrade(coroutine)))
    }

    pub fn unregister_coroutine(&self, id: CoroutineId) {
        let mut coroutines = self.coroutines.borrow_mut();
        if coroutines.contains(id.0) {
            coroutines.remove(id.0);
        }
    }

    pub(crate) fn get_coroutine(&self, id: CoroutineId) -> Option<Rc<RefCell<dyn Coroutine>>> {
        self.coroutines.borrow().get(id.0).and_then(Weak::upgrade)
    }

    /// Monotonic counter backing `use_id`.
    pub fn next_id(&self) -> u64 {
        let id = self.id_counter.get();
        self.id_counter.set(id + 1);
        id
    }

    pub(crate) fn next_frame_id(&self) -> u64 {
        let id = self.frame_counter.get();
        self.frame_counter.set(id + 1);
        id
    }

    /// Compile-or-reuse a template for a tagged-template value. The cache
    /// is keyed by the post-splice strings and mode, so re-renders of the
    /// same literal never re-parse.
    pub(crate) fn template(&self, value: &TemplateValue) -> Result<Rc<Template>, TemplateError> {
        let key = TemplateKey {
            mode: value.mode,
            strings: value.strings.as_ref().clone(),
        };
        if let Some(template) = self.templates.borrow().get(&key) {
            return Ok(template.clone());
        }
        let strings: Vec<&str> = value.strings.iter().map(|s| &**s).collect();
        let template = {
            let mut doc = self.document.borrow_mut();
            Template::compile(
                &mut doc,
                &strings,
                value.binds.len(),
                &self.placeholder,
                value.mode,
            )?
        };
        let template = Rc::new(template);
        self.templates.borrow_mut().insert(key, template.clone());
        Ok(template)
    }
}

/// The render-pass context handed through connect/reconcile: the shared
/// runtime state, the open frame, and the lexical scope.
pub struct UpdateContext<'a> {
    pub shared: &'a Rc<RuntimeShared>,
    pub frame: &'a mut UpdateFrame,
    pub scope: Rc<Scope>,
}

impl<'a> UpdateContext<'a> {
    pub fn document(&self) -> Rc<RefCell<Document>> {
        self.shared.document.clone()
    }

    pub fn enqueue(&mut self, phase: CommitPhase, effect: Effect) {
        self.frame.enqueue(phase, effect);
    }

    /// Run `f` with the same frame under a different lexical scope.
    pub fn with_scope<R>(
        &mut self,
        scope: Rc<Scope>,
        f: impl FnOnce(&mut UpdateContext<'_>) -> R,
    ) -> R {
        let mut child = UpdateContext {
            shared: self.shared,
            frame: &mut *self.frame,
            scope,
        };
        f(&mut child)
    }

    /// The active hydration walker, if this subtree is adopting
    /// pre-rendered markup.
    pub fn hydration_walker(&self) -> Result<Rc<RefCell<HydrationWalker>>, RenderError> {
        match self.scope.hydration_walker() {
            Some(walker) if !walker.borrow().is_finished() => Ok(walker),
            _ => Err(RenderError::Hydration(HydrationError::Mismatch {
                expected: NodeType::Comment,
                found: "no active hydration boundary".to_string(),
            })),
        }
    }
}

/// The commit-phase context: effects mutate the document through this.
pub struct CommitContext<'a> {
    pub shared: &'a Rc<RuntimeShared>,
    pub phase: CommitPhase,
    pub frame_id: u64,
}

impl CommitContext<'_> {
    pub fn document(&self) -> Rc<RefCell<Document>> {
        self.shared.document.clone()
    }
}

/// A mounted top-level value: the root slot plus its anchor marker.
pub struct Root {
    container: NodeId,
    part: Part,
    slot: Option<Slot>,
    scope: Rc<Scope>,
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Root({:?})", self.container)
    }
}

impl Root {
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }
}

/// Owns the update engine: the scheduler channel's receiving end, the
/// pending-handle list, and the shared state everything else hangs off.
pub struct Runtime {
    shared: Rc<RuntimeShared>,
    receiver: UnboundedReceiver<SchedulerMsg>,
    handles: HandleList,
    requested: FxHashSet<Priority>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_backend(Rc::new(CoreBackend))
    }

    pub fn with_backend(backend: Rc<dyn Backend>) -> Self {
        Self::with_backend_and_placeholder(backend, "weft")
    }

    pub fn with_backend_and_placeholder(backend: Rc<dyn Backend>, placeholder: &str) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            shared: Rc::new(RuntimeShared {
                document: Rc::new(RefCell::new(Document::new())),
                backend,
                sender,
                coroutines: RefCell::new(Slab::new()),
                templates: RefCell::new(FxHashMap::default()),
                placeholder: Box::from(placeholder),
                id_counter: Cell::new(0),
                frame_counter: Cell::new(0),
            }),
            receiver,
            handles: HandleList::default(),
            requested: FxHashSet::default(),
        }
    }

    pub fn shared(&self) -> &Rc<RuntimeShared> {
        &self.shared
    }

    pub fn document(&self) -> Rc<RefCell<Document>> {
        self.shared.document.clone()
    }

    /// Convenience: an empty `<div>` appended to the document root.
    pub fn create_container(&self) -> NodeId {
        let mut doc = self.shared.document.borrow_mut();
        let container = doc.create_element("div", Namespace::Html);
        let root = doc.root();
        doc.append(root, container);
        container
    }

    /// Mount a value into a container, rendering and committing
    /// synchronously.
    pub fn mount(&mut self, value: Value, container: NodeId) -> Result<Root, RenderError> {
        let marker = {
            let mut doc = self.shared.document.borrow_mut();
            let marker = doc.create_comment("");
            doc.append(container, marker);
            marker
        };
        let mut root = Root {
            container,
            part: Part::child_node(marker, Namespace::Html),
            slot: None,
            scope: Scope::root(),
        };
        self.render_root(&mut root, value)?;
        Ok(root)
    }

    /// Adopt a pre-rendered container instead of creating fresh nodes.
    pub fn hydrate(&mut self, value: Value, container: NodeId) -> Result<Root, RenderError> {
        let walker = {
            let doc = self.shared.document.borrow();
            Rc::new(RefCell::new(HydrationWalker::new(&doc, container)))
        };
        let scope = Scope::root();
        scope.set_hydration_walker(walker.clone());

        let fresh = self.shared.document.borrow_mut().create_comment("");
        let part = Part::child_node(fresh, Namespace::Html);
        let mut slot_out = None;
        {
            let part = part.clone();
            let slot_out = &mut slot_out;
            self.run_frame(Lanes::SYNC | Lanes::USER_BLOCKING, scope.clone(), move |cx| {
                let mut slot = Slot::resolve(value, part, cx)?;
                slot.hydrate(cx)?;
                *slot_out = Some(slot);
                Ok(())
            })?;
        }

        // The trailing comment is the root marker; swap in our own the
        // same way nested ranges do.
        {
            let doc = self.shared.document.borrow();
            let live = walker.borrow_mut().next_node(&doc, NodeType::Comment)?;
            drop(doc);
            let mut doc = self.shared.document.borrow_mut();
            doc.insert_before(live, fresh);
            doc.detach(live);
        }
        walker.borrow_mut().finish();

        Ok(Root {
            container,
            part,
            slot: slot_out,
            scope,
        })
    }

    /// Drive a new value through an existing root.
    pub fn update(&mut self, root: &mut Root, value: Value) -> Result<(), RenderError> {
        self.render_root(root, value)
    }

    /// Disconnect the root and roll its tree back out of the document.
    pub fn unmount(&mut self, root: &mut Root) -> Result<(), RenderError> {
        if let Some(mut slot) = root.slot.take() {
            let scope = root.scope.clone();
            self.run_frame(Lanes::SYNC | Lanes::USER_BLOCKING, scope, |cx| {
                slot.disconnect(cx);
                Ok(())
            })?;
        }
        self.shared.document.borrow_mut().detach(root.part.node());
        Ok(())
    }

    fn render_root(&mut self, root: &mut Root, value: Value) -> Result<(), RenderError> {
        let part = root.part.clone();
        let scope = root.scope.clone();
        let slot_ref = &mut root.slot;
        self.run_frame(Lanes::SYNC | Lanes::USER_BLOCKING, scope, move |cx| {
            match slot_ref {
                Some(slot) => {
                    slot.reconcile(value, cx)?;
                }
                None => {
                    let mut slot = Slot::resolve(value, part, cx)?;
                    slot.connect(cx)?;
                    *slot_ref = Some(slot);
                }
            }
            Ok(())
        })
    }

    /// Forward a platform event into the tree.
    pub fn handle_event(&self, target: NodeId, event: &DomEvent) {
        dispatch_event(&self.shared.document, target, event);
    }

    // ------------------------------------------------------------------
    // The work loop
    // ------------------------------------------------------------------

    fn drain_messages(&mut self) {
        while let Ok(Some(msg)) = self.receiver.try_next() {
            self.apply_message(msg);
        }
    }

    fn apply_message(&mut self, msg: SchedulerMsg) {
        match msg {
            SchedulerMsg::Schedule { coroutine, options } => {
                let priority = options
                    .priority
                    .unwrap_or_else(|| self.shared.backend.current_priority());
                let lanes = options.schedule_lanes(priority);
                match self.shared.get_coroutine(coroutine) {
                    Some(live) => live.borrow_mut().add_pending_lanes(lanes),
                    None => return,
                }
                tracing::trace!("scheduling {coroutine:?} on {lanes:?}");
                self.handles.upsert(coroutine, lanes);
                if self.requested.insert(priority) {
                    // Ask the back-end for a future main-task run; hosts
                    // drive poll_work/run_until_idle from the grant.
                    drop(self.shared.backend.request_callback(priority));
                }
            }
            SchedulerMsg::Wait { coroutine, waiter } => {
                self.handles.add_waiter(coroutine, waiter);
            }
        }
    }

    pub fn has_work(&mut self) -> bool {
        self.drain_messages();
        self.handles.has_work(None)
    }

    fn process_handle(
        &mut self,
        handle: UpdateHandle,
        extra_lanes: Lanes,
    ) -> Result<(), Rc<RenderError>> {
        let mut handle = handle;
        let Some(coroutine) = self.shared.get_coroutine(handle.coroutine) else {
            // The binding is gone; the promise still resolves.
            handle.resolve(Ok(()));
            return Ok(());
        };
        let pending = coroutine.borrow().pending_lanes();
        if !pending.intersects(handle.lanes) {
            // Cancelled: an earlier flush already claimed these lanes.
            handle.resolve(Ok(()));
            return Ok(());
        }
        handle.running = true;

        let flush = handle.lanes.flush_lanes() | extra_lanes;
        tracing::trace!("working {:?} with {flush:?}", handle.coroutine);
        let result = self.run_frame(flush, Scope::root(), |cx| {
            cx.frame.enqueue_coroutine(coroutine);
            Ok(())
        });
        self.requested.clear();
        match result {
            Ok(()) => {
                handle.resolve(Ok(()));
                Ok(())
            }
            Err(err) => {
                let err = Rc::new(err);
                handle.resolve(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Drain all pending work on the current turn, never yielding.
    pub fn poll_work(&mut self) -> Result<(), Rc<RenderError>> {
        loop {
            self.drain_messages();
            let Some(handle) = self.handles.pop_next(None) else {
                return Ok(());
            };
            self.process_handle(handle, Lanes::NONE)?;
        }
    }

    /// Synchronously flush exactly the handles whose lanes intersect
    /// `lanes`, leaving the rest pending.
    pub fn flush_sync(&mut self, lanes: Lanes) -> Result<(), Rc<RenderError>> {
        loop {
            self.drain_messages();
            let Some(handle) = self.handles.pop_next(Some(lanes)) else {
                return Ok(());
            };
            self.process_handle(handle, Lanes::SYNC)?;
        }
    }

    /// Work handles down cooperatively: between handles of concurrent
    /// frames the back-end may ask for the main task back.
    pub async fn run_until_idle(&mut self) -> Result<(), Rc<RenderError>> {
        loop {
            self.drain_messages();
            let Some(handle) = self.handles.pop_next(None) else {
                return Ok(());
            };
            let concurrent = handle.lanes.intersects(Lanes::CONCURRENT);
            self.process_handle(handle, Lanes::NONE)?;
            if concurrent && self.shared.backend.should_yield() {
                self.shared.backend.yield_to_main().await;
            }
        }
    }

    /// Park until the scheduler channel produces something. Cancel-safe.
    pub async fn wait_for_work(&mut self) {
        if self.has_work() {
            return;
        }
        if let Some(msg) = self.receiver.next().await {
            self.apply_message(msg);
        }
    }

    /// Process whatever is ready without an executor: polls the
    /// cooperative loop once with a no-op waker, so a pending yield simply
    /// leaves the rest queued.
    pub fn work_immediate(&mut self) -> Result<(), Rc<RenderError>> {
        let waker = futures_util::task::noop_waker();
        let mut task_cx = std::task::Context::from_waker(&waker);
        let fut = self.run_until_idle();
        pin_mut!(fut);
        match fut.poll(&mut task_cx) {
            std::task::Poll::Ready(result) => result,
            std::task::Poll::Pending => Ok(()),
        }
    }

    fn run_frame(
        &mut self,
        lanes: Lanes,
        scope: Rc<Scope>,
        work: impl FnOnce(&mut UpdateContext<'_>) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let mut frame = UpdateFrame::new(self.shared.next_frame_id(), lanes);
        {
            let mut cx = UpdateContext {
                shared: &self.shared,
                frame: &mut frame,
                scope,
            };
            work(&mut cx)?;
            // Drain child coroutines FIFO into the same frame.
            loop {
                let Some(coroutine) = cx.frame.pending_coroutines.pop_front() else {
                    break;
                };
                let flushed = cx.frame.lanes;
                let result = coroutine.borrow_mut().resume(&mut cx);
                coroutine.borrow_mut().clear_pending_lanes(flushed);
                result?;
            }
        }
        self.commit_frame(frame)
    }

    fn commit_frame(&mut self, frame: UpdateFrame) -> Result<(), RenderError> {
        let UpdateFrame {
            id,
            lanes,
            mutation_effects,
            layout_effects,
            passive_effects,
            pending_coroutines: _,
        } = frame;

        let backend = self.shared.backend.clone();
        let shared = self.shared.clone();
        let mut result: Result<(), RenderError> = Ok(());
        {
            let commit: Box<dyn FnOnce() + '_> = {
                let backend = backend.clone();
                let shared = shared.clone();
                let result = &mut result;
                Box::new(move || {
                    let mut cx = CommitContext {
                        shared: &shared,
                        phase: CommitPhase::Mutation,
                        frame_id: id,
                    };
                    if let Err(err) =
                        backend.commit_effects(mutation_effects, CommitPhase::Mutation, &mut cx)
                    {
                        *result = Err(err);
                        return;
                    }
                    let mut cx = CommitContext {
                        shared: &shared,
                        phase: CommitPhase::Layout,
                        frame_id: id,
                    };
                    if let Err(err) =
                        backend.commit_effects(layout_effects, CommitPhase::Layout, &mut cx)
                    {
                        *result = Err(err);
                    }
                })
            };
            if lanes.intersects(Lanes::VIEW_TRANSITION) {
                // The visual transition encloses mutation and layout;
                // passive effects run outside it.
                backend.start_view_transition(commit);
            } else {
                commit();
            }
        }
        result?;

        let mut cx = CommitContext {
            shared: &self.shared,
            phase: CommitPhase::Passive,
            frame_id: id,
        };
        self.shared
            .backend
            .commit_effects(passive_effects, CommitPhase::Passive, &mut cx)
    }
}
