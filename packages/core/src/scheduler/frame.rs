use crate::binding::BindingRef;
use crate::error::RenderError;
use crate::runtime::CommitContext;
use crate::scheduler::{Coroutine, Lanes};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// The three commit phases, in the order they drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitPhase {
    Mutation,
    Layout,
    Passive,
}

/// One deferred unit of DOM work, collected during a resume and drained at
/// commit time.
pub enum Effect {
    Commit(BindingRef),
    Rollback(BindingRef),
    Run(Box<dyn FnOnce(&mut CommitContext<'_>) -> Result<(), RenderError>>),
}

impl Effect {
    pub fn run(self, cx: &mut CommitContext<'_>) -> Result<(), RenderError> {
        match self {
            Effect::Commit(binding) => binding.borrow_mut().commit(cx),
            Effect::Rollback(binding) => binding.borrow_mut().rollback(cx),
            Effect::Run(callback) => callback(cx),
        }
    }
}

/// One scheduler pass: the coroutines resumed in it and the effects they
/// produced, bucketed by phase.
pub struct UpdateFrame {
    pub id: u64,
    pub lanes: Lanes,
    pub pending_coroutines: VecDeque<Rc<RefCell<dyn Coroutine>>>,
    pub mutation_effects: Vec<Effect>,
    pub layout_effects: Vec<Effect>,
    pub passive_effects: Vec<Effect>,
}

impl UpdateFrame {
    pub fn new(id: u64, lanes: Lanes) -> Self {
        Self {
            id,
            lanes,
            pending_coroutines: VecDeque::new(),
            mutation_effects: Vec::new(),
            layout_effects: Vec::new(),
            passive_effects: Vec::new(),
        }
    }

    pub fn enqueue(&mut self, phase: CommitPhase, effect: Effect) {
        match phase {
            CommitPhase::Mutation => self.mutation_effects.push(effect),
            CommitPhase::Layout => self.layout_effects.push(effect),
            CommitPhase::Passive => self.passive_effects.push(effect),
        }
    }

    /// Queue a coroutine to resume within this frame, FIFO.
    pub fn enqueue_coroutine(&mut self, coroutine: Rc<RefCell<dyn Coroutine>>) {
        self.pending_coroutines.push_back(coroutine);
    }
}
