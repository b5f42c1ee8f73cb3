//! The update engine's moving parts: priority lanes, update frames, and the
//! handle list the runtime works down.
//!
//! Scheduling is cooperative and single-threaded. Dispatchers never touch
//! the engine directly; they send a [`SchedulerMsg`] over the runtime's
//! channel and the runtime folds it into the handle list before the next
//! pass (the same shape as a virtual-dom scheduler channel).

mod frame;
mod lanes;

pub use frame::{CommitPhase, Effect, UpdateFrame};
pub use lanes::{Lanes, Priority, ScheduleOptions};

use crate::error::RenderError;
use crate::runtime::UpdateContext;
use futures_channel::oneshot;
use indexmap::IndexMap;
use std::rc::Rc;

/// Identifies a registered coroutine in the runtime's arena.
///
/// Bindings store this id rather than a pointer back into the scheduler,
/// which breaks the component → hook → dispatch → scheduler cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoroutineId(pub usize);

/// A resumable unit of work. A component binding is itself a coroutine.
pub trait Coroutine {
    fn pending_lanes(&self) -> Lanes;
    fn add_pending_lanes(&mut self, lanes: Lanes);
    fn clear_pending_lanes(&mut self, lanes: Lanes);

    /// Run one synchronous render pass. May enqueue child coroutines and
    /// effects on the frame; must not mutate the live tree.
    fn resume(&mut self, cx: &mut UpdateContext<'_>) -> Result<(), RenderError>;
}

pub(crate) enum SchedulerMsg {
    Schedule {
        coroutine: CoroutineId,
        options: ScheduleOptions,
    },
    Wait {
        coroutine: CoroutineId,
        waiter: UpdateWaiter,
    },
}

pub(crate) fn send_schedule(
    sender: &futures_channel::mpsc::UnboundedSender<SchedulerMsg>,
    coroutine: CoroutineId,
    options: ScheduleOptions,
) {
    let _ = sender.unbounded_send(SchedulerMsg::Schedule { coroutine, options });
}

pub(crate) type UpdateWaiter = oneshot::Sender<Result<(), Rc<RenderError>>>;

/// One queued unit of scheduler work for a coroutine.
pub(crate) struct UpdateHandle {
    pub coroutine: CoroutineId,
    pub lanes: Lanes,
    pub running: bool,
    pub waiters: Vec<UpdateWaiter>,
}

impl UpdateHandle {
    pub fn resolve(&mut self, result: Result<(), Rc<RenderError>>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }
}

/// The pending-handle list: one handle per coroutine, insertion ordered.
#[derive(Default)]
pub(crate) struct HandleList {
    handles: IndexMap<CoroutineId, UpdateHandle>,
}

impl HandleList {
    /// Merge a schedule request: upgrade the lanes of an existing
    /// not-yet-running handle, or append a new one.
    pub fn upsert(&mut self, coroutine: CoroutineId, lanes: Lanes) {
        match self.handles.get_mut(&coroutine) {
            Some(handle) if !handle.running => handle.lanes |= lanes,
            _ => {
                self.handles.insert(
                    coroutine,
                    UpdateHandle {
                        coroutine,
                        lanes,
                        running: false,
                        waiters: Vec::new(),
                    },
                );
            }
        }
    }

    /// Register a waiter on the next update of `coroutine`, creating a
    /// placeholder entry if nothing is queued for it.
    pub fn add_waiter(&mut self, coroutine: CoroutineId, waiter: UpdateWaiter) {
        match self.handles.get_mut(&coroutine) {
            Some(handle) if !handle.running => handle.waiters.push(waiter),
            _ => {
                self.handles.insert(
                    coroutine,
                    UpdateHandle {
                        coroutine,
                        lanes: Lanes::NONE,
                        running: false,
                        waiters: vec![waiter],
                    },
                );
            }
        }
    }

    /// Pop the next handle to work on: highest priority first, FIFO within
    /// a priority. Handles restricted by `filter` (for `flush_sync`) are
    /// left in place when they do not intersect it.
    pub fn pop_next(&mut self, filter: Option<Lanes>) -> Option<UpdateHandle> {
        let mut best: Option<(usize, Priority)> = None;
        for (index, handle) in self.handles.values().enumerate() {
            if let Some(filter) = filter {
                if !handle.lanes.intersects(filter) {
                    continue;
                }
            }
            let Some(priority) = handle.lanes.highest_priority() else {
                // A waiter-only placeholder; claim it at the lowest urgency.
                if best.is_none() {
                    best = Some((index, Priority::Background));
                }
                continue;
            };
            match best {
                Some((_, current)) if current <= priority => {}
                _ => best = Some((index, priority)),
            }
        }
        best.map(|(index, _)| {
            self.handles
                .shift_remove_index(index)
                .map(|(_, handle)| handle)
                .expect("handle index is in range")
        })
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn has_work(&self, filter: Option<Lanes>) -> bool {
        match filter {
            Some(filter) => self
                .handles
                .values()
                .any(|handle| handle.lanes.intersects(filter)),
            None => !self.handles.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_prefers_higher_priority() {
        let mut list = HandleList::default();
        list.upsert(CoroutineId(0), Lanes::BACKGROUND);
        list.upsert(CoroutineId(1), Lanes::USER_BLOCKING);

        let first = list.pop_next(None).unwrap();
        assert_eq!(first.coroutine, CoroutineId(1));
        let second = list.pop_next(None).unwrap();
        assert_eq!(second.coroutine, CoroutineId(0));
        assert!(list.pop_next(None).is_none());
    }

    #[test]
    fn pop_is_fifo_within_a_priority() {
        let mut list = HandleList::default();
        list.upsert(CoroutineId(3), Lanes::USER_VISIBLE);
        list.upsert(CoroutineId(7), Lanes::USER_VISIBLE);
        assert_eq!(list.pop_next(None).unwrap().coroutine, CoroutineId(3));
        assert_eq!(list.pop_next(None).unwrap().coroutine, CoroutineId(7));
    }

    #[test]
    fn upsert_merges_lanes_for_pending_handles() {
        let mut list = HandleList::default();
        list.upsert(CoroutineId(0), Lanes::BACKGROUND);
        list.upsert(CoroutineId(0), Lanes::USER_BLOCKING);
        let handle = list.pop_next(None).unwrap();
        assert!(handle.lanes.contains(Lanes::BACKGROUND | Lanes::USER_BLOCKING));
        assert!(list.is_empty());
    }

    #[test]
    fn filtered_pop_leaves_other_lanes_pending() {
        let mut list = HandleList::default();
        list.upsert(CoroutineId(0), Lanes::BACKGROUND);
        list.upsert(CoroutineId(1), Lanes::USER_BLOCKING);

        let popped = list.pop_next(Some(Lanes::USER_BLOCKING)).unwrap();
        assert_eq!(popped.coroutine, CoroutineId(1));
        assert!(list.pop_next(Some(Lanes::USER_BLOCKING)).is_none());
        assert!(list.has_work(None));
    }
}
