use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Priority classes for scheduled work, highest first.
///
/// The goal of the lane system is latency management: "flashier" changes
/// preempt subtler ones between coroutine resumes, never mid-resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    UserBlocking,
    UserVisible,
    Background,
}

/// A bitmask of priority lanes plus the two mode bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lanes(u32);

impl Lanes {
    pub const NONE: Lanes = Lanes(0);
    pub const SYNC: Lanes = Lanes(1 << 0);
    pub const USER_BLOCKING: Lanes = Lanes(1 << 1);
    pub const USER_VISIBLE: Lanes = Lanes(1 << 2);
    pub const BACKGROUND: Lanes = Lanes(1 << 3);
    pub const VIEW_TRANSITION: Lanes = Lanes(1 << 4);
    pub const CONCURRENT: Lanes = Lanes(1 << 5);

    pub const ALL: Lanes = Lanes(
        Self::SYNC.0
            | Self::USER_BLOCKING.0
            | Self::USER_VISIBLE.0
            | Self::BACKGROUND.0
            | Self::VIEW_TRANSITION.0
            | Self::CONCURRENT.0,
    );

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Lanes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Lanes) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: Lanes) {
        self.0 &= !other.0;
    }

    pub fn priority_lane(priority: Priority) -> Lanes {
        match priority {
            Priority::UserBlocking => Lanes::USER_BLOCKING,
            Priority::UserVisible => Lanes::USER_VISIBLE,
            Priority::Background => Lanes::BACKGROUND,
        }
    }

    /// The most urgent priority present in this mask, if any priority lane
    /// is set at all.
    pub fn highest_priority(self) -> Option<Priority> {
        if self.intersects(Lanes::USER_BLOCKING) {
            Some(Priority::UserBlocking)
        } else if self.intersects(Lanes::USER_VISIBLE) {
            Some(Priority::UserVisible)
        } else if self.intersects(Lanes::BACKGROUND) {
            Some(Priority::Background)
        } else {
            None
        }
    }

    /// The mask a frame flushes when scheduled at `self`: flushing a lane
    /// implies flushing everything more urgent, so a background frame also
    /// drains user-blocking and user-visible work for its coroutine.
    pub fn flush_lanes(self) -> Lanes {
        let mut out = self;
        if self.intersects(Lanes::BACKGROUND) {
            out |= Lanes::USER_BLOCKING | Lanes::USER_VISIBLE;
        }
        if self.intersects(Lanes::USER_VISIBLE) {
            out |= Lanes::USER_BLOCKING;
        }
        out
    }
}

impl BitOr for Lanes {
    type Output = Lanes;
    fn bitor(self, rhs: Lanes) -> Lanes {
        Lanes(self.0 | rhs.0)
    }
}

impl BitOrAssign for Lanes {
    fn bitor_assign(&mut self, rhs: Lanes) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (lane, name) in [
            (Lanes::SYNC, "sync"),
            (Lanes::USER_BLOCKING, "user-blocking"),
            (Lanes::USER_VISIBLE, "user-visible"),
            (Lanes::BACKGROUND, "background"),
            (Lanes::VIEW_TRANSITION, "view-transition"),
            (Lanes::CONCURRENT, "concurrent"),
        ] {
            if self.intersects(lane) {
                names.push(name);
            }
        }
        write!(f, "Lanes({})", names.join("|"))
    }
}

/// Options accepted by `schedule_update`, `force_update` and dispatchers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduleOptions {
    /// Explicit priority; defaults to the back-end's current task priority.
    pub priority: Option<Priority>,
    pub view_transition: bool,
    pub concurrent: bool,
}

impl ScheduleOptions {
    pub fn background() -> Self {
        Self {
            priority: Some(Priority::Background),
            ..Default::default()
        }
    }

    pub fn user_blocking() -> Self {
        Self {
            priority: Some(Priority::UserBlocking),
            ..Default::default()
        }
    }

    /// The lanes a schedule request sets. Non-escalating: only the
    /// specific requested lane is recorded; escalation happens at flush
    /// time via [`Lanes::flush_lanes`].
    pub fn schedule_lanes(self, fallback: Priority) -> Lanes {
        let mut lanes = Lanes::priority_lane(self.priority.unwrap_or(fallback));
        if self.view_transition {
            lanes |= Lanes::VIEW_TRANSITION;
        }
        if self.concurrent {
            lanes |= Lanes::CONCURRENT;
        }
        lanes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_lanes_escalate() {
        assert_eq!(
            Lanes::USER_BLOCKING.flush_lanes(),
            Lanes::USER_BLOCKING
        );
        assert!(Lanes::USER_VISIBLE
            .flush_lanes()
            .contains(Lanes::USER_BLOCKING | Lanes::USER_VISIBLE));
        assert!(Lanes::BACKGROUND
            .flush_lanes()
            .contains(Lanes::USER_BLOCKING | Lanes::USER_VISIBLE | Lanes::BACKGROUND));
    }

    #[test]
    fn schedule_lanes_do_not_escalate() {
        let lanes = ScheduleOptions::background().schedule_lanes(Priority::UserVisible);
        assert!(lanes.intersects(Lanes::BACKGROUND));
        assert!(!lanes.intersects(Lanes::USER_BLOCKING));
        assert!(!lanes.intersects(Lanes::USER_VISIBLE));
    }

    #[test]
    fn highest_priority_orders_lanes() {
        let lanes = Lanes::BACKGROUND | Lanes::USER_BLOCKING;
        assert_eq!(lanes.highest_priority(), Some(Priority::UserBlocking));
        assert_eq!(Lanes::VIEW_TRANSITION.highest_priority(), None);
    }
}
