//! Clock-driven timers for pushing and polling.
//!
//! Neither timer owns a thread; callers pass `now` on every tick.

use super::Instant;
use std::time::Duration;

/// Fires once after triggers stop arriving for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    running: bool,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop and forget any pending deadline.
    pub fn stop(&mut self) {
        self.running = false;
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drop a pending deadline but keep accepting triggers.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Restart the quiet period from `now`. Ignored while stopped.
    pub fn trigger(&mut self, now: Instant) {
        if self.running {
            self.deadline = Some(now + self.delay);
        }
    }

    /// True exactly once when the quiet period has elapsed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Fires every `interval`, starting one interval after `start`.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    next: Option<Instant>,
}

impl PollSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// True when a poll is due. Missed intervals collapse into one poll.
    pub fn fire(&mut self, now: Instant) -> bool {
        let Some(next) = self.next else {
            return false;
        };
        if now < next {
            return false;
        }
        let mut upcoming = next + self.interval;
        while upcoming <= now {
            upcoming += self.interval;
        }
        self.next = Some(upcoming);
        true
    }
}
