//! Cooperative single-queue scheduler with a virtual clock.
//!
//! All coordination in the engine runs as tasks on one [`Scheduler`]:
//! request continuations, deferred notifications, and timers. Nothing ever
//! blocks; a pipeline that must wait subscribes to a signal and returns.
//!
//! Time is measured in abstract [`Ticks`]. The clock only moves when the
//! host calls [`Scheduler::advance`], which makes timer-driven behaviour
//! (such as "blocked" notifications) deterministic under test.
//!
//! # Turns
//!
//! A *turn* is the execution of one task. Tasks queued during a turn run in
//! later turns, in FIFO order. Timers fire in due order, ties broken by the
//! order they were scheduled.

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Unit of virtual time.
pub type Ticks = u64;

type Task = Box<dyn FnOnce() + Send>;

/// Handle to a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    due: Ticks,
    sequence: u64,
}

impl TimerHandle {
    /// Returns the instant at which the timer is due.
    #[must_use]
    pub const fn due(&self) -> Ticks {
        self.due
    }
}

struct SchedulerState {
    now: Ticks,
    queue: VecDeque<Task>,
    // Keyed by (due, sequence): earliest first, FIFO among equal deadlines
    timers: BTreeMap<(Ticks, u64), Task>,
    sequence: u64,
    turns: u64,
}

/// A cooperative scheduler.
///
/// Cloning a `Scheduler` yields another handle to the same queue. The
/// internal lock is never held while a task runs, so tasks may freely
/// spawn, schedule, and cancel.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    /// Creates a scheduler at tick 0 with no pending work.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                now: 0,
                queue: VecDeque::new(),
                timers: BTreeMap::new(),
                sequence: 0,
                turns: 0,
            })),
        }
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> Ticks {
        self.state.lock().now
    }

    /// Returns the number of turns executed so far.
    pub fn turns(&self) -> u64 {
        self.state.lock().turns
    }

    /// Queues a task for a later turn.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.state.lock().queue.push_back(Box::new(task));
    }

    /// Schedules a task to run once `delay` ticks have elapsed.
    pub fn schedule_after<F>(&self, delay: Ticks, task: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        state.sequence += 1;
        let handle = TimerHandle {
            due: state.now.saturating_add(delay),
            sequence: state.sequence,
        };
        state
            .timers
            .insert((handle.due, handle.sequence), Box::new(task));
        handle
    }

    /// Cancels a timer.
    ///
    /// Returns true if the timer was still pending.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.state
            .lock()
            .timers
            .remove(&(handle.due, handle.sequence))
            .is_some()
    }

    /// Returns true if the timer has neither fired nor been cancelled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.state
            .lock()
            .timers
            .contains_key(&(handle.due, handle.sequence))
    }

    /// Returns the number of queued tasks.
    pub fn pending_tasks(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns the number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Returns true if no tasks are queued.
    pub fn is_idle(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Runs a single queued task.
    ///
    /// Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        let task = {
            let mut state = self.state.lock();
            let task = state.queue.pop_front();
            if task.is_some() {
                state.turns += 1;
            }
            task
        };

        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs queued tasks until the queue is empty.
    ///
    /// Timers do not fire. Returns the number of turns executed.
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        while self.run_next() {
            executed += 1;
        }
        executed
    }

    /// Advances the clock by `ticks`, firing every timer that falls due.
    ///
    /// Queued work is drained before each timer fires and after the last
    /// one, so the scheduler is idle at the target instant. Returns the
    /// number of turns executed (timer callbacks included).
    pub fn advance(&self, ticks: Ticks) -> usize {
        let target = self.now().saturating_add(ticks);
        let mut executed = self.run_until_idle();

        loop {
            let timer = {
                let mut state = self.state.lock();
                let due = match state.timers.keys().next() {
                    Some(&(due, seq)) if due <= target => Some((due, seq)),
                    _ => None,
                };
                due.and_then(|key| {
                    let task = state.timers.remove(&key)?;
                    state.now = state.now.max(key.0);
                    state.turns += 1;
                    Some(task)
                })
            };

            match timer {
                Some(task) => {
                    task();
                    executed += 1;
                    executed += self.run_until_idle();
                }
                None => break,
            }
        }

        {
            let mut state = self.state.lock();
            state.now = state.now.max(target);
        }
        executed + self.run_until_idle()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("queued", &state.queue.len())
            .field("timers", &state.timers.len())
            .field("turns", &state.turns)
            .finish()
    }
}
