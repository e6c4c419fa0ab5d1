//! Named notification channels and resolve-once completions.
//!
//! Every entity in the engine exposes its notifications as a fixed set of
//! [`Signal`]s, each with a declared [`Cardinality`]:
//!
//! - [`Cardinality::Once`] signals fire at most once. The payload is latched,
//!   and a listener that subscribes afterwards is invoked immediately.
//! - [`Cardinality::Repeating`] signals may fire any number of times and only
//!   reach listeners subscribed at the time of emission.
//!
//! [`Completion`] is the resolve-once primitive used by the version-change
//! coordinator: it settles exactly once, successfully or with an error, and
//! supports any number of independent waiters.
//!
//! Listeners are always invoked with no internal lock held, so they may
//! subscribe, unsubscribe, or emit on the same signal.

use crate::error::CoreError;
use parking_lot::Mutex;
use std::sync::Arc;

/// How many times a signal may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Fires at most once; the payload is latched.
    Once,
    /// Fires zero or more times.
    Repeating,
}

/// Identifies a listener so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: ListenerId,
    callback: Listener<T>,
    once: bool,
}

struct SignalState<T> {
    listeners: Vec<Entry<T>>,
    next_id: u64,
    emitted: usize,
    latched: Option<T>,
}

/// A named notification channel.
pub struct Signal<T> {
    name: &'static str,
    cardinality: Cardinality,
    state: Mutex<SignalState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Creates a signal that fires at most once.
    pub fn once(name: &'static str) -> Self {
        Self::with_cardinality(name, Cardinality::Once)
    }

    /// Creates a signal that may fire repeatedly.
    pub fn repeating(name: &'static str) -> Self {
        Self::with_cardinality(name, Cardinality::Repeating)
    }

    fn with_cardinality(name: &'static str, cardinality: Cardinality) -> Self {
        Self {
            name,
            cardinality,
            state: Mutex::new(SignalState {
                listeners: Vec::new(),
                next_id: 0,
                emitted: 0,
                latched: None,
            }),
        }
    }

    /// Returns the signal's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the signal's cardinality.
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Adds a listener.
    ///
    /// On a `Once` signal that has already fired, the listener is invoked
    /// immediately with the latched payload and is not retained.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add(Arc::new(listener), false)
    }

    /// Adds a listener that is removed after its first invocation.
    pub fn subscribe_once<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let slot = Mutex::new(Some(listener));
        self.add(
            Arc::new(move |payload: &T| {
                if let Some(listener) = slot.lock().take() {
                    listener(payload);
                }
            }),
            true,
        )
    }

    fn add(&self, callback: Listener<T>, once: bool) -> ListenerId {
        let mut state = self.state.lock();
        let id = ListenerId(state.next_id);
        state.next_id += 1;

        if let Some(payload) = state.latched.clone() {
            drop(state);
            callback(&payload);
            return id;
        }

        state.listeners.push(Entry { id, callback, once });
        id
    }

    /// Removes a listener. Returns true if it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|entry| entry.id != id);
        state.listeners.len() != before
    }

    /// Delivers `payload` to every current listener.
    ///
    /// Returns false, without delivering, if this is a `Once` signal that
    /// has already fired.
    pub fn emit(&self, payload: T) -> bool {
        let listeners: Vec<Listener<T>> = {
            let mut state = self.state.lock();
            match self.cardinality {
                Cardinality::Once => {
                    if state.emitted > 0 {
                        return false;
                    }
                    state.latched = Some(payload.clone());
                    state.emitted = 1;
                    std::mem::take(&mut state.listeners)
                        .into_iter()
                        .map(|entry| entry.callback)
                        .collect()
                }
                Cardinality::Repeating => {
                    state.emitted += 1;
                    let snapshot = state
                        .listeners
                        .iter()
                        .map(|entry| Arc::clone(&entry.callback))
                        .collect();
                    state.listeners.retain(|entry| !entry.once);
                    snapshot
                }
            }
        };

        for listener in listeners {
            listener(&payload);
        }
        true
    }

    /// Returns how many times the signal has fired.
    pub fn emit_count(&self) -> usize {
        self.state.lock().emitted
    }

    /// Returns true if a `Once` signal has fired.
    pub fn has_fired(&self) -> bool {
        self.emit_count() > 0
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("cardinality", &self.cardinality)
            .field("listeners", &state.listeners.len())
            .field("emitted", &state.emitted)
            .finish()
    }
}

/// Outcome of a settled [`Completion`].
pub type Settlement = Result<(), CoreError>;

type Waiter = Box<dyn FnOnce(&Settlement) + Send>;

enum CompletionState {
    Pending(Vec<Waiter>),
    Settled(Settlement),
}

/// A resolve-once completion signal with multiple waiters.
///
/// Settling is idempotent: only the first `resolve` or `reject` has any
/// effect. Waiters attached after settlement run immediately, in the
/// caller's turn.
#[derive(Clone)]
pub struct Completion {
    state: Arc<Mutex<CompletionState>>,
}

impl Completion {
    /// Creates a pending completion.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CompletionState::Pending(Vec::new()))),
        }
    }

    /// Creates an already resolved completion.
    pub fn resolved() -> Self {
        Self {
            state: Arc::new(Mutex::new(CompletionState::Settled(Ok(())))),
        }
    }

    /// Creates an already rejected completion.
    pub fn rejected(err: CoreError) -> Self {
        Self {
            state: Arc::new(Mutex::new(CompletionState::Settled(Err(err)))),
        }
    }

    /// Resolves the completion. Returns false if it had already settled.
    pub fn resolve(&self) -> bool {
        self.settle(Ok(()))
    }

    /// Rejects the completion. Returns false if it had already settled.
    pub fn reject(&self, err: CoreError) -> bool {
        self.settle(Err(err))
    }

    fn settle(&self, outcome: Settlement) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            match &mut *state {
                CompletionState::Settled(_) => return false,
                CompletionState::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *state = CompletionState::Settled(outcome.clone());
                    waiters
                }
            }
        };

        for waiter in waiters {
            waiter(&outcome);
        }
        true
    }

    /// Attaches a waiter that runs once the completion settles.
    pub fn on_settled<F>(&self, waiter: F)
    where
        F: FnOnce(&Settlement) + Send + 'static,
    {
        let settled = {
            let mut state = self.state.lock();
            match &mut *state {
                CompletionState::Pending(waiters) => {
                    waiters.push(Box::new(waiter));
                    return;
                }
                CompletionState::Settled(outcome) => outcome.clone(),
            }
        };
        waiter(&settled);
    }

    /// Returns true once resolved or rejected.
    pub fn is_settled(&self) -> bool {
        matches!(*self.state.lock(), CompletionState::Settled(_))
    }

    /// Returns true if resolved successfully.
    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.lock(), CompletionState::Settled(Ok(())))
    }

    /// Returns the outcome, if settled.
    pub fn outcome(&self) -> Option<Settlement> {
        match &*self.state.lock() {
            CompletionState::Pending(_) => None,
            CompletionState::Settled(outcome) => Some(outcome.clone()),
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.lock() {
            CompletionState::Pending(waiters) => f
                .debug_struct("Completion")
                .field("pending_waiters", &waiters.len())
                .finish(),
            CompletionState::Settled(outcome) => f
                .debug_struct("Completion")
                .field("outcome", outcome)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn once_signal_fires_once() {
        let signal: Signal<u32> = Signal::once("closed");
        let hits = counter();
        let h = Arc::clone(&hits);
        signal.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(signal.emit(1));
        assert!(!signal.emit(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
        assert!(signal.has_fired());
    }

    #[test]
    fn once_signal_latches_for_late_subscribers() {
        let signal: Signal<u32> = Signal::once("done");
        signal.emit(7);

        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        signal.subscribe(move |v| *s.lock() = Some(*v));
        assert_eq!(*seen.lock(), Some(7));
    }

    #[test]
    fn repeating_signal_reaches_current_listeners() {
        let signal: Signal<()> = Signal::repeating("blocked");
        let hits = counter();
        signal.emit(());

        let h = Arc::clone(&hits);
        let id = signal.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        signal.emit(());
        signal.emit(());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(signal.unsubscribe(id));
        signal.emit(());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(signal.emit_count(), 4);
    }

    #[test]
    fn subscribe_once_removes_itself() {
        let signal: Signal<()> = Signal::repeating("ready");
        let hits = counter();
        let h = Arc::clone(&hits);
        signal.subscribe_once(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(signal.listener_count(), 1);
        signal.emit(());
        assert_eq!(signal.listener_count(), 0);
        signal.emit(());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_reenter_signal() {
        let signal: Arc<Signal<()>> = Arc::new(Signal::repeating("ready"));
        let inner = Arc::clone(&signal);
        let hits = counter();
        let h = Arc::clone(&hits);
        signal.subscribe(move |_| {
            let h2 = Arc::clone(&h);
            inner.subscribe(move |_| {
                h2.fetch_add(1, Ordering::SeqCst);
            });
        });
        signal.emit(());
        assert_eq!(signal.listener_count(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn completion_resolves_once_for_all_waiters() {
        let completion = Completion::new();
        let hits = counter();
        for _ in 0..3 {
            let h = Arc::clone(&hits);
            completion.on_settled(move |outcome| {
                assert!(outcome.is_ok());
                h.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(!completion.is_settled());
        assert!(completion.resolve());
        assert!(!completion.resolve());
        assert!(!completion.reject(CoreError::abort("late")));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(completion.is_resolved());
    }

    #[test]
    fn completion_late_waiter_runs_immediately() {
        let completion = Completion::rejected(CoreError::abort("gone"));
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        completion.on_settled(move |outcome| {
            *s.lock() = outcome.as_ref().err().map(|e| e.name().to_string());
        });
        assert_eq!(seen.lock().as_deref(), Some("AbortError"));
        assert!(!completion.is_resolved());
    }

    #[test]
    fn completion_outcome() {
        let completion = Completion::new();
        assert_eq!(completion.outcome(), None);
        completion.reject(CoreError::abort("x"));
        assert_eq!(completion.outcome(), Some(Err(CoreError::abort("x"))));
        assert!(Completion::resolved().is_resolved());
    }
}
