//! Tick scheduler
//!
//! Every clock advancement produces one notification pass: each subscribed
//! listener is called with the current time, in subscription order.
//!
//! # Pass semantics
//!
//! A pass iterates a snapshot of the subscription ids taken when it starts.
//!
//!   subscribe during a pass    -> first called on the next pass
//!   unsubscribe during a pass  -> skipped if not reached yet; a listener
//!                                 that is already running finishes normally
//!   notify during a pass       -> queued, run after the current pass
//!
//! A listener that returns an error or panics is recorded as a
//! [`ListenerFailure`]; the rest of the pass still runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::{Error, Result, Seconds, TIME_EPSILON};

/// Outcome of one listener invocation
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type TickFn = Box<dyn FnMut(Seconds) -> ListenerResult>;
type OnceFn = Box<dyn FnOnce(Seconds) -> ListenerResult>;

/// Opaque subscription identity; ids increase with registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// A listener that failed during a pass
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerFailure {
    pub subscription: SubscriptionId,
    pub time: Seconds,
    pub message: String,
}

enum Callback {
    /// Runs on every pass
    Every(TickFn),
    /// Runs once, on the first pass at or past `at`
    Once { at: Seconds, callback: OnceFn },
}

struct Entry {
    id: SubscriptionId,
    /// None while the callback is running
    callback: Option<Callback>,
}

#[derive(Default)]
struct Shared {
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
    in_pass: Cell<bool>,
    deferred: RefCell<VecDeque<Seconds>>,
}

impl Shared {
    fn insert(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        // ids are monotonic, so push keeps the vector sorted
        self.entries.borrow_mut().push(Entry {
            id,
            callback: Some(callback),
        });
        id
    }

    /// One-shot insert; `at` must be a finite, non-negative time
    fn insert_at(&self, at: Seconds, callback: OnceFn) -> Result<SubscriptionId> {
        if !(at.is_finite() && at >= 0.0) {
            return Err(Error::InvalidTime(at));
        }
        Ok(self.insert(Callback::Once { at, callback }))
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.binary_search_by_key(&id, |e| e.id) {
            Ok(index) => {
                entries.remove(index);
                true
            }
            Err(_) => false,
        }
    }
}

/// Tick-granular event bus owned by one context
pub struct EventScheduler {
    shared: Rc<Shared>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared::default()),
        }
    }

    /// Register a listener called on every pass
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: FnMut(Seconds) -> ListenerResult + 'static,
    {
        self.shared.insert(Callback::Every(Box::new(listener)))
    }

    /// Register a one-shot callback for virtual time `at`
    ///
    /// The callback runs on the first pass whose time is at or past `at` and
    /// receives `at` itself, not the pass time. Negative or non-finite times
    /// are rejected with `InvalidTime`.
    pub fn subscribe_at<F>(&self, at: Seconds, callback: F) -> Result<SubscriptionId>
    where
        F: FnOnce(Seconds) -> ListenerResult + 'static,
    {
        self.shared.insert_at(at, Box::new(callback))
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.remove(id)
    }

    pub fn len(&self) -> usize {
        self.shared.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Weak handle for listeners that need to (un)subscribe from inside a pass
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Run one notification pass at `time`
    ///
    /// Called only by the owning context or driver. A call made while a pass
    /// is already running is queued and executed once that pass returns.
    pub(crate) fn notify_all(&self, time: Seconds) -> Vec<ListenerFailure> {
        let mut failures = Vec::new();

        if self.shared.in_pass.replace(true) {
            self.shared.deferred.borrow_mut().push_back(time);
            return failures;
        }

        let mut next = Some(time);
        while let Some(time) = next {
            self.run_pass(time, &mut failures);
            next = self.shared.deferred.borrow_mut().pop_front();
        }

        self.shared.in_pass.set(false);
        failures
    }

    fn run_pass(&self, time: Seconds, failures: &mut Vec<ListenerFailure>) {
        let snapshot: Vec<SubscriptionId> =
            self.shared.entries.borrow().iter().map(|e| e.id).collect();

        for id in snapshot {
            // Take the callback out so the listener can touch the scheduler
            let callback = {
                let mut entries = self.shared.entries.borrow_mut();
                let Ok(index) = entries.binary_search_by_key(&id, |e| e.id) else {
                    continue; // unsubscribed earlier in this pass
                };
                let due = match &entries[index].callback {
                    Some(Callback::Every(_)) => true,
                    Some(Callback::Once { at, .. }) => time + TIME_EPSILON >= *at,
                    None => false,
                };
                if !due {
                    continue;
                }
                if matches!(entries[index].callback, Some(Callback::Once { .. })) {
                    entries.remove(index).callback
                } else {
                    entries[index].callback.take()
                }
            };

            let outcome = match callback {
                Some(Callback::Every(mut listener)) => {
                    let outcome = invoke(|| listener(time));
                    self.restore(id, listener);
                    outcome
                }
                Some(Callback::Once { at, callback }) => invoke(move || callback(at)),
                None => continue,
            };

            if let Err(message) = outcome {
                tracing::warn!(?id, time, %message, "scheduled listener failed");
                failures.push(ListenerFailure {
                    subscription: id,
                    time,
                    message,
                });
            }
        }
    }

    /// Put a repeating listener back unless it unsubscribed while running
    fn restore(&self, id: SubscriptionId, listener: TickFn) {
        let mut entries = self.shared.entries.borrow_mut();
        if let Ok(index) = entries.binary_search_by_key(&id, |e| e.id) {
            entries[index].callback = Some(Callback::Every(listener));
        }
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke<F>(f: F) -> std::result::Result<(), String>
where
    F: FnOnce() -> ListenerResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("listener panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("listener panicked: {}", message)
    } else {
        "listener panicked".to_string()
    }
}

/// Weak reference to a scheduler, safe to capture inside listeners
///
/// Operations on a handle whose scheduler was dropped do nothing.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Weak<Shared>,
}

impl SchedulerHandle {
    pub fn subscribe<F>(&self, listener: F) -> Option<SubscriptionId>
    where
        F: FnMut(Seconds) -> ListenerResult + 'static,
    {
        self.shared
            .upgrade()
            .map(|shared| shared.insert(Callback::Every(Box::new(listener))))
    }

    /// Same checks as [`EventScheduler::subscribe_at`]; `Closed` once the
    /// scheduler is gone
    pub fn subscribe_at<F>(&self, at: Seconds, callback: F) -> Result<SubscriptionId>
    where
        F: FnOnce(Seconds) -> ListenerResult + 'static,
    {
        let shared = self.shared.upgrade().ok_or(Error::Closed)?;
        shared.insert_at(at, Box::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.remove(id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<(&'static str, Seconds)>>>;

    fn recorder(log: &Log, name: &'static str) -> impl FnMut(Seconds) -> ListenerResult {
        let log = log.clone();
        move |time| {
            log.borrow_mut().push((name, time));
            Ok(())
        }
    }

    #[test]
    fn test_notifies_in_subscription_order() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        scheduler.subscribe(recorder(&log, "a"));
        scheduler.subscribe(recorder(&log, "b"));
        scheduler.subscribe(recorder(&log, "c"));

        scheduler.notify_all(0.0);
        scheduler.notify_all(0.5);

        assert_eq!(
            *log.borrow(),
            vec![("a", 0.0), ("b", 0.0), ("c", 0.0), ("a", 0.5), ("b", 0.5), ("c", 0.5)]
        );
    }

    #[test]
    fn test_unsubscribed_listener_is_not_notified() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        let a = scheduler.subscribe(recorder(&log, "a"));
        scheduler.subscribe(recorder(&log, "b"));

        scheduler.notify_all(0.0);
        assert!(scheduler.unsubscribe(a));
        assert!(!scheduler.unsubscribe(a));
        scheduler.notify_all(1.0);

        assert_eq!(*log.borrow(), vec![("a", 0.0), ("b", 0.0), ("b", 1.0)]);
    }

    #[test]
    fn test_self_unsubscribe_completes_current_call() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        let handle = scheduler.handle();
        let own_id: Rc<Cell<Option<SubscriptionId>>> = Default::default();

        let inner_log = log.clone();
        let inner_id = own_id.clone();
        let id = scheduler.subscribe(move |time| {
            if let Some(id) = inner_id.get() {
                handle.unsubscribe(id);
            }
            inner_log.borrow_mut().push(("self", time));
            Ok(())
        });
        own_id.set(Some(id));
        scheduler.subscribe(recorder(&log, "after"));

        scheduler.notify_all(0.0);
        scheduler.notify_all(1.0);

        assert_eq!(
            *log.borrow(),
            vec![("self", 0.0), ("after", 0.0), ("after", 1.0)]
        );
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_unsubscribe_later_listener_mid_pass() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        let handle = scheduler.handle();
        let victim: Rc<Cell<Option<SubscriptionId>>> = Default::default();

        scheduler.subscribe(recorder(&log, "first"));
        let target = victim.clone();
        scheduler.subscribe(move |_| {
            if let Some(id) = target.take() {
                handle.unsubscribe(id);
            }
            Ok(())
        });
        victim.set(Some(scheduler.subscribe(recorder(&log, "victim"))));

        scheduler.notify_all(0.0);

        // "first" already ran, "victim" never does
        assert_eq!(*log.borrow(), vec![("first", 0.0)]);
    }

    #[test]
    fn test_subscribe_during_pass_starts_next_pass() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        let handle = scheduler.handle();

        let late_log = log.clone();
        let mut added = false;
        scheduler.subscribe(move |_| {
            if !added {
                added = true;
                handle.subscribe(recorder(&late_log, "late"));
            }
            Ok(())
        });

        scheduler.notify_all(0.0);
        assert!(log.borrow().is_empty());
        scheduler.notify_all(1.0);
        assert_eq!(*log.borrow(), vec![("late", 1.0)]);
    }

    #[test]
    fn test_failing_listener_does_not_stop_pass() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        let bad = scheduler.subscribe(|_| Err("boom".into()));
        scheduler.subscribe(|_| panic!("poisoned"));
        scheduler.subscribe(recorder(&log, "ok"));

        let failures = scheduler.notify_all(0.25);

        assert_eq!(*log.borrow(), vec![("ok", 0.25)]);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].subscription, bad);
        assert_eq!(failures[0].message, "boom");
        assert!(failures[1].message.contains("poisoned"));

        // Failing listeners stay subscribed
        assert_eq!(scheduler.notify_all(0.5).len(), 2);
    }

    #[test]
    fn test_one_shot_fires_once_with_requested_time() {
        let log: Log = Default::default();
        let scheduler = EventScheduler::new();
        let inner = log.clone();
        scheduler
            .subscribe_at(0.012, move |at| {
                inner.borrow_mut().push(("once", at));
                Ok(())
            })
            .unwrap();

        scheduler.notify_all(0.005);
        scheduler.notify_all(0.010);
        scheduler.notify_all(0.015);
        scheduler.notify_all(0.020);

        assert_eq!(*log.borrow(), vec![("once", 0.012)]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_nested_notify_is_queued() {
        let log: Log = Default::default();
        let scheduler = Rc::new(EventScheduler::new());
        let weak = Rc::downgrade(&scheduler);

        let inner = log.clone();
        scheduler.subscribe(move |time| {
            inner.borrow_mut().push(("outer", time));
            if time == 0.0 {
                if let Some(scheduler) = weak.upgrade() {
                    // queued, not recursive
                    assert!(scheduler.notify_all(9.0).is_empty());
                }
            }
            Ok(())
        });
        scheduler.subscribe(recorder(&log, "tail"));

        scheduler.notify_all(0.0);

        assert_eq!(
            *log.borrow(),
            vec![("outer", 0.0), ("tail", 0.0), ("outer", 9.0), ("tail", 9.0)]
        );
    }

    #[test]
    fn test_handle_outliving_scheduler_is_inert() {
        let scheduler = EventScheduler::new();
        let handle = scheduler.handle();
        drop(scheduler);
        assert!(handle.subscribe(|_| Ok(())).is_none());
        assert!(!handle.unsubscribe(SubscriptionId(0)));
    }

    #[test]
    fn test_one_shot_rejects_invalid_times() {
        let scheduler = EventScheduler::new();
        let handle = scheduler.handle();

        for at in [f64::NAN, f64::INFINITY, -0.001] {
            assert!(matches!(
                scheduler.subscribe_at(at, |_| Ok(())),
                Err(Error::InvalidTime(_))
            ));
            assert!(matches!(
                handle.subscribe_at(at, |_| Ok(())),
                Err(Error::InvalidTime(_))
            ));
        }
        assert!(scheduler.is_empty());

        assert!(handle.subscribe_at(0.0, |_| Ok(())).is_ok());
        drop(scheduler);
        assert_eq!(handle.subscribe_at(0.0, |_| Ok(())), Err(Error::Closed));
    }
}
