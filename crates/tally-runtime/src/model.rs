#![forbid(unsafe_code)]

//! Models: domain state plus an ordered, weak list of subscribed views.
//!
//! # Design
//!
//! A model implements [`Model`]: it projects its state into a [`Snapshot`]
//! via [`to_external`](Model::to_external) and exposes a [`Subscribers`]
//! list. Every mutation changes state and then calls
//! [`notify_all`](Model::notify_all), which pushes a fresh snapshot to each
//! live view in subscription order, synchronously, on the caller's thread.
//!
//! Subscribers are stored as `Weak` handles: the model never keeps a view
//! alive. Views whose last strong handle was dropped are pruned lazily on
//! the next notification.
//!
//! # Invariants
//!
//! 1. Views are notified in registration order.
//! 2. Each delivery computes its own snapshot after the mutation completed.
//! 3. A view registered twice is notified twice per cycle.
//! 4. `to_external` never mutates the model.
//!
//! # Failure Modes
//!
//! | Policy | A view fails | Result |
//! |--------|--------------|--------|
//! | `FailFast` | later views skipped | `NotifyError::Aborted` |
//! | `Isolate` | later views still rendered | `NotifyError::Partial` |
//!
//! A view notified while it is already rendering (a re-entrant mutation
//! from inside a render) fails with [`ViewError::Reentrant`] rather than
//! panicking on the `RefCell`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, debug_span};

use crate::config::NotifyPolicy;
use crate::error::{NotifyError, ViewError, ViewFailure};
use crate::snapshot::Snapshot;
use crate::view::Render;

/// Strong handle to a notifiable view.
pub type ViewHandle = Rc<RefCell<dyn Render>>;
type WeakView = Weak<RefCell<dyn Render>>;

/// Ordered weak registration of views.
#[derive(Default)]
pub struct Subscribers {
    views: Vec<WeakView>,
    policy: NotifyPolicy,
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("registered", &self.views.len())
            .field("live", &self.live_count())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Subscribers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: NotifyPolicy) -> Self {
        Self {
            views: Vec::new(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: NotifyPolicy) {
        self.policy = policy;
    }

    /// Append a weak registration of `view`. Duplicates are kept.
    pub fn subscribe<V: Render + 'static>(&mut self, view: &Rc<RefCell<V>>) {
        let handle: ViewHandle = view.clone();
        self.views.push(Rc::downgrade(&handle));
    }

    /// Remove every registration of `view`. Returns how many were removed.
    pub fn unsubscribe<V: Render + 'static>(&mut self, view: &Rc<RefCell<V>>) -> usize {
        let target = Rc::as_ptr(view);
        let before = self.views.len();
        self.views.retain(|w| !std::ptr::addr_eq(w.as_ptr(), target));
        before - self.views.len()
    }

    /// Registrations, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Registrations whose view is still alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.views.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Prune dead registrations and return strong handles to the rest, in
    /// order.
    fn live(&mut self) -> Vec<ViewHandle> {
        let before = self.views.len();
        self.views.retain(|w| w.strong_count() > 0);
        let pruned = before - self.views.len();
        if pruned > 0 {
            debug!(pruned, "pruned dropped views");
        }
        self.views.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Application state that pushes re-renders to subscribed views.
pub trait Model {
    /// Project the current state into an immutable snapshot.
    fn to_external(&self) -> Snapshot;

    fn subscribers(&self) -> &Subscribers;

    fn subscribers_mut(&mut self) -> &mut Subscribers;

    /// Register `view` for notifications. The model does not take ownership.
    fn subscribe<V: Render + 'static>(&mut self, view: &Rc<RefCell<V>>) {
        self.subscribers_mut().subscribe(view);
    }

    /// Remove every registration of `view`.
    fn unsubscribe<V: Render + 'static>(&mut self, view: &Rc<RefCell<V>>) -> usize {
        self.subscribers_mut().unsubscribe(view)
    }

    /// Push a fresh snapshot to every live view, in subscription order.
    ///
    /// Returns the number of views rendered.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if any view failed; see the module docs for
    /// how the policy affects the remaining views.
    fn notify_all(&mut self) -> Result<usize, NotifyError> {
        let views = self.subscribers_mut().live();
        let policy = self.subscribers().policy();
        let _span = debug_span!("notify_all", views = views.len()).entered();
        deliver(&views, policy, || self.to_external())
    }
}

fn deliver(
    views: &[ViewHandle],
    policy: NotifyPolicy,
    snapshot: impl Fn() -> Snapshot,
) -> Result<usize, NotifyError> {
    let mut delivered = 0;
    let mut failures = Vec::new();

    for (index, view) in views.iter().enumerate() {
        let result = match view.try_borrow_mut() {
            Ok(mut view) => view.render_from(&snapshot()),
            Err(_) => Err(ViewError::Reentrant),
        };
        match result {
            Ok(()) => delivered += 1,
            Err(error) => match policy {
                NotifyPolicy::FailFast => {
                    debug!(index, delivered, %error, "notification aborted");
                    return Err(NotifyError::Aborted {
                        index,
                        delivered,
                        source: error,
                    });
                }
                NotifyPolicy::Isolate => {
                    debug!(index, %error, "view failed, continuing");
                    failures.push(ViewFailure { index, error });
                }
            },
        }
    }

    if failures.is_empty() {
        debug!(delivered, "notified views");
        Ok(delivered)
    } else {
        Err(NotifyError::Partial {
            delivered,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<(char, u64)>>>;

    /// Records `(name, value)` for every snapshot it receives.
    struct Recorder {
        name: char,
        log: Log,
        fail: bool,
    }

    impl Recorder {
        fn new(name: char, log: &Log) -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self {
                name,
                log: Rc::clone(log),
                fail: false,
            }))
        }
    }

    impl Render for Recorder {
        fn render_from(&mut self, snapshot: &Snapshot) -> Result<(), ViewError> {
            if self.fail {
                return Err(ViewError::Template(format!("{} failed", self.name)));
            }
            let value = snapshot.get("value").and_then(|v| v.as_u64()).unwrap_or(0);
            self.log.borrow_mut().push((self.name, value));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Probe {
        value: u64,
        subscribers: Subscribers,
        projections: Cell<u32>,
    }

    impl Probe {
        fn bump(&mut self) -> Result<usize, NotifyError> {
            self.value += 1;
            self.notify_all()
        }
    }

    impl Model for Probe {
        fn to_external(&self) -> Snapshot {
            self.projections.set(self.projections.get() + 1);
            Snapshot::builder().field("value", self.value).build()
        }

        fn subscribers(&self) -> &Subscribers {
            &self.subscribers
        }

        fn subscribers_mut(&mut self) -> &mut Subscribers {
            &mut self.subscribers
        }
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn notification_order_is_registration_order() {
        let log = log();
        let (a, b, c) = (Recorder::new('A', &log), Recorder::new('B', &log), Recorder::new('C', &log));
        let mut model = Probe::default();
        model.subscribe(&a);
        model.subscribe(&b);
        model.subscribe(&c);

        assert_eq!(model.bump().unwrap(), 3);
        assert_eq!(*log.borrow(), vec![('A', 1), ('B', 1), ('C', 1)]);
    }

    #[test]
    fn each_delivery_gets_its_own_snapshot() {
        let log = log();
        let a = Recorder::new('A', &log);
        let b = Recorder::new('B', &log);
        let mut model = Probe::default();
        model.subscribe(&a);
        model.subscribe(&b);

        model.bump().unwrap();
        assert_eq!(model.projections.get(), 2);
    }

    #[test]
    fn duplicates_are_notified_twice() {
        let log = log();
        let a = Recorder::new('A', &log);
        let mut model = Probe::default();
        model.subscribe(&a);
        model.subscribe(&a);

        assert_eq!(model.bump().unwrap(), 2);
        assert_eq!(*log.borrow(), vec![('A', 1), ('A', 1)]);
    }

    #[test]
    fn registration_is_weak() {
        let log = log();
        let a = Recorder::new('A', &log);
        let b = Recorder::new('B', &log);
        let mut model = Probe::default();
        model.subscribe(&a);
        model.subscribe(&b);
        assert_eq!(Rc::strong_count(&a), 1);

        drop(a);
        assert_eq!(model.subscribers().len(), 2);
        assert_eq!(model.subscribers().live_count(), 1);

        assert_eq!(model.bump().unwrap(), 1);
        assert_eq!(model.subscribers().len(), 1);
        assert_eq!(*log.borrow(), vec![('B', 1)]);
    }

    #[test]
    fn unsubscribe_removes_every_registration() {
        let log = log();
        let a = Recorder::new('A', &log);
        let b = Recorder::new('B', &log);
        let mut model = Probe::default();
        model.subscribe(&a);
        model.subscribe(&b);
        model.subscribe(&a);

        assert_eq!(model.unsubscribe(&a), 2);
        assert_eq!(model.unsubscribe(&a), 0);
        model.bump().unwrap();
        assert_eq!(*log.borrow(), vec![('B', 1)]);
    }

    #[test]
    fn fail_fast_stops_at_first_failure() {
        let log = log();
        let (a, b, c) = (Recorder::new('A', &log), Recorder::new('B', &log), Recorder::new('C', &log));
        b.borrow_mut().fail = true;
        let mut model = Probe::default();
        model.subscribe(&a);
        model.subscribe(&b);
        model.subscribe(&c);

        match model.bump() {
            Err(NotifyError::Aborted {
                index, delivered, ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!(delivered, 1);
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(*log.borrow(), vec![('A', 1)]);
        // The mutation itself is not rolled back.
        assert_eq!(model.value, 1);
    }

    #[test]
    fn isolate_renders_everything_else() {
        let log = log();
        let (a, b, c) = (Recorder::new('A', &log), Recorder::new('B', &log), Recorder::new('C', &log));
        a.borrow_mut().fail = true;
        c.borrow_mut().fail = true;
        let mut model = Probe {
            subscribers: Subscribers::with_policy(NotifyPolicy::Isolate),
            ..Probe::default()
        };
        model.subscribe(&a);
        model.subscribe(&b);
        model.subscribe(&c);

        match model.bump() {
            Err(NotifyError::Partial {
                delivered,
                failures,
            }) => {
                assert_eq!(delivered, 1);
                let indices: Vec<_> = failures.iter().map(|f| f.index).collect();
                assert_eq!(indices, [0, 2]);
            }
            other => panic!("expected partial, got {other:?}"),
        }
        assert_eq!(*log.borrow(), vec![('B', 1)]);
    }

    #[test]
    fn busy_view_reports_reentrant() {
        let log = log();
        let a = Recorder::new('A', &log);
        let mut model = Probe::default();
        model.subscribe(&a);

        let _guard = a.borrow_mut();
        let err = model.bump().unwrap_err();
        assert!(matches!(
            err,
            NotifyError::Aborted {
                source: ViewError::Reentrant,
                ..
            }
        ));
    }

    #[test]
    fn to_external_does_not_mutate() {
        let model = Probe {
            value: 41,
            ..Probe::default()
        };
        let first = model.to_external();
        let second = model.to_external();
        assert_eq!(first, second);
        assert_eq!(model.value, 41);
    }

    #[test]
    fn empty_model_notifies_nobody() {
        let mut model = Probe::default();
        assert!(model.subscribers().is_empty());
        assert_eq!(model.bump().unwrap(), 0);
    }
}
