#![forbid(unsafe_code)]

//! Controller: wires one model to one view and binds triggers to mutations.
//!
//! # Lifecycle
//!
//! ```text
//! Created --attach_views--> Wired --listen_events--> Listening
//!    --Trigger::Start--> Running --stop / Trigger::Stop--> Stopped
//! ```
//!
//! `stop()` is valid from any state and is terminal.
//!
//! # Threading
//!
//! The controller, its model and its view live on one thread. Triggers
//! arrive through the controller's [`TriggerInbox`]: the timer thread and any
//! other producer only hold a [`TriggerSender`]. Mutation, notification,
//! render and display for one trigger complete before the next trigger is
//! taken from the inbox, and the bound mutation always runs against this
//! controller's own model.
//!
//! # Trigger handling
//!
//! | State | Start | Tick | Stop |
//! |-------|-------|------|------|
//! | Created / Wired | ignored | ignored | stop |
//! | Listening | start timer, Running | ignored | stop |
//! | Running | ignored (one timer) | run mutation | stop |
//! | Stopped | ignored | ignored | no-op |

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};
use web_time::Instant;

use crate::config::RuntimeConfig;
use crate::error::{ControllerError, NotifyError};
use crate::model::Model;
use crate::trigger::{Scheduler, ThreadScheduler, TimerHandle, Trigger, TriggerInbox, TriggerSender};
use crate::view::Render;

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Created,
    /// View subscribed and initially rendered.
    Wired,
    /// Mutation bound; waiting for the start trigger.
    Listening,
    /// Timer running.
    Running,
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Wired => "wired",
            Self::Listening => "listening",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

type Action<M> = Box<dyn FnMut(&mut M) -> Result<usize, NotifyError>>;

/// Owns one model and one view and drives the model from triggers.
pub struct Controller<M: Model, V: Render + 'static> {
    model: M,
    view: Rc<RefCell<V>>,
    config: RuntimeConfig,
    state: ControllerState,
    inbox: TriggerInbox,
    scheduler: Box<dyn Scheduler>,
    timer: Option<TimerHandle>,
    action: Option<Action<M>>,
    ticks: u64,
}

impl<M: Model + fmt::Debug, V: Render + fmt::Debug + 'static> fmt::Debug for Controller<M, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("model", &self.model)
            .field("view", &self.view)
            .field("state", &self.state)
            .field("ticks", &self.ticks)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl<M: Model, V: Render + 'static> Controller<M, V> {
    /// Take ownership of `model` and `view`, using a threaded timer.
    ///
    /// The model's notification policy is set from `config`.
    pub fn new(model: M, view: V, config: RuntimeConfig) -> Self {
        Self::with_scheduler(model, view, config, ThreadScheduler)
    }

    /// Like [`new`](Self::new) with an explicit timer scheduler.
    pub fn with_scheduler(
        mut model: M,
        view: V,
        config: RuntimeConfig,
        scheduler: impl Scheduler + 'static,
    ) -> Self {
        model.subscribers_mut().set_policy(config.notify_policy);
        Self {
            model,
            view: Rc::new(RefCell::new(view)),
            config,
            state: ControllerState::Created,
            inbox: TriggerInbox::new(),
            scheduler: Box::new(scheduler),
            timer: None,
            action: None,
            ticks: 0,
        }
    }

    /// Subscribe the view to the model and render the current state once.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidState`] unless freshly created;
    /// [`ControllerError::Render`] if the initial render fails, in which case
    /// the subscription is rolled back.
    pub fn attach_views(&mut self) -> Result<(), ControllerError> {
        self.expect_state("attach views", ControllerState::Created)?;
        self.model.subscribe(&self.view);
        let snapshot = self.model.to_external();
        if let Err(e) = self.view.borrow_mut().render_from(&snapshot) {
            self.model.unsubscribe(&self.view);
            return Err(e.into());
        }
        self.transition(ControllerState::Wired);
        Ok(())
    }

    /// Bind `action` as the mutation each timer tick runs against the model.
    ///
    /// Returns a sender for firing [`Trigger::Start`] (and any other
    /// trigger) from any thread.
    ///
    /// # Errors
    ///
    /// [`ControllerError::InvalidState`] unless wired.
    pub fn listen_events(
        &mut self,
        action: impl FnMut(&mut M) -> Result<usize, NotifyError> + 'static,
    ) -> Result<TriggerSender, ControllerError> {
        self.expect_state("listen for events", ControllerState::Wired)?;
        self.action = Some(Box::new(action));
        self.transition(ControllerState::Listening);
        Ok(self.inbox.sender())
    }

    /// Apply one trigger.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Timer`] if the timer can't start;
    /// [`ControllerError::Notify`] if a tick's notification fails.
    pub fn dispatch(&mut self, trigger: Trigger) -> Result<(), ControllerError> {
        match (trigger, self.state) {
            (Trigger::Start, ControllerState::Listening) => {
                let timer = self
                    .scheduler
                    .repeat(self.config.tick_interval, self.inbox.sender())
                    .map_err(ControllerError::Timer)?;
                self.timer = Some(timer);
                self.transition(ControllerState::Running);
            }
            (Trigger::Tick, ControllerState::Running) => {
                if let Some(action) = self.action.as_mut() {
                    self.ticks += 1;
                    let delivered = action(&mut self.model)?;
                    debug!(tick = self.ticks, delivered, "tick applied");
                }
            }
            (Trigger::Stop, _) => self.stop(),
            (Trigger::Start, ControllerState::Running) => {
                debug!("start ignored, timer already running");
            }
            (trigger, state) => {
                warn!(?trigger, %state, "trigger ignored");
            }
        }
        Ok(())
    }

    /// Apply every trigger already waiting in the inbox, without blocking.
    ///
    /// Returns how many triggers were applied.
    pub fn pump(&mut self) -> Result<usize, ControllerError> {
        let mut applied = 0;
        while let Some(trigger) = self.inbox.try_next() {
            self.dispatch(trigger)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Block on the inbox, applying triggers until `done` holds or the
    /// controller stops.
    ///
    /// Partial notification failures (isolating policy) are logged and the
    /// loop continues; every other error ends it.
    pub fn run_until(&mut self, done: impl FnMut(&Self) -> bool) -> Result<(), ControllerError> {
        self.run_loop(done, None).map(|_| ())
    }

    /// Like [`run_until`](Self::run_until), giving up after `timeout`.
    ///
    /// Returns whether `done` held (or the controller stopped) in time.
    pub fn run_until_timeout(
        &mut self,
        done: impl FnMut(&Self) -> bool,
        timeout: Duration,
    ) -> Result<bool, ControllerError> {
        self.run_loop(done, Some(Instant::now() + timeout))
    }

    fn run_loop(
        &mut self,
        mut done: impl FnMut(&Self) -> bool,
        deadline: Option<Instant>,
    ) -> Result<bool, ControllerError> {
        loop {
            if done(self) || self.state == ControllerState::Stopped {
                return Ok(true);
            }
            let trigger = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    match self.inbox.next_timeout(left) {
                        Some(trigger) => trigger,
                        None => return Ok(false),
                    }
                }
                None => match self.inbox.next() {
                    Some(trigger) => trigger,
                    None => {
                        warn!(state = %self.state, "no trigger producers left");
                        return Ok(false);
                    }
                },
            };
            match self.dispatch(trigger) {
                Ok(()) => {}
                Err(ControllerError::Notify(e)) if e.is_partial() => {
                    warn!(error = %e, "some views failed to render");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancel the timer and unsubscribe the view. Terminal.
    pub fn stop(&mut self) {
        if self.state == ControllerState::Stopped {
            return;
        }
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.model.unsubscribe(&self.view);
        self.transition(ControllerState::Stopped);
        info!(ticks = self.ticks, "controller stopped");
    }

    /// A sender into this controller's inbox.
    #[must_use]
    pub fn sender(&self) -> TriggerSender {
        self.inbox.sender()
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Ticks delivered to the bound mutation so far.
    ///
    /// A tick whose notification failed still counts: the mutation runs
    /// before views are notified and is not rolled back.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Borrow the view.
    ///
    /// # Panics
    ///
    /// Panics if called while the view is rendering.
    pub fn view(&self) -> Ref<'_, V> {
        self.view.borrow()
    }

    /// Shared handle to the view, e.g. to subscribe it elsewhere.
    pub fn view_handle(&self) -> Rc<RefCell<V>> {
        Rc::clone(&self.view)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: ControllerState,
    ) -> Result<(), ControllerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ControllerError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: ControllerState) {
        info!(from = %self.state, to = %next, "controller state");
        self.state = next;
    }
}
