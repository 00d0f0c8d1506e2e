#![forbid(unsafe_code)]

//! Trigger delivery and repeating timers.
//!
//! Triggers are plain messages sent over an `mpsc` channel into a
//! controller's [`TriggerInbox`]. Whoever holds a [`TriggerSender`] (a UI
//! thread, a stdin reader, a timer thread) can fire them; the controller
//! applies them on its own thread, one at a time.
//!
//! A [`Scheduler`] turns an interval into a stream of [`Trigger::Tick`]s and
//! returns a [`TimerHandle`] that cancels it. [`ThreadScheduler`] runs a
//! dedicated timer thread; [`ManualScheduler`] fires ticks only when told to,
//! for deterministic tests.
//!
//! # Invariants
//!
//! 1. After `TimerHandle::cancel()` (or drop) returns, the timer sends no
//!    further ticks.
//! 2. A timer thread exits on its own once every receiver is gone.
//! 3. Ticks are fixed-rate: the k-th tick is due `k * interval` after start,
//!    so slow consumers don't accumulate drift.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use web_time::Instant;

use crate::config::MIN_TICK_INTERVAL;

/// External stimuli a controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// One-shot start event (the "click").
    Start,
    /// One firing of the repeating timer.
    Tick,
    /// Request a clean shutdown.
    Stop,
}

/// Cloneable, `Send` handle for firing triggers into an inbox.
///
/// Every live sender (and clone) counts as a producer for its inbox.
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<Trigger>,
    _producer: Arc<()>,
}

impl TriggerSender {
    /// Send a trigger. Returns `false` if the inbox is gone.
    pub fn send(&self, trigger: Trigger) -> bool {
        self.tx.send(trigger).is_ok()
    }

    pub fn start(&self) -> bool {
        self.send(Trigger::Start)
    }

    pub fn tick(&self) -> bool {
        self.send(Trigger::Tick)
    }

    pub fn stop(&self) -> bool {
        self.send(Trigger::Stop)
    }
}

/// How often a blocked [`TriggerInbox::next`] checks for remaining producers.
const PRODUCER_POLL: Duration = Duration::from_millis(50);

/// Receiving end of a controller's trigger channel.
#[derive(Debug)]
pub struct TriggerInbox {
    tx: mpsc::Sender<Trigger>,
    rx: mpsc::Receiver<Trigger>,
    producers: Arc<()>,
}

impl Default for TriggerInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerInbox {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            producers: Arc::new(()),
        }
    }

    #[must_use]
    pub fn sender(&self) -> TriggerSender {
        TriggerSender {
            tx: self.tx.clone(),
            _producer: Arc::clone(&self.producers),
        }
    }

    /// Whether any [`TriggerSender`] for this inbox is still alive.
    #[must_use]
    pub fn has_producers(&self) -> bool {
        Arc::strong_count(&self.producers) > 1
    }

    /// Next pending trigger, without blocking.
    pub fn try_next(&self) -> Option<Trigger> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next trigger.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Trigger> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Block until the next trigger arrives.
    ///
    /// Returns `None` once the queue is empty and every sender is gone, since
    /// nothing could ever arrive after that.
    pub fn next(&self) -> Option<Trigger> {
        loop {
            match self.rx.recv_timeout(PRODUCER_POLL) {
                Ok(trigger) => return Some(trigger),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.has_producers() {
                        // A sender's last message happens-before its drop.
                        return self.rx.try_recv().ok();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// Cancellation handle for a repeating timer.
pub struct TimerHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("threaded", &self.thread.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl TimerHandle {
    /// A handle with no thread behind it; cancelling only flips the flag.
    #[must_use]
    pub fn detached(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            stop: None,
            thread: None,
            cancelled,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the timer and wait for its thread to exit.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // Dropping the stop sender wakes the timer thread immediately.
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Something that can start a repeating timer.
pub trait Scheduler {
    /// Send [`Trigger::Tick`] through `sender` every `interval` until the
    /// returned handle is cancelled.
    fn repeat(&self, interval: Duration, sender: TriggerSender) -> io::Result<TimerHandle>;
}

/// Runs each timer on its own thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn repeat(&self, interval: Duration, sender: TriggerSender) -> io::Result<TimerHandle> {
        let interval = interval.max(MIN_TICK_INTERVAL);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let thread = thread::Builder::new()
            .name("tally-timer".into())
            .spawn(move || timer_loop(interval, &sender, &stop_rx, &flag))?;
        debug!(interval_ms = interval.as_millis() as u64, "timer started");
        Ok(TimerHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
            cancelled,
        })
    }
}

fn timer_loop(
    interval: Duration,
    sender: &TriggerSender,
    stop: &mpsc::Receiver<()>,
    cancelled: &AtomicBool,
) {
    let mut due = Instant::now() + interval;
    let mut fired: u64 = 0;
    loop {
        let wait = due.saturating_duration_since(Instant::now());
        match stop.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {
                if cancelled.load(Ordering::Acquire) || !sender.tick() {
                    break;
                }
                fired += 1;
                due += interval;
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(fired, "timer stopped");
}

struct Armed {
    interval: Duration,
    sender: TriggerSender,
    cancelled: Arc<AtomicBool>,
}

/// Deterministic scheduler: ticks are sent only by [`fire`](Self::fire).
///
/// Clones share the same set of armed timers.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    armed: Rc<RefCell<Vec<Armed>>>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("active", &self.active())
            .finish()
    }
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `n` ticks from every active timer. Returns the ticks sent.
    pub fn fire(&self, n: usize) -> usize {
        let armed = self.armed.borrow();
        let mut sent = 0;
        for timer in armed.iter() {
            for _ in 0..n {
                if timer.cancelled.load(Ordering::Acquire) || !timer.sender.tick() {
                    break;
                }
                sent += 1;
            }
        }
        sent
    }

    /// Timers started and not yet cancelled.
    #[must_use]
    pub fn active(&self) -> usize {
        self.armed
            .borrow()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::Acquire))
            .count()
    }

    /// Interval of the most recently started timer.
    #[must_use]
    pub fn last_interval(&self) -> Option<Duration> {
        self.armed.borrow().last().map(|t| t.interval)
    }
}

impl Scheduler for ManualScheduler {
    fn repeat(&self, interval: Duration, sender: TriggerSender) -> io::Result<TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.armed.borrow_mut().push(Armed {
            interval,
            sender,
            cancelled: Arc::clone(&cancelled),
        });
        Ok(TimerHandle::detached(cancelled))
    }
}
