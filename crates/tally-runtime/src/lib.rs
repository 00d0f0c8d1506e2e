#![forbid(unsafe_code)]

//! Runtime: observer-based models, template-bound views, and controllers.
//!
//! # Role in Tally
//! `tally-runtime` is the whole framework. A [`Model`] owns domain state and
//! an ordered, weak list of subscribed views. A [`TemplateView`] owns a
//! compiled template and the last string it rendered. A [`Controller`] wires
//! one model to one view and turns external [`Trigger`]s into model
//! mutations.
//!
//! # Data flow
//! ```text
//! Trigger -> Controller -> Model mutation -> notify_all()
//!         -> View::render_from(snapshot) -> DisplaySink::display(target, output)
//! ```
//!
//! # Threading
//! Models, views and controllers are single-threaded (`Rc<RefCell<..>>`).
//! The only thread the runtime spawns is the repeating timer, which sends
//! [`Trigger::Tick`] messages back into the controller's inbox.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod sink;
pub mod snapshot;
pub mod template;
pub mod trigger;
pub mod view;

pub use config::{
    DEFAULT_DISPLAY_TARGET, DEFAULT_TICK_INTERVAL, MIN_TICK_INTERVAL, NotifyPolicy, RuntimeConfig,
};
pub use controller::{Controller, ControllerState};
pub use error::{ControllerError, NotifyError, TemplateCompileError, ViewError, ViewFailure};
pub use model::{Model, Subscribers, ViewHandle};
pub use sink::{DEFAULT_HISTORY_LIMIT, DisplaySink, MemorySink, TerminalMode, TerminalSink};
pub use snapshot::{Snapshot, SnapshotBuilder, Value};
pub use template::{FnTemplate, HandlebarsCompiler, Template, TemplateCompiler};
pub use trigger::{
    ManualScheduler, Scheduler, ThreadScheduler, TimerHandle, Trigger, TriggerInbox, TriggerSender,
};
pub use view::{Render, TemplateView};
