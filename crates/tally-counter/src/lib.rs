#![forbid(unsafe_code)]

//! Tally Counter: a counter that increments on a timer.
//!
//! The binary wires a [`counter::CounterModel`] to a template view that
//! presents `<span class="counter-value">N</span>` on the terminal. The timer
//! starts when the user presses Enter (the "click") or immediately with
//! `--autostart`.

pub mod click;
pub mod cli;
pub mod counter;
pub mod logging;

pub use counter::{
    COUNTER_TEMPLATE, CounterController, CounterModel, CounterOptions, CounterView,
    build_controller, build_controller_with,
};
