#![forbid(unsafe_code)]

//! The counter: a `u32` that increments on every timer tick.

use tally_runtime::{
    Controller, DisplaySink, HandlebarsCompiler, Model, NotifyError, RuntimeConfig, Scheduler,
    Snapshot, Subscribers, TemplateCompileError, TemplateView,
};

/// Template the counter view renders by default.
pub const COUNTER_TEMPLATE: &str = r#"<span class="counter-value">{{value}}</span>"#;

/// Counter state. Increments wrap at `u32::MAX`.
#[derive(Debug, Default)]
pub struct CounterModel {
    value: u32,
    subscribers: Subscribers,
}

impl CounterModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter starting at `value`.
    #[must_use]
    pub fn starting_at(value: u32) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Add one (mod 2^32) and re-render every subscribed view.
    ///
    /// # Errors
    ///
    /// Propagates the notification failure; the increment itself sticks.
    pub fn increment(&mut self) -> Result<usize, NotifyError> {
        self.value = self.value.wrapping_add(1);
        self.notify_all()
    }
}

impl Model for CounterModel {
    fn to_external(&self) -> Snapshot {
        Snapshot::builder().field("value", self.value).build()
    }

    fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    fn subscribers_mut(&mut self) -> &mut Subscribers {
        &mut self.subscribers
    }
}

/// The counter's view: a compiled template presenting on one target.
pub type CounterView<S> = TemplateView<S>;

/// Controller owning one counter model and one counter view.
pub type CounterController<S> = Controller<CounterModel, CounterView<S>>;

/// Options for building a counter controller.
#[derive(Debug, Clone)]
pub struct CounterOptions {
    pub config: RuntimeConfig,
    pub template: String,
    pub escape_html: bool,
    pub start_value: u32,
}

impl Default for CounterOptions {
    fn default() -> Self {
        Self {
            config: RuntimeConfig::default(),
            template: COUNTER_TEMPLATE.to_owned(),
            escape_html: true,
            start_value: 0,
        }
    }
}

/// Compile the view and build the controller, using a threaded timer.
///
/// # Errors
///
/// Returns [`TemplateCompileError`] for a malformed template; nothing is
/// subscribed or rendered in that case.
pub fn build_controller<S: DisplaySink + 'static>(
    options: &CounterOptions,
    sink: S,
) -> Result<CounterController<S>, TemplateCompileError> {
    let view = compile_view(options, sink)?;
    Ok(Controller::new(
        CounterModel::starting_at(options.start_value),
        view,
        options.config.clone(),
    ))
}

/// Like [`build_controller`] with an explicit scheduler.
pub fn build_controller_with<S: DisplaySink + 'static>(
    options: &CounterOptions,
    sink: S,
    scheduler: impl Scheduler + 'static,
) -> Result<CounterController<S>, TemplateCompileError> {
    let view = compile_view(options, sink)?;
    Ok(Controller::with_scheduler(
        CounterModel::starting_at(options.start_value),
        view,
        options.config.clone(),
        scheduler,
    ))
}

fn compile_view<S: DisplaySink>(
    options: &CounterOptions,
    sink: S,
) -> Result<CounterView<S>, TemplateCompileError> {
    let compiler = HandlebarsCompiler::new().with_html_escape(options.escape_html);
    TemplateView::new(
        &compiler,
        &options.template,
        options.config.display_target.clone(),
        sink,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tally_runtime::MemorySink;

    #[test]
    fn starts_at_zero() {
        let model = CounterModel::new();
        assert_eq!(model.value(), 0);
        assert_eq!(
            model.to_external().get("value").and_then(|v| v.as_u64()),
            Some(0)
        );
    }

    #[test]
    fn increment_wraps_at_max() {
        let mut model = CounterModel::starting_at(u32::MAX);
        model.increment().unwrap();
        assert_eq!(model.value(), 0);
    }

    #[test]
    fn increment_notifies_subscribed_view() {
        let sink = MemorySink::new();
        let view = Rc::new(RefCell::new(
            compile_view(&CounterOptions::default(), sink.clone()).unwrap(),
        ));
        let mut model = CounterModel::new();
        model.subscribe(&view);

        assert_eq!(model.increment().unwrap(), 1);
        assert_eq!(
            sink.content("counter-container").as_deref(),
            Some(r#"<span class="counter-value">1</span>"#)
        );
    }

    #[test]
    fn custom_template_and_target() {
        let options = CounterOptions {
            config: RuntimeConfig::default().with_display_target("status"),
            template: "Count: {{value}}".into(),
            ..CounterOptions::default()
        };
        let sink = MemorySink::new();
        let mut ctrl = build_controller(&options, sink.clone()).unwrap();
        ctrl.attach_views().unwrap();
        assert_eq!(sink.content("status").as_deref(), Some("Count: 0"));
    }

    #[test]
    fn malformed_template_is_rejected() {
        let options = CounterOptions {
            template: "{{#if value}}unterminated".into(),
            ..CounterOptions::default()
        };
        assert!(build_controller(&options, MemorySink::new()).is_err());
    }
}
