#![forbid(unsafe_code)]

//! Property-based invariant tests for the observer/render pipeline.
//!
//! 1. Views render in subscription order on every mutation.
//! 2. A view subscribed m times renders m times per mutation.
//! 3. Wrapping counters never overflow and the output tracks the wrapped value.
//! 4. Displaying the same content twice is indistinguishable from once.
//! 5. The initial render after wiring equals the template applied to the
//!    model's snapshot at that moment.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use tally_runtime::{
    Controller, DisplaySink, HandlebarsCompiler, ManualScheduler, MemorySink, Model, NotifyError,
    Render, RuntimeConfig, Snapshot, Subscribers, Template, TemplateCompiler, TemplateView,
    TerminalMode, TerminalSink, ViewError,
};

// ── Fixtures ──────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Debug, Default)]
struct Wrapping {
    value: u32,
    subscribers: Subscribers,
}

impl Wrapping {
    fn at(value: u32) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    fn increment(&mut self) -> Result<usize, NotifyError> {
        self.value = self.value.wrapping_add(1);
        self.notify_all()
    }
}

impl Model for Wrapping {
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

struct Tagged {
    tag: usize,
    log: Rc<RefCell<Vec<usize>>>,
}

impl Render for Tagged {
    fn render_from(&mut self, _snapshot: &Snapshot) -> Result<(), ViewError> {
        self.log.borrow_mut().push(self.tag);
        Ok(())
    }
}

fn counter_view(sink: &MemorySink) -> TemplateView<MemorySink> {
    TemplateView::new(
        &HandlebarsCompiler::new(),
        r#"<span class="counter-value">{{value}}</span>"#,
        "counter-container",
        sink.clone(),
    )
    .expect("counter template compiles")
}

// ── Properties ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn views_render_in_subscription_order(views in 1usize..8, mutations in 1usize..6) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handles: Vec<_> = (0..views)
            .map(|tag| Rc::new(RefCell::new(Tagged { tag, log: Rc::clone(&log) })))
            .collect();
        let mut model = Wrapping::default();
        for handle in &handles {
            model.subscribe(handle);
        }

        for _ in 0..mutations {
            prop_assert_eq!(model.increment().unwrap(), views);
        }

        let expected: Vec<usize> = (0..mutations).flat_map(|_| 0..views).collect();
        prop_assert_eq!(&*log.borrow(), &expected);
    }

    #[test]
    fn duplicate_subscriptions_render_per_registration(copies in 1usize..5, mutations in 1usize..5) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let view = Rc::new(RefCell::new(Tagged { tag: 0, log: Rc::clone(&log) }));
        let mut model = Wrapping::default();
        for _ in 0..copies {
            model.subscribe(&view);
        }
        for _ in 0..mutations {
            model.increment().unwrap();
        }
        prop_assert_eq!(log.borrow().len(), copies * mutations);
    }

    #[test]
    fn increments_wrap_and_output_follows(start in any::<u32>(), steps in 0u32..300) {
        let sink = MemorySink::new();
        let view = Rc::new(RefCell::new(counter_view(&sink)));
        let mut model = Wrapping::at(start);
        model.subscribe(&view);

        for _ in 0..steps {
            model.increment().unwrap();
        }

        let expected = start.wrapping_add(steps);
        prop_assert_eq!(model.value, expected);
        if steps > 0 {
            let view_ref = view.borrow();
            prop_assert_eq!(
                view_ref.output(),
                format!(r#"<span class="counter-value">{expected}</span>"#)
            );
        }
    }

    #[test]
    fn memory_display_is_idempotent(content in ".{0,64}") {
        let mut once = MemorySink::new();
        once.display("t", &content).unwrap();

        let mut twice = MemorySink::new();
        twice.display("t", &content).unwrap();
        twice.display("t", &content).unwrap();

        prop_assert_eq!(once.regions(), twice.regions());
    }

    #[test]
    fn terminal_display_is_idempotent(content in "[ -~]{0,64}") {
        let mut once = TerminalSink::new(Vec::new(), TerminalMode::Inline);
        once.display("t", &content).unwrap();

        let mut twice = TerminalSink::new(Vec::new(), TerminalMode::Inline);
        twice.display("t", &content).unwrap();
        twice.display("t", &content).unwrap();

        prop_assert_eq!(once.into_inner(), twice.into_inner());
    }

    #[test]
    fn initial_render_matches_snapshot(start in any::<u32>()) {
        init_tracing();
        let sink = MemorySink::new();
        let mut ctrl = Controller::with_scheduler(
            Wrapping::at(start),
            counter_view(&sink),
            RuntimeConfig::default(),
            ManualScheduler::new(),
        );
        ctrl.attach_views().unwrap();

        let expected = apply_counter_template(&ctrl.model().to_external());
        let view_ref = ctrl.view();
        prop_assert_eq!(view_ref.output(), expected.as_str());
        drop(view_ref);
        prop_assert_eq!(sink.content("counter-container"), Some(expected));
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn apply_counter_template(snapshot: &Snapshot) -> String {
    HandlebarsCompiler::new()
        .compile(r#"<span class="counter-value">{{value}}</span>"#)
        .expect("template compiles")
        .apply(snapshot)
        .expect("template applies")
        .unwrap_or_default()
}

#[test]
fn wrap_at_maximum_renders_zero() {
    init_tracing();
    let sink = MemorySink::new();
    let view = Rc::new(RefCell::new(counter_view(&sink)));
    let mut model = Wrapping::at(u32::MAX);
    model.subscribe(&view);

    model.increment().unwrap();
    assert_eq!(model.value, 0);
    assert_eq!(
        sink.content("counter-container").as_deref(),
        Some(r#"<span class="counter-value">0</span>"#)
    );
}
