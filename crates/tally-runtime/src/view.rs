#![forbid(unsafe_code)]

//! Views: compiled template + last rendered output + display sink.
//!
//! Models talk to views through the single-method [`Render`] trait, so any
//! type can be notified. [`TemplateView`] is the stock implementation: it
//! applies a compiled template to each snapshot it is pushed, stores the
//! string, and presents it on its sink.
//!
//! # Invariants
//!
//! 1. `output()` is always the template applied to the most recent snapshot
//!    passed to `render_from` (empty before the first render).
//! 2. A template producing no output is presented as the empty string.
//! 3. The snapshot is not retained past `render_from`.
//!
//! # Failure Modes
//!
//! - **Template error**: `output` keeps its previous value and nothing is
//!   displayed.
//! - **Sink error**: `output` already holds the new string; the error
//!   propagates to the notifier.

use tracing::debug_span;

use crate::error::{TemplateCompileError, ViewError};
use crate::sink::DisplaySink;
use crate::snapshot::Snapshot;
use crate::template::{Template, TemplateCompiler};

/// Something a model can push snapshots to.
pub trait Render {
    fn render_from(&mut self, snapshot: &Snapshot) -> Result<(), ViewError>;
}

/// A view that renders a compiled template into a display sink.
pub struct TemplateView<S: DisplaySink> {
    template: Box<dyn Template>,
    output: String,
    target: String,
    sink: S,
    renders: u64,
}

impl<S: DisplaySink> std::fmt::Debug for TemplateView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateView")
            .field("target", &self.target)
            .field("output", &self.output)
            .field("renders", &self.renders)
            .finish_non_exhaustive()
    }
}

impl<S: DisplaySink> TemplateView<S> {
    /// Compile `source` and build a view presenting on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateCompileError`] if the compiler rejects `source`.
    pub fn new(
        compiler: &dyn TemplateCompiler,
        source: &str,
        target: impl Into<String>,
        sink: S,
    ) -> Result<Self, TemplateCompileError> {
        let template = compiler.compile(source)?;
        Ok(Self::with_template(template, target, sink))
    }

    /// Build a view around an already compiled template.
    pub fn with_template(template: Box<dyn Template>, target: impl Into<String>, sink: S) -> Self {
        Self {
            template,
            output: String::new(),
            target: target.into(),
            sink,
            renders: 0,
        }
    }

    /// The last rendered output.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// The display target this view presents on.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Completed renders so far.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Present `output` on this view's target. Every render goes through
    /// here.
    pub fn display(&mut self, output: &str) -> Result<(), ViewError> {
        self.sink.display(&self.target, output)?;
        Ok(())
    }
}

impl<S: DisplaySink> Render for TemplateView<S> {
    fn render_from(&mut self, snapshot: &Snapshot) -> Result<(), ViewError> {
        let _span = debug_span!("view_render", target = %self.target).entered();
        let output = self.template.apply(snapshot)?.unwrap_or_default();
        self.output.clone_from(&output);
        self.renders += 1;
        self.display(&output)
    }
}
