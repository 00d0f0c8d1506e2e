#![forbid(unsafe_code)]

//! Template collaborator seam.
//!
//! The runtime does not implement templating itself. It needs exactly two
//! capabilities:
//!
//! - [`TemplateCompiler::compile`]: source text to a reusable [`Template`],
//!   failing with [`TemplateCompileError`] on malformed input.
//! - [`Template::apply`]: snapshot to an optional string. `None` means "no
//!   output" and views present it as the empty string.
//!
//! [`HandlebarsCompiler`] is the stock collaborator. [`FnTemplate`] adapts a
//! closure, which is handy for tests and for views that don't need a
//! template language at all.

use std::fmt;

use handlebars::Handlebars;

use crate::error::{TemplateCompileError, ViewError};
use crate::snapshot::Snapshot;

/// A compiled template: a pure function from snapshot to string.
pub trait Template {
    /// Apply the template to a snapshot.
    fn apply(&self, snapshot: &Snapshot) -> Result<Option<String>, ViewError>;
}

/// Compiles template source text into a [`Template`].
pub trait TemplateCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn Template>, TemplateCompileError>;
}

impl<F> TemplateCompiler for F
where
    F: Fn(&str) -> Result<Box<dyn Template>, TemplateCompileError>,
{
    fn compile(&self, source: &str) -> Result<Box<dyn Template>, TemplateCompileError> {
        self(source)
    }
}

/// Name under which each compiled source is registered in its private
/// registry.
const TEMPLATE_NAME: &str = "view";

/// Handlebars-backed compiler.
///
/// Every compiled template gets its own registry, so templates never see
/// each other's partials or helpers.
#[derive(Debug, Clone, Copy)]
pub struct HandlebarsCompiler {
    escape_html: bool,
    strict: bool,
}

impl Default for HandlebarsCompiler {
    fn default() -> Self {
        Self {
            escape_html: true,
            strict: false,
        }
    }
}

impl HandlebarsCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle HTML escaping of interpolated values (on by default).
    #[must_use]
    pub fn with_html_escape(mut self, enabled: bool) -> Self {
        self.escape_html = enabled;
        self
    }

    /// In strict mode, referencing a field missing from the snapshot is a
    /// render error instead of an empty interpolation.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl TemplateCompiler for HandlebarsCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn Template>, TemplateCompileError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.strict);
        if !self.escape_html {
            registry.register_escape_fn(handlebars::no_escape);
        }
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .map_err(|e| TemplateCompileError::new(e.to_string(), source))?;
        tracing::debug!(len = source.len(), strict = self.strict, "compiled template");
        Ok(Box::new(HandlebarsTemplate { registry }))
    }
}

struct HandlebarsTemplate {
    registry: Handlebars<'static>,
}

impl Template for HandlebarsTemplate {
    fn apply(&self, snapshot: &Snapshot) -> Result<Option<String>, ViewError> {
        self.registry
            .render(TEMPLATE_NAME, &snapshot.to_json())
            .map(Some)
            .map_err(|e| ViewError::Template(e.to_string()))
    }
}

type TemplateFn = dyn Fn(&Snapshot) -> Result<Option<String>, ViewError>;

/// A template backed by a closure.
pub struct FnTemplate {
    f: Box<TemplateFn>,
}

impl FnTemplate {
    /// Wrap an infallible closure.
    pub fn new(f: impl Fn(&Snapshot) -> Option<String> + 'static) -> Self {
        Self {
            f: Box::new(move |snap| Ok(f(snap))),
        }
    }

    /// Wrap a closure that can fail.
    pub fn fallible(f: impl Fn(&Snapshot) -> Result<Option<String>, ViewError> + 'static) -> Self {
        Self { f: Box::new(f) }
    }

    /// A compiler that ignores its source and always yields this closure's
    /// template. Lets closure templates go through the same construction
    /// path as compiled ones.
    pub fn compiler(
        f: impl Fn(&Snapshot) -> Option<String> + Clone + 'static,
    ) -> impl TemplateCompiler {
        move |_source: &str| -> Result<Box<dyn Template>, TemplateCompileError> {
            Ok(Box::new(FnTemplate::new(f.clone())))
        }
    }
}

impl fmt::Debug for FnTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTemplate").finish_non_exhaustive()
    }
}

impl Template for FnTemplate {
    fn apply(&self, snapshot: &Snapshot) -> Result<Option<String>, ViewError> {
        (self.f)(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(value: u32) -> Snapshot {
        Snapshot::builder().field("value", value).build()
    }

    #[test]
    fn handlebars_interpolates_fields() {
        let template = HandlebarsCompiler::new()
            .compile(r#"<span class="counter-value">{{value}}</span>"#)
            .unwrap();
        assert_eq!(
            template.apply(&counter(3)).unwrap().as_deref(),
            Some(r#"<span class="counter-value">3</span>"#)
        );
    }

    #[test]
    fn handlebars_rejects_unclosed_block() {
        let err = HandlebarsCompiler::new()
            .compile("{{#if value}}<b>open")
            .err()
            .expect("unclosed block must not compile");
        assert!(err.excerpt.starts_with("{{#if value}}"));
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn handlebars_escapes_values_by_default() {
        let snap = Snapshot::builder().field("name", "<b>").build();
        let escaped = HandlebarsCompiler::new().compile("{{name}}").unwrap();
        assert_eq!(escaped.apply(&snap).unwrap().as_deref(), Some("&lt;b&gt;"));

        let raw = HandlebarsCompiler::new()
            .with_html_escape(false)
            .compile("{{name}}")
            .unwrap();
        assert_eq!(raw.apply(&snap).unwrap().as_deref(), Some("<b>"));
    }

    #[test]
    fn missing_fields_render_empty_unless_strict() {
        let lenient = HandlebarsCompiler::new().compile("[{{missing}}]").unwrap();
        assert_eq!(lenient.apply(&counter(1)).unwrap().as_deref(), Some("[]"));

        let strict = HandlebarsCompiler::new()
            .with_strict(true)
            .compile("[{{missing}}]")
            .unwrap();
        assert!(matches!(
            strict.apply(&counter(1)),
            Err(ViewError::Template(_))
        ));
    }

    #[test]
    fn fn_template_may_produce_nothing() {
        let template = FnTemplate::new(|_| None);
        assert_eq!(template.apply(&Snapshot::empty()).unwrap(), None);
    }

    #[test]
    fn fn_template_compiler_ignores_source() {
        let compiler = FnTemplate::compiler(|snap: &Snapshot| {
            snap.get("value").map(ToString::to_string)
        });
        let template = compiler.compile("anything {{").unwrap();
        assert_eq!(template.apply(&counter(9)).unwrap().as_deref(), Some("9"));
    }
}
