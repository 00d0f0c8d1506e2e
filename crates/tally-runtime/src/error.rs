#![forbid(unsafe_code)]

//! Error taxonomy for the runtime.
//!
//! | Error | Raised by | Behavior |
//! |-------|-----------|----------|
//! | [`TemplateCompileError`] | view construction | Surfaces to the caller; nothing is wired |
//! | [`ViewError`] | `render_from` | Propagates to `notify_all` / `attach_views` |
//! | [`NotifyError`] | `notify_all` | Fail-fast or isolated, per [`NotifyPolicy`](crate::NotifyPolicy) |
//! | [`ControllerError`] | controller operations | Propagates to the entry point |
//!
//! Counter overflow is not an error: mutations wrap.

use std::fmt;
use std::io;

use crate::controller::ControllerState;

/// The template collaborator rejected a template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCompileError {
    /// Collaborator-provided reason.
    pub reason: String,
    /// Leading part of the rejected source, for diagnostics.
    pub excerpt: String,
}

/// Longest source excerpt kept in a [`TemplateCompileError`].
const EXCERPT_CHARS: usize = 48;

impl TemplateCompileError {
    /// Build an error for `source`, keeping only a short excerpt of it.
    pub fn new(reason: impl Into<String>, source: &str) -> Self {
        let mut excerpt: String = source.chars().take(EXCERPT_CHARS).collect();
        if source.chars().count() > EXCERPT_CHARS {
            excerpt.push('…');
        }
        Self {
            reason: reason.into(),
            excerpt,
        }
    }
}

impl fmt::Display for TemplateCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template compile error: {} (in {:?})",
            self.reason, self.excerpt
        )
    }
}

impl std::error::Error for TemplateCompileError {}

/// A single view failed to render or present its output.
#[derive(Debug)]
pub enum ViewError {
    /// The compiled template failed while being applied to a snapshot.
    Template(String),
    /// The display sink could not present the output.
    Display(io::Error),
    /// The view was notified while it was already rendering.
    Reentrant,
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(msg) => write!(f, "template evaluation failed: {msg}"),
            Self::Display(e) => write!(f, "display sink failed: {e}"),
            Self::Reentrant => write!(f, "view notified while already rendering"),
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Display(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ViewError {
    fn from(e: io::Error) -> Self {
        Self::Display(e)
    }
}

/// One failed delivery inside a notification cycle.
#[derive(Debug)]
pub struct ViewFailure {
    /// Position of the view in the subscriber list.
    pub index: usize,
    pub error: ViewError,
}

/// A notification cycle did not reach every subscribed view cleanly.
///
/// Notification is never atomic: views rendered before the failure keep
/// their new output.
#[derive(Debug)]
pub enum NotifyError {
    /// Fail-fast: the view at `index` failed and later views were skipped.
    Aborted {
        index: usize,
        /// Views rendered successfully before the failure.
        delivered: usize,
        source: ViewError,
    },
    /// Isolated: every live view was attempted; these ones failed.
    Partial {
        delivered: usize,
        failures: Vec<ViewFailure>,
    },
}

impl NotifyError {
    /// Number of views that rendered successfully during the cycle.
    #[must_use]
    pub fn delivered(&self) -> usize {
        match self {
            Self::Aborted { delivered, .. } | Self::Partial { delivered, .. } => *delivered,
        }
    }

    /// Whether the remaining views were still notified.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted {
                index,
                delivered,
                source,
            } => write!(
                f,
                "notification aborted at view {index} after {delivered} delivered: {source}"
            ),
            Self::Partial {
                delivered,
                failures,
            } => {
                write!(
                    f,
                    "{} view(s) failed, {delivered} delivered",
                    failures.len()
                )?;
                if let Some(first) = failures.first() {
                    write!(f, "; first at view {}: {}", first.index, first.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Aborted { source, .. } => Some(source),
            Self::Partial { failures, .. } => failures
                .first()
                .map(|f| &f.error as &(dyn std::error::Error + 'static)),
        }
    }
}

/// Errors from [`Controller`](crate::Controller) operations.
#[derive(Debug)]
pub enum ControllerError {
    /// The operation is not valid in the controller's current state.
    InvalidState {
        operation: &'static str,
        state: ControllerState,
    },
    /// The initial render after wiring failed.
    Render(ViewError),
    /// A model mutation's notification cycle failed.
    Notify(NotifyError),
    /// The repeating timer could not be started.
    Timer(io::Error),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState { operation, state } => {
                write!(f, "cannot {operation} while controller is {state}")
            }
            Self::Render(e) => write!(f, "initial render failed: {e}"),
            Self::Notify(e) => write!(f, "notification failed: {e}"),
            Self::Timer(e) => write!(f, "failed to start timer: {e}"),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidState { .. } => None,
            Self::Render(e) => Some(e),
            Self::Notify(e) => Some(e),
            Self::Timer(e) => Some(e),
        }
    }
}

impl From<ViewError> for ControllerError {
    fn from(e: ViewError) -> Self {
        Self::Render(e)
    }
}

impl From<NotifyError> for ControllerError {
    fn from(e: NotifyError) -> Self {
        Self::Notify(e)
    }
}
