#![forbid(unsafe_code)]

//! Display sinks: where rendered view output is presented.
//!
//! A sink only needs a named target and a write operation. Presentation must
//! be a pure function of the string: presenting the same content twice
//! looks exactly like presenting it once.
//!
//! - [`MemorySink`]: shared in-memory regions plus a write history. Cloning
//!   a `MemorySink` yields a handle to the same regions, so tests can keep a
//!   handle while a view owns another.
//! - [`TerminalSink`]: writes to any `Write` (normally stdout). In inline
//!   mode it rewrites the current line in place; in line mode it appends one
//!   `target: content` line per change.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{self, Write};
use std::rc::Rc;

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

/// Presents rendered output under a named target.
pub trait DisplaySink {
    fn display(&mut self, target: &str, content: &str) -> io::Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn display(&mut self, target: &str, content: &str) -> io::Result<()> {
        (**self).display(target, content)
    }
}

/// History entries a [`MemorySink`] keeps unless told otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

#[derive(Debug)]
struct MemoryState {
    regions: BTreeMap<String, String>,
    history: VecDeque<(String, String)>,
    history_limit: usize,
    writes: usize,
}

/// In-memory display regions shared between clones.
///
/// Meant for tests and inspection. Regions hold only the latest content per
/// target; the write history keeps the most recent
/// [`DEFAULT_HISTORY_LIMIT`] entries (see [`with_history_limit`](Self::with_history_limit)).
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Rc<RefCell<MemoryState>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose history keeps at most `limit` entries, oldest dropped
    /// first.
    #[must_use]
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoryState {
                regions: BTreeMap::new(),
                history: VecDeque::new(),
                history_limit: limit,
                writes: 0,
            })),
        }
    }

    /// Current content of `target`, if anything was displayed there.
    #[must_use]
    pub fn content(&self, target: &str) -> Option<String> {
        self.state.borrow().regions.get(target).cloned()
    }

    /// All regions, in target-name order.
    #[must_use]
    pub fn regions(&self) -> BTreeMap<String, String> {
        self.state.borrow().regions.clone()
    }

    /// Retained `(target, content)` pairs, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(String, String)> {
        self.state.borrow().history.iter().cloned().collect()
    }

    /// Number of display calls so far, including ones no longer in
    /// [`history`](Self::history).
    #[must_use]
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }
}

impl DisplaySink for MemorySink {
    fn display(&mut self, target: &str, content: &str) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.regions.insert(target.to_owned(), content.to_owned());
        state.writes += 1;
        if state.history_limit > 0 {
            if state.history.len() == state.history_limit {
                state.history.pop_front();
            }
            state.history.push_back((target.to_owned(), content.to_owned()));
        }
        Ok(())
    }
}

/// How a [`TerminalSink`] lays out output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Rewrite the current line in place (interactive terminals).
    Inline,
    /// Append `target: content` lines (pipes, files, CI logs).
    Lines,
}

/// Terminal-backed sink.
///
/// Identical consecutive content for the same target is not rewritten.
#[derive(Debug)]
pub struct TerminalSink<W: Write> {
    out: W,
    mode: TerminalMode,
    last: HashMap<String, String>,
    writes: u64,
    line_open: bool,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, mode: TerminalMode) -> Self {
        Self {
            out,
            mode,
            last: HashMap::new(),
            writes: 0,
            line_open: false,
        }
    }

    #[must_use]
    pub fn mode(&self) -> TerminalMode {
        self.mode
    }

    /// Number of writes that actually reached the underlying writer.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// End an inline line left open by the last write, so the shell prompt
    /// starts on a fresh line. No-op in line mode.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.out.flush()?;
            self.line_open = false;
        }
        Ok(())
    }
}

impl TerminalSink<io::Stdout> {
    /// Stdout sink, inline when stdout is a terminal.
    #[must_use]
    pub fn stdout() -> Self {
        use std::io::IsTerminal;
        let out = io::stdout();
        let mode = if out.is_terminal() {
            TerminalMode::Inline
        } else {
            TerminalMode::Lines
        };
        Self::new(out, mode)
    }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn display(&mut self, target: &str, content: &str) -> io::Result<()> {
        if self.last.get(target).is_some_and(|prev| prev == content) {
            return Ok(());
        }
        match self.mode {
            TerminalMode::Inline => {
                let line = sanitize(content).replace('\n', " ");
                queue!(
                    self.out,
                    MoveToColumn(0),
                    Clear(ClearType::CurrentLine),
                    Print(line)
                )?;
                self.line_open = true;
            }
            TerminalMode::Lines => {
                writeln!(self.out, "{target}: {}", sanitize(content))?;
            }
        }
        self.out.flush()?;
        self.last.insert(target.to_owned(), content.to_owned());
        self.writes += 1;
        Ok(())
    }
}

/// Strip control characters (escape sequences included) except newline and
/// tab, so rendered output can't drive the terminal.
fn sanitize(content: &str) -> String {
    content
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
