//! Message sinks for interpreter output.
//!
//! Everything the interpreter reports (startup banner, script errors,
//! `print` output in editor mode, cache tracing) goes through a
//! [`MessageSink`]. The default [`LogSink`] forwards to the `log` crate.

use log::{Level, LevelFilter};
use std::cell::RefCell;

/// Sink for formatted interpreter lines.
pub trait MessageSink {
    fn emit(&self, level: Level, message: &str);
}

/// Forwards interpreter lines to the `log` crate under the `lgscript` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn emit(&self, level: Level, message: &str) {
        log::log!(target: "lgscript", level, "{}", message);
    }
}

/// Records lines in memory, e.g. for an editor console.
///
/// Lines less severe than the configured filter are dropped.
#[derive(Debug)]
pub struct MemorySink {
    filter: LevelFilter,
    lines: RefCell<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new(filter: LevelFilter) -> Self {
        Self {
            filter,
            lines: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of every recorded line.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.borrow().clone()
    }

    /// Recorded messages at exactly `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// True if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(LevelFilter::Trace)
    }
}

impl MessageSink for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        if level <= self.filter {
            self.lines.borrow_mut().push((level, message.to_string()));
        }
    }
}
