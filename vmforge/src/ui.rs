//! User-facing output sink.
//!
//! Progress and failure messages meant for the person running the build.
//! Diagnostic detail goes to `tracing` instead.

use parking_lot::Mutex;

pub trait BuildUi: Send + Sync {
    /// Report progress.
    fn say(&self, message: &str);

    /// Report a failure.
    fn error(&self, message: &str);
}

/// Prints `==> <builder>: message` lines to stdout, errors to stderr.
#[derive(Debug, Clone)]
pub struct ConsoleUi {
    prefix: String,
}

impl ConsoleUi {
    pub fn new(builder: impl Into<String>) -> Self {
        Self {
            prefix: builder.into(),
        }
    }
}

impl BuildUi for ConsoleUi {
    fn say(&self, message: &str) {
        println!("==> {}: {}", self.prefix, message);
    }

    fn error(&self, message: &str) {
        eprintln!("==> {}: {}", self.prefix, message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiLine {
    Say(String),
    Error(String),
}

/// Records every message in memory.
#[derive(Debug, Default)]
pub struct MemoryUi {
    lines: Mutex<Vec<UiLine>>,
}

impl MemoryUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<UiLine> {
        self.lines.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter_map(|line| match line {
                UiLine::Error(msg) => Some(msg.clone()),
                UiLine::Say(_) => None,
            })
            .collect()
    }
}

impl BuildUi for MemoryUi {
    fn say(&self, message: &str) {
        self.lines.lock().push(UiLine::Say(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().push(UiLine::Error(message.to_string()));
    }
}
