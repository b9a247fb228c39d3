//! Run reporting.
//!
//! The migration driver and resolvers report through an injected
//! [`Reporter`] instead of a process-wide logger. [`TracingReporter`]
//! forwards entries to `tracing` (console and log file) and draws a progress
//! bar; [`MemoryReporter`] keeps entries in memory for tests.

use std::cell::{Cell, RefCell};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Severity of a report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single report entry
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Pipeline stage the entry belongs to, if any
    pub stage: Option<&'static str>,
    /// Nesting level for detail lines
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            stage: None,
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    pub fn in_stage(mut self, stage: &'static str) -> Self {
        self.stage = Some(stage);
        self
    }
}

// =============================================================================
// Reporter Trait
// =============================================================================

/// Sink for run progress and messages.
pub trait Reporter {
    /// Record one entry.
    fn log(&self, entry: LogEntry);

    /// Row iteration is starting over `total` rows.
    fn start_progress(&self, _total: usize) {}

    /// One more row processed.
    fn advance(&self) {}

    /// Row iteration ended, successfully or not.
    fn finish_progress(&self) {}
}

// =============================================================================
// Tracing Reporter
// =============================================================================

/// Forwards entries to `tracing` and shows a progress bar while iterating.
pub struct TracingReporter {
    show_progress: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl TracingReporter {
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            bar: Mutex::new(None),
        }
    }

    fn emit(entry: &LogEntry) {
        let indent = "  ".repeat(entry.indent as usize);
        let stage = entry.stage.unwrap_or("-");
        match entry.level {
            LogLevel::Info => tracing::info!(stage, "{indent}{}", entry.message),
            LogLevel::Success => tracing::info!(stage, outcome = "ok", "{indent}{}", entry.message),
            LogLevel::Warning => tracing::warn!(stage, "{indent}{}", entry.message),
            LogLevel::Error => tracing::error!(stage, "{indent}{}", entry.message),
        }
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reporter for TracingReporter {
    fn log(&self, entry: LogEntry) {
        match self.active_bar() {
            Some(bar) => bar.suspend(|| Self::emit(&entry)),
            None => Self::emit(&entry),
        }
    }

    fn start_progress(&self, total: usize) {
        if !self.show_progress {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{prefix:.bold} [{elapsed_precise}] [{bar:32.cyan/blue}] {pos}/{len} ({percent}%) eta {eta_precise}",
        ) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix("Migrating");
        bar.enable_steady_tick(Duration::from_millis(250));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn advance(&self) {
        if let Some(bar) = self.active_bar() {
            bar.inc(1);
        }
    }

    fn finish_progress(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}

// =============================================================================
// Memory Reporter
// =============================================================================

/// Keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: RefCell<Vec<LogEntry>>,
    progress_total: Cell<Option<usize>>,
    advanced: Cell<usize>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// True if some entry's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.message.contains(needle))
    }

    /// Stages in the order they were first reported.
    pub fn stages(&self) -> Vec<&'static str> {
        let mut stages: Vec<&'static str> = Vec::new();
        for stage in self.entries.borrow().iter().filter_map(|e| e.stage) {
            if stages.last() != Some(&stage) {
                stages.push(stage);
            }
        }
        stages
    }

    pub fn progress_total(&self) -> Option<usize> {
        self.progress_total.get()
    }

    pub fn advanced(&self) -> usize {
        self.advanced.get()
    }
}

impl Reporter for MemoryReporter {
    fn log(&self, entry: LogEntry) {
        self.entries.borrow_mut().push(entry);
    }

    fn start_progress(&self, total: usize) {
        self.progress_total.set(Some(total));
    }

    fn advance(&self) {
        self.advanced.set(self.advanced.get() + 1);
    }
}
