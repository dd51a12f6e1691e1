//! Console reporter
//!
//! One line per node: an icon, the display name indented by nesting depth,
//! and the elapsed duration once the node completes. `start` draws a neutral
//! pending line that the outcome line overwrites with a carriage return.
//! Failures are expanded after the summary with their call site and, best
//! effort, the literal failing source line.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;

use crate::error::TestError;
use crate::reporter::Reporter;
use crate::runner::SuiteFailure;
use crate::suite::Suite;

const ICON_PASS: &str = "\u{2713}"; // ✓
const ICON_FAIL: &str = "\u{2620}"; // ☠

/// Interactive console sink. Writes to stdout by default; any writer works,
/// which is how the tests capture output.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    w: W,
    depth: usize,

    num_spec: usize,
    num_pass: usize,
    num_fail: usize,
    num_skip: usize,

    start: Option<Instant>,
}

impl ConsoleReporter<io::Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsoleReporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(w: W) -> Self {
        Self {
            w,
            depth: 0,
            num_spec: 0,
            num_pass: 0,
            num_fail: 0,
            num_skip: 0,
            start: None,
        }
    }

    /// Write errors are swallowed: a broken console must not change the
    /// outcome of a run.
    fn emit(&mut self, text: &str) {
        let _ = self.w.write_all(text.as_bytes());
    }

    fn status(&mut self, icon: &str, msg: &str, duration: Option<Duration>) {
        let pad = "  ".repeat(self.depth);
        let dur = duration.map(|d| format!("{:?}", d)).unwrap_or_default();
        let line = format!("\r{}{} {:<10} {}", pad, icon, msg, style(dur).dim());
        self.emit(&line);
    }

    fn print_failure(&mut self, failure: &SuiteFailure) {
        self.emit(&format!(
            "\n  FAILURE in '{}'\n",
            failure.suite.name()
        ));
        for err in &failure.errors {
            self.emit(&format!(
                "  {} {}:{}\n",
                style(ICON_FAIL).red().bold(),
                err.file,
                err.line
            ));
            if let Ok(src) = err.source() {
                self.emit(&format!("    {}\n", style(src).bold()));
            }
            for line in err.message.lines() {
                self.emit(&format!("      {}\n", line));
            }
            self.emit("\n");
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn begin(&mut self) {
        self.start = Some(Instant::now());
        self.emit("\n");
    }

    fn start(&mut self, suite: &Arc<Suite>) {
        self.num_spec += 1;
        self.status(" ", suite.name(), None);
    }

    fn pass(&mut self, suite: &Arc<Suite>) {
        self.num_pass += 1;
        let icon = style(ICON_PASS).green().to_string();
        self.status(&icon, suite.name(), Some(suite.duration()));
        self.emit("\n");
    }

    fn fail(&mut self, suite: &Arc<Suite>, _errors: &[TestError]) {
        self.num_fail += 1;
        let icon = style(ICON_FAIL).bold().to_string();
        let name = style(suite.name()).red().to_string();
        self.status(&icon, &name, Some(suite.duration()));
        self.emit("\n");
    }

    fn skip(&mut self, suite: &Arc<Suite>, skip: &TestError) {
        self.num_skip += 1;
        let msg = format!("{} {}", style(suite.name()).yellow(), skip.message);
        self.status(" ", &msg, Some(suite.duration()));
        self.emit("\n");
    }

    fn descend(&mut self, _suite: &Arc<Suite>) {
        self.depth += 1;
    }

    fn ascend(&mut self, _suite: &Arc<Suite>) {
        self.depth -= 1;
    }

    fn finish(&mut self, failures: &[SuiteFailure]) {
        let duration = self
            .start
            .map(|s| s.elapsed())
            .unwrap_or_default();

        self.emit("\n\n----------------------------------------------------\n");
        self.emit(&format!(
            "{} PASSED {} FAILED {} SKIPPED\n",
            self.num_pass, self.num_fail, self.num_skip
        ));

        for failure in failures {
            self.print_failure(failure);
        }

        let status = if failures.is_empty() {
            style("OK").green().to_string()
        } else {
            style("FAIL").red().to_string()
        };
        self.emit(&format!(
            "{} ({} specs in {:?})\n",
            status, self.num_spec, duration
        ));
        let _ = self.w.flush();
    }
}
