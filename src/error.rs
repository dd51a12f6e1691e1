//! Spec errors
//!
//! `TestError` is a single recorded failure or skip inside a spec body, with
//! the call site of the statement that produced it. `SpecError` covers
//! orchestration-level problems (a re-run that no longer declares the child
//! it was asked to reach, or an overall failing run) — those never travel
//! through the reporter protocol as spec outcomes.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::panic::Location;

/// A failure or skip recorded during one spec body invocation.
///
/// The file/line point at the `fail`/`failf`/`skip` call expression itself,
/// captured through `#[track_caller]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError {
    /// Failure message (or skip reason)
    pub message: String,
    /// Source file of the failing/skip-inducing statement
    pub file: &'static str,
    /// Line of the failing/skip-inducing statement
    pub line: u32,
    /// True if this error is a skip signal rather than a failure
    pub is_skip: bool,
}

impl TestError {
    /// Create a failure error located at the caller's call site.
    #[track_caller]
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
            is_skip: false,
        }
    }

    /// Create a skip signal located at the caller's call site.
    #[track_caller]
    pub(crate) fn skipped(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
            is_skip: true,
        }
    }

    /// Best-effort read of the literal source line this error points at,
    /// trimmed of surrounding whitespace. Used for diagnostics only; an I/O
    /// error here must never mask the original test failure.
    pub fn source(&self) -> io::Result<String> {
        let line = read_line(self.file, self.line as usize)?;
        Ok(line.trim().to_string())
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

/// Read a single 1-based line of a file.
fn read_line(fname: &str, line_no: usize) -> io::Result<String> {
    let file = File::open(fname)?;
    let reader = BufReader::new(file);
    for (i, line) in reader.lines().enumerate() {
        if i + 1 == line_no {
            return line;
        }
    }
    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("{} has no line {}", fname, line_no),
    ))
}

/// The kind of orchestration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A targeted re-run completed without the parent declaring the child —
    /// the declared children changed shape since the target was captured
    ChildNotFound,
    /// At least one spec failed during a runner invocation
    Failures,
}

/// An orchestration-level error, distinct from spec-level failures
#[derive(Debug)]
pub struct SpecError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SpecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn child_not_found(parent: &str, child: &str) -> Self {
        Self::new(
            ErrorKind::ChildNotFound,
            format!("suite {:?} did not declare child {:?}", parent, child),
        )
    }

    pub fn failures(count: usize) -> Self {
        Self::new(ErrorKind::Failures, format!("{} spec failures", count))
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SpecError {}
