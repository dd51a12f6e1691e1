//! Suite runner
//!
//! Orchestrates a set of root suites against a set of reporters. The runner
//! is itself the reporter the traversal sees: it fans every lifecycle call
//! out to the attached reporters and accumulates one `SuiteFailure` per
//! failing node. Concurrent `run` calls on one runner serialize on a guard;
//! there is no interleaving of node visits between two runs.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{SpecError, TestError};
use crate::reporter::{ConsoleReporter, Reporter};
use crate::suite::Suite;

/// The failures of one spec node, recorded once per failing node and handed
/// to every reporter's `finish`.
#[derive(Debug)]
pub struct SuiteFailure {
    /// The failing node
    pub suite: Arc<Suite>,
    /// Every failure the node's invocation recorded, in call order
    pub errors: Vec<TestError>,
}

/// An explicit registry of root suites.
///
/// Construct one, `add` suites to it, and `run` it against reporters. Every
/// call to `run` is a full, independent traversal — running twice executes
/// every suite twice.
#[derive(Default)]
pub struct Runner {
    suites: Vec<Arc<Suite>>,
    guard: Mutex<()>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a runner pre-seeded with root suites, in run order.
    pub fn with_suites(suites: Vec<Arc<Suite>>) -> Self {
        Self {
            suites,
            guard: Mutex::new(()),
        }
    }

    /// Register a root suite. Takes `&mut self`, so registration cannot race
    /// an active run.
    pub fn add(&mut self, suite: Arc<Suite>) {
        self.suites.push(suite);
    }

    pub fn suites(&self) -> &[Arc<Suite>] {
        &self.suites
    }

    /// Run every registered suite, broadcasting lifecycle calls to each of
    /// the given reporters. Returns an error iff at least one node failed;
    /// skips never contribute to that determination. A concurrent caller on
    /// the same runner blocks until this traversal completes.
    pub fn run(&self, reporters: &mut [&mut dyn Reporter]) -> Result<(), SpecError> {
        // A spec body that panicked out of an earlier run poisons the guard;
        // that must not wedge every later run.
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        debug!("running {} root suites", self.suites.len());

        let mut fanout = Fanout {
            reporters,
            failures: Vec::new(),
        };

        fanout.begin();
        for suite in &self.suites {
            suite.run(&mut fanout)?;
        }
        fanout.finish_run();

        debug!("run complete: {} failing nodes", fanout.failures.len());
        if fanout.failures.is_empty() {
            Ok(())
        } else {
            Err(SpecError::failures(fanout.failures.len()))
        }
    }
}

/// The aggregating reporter a traversal is driven against: broadcasts every
/// call and records failures. Observes without altering traversal.
struct Fanout<'a, 'r> {
    reporters: &'a mut [&'r mut dyn Reporter],
    failures: Vec<SuiteFailure>,
}

impl Fanout<'_, '_> {
    /// `finish` needs the accumulated failures, which live on `self`, so the
    /// trait method stays a no-op and the runner calls this instead.
    fn finish_run(&mut self) {
        for r in self.reporters.iter_mut() {
            r.finish(&self.failures);
        }
    }
}

impl Reporter for Fanout<'_, '_> {
    fn begin(&mut self) {
        for r in self.reporters.iter_mut() {
            r.begin();
        }
    }

    fn start(&mut self, suite: &Arc<Suite>) {
        for r in self.reporters.iter_mut() {
            r.start(suite);
        }
    }

    fn pass(&mut self, suite: &Arc<Suite>) {
        for r in self.reporters.iter_mut() {
            r.pass(suite);
        }
    }

    fn fail(&mut self, suite: &Arc<Suite>, errors: &[TestError]) {
        self.failures.push(SuiteFailure {
            suite: Arc::clone(suite),
            errors: errors.to_vec(),
        });
        for r in self.reporters.iter_mut() {
            r.fail(suite, errors);
        }
    }

    fn skip(&mut self, suite: &Arc<Suite>, skip: &TestError) {
        for r in self.reporters.iter_mut() {
            r.skip(suite, skip);
        }
    }

    fn descend(&mut self, suite: &Arc<Suite>) {
        for r in self.reporters.iter_mut() {
            r.descend(suite);
        }
    }

    fn ascend(&mut self, suite: &Arc<Suite>) {
        for r in self.reporters.iter_mut() {
            r.ascend(suite);
        }
    }

    fn finish(&mut self, _failures: &[SuiteFailure]) {}
}

/// Thin test-harness entry point: run the registry against a console
/// reporter and panic on aggregate failure, so a wrapping `#[test]` fails.
///
/// ```ignore
/// #[test]
/// fn specs() {
///     let mut runner = specrun::Runner::new();
///     runner.add(my_suite());
///     specrun::run_and_assert(&runner);
/// }
/// ```
pub fn run_and_assert(runner: &Runner) {
    let mut console = ConsoleReporter::new();
    if let Err(err) = runner.run(&mut [&mut console]) {
        panic!("{}", err);
    }
}
