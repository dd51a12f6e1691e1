//! Execution context
//!
//! A `Context` is the handle a spec body receives while it runs. It collects
//! declared children (only while a discovery callback is installed), records
//! failures, and raises the skip signal. One context exists per body
//! invocation; its error list starts empty and the discovery callback is
//! dropped on every exit path, so no state leaks between invocations.

use std::fmt::{self, Display};
use std::panic::panic_any;
use std::sync::Arc;
use std::sync::Once;

use crate::error::TestError;
use crate::suite::Suite;

/// Callback observing children as a body declares them, in order.
pub(crate) type OnChild<'run> = &'run mut dyn FnMut(&Arc<Suite>);

/// Per-invocation handle passed to a spec body.
pub struct Context<'run> {
    /// Discovery callback — present only while children are being collected
    /// or a targeted re-run is matching; absent once the sequence is frozen.
    on_child: Option<OnChild<'run>>,
    /// Failures recorded by this invocation, in call order
    errors: Vec<TestError>,
}

impl<'run> Context<'run> {
    pub(crate) fn new(on_child: Option<OnChild<'run>>) -> Self {
        Self {
            on_child,
            errors: Vec::new(),
        }
    }

    /// Declare a child spec. The child is registered with the owning node
    /// only if a discovery callback is currently installed; declaring against
    /// an already-frozen child sequence has no effect on it. Returns the
    /// created node, which is useful as a target for a later re-run.
    pub fn it(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(&mut Context<'_>) + Send + Sync + 'static,
    ) -> Arc<Suite> {
        let child = Suite::new(name, body);
        if let Some(on_child) = self.on_child.as_mut() {
            on_child(&child);
        }
        child
    }

    /// Record a failure at the caller's call site. Non-terminating: the rest
    /// of the body keeps executing and may record further failures.
    #[track_caller]
    pub fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(TestError::failure(message));
    }

    /// Record a formatted failure at the caller's call site.
    ///
    /// ```ignore
    /// c.failf(format_args!("expected {} got {}", want, got));
    /// ```
    #[track_caller]
    pub fn failf(&mut self, args: fmt::Arguments<'_>) {
        self.errors.push(TestError::failure(args.to_string()));
    }

    /// Abort this body invocation with a skip. No statement after the call
    /// executes, and no failure recorded by a later statement can be
    /// observed. The signal unwinds only to the immediate enclosing run of
    /// this one invocation; it is never visible to ancestor bodies or to the
    /// runner.
    #[track_caller]
    pub fn skip(&self, reason: impl Into<String>) -> ! {
        let err = TestError::skipped(reason);
        install_skip_hook();
        panic_any(err)
    }

    /// Bridge for external assertion facilities: an `Err` surfaces through
    /// the same channel as an explicit `fail`, located at this call site.
    /// Returns the success value so checks can feed later statements.
    #[track_caller]
    pub fn check<T, E: Display>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(TestError::failure(err.to_string()));
                None
            }
        }
    }

    /// Failures recorded so far by this invocation.
    pub fn errors(&self) -> &[TestError] {
        &self.errors
    }

    pub(crate) fn take_errors(&mut self) -> Vec<TestError> {
        std::mem::take(&mut self.errors)
    }
}

/// The default panic hook prints a message and backtrace for every unwind,
/// which would spam the output once per skip. Wrap it once so skip signals
/// pass silently; every other panic still reaches the previous hook.
fn install_skip_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let is_skip = info
                .payload()
                .downcast_ref::<TestError>()
                .map(|e| e.is_skip)
                .unwrap_or(false);
            if !is_skip {
                previous(info);
            }
        }));
    });
}
