//! specrun: a nested behavior-spec test framework
//!
//! Specs are named blocks that declare children lazily as their bodies
//! execute, forming a tree whose leaves are the executable examples. Every
//! example sees isolated parent state without any snapshotting: to reach one
//! child, the engine simply re-invokes the ancestor bodies, so each descent
//! rebuilds the locals those bodies close over.
//!
//! ```
//! use specrun::{suite, ConsoleReporter, Runner};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let mut runner = Runner::new();
//! runner.add(suite("a stack", |c| {
//!     // Fresh for every example that runs below.
//!     let stack = Arc::new(AtomicUsize::new(0));
//!
//!     let s = stack.clone();
//!     c.it("starts empty", move |c| {
//!         if s.load(Ordering::SeqCst) != 0 {
//!             c.fail("expected an empty stack");
//!         }
//!     });
//!
//!     let s = stack.clone();
//!     c.it("grows by one on push", move |c| {
//!         s.fetch_add(1, Ordering::SeqCst);
//!         c.check::<_, String>(if s.load(Ordering::SeqCst) == 1 {
//!             Ok(())
//!         } else {
//!             Err("push did not grow the stack".into())
//!         });
//!     });
//! }));
//!
//! let mut console = ConsoleReporter::new();
//! runner.run(&mut [&mut console]).unwrap();
//! ```
//!
//! # Control flow inside a body
//!
//! | Call | Effect |
//! |---------|-------------|
//! | `c.it` | declare a child spec (registered only during discovery) |
//! | `c.fail` / `c.failf` | record a failure; the body keeps running |
//! | `c.skip` | abort this invocation; reported distinctly, never a failure |
//! | `c.check` | surface a `Result::Err` through the fail channel |
//!
//! A failed or skipped node never descends into its children for that pass.
//! Panics that are not the skip signal propagate unchanged — they are
//! defects, not outcomes.

mod context;
mod error;
mod reporter;
mod runner;
mod suite;

pub use context::Context;
pub use error::{ErrorKind, SpecError, TestError};
pub use reporter::{ConsoleReporter, JUnitReporter, Reporter};
pub use runner::{run_and_assert, Runner, SuiteFailure};
pub use suite::{suite, Body, Outcome, Stats, Suite};
