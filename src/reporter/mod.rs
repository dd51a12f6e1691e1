//! Reporters
//!
//! A reporter is a sink driven through a fixed lifecycle protocol while a
//! traversal runs. For any traversal the order is strict: `begin` once; then
//! per node `start`, followed by exactly one of `pass` / `fail` / `skip`;
//! after a pass, `descend`, the same sequence for each child in order, then
//! `ascend`; finally `finish` once with every recorded failure. Reporters
//! observe — they never alter traversal.

use std::sync::Arc;

use crate::error::TestError;
use crate::runner::SuiteFailure;
use crate::suite::Suite;

mod console;
mod junit;

pub use console::ConsoleReporter;
pub use junit::JUnitReporter;

/// A sink for traversal lifecycle events.
pub trait Reporter {
    /// A full run is starting.
    fn begin(&mut self);

    /// A node's body is about to execute.
    fn start(&mut self, suite: &Arc<Suite>);

    /// The node's own invocation recorded no failures.
    fn pass(&mut self, suite: &Arc<Suite>);

    /// The node's invocation recorded failures, in call order.
    fn fail(&mut self, suite: &Arc<Suite>, errors: &[TestError]);

    /// The node's invocation raised the skip signal.
    fn skip(&mut self, suite: &Arc<Suite>, skip: &TestError);

    /// Entering a passed node's children.
    fn descend(&mut self, suite: &Arc<Suite>);

    /// Done with a passed node's children.
    fn ascend(&mut self, suite: &Arc<Suite>);

    /// The run is over; `failures` holds one record per failing node.
    fn finish(&mut self, failures: &[SuiteFailure]);
}
