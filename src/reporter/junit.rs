//! JUnit-style reporter
//!
//! Persists one `<testsuite>` record with a total test count and one ordered
//! `<testcase>` per visited node. Classnames join the fixed root token
//! `test` with the sanitized ancestor chain; both classnames and display
//! names are title-cased and stripped to an allow-list (classname:
//! alphanumeric; display name: alphanumeric and space).

use std::io::Write;
use std::sync::Arc;

use log::error;
use regex::Regex;
use serde::Serialize;

use crate::error::TestError;
use crate::reporter::Reporter;
use crate::runner::SuiteFailure;
use crate::suite::Suite;

#[derive(Serialize)]
#[serde(rename = "testsuite")]
struct TestSuiteXml {
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "testcase")]
    cases: Vec<TestCaseXml>,
}

#[derive(Serialize)]
struct TestCaseXml {
    #[serde(rename = "@classname")]
    classname: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "failure")]
    failures: Vec<String>,
    #[serde(rename = "skipped", skip_serializing_if = "Option::is_none")]
    skipped: Option<SkippedXml>,
}

#[derive(Serialize)]
struct SkippedXml {
    #[serde(rename = "@message")]
    message: String,
}

/// Reporter that encodes the run as a JUnit-style XML document on `finish`.
pub struct JUnitReporter<W: Write> {
    w: W,
    stack: Vec<String>,
    invalid_class: Regex,
    invalid_name: Regex,
    suite: TestSuiteXml,
    current: Option<TestCaseXml>,
}

impl<W: Write> JUnitReporter<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            stack: Vec::new(),
            // Patterns are fixed; construction cannot fail.
            invalid_class: Regex::new(r"[^A-Za-z0-9]").unwrap(),
            invalid_name: Regex::new(r"[^A-Za-z0-9 ]").unwrap(),
            suite: TestSuiteXml {
                tests: 0,
                cases: Vec::new(),
            },
            current: None,
        }
    }

    fn class_name(&self, s: &str) -> String {
        self.invalid_class
            .replace_all(&title_case(s), "")
            .into_owned()
    }

    fn name(&self, s: &str) -> String {
        self.invalid_name
            .replace_all(&title_case(s), "")
            .into_owned()
    }

    fn push_current(&mut self) {
        if let Some(case) = self.current.take() {
            self.suite.cases.push(case);
        }
    }
}

impl<W: Write> Reporter for JUnitReporter<W> {
    fn begin(&mut self) {}

    fn start(&mut self, suite: &Arc<Suite>) {
        self.suite.tests += 1;
        let mut chain = Vec::with_capacity(self.stack.len() + 1);
        chain.push("test".to_string());
        chain.extend(self.stack.iter().cloned());
        self.current = Some(TestCaseXml {
            classname: chain.join("."),
            name: self.name(suite.name()),
            failures: Vec::new(),
            skipped: None,
        });
    }

    fn pass(&mut self, _suite: &Arc<Suite>) {
        self.push_current();
    }

    fn fail(&mut self, _suite: &Arc<Suite>, errors: &[TestError]) {
        if let Some(case) = self.current.as_mut() {
            for err in errors {
                case.failures.push(err.message.clone());
            }
        }
        self.push_current();
    }

    fn skip(&mut self, _suite: &Arc<Suite>, skip: &TestError) {
        if let Some(case) = self.current.as_mut() {
            case.skipped = Some(SkippedXml {
                message: skip.message.clone(),
            });
        }
        self.push_current();
    }

    fn descend(&mut self, suite: &Arc<Suite>) {
        self.stack.push(self.class_name(suite.name()));
    }

    fn ascend(&mut self, _suite: &Arc<Suite>) {
        self.stack.pop();
    }

    fn finish(&mut self, _failures: &[SuiteFailure]) {
        let mut body = String::new();
        let mut ser = quick_xml::se::Serializer::new(&mut body);
        ser.indent(' ', 2);
        if let Err(err) = self.suite.serialize(ser) {
            error!("failed to encode junit report: {}", err);
            return;
        }
        let result = self
            .w
            .write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")
            .and_then(|_| self.w.write_all(body.as_bytes()))
            .and_then(|_| self.w.flush());
        if let Err(err) = result {
            error!("failed to write junit report: {}", err);
        }
    }
}

/// Uppercase the first letter of every word, leaving the rest untouched.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() && !prev_is_letter {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev_is_letter = ch.is_alphabetic();
    }
    out
}
