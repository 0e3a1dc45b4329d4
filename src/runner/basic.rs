// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default in-process [`Host`] implementation.

use std::{cell::RefCell, fmt, panic::AssertUnwindSafe, rc::Rc, time::Duration};

use futures::{
    future::LocalBoxFuture, stream, FutureExt as _, StreamExt as _,
};
use smart_default::SmartDefault;

use super::{
    coerce_error, deadline, display_name, nested, CurrentTest, HookBody, Host,
    TestBody, TestMode,
};

/// Configuration of a [`Basic`] host.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Maximum number of sibling tests executed concurrently.
    #[default(64)]
    pub concurrency: usize,
}

/// Outcome of a single test run by a [`Basic`] host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Test passed.
    Passed,

    /// Test failed with the given message.
    Failed(String),

    /// Test was skipped.
    Skipped,
}

/// Outcomes of all the tests run by a [`Basic`] host.
#[derive(Clone, Debug, Default)]
pub struct Report {
    /// Display names of the tests along with their [`Outcome`]s, in the order
    /// they finished.
    pub tests: Vec<(String, Outcome)>,

    /// Messages of panicked hooks.
    pub hook_failures: Vec<String>,
}

impl Report {
    /// Returns the number of tests with the [`Outcome`] matching the given
    /// predicate.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.tests.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Indicates whether some test or hook has failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        !self.hook_failures.is_empty()
            || self.count(|o| matches!(o, Outcome::Failed(_))) > 0
    }
}

/// Declared test.
struct Test {
    title: String,
    mode: TestMode,
    timeout: Option<Duration>,
    body: TestBody,
}

/// Declared suite.
#[derive(Default)]
struct Suite {
    title: String,
    mode: TestMode,
    before_all: Vec<HookBody>,
    after_all: Vec<HookBody>,
    before_each: Vec<HookBody>,
    after_each: Vec<HookBody>,
    tests: Vec<Test>,
    suites: Vec<Suite>,
}

impl Suite {
    /// Indicates whether this [`Suite`] or anything inside it is in
    /// [`TestMode::Only`].
    fn has_only(&self) -> bool {
        self.mode == TestMode::Only
            || self.tests.iter().any(|t| t.mode == TestMode::Only)
            || self.suites.iter().any(Self::has_only)
    }

    /// Returns the display names of all the tests inside this [`Suite`].
    fn test_names(&self, path: &[String], out: &mut Vec<String>) {
        let path = nested(path, &self.title);
        out.extend(self.tests.iter().map(|t| display_name(&path, &t.title)));
        for s in &self.suites {
            s.test_names(&path, out);
        }
    }
}

/// Hooks inherited by a [`Suite`] from its ancestors.
#[derive(Clone, Default)]
struct Inherited {
    before_each: Vec<HookBody>,
    after_each: Vec<HookBody>,
}

/// In-process [`Host`], collecting the declared suites and running them
/// afterwards with [`Basic::run()`].
///
/// Tests of the same suite run concurrently (up to the
/// [`Config::concurrency`]), while nested suites run one after another, once
/// all the tests of their parent suite are done.
pub struct Basic {
    config: Config,
    stack: Vec<Suite>,
    current: Rc<RefCell<Option<String>>>,
}

impl fmt::Debug for Basic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Basic")
            .field("config", &self.config)
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl Default for Basic {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Basic {
    /// Creates a new empty [`Basic`] host with the given [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stack: vec![Suite::default()],
            current: Rc::new(RefCell::new(None)),
        }
    }

    /// Limits the number of concurrently executed sibling tests.
    #[must_use]
    pub fn concurrency(mut self, max: usize) -> Self {
        self.config.concurrency = max;
        self
    }

    fn current_suite(&mut self) -> &mut Suite {
        // The root suite is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Runs all the declared suites and tests.
    pub async fn run(mut self) -> Report {
        while self.stack.len() > 1 {
            if let Some(s) = self.stack.pop() {
                self.current_suite().suites.push(s);
            }
        }
        let root = self.stack.pop().unwrap_or_default();
        let runner = Rc::new(Runner {
            concurrency: self.config.concurrency.max(1),
            only: root.has_only(),
            current: Rc::clone(&self.current),
            report: RefCell::new(Report::default()),
        });

        tracing::debug!(only = runner.only, "running host suites");
        Rc::clone(&runner)
            .run_suite(root, Vec::new(), Inherited::default(), false)
            .await;

        runner.report.take()
    }
}

impl Host for Basic {
    fn suite<F>(&mut self, title: &str, mode: TestMode, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.stack.push(Suite {
            title: title.to_owned(),
            mode,
            ..Suite::default()
        });
        body(self);
        if self.stack.len() > 1 {
            if let Some(s) = self.stack.pop() {
                self.current_suite().suites.push(s);
            }
        }
    }

    fn test(
        &mut self,
        title: &str,
        mode: TestMode,
        timeout: Option<Duration>,
        body: TestBody,
    ) {
        self.current_suite().tests.push(Test {
            title: title.to_owned(),
            mode,
            timeout,
            body,
        });
    }

    fn before_all(&mut self, body: HookBody) {
        self.current_suite().before_all.push(body);
    }

    fn after_all(&mut self, body: HookBody) {
        self.current_suite().after_all.push(body);
    }

    fn before_each(&mut self, body: HookBody) {
        self.current_suite().before_each.push(body);
    }

    fn after_each(&mut self, body: HookBody) {
        self.current_suite().after_each.push(body);
    }

    fn current_test(&self) -> Option<CurrentTest> {
        let current = Rc::clone(&self.current);
        Some(Rc::new(move || current.borrow().clone()))
    }
}

/// Shared state of a [`Basic::run()`].
struct Runner {
    concurrency: usize,
    only: bool,
    current: Rc<RefCell<Option<String>>>,
    report: RefCell<Report>,
}

impl Runner {
    fn run_suite(
        self: Rc<Self>,
        suite: Suite,
        path: Vec<String>,
        inherited: Inherited,
        selected: bool,
    ) -> LocalBoxFuture<'static, ()> {
        async move {
            let parent = path;
            let path = nested(&parent, &suite.title);
            let selected = selected || suite.mode == TestMode::Only;
            if suite.mode == TestMode::Skip
                || (self.only && !selected && !suite.has_only())
            {
                let mut names = Vec::new();
                suite.test_names(&parent, &mut names);
                self.report
                    .borrow_mut()
                    .tests
                    .extend(names.into_iter().map(|n| (n, Outcome::Skipped)));
                return;
            }

            for hook in &suite.before_all {
                self.run_hook(hook).await;
            }

            let mut each = inherited.clone();
            each.before_each.extend(suite.before_each.iter().cloned());
            each.after_each = suite
                .after_each
                .iter()
                .cloned()
                .chain(inherited.after_each.iter().cloned())
                .collect();

            let this = &self;
            let (path_ref, each_ref) = (&path, &each);
            stream::iter(suite.tests)
                .map(|test| this.run_test(test, path_ref, each_ref, selected))
                .buffer_unordered(self.concurrency)
                .collect::<Vec<()>>()
                .await;

            for child in suite.suites {
                Rc::clone(&self)
                    .run_suite(child, path.clone(), each.clone(), selected)
                    .await;
            }

            for hook in &suite.after_all {
                self.run_hook(hook).await;
            }
        }
        .boxed_local()
    }

    async fn run_test(
        &self,
        test: Test,
        path: &[String],
        each: &Inherited,
        selected: bool,
    ) {
        let name = display_name(path, &test.title);
        let excluded = self.only && !selected && test.mode != TestMode::Only;
        if test.mode == TestMode::Skip || excluded {
            self.report.borrow_mut().tests.push((name, Outcome::Skipped));
            return;
        }

        for hook in &each.before_each {
            self.run_hook(hook).await;
        }

        let fut = AssertUnwindSafe((test.body)()).catch_unwind();
        let res = match test.timeout {
            Some(dur) => deadline::timeout(dur, fut).await,
            None => Some(fut.await),
        };
        let timeout = test
            .timeout
            .map(|d| humantime::format_duration(d).to_string())
            .unwrap_or_default();
        let outcome = match res {
            Some(Ok(Ok(()))) => Outcome::Passed,
            Some(Ok(Err(e))) => Outcome::Failed(e.to_string()),
            Some(Err(panic)) => Outcome::Failed(coerce_error(&*panic).into()),
            None => Outcome::Failed(format!("timed out after {timeout}")),
        };
        tracing::trace!(test = %name, ?outcome, "host test finished");

        for hook in &each.after_each {
            *self.current.borrow_mut() = Some(name.clone());
            self.run_hook(hook).await;
        }
        *self.current.borrow_mut() = None;

        self.report.borrow_mut().tests.push((name, outcome));
    }

    async fn run_hook(&self, hook: &HookBody) {
        if let Err(panic) = AssertUnwindSafe(hook()).catch_unwind().await {
            let msg = coerce_error(&*panic).into_owned();
            tracing::warn!("host hook panicked: {msg}");
            self.report.borrow_mut().hook_failures.push(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use futures::{executor::block_on, future, FutureExt as _};

    use super::*;
    use crate::runner::ExecutionError;

    type Log = Rc<RefCell<Vec<String>>>;

    fn hook(log: &Log, msg: &'static str) -> HookBody {
        let log = Rc::clone(log);
        Rc::new(move || {
            log.borrow_mut().push(msg.to_owned());
            future::ready(()).boxed_local()
        })
    }

    fn test(log: &Log, msg: &'static str) -> TestBody {
        let log = Rc::clone(log);
        Box::new(move || {
            log.borrow_mut().push(msg.to_owned());
            passing().boxed_local()
        })
    }

    async fn passing() -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn failing() -> Result<(), ExecutionError> {
        Err(ExecutionError::Dropped { scenario: "x".into() })
    }

    async fn panicking() -> Result<(), ExecutionError> {
        panic!("boom")
    }

    async fn hanging() -> Result<(), ExecutionError> {
        future::pending().await
    }

    #[test]
    fn runs_hooks_around_tests() {
        let log = Log::default();
        let mut host = Basic::default();
        host.before_all(hook(&log, "root before all"));
        host.suite("F", TestMode::Run, |h| {
            h.before_all(hook(&log, "F before all"));
            h.before_each(hook(&log, "F before each"));
            h.after_each(hook(&log, "F after each"));
            h.after_all(hook(&log, "F after all"));
            h.test("a", TestMode::Run, None, test(&log, "a"));
            h.suite("R", TestMode::Run, |h| {
                h.after_each(hook(&log, "R after each"));
                h.test("b", TestMode::Run, None, test(&log, "b"));
            });
        });
        host.after_all(hook(&log, "root after all"));

        let report = block_on(host.run());

        assert_eq!(
            *log.borrow(),
            [
                "root before all",
                "F before all",
                "F before each",
                "a",
                "F after each",
                "F before each",
                "b",
                "R after each",
                "F after each",
                "F after all",
                "root after all",
            ],
        );
        assert_eq!(
            report.tests,
            [
                ("F > a".to_owned(), Outcome::Passed),
                ("F > R > b".to_owned(), Outcome::Passed),
            ],
        );
        assert!(!report.has_failed());
    }

    #[test]
    fn skips_without_polling() {
        let log = Log::default();
        let mut host = Basic::default();
        host.suite("F", TestMode::Run, |h| {
            h.test("a", TestMode::Skip, None, test(&log, "a"));
            h.test("b", TestMode::Run, None, test(&log, "b"));
        });
        host.suite("G", TestMode::Skip, |h| {
            h.before_all(hook(&log, "G before all"));
            h.test("c", TestMode::Run, None, test(&log, "c"));
        });

        let report = block_on(host.run());

        assert_eq!(*log.borrow(), ["b"]);
        assert_eq!(report.count(|o| *o == Outcome::Skipped), 2);
        assert!(report.tests.contains(&("G > c".into(), Outcome::Skipped)));
    }

    #[test]
    fn only_restricts_execution() {
        let log = Log::default();
        let mut host = Basic::default();
        host.suite("F", TestMode::Run, |h| {
            h.test("a", TestMode::Run, None, test(&log, "a"));
            h.test("b", TestMode::Only, None, test(&log, "b"));
        });
        host.suite("G", TestMode::Only, |h| {
            h.test("c", TestMode::Run, None, test(&log, "c"));
        });
        host.suite("H", TestMode::Run, |h| {
            h.test("d", TestMode::Run, None, test(&log, "d"));
        });

        _ = block_on(host.run());

        assert_eq!(*log.borrow(), ["b", "c"]);
    }

    #[test]
    fn reports_failures_and_timeouts() {
        let mut host = Basic::default();
        host.suite("F", TestMode::Run, |h| {
            h.test(
                "err",
                TestMode::Run,
                None,
                Box::new(|| failing().boxed_local()),
            );
            h.test(
                "panic",
                TestMode::Run,
                None,
                Box::new(|| panicking().boxed_local()),
            );
            h.test(
                "slow",
                TestMode::Run,
                Some(Duration::from_millis(10)),
                Box::new(|| hanging().boxed_local()),
            );
        });

        let report = block_on(host.run());

        assert!(report.has_failed());
        assert!(report.tests.contains(&(
            "F > panic".into(),
            Outcome::Failed("boom".into()),
        )));
        assert!(report.tests.contains(&(
            "F > slow".into(),
            Outcome::Failed("timed out after 10ms".into()),
        )));
        assert_eq!(report.count(|o| matches!(o, Outcome::Failed(_))), 3);
    }

    #[test]
    fn exposes_current_test_to_after_each() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut host = Basic::default();
        let current = host.current_test().unwrap();
        let seen2 = Rc::clone(&seen);
        host.after_each(Rc::new(move || {
            seen2.borrow_mut().push(current());
            future::ready(()).boxed_local()
        }));
        host.suite("F", TestMode::Run, |h| {
            h.test(
                "a",
                TestMode::Run,
                None,
                Box::new(|| passing().boxed_local()),
            );
        });

        _ = block_on(host.run());

        assert_eq!(*seen.borrow(), [Some("F > a".to_owned())]);
    }
}
