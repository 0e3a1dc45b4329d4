// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for executing a [`TestPlan`] through a host test runner.
//!
//! [`Adapter`] is the only piece aware of the [`Host`] vocabulary: it
//! registers suites, tests and hooks, and its test bodies execute the
//! scenarios. [`Basic`] is the in-process [`Host`] implementation used by
//! default.
//!
//! [`TestPlan`]: crate::plan::TestPlan

mod adapter;
pub mod basic;
mod deadline;
mod error;
mod result;

use std::{rc::Rc, time::Duration};

use derive_more::with_trait::Display;
use futures::future::LocalBoxFuture;

#[doc(inline)]
pub use self::{
    adapter::Adapter,
    basic::Basic,
    error::{coerce_error, ExecutionError},
    result::{ExecutionResult, Results, RunReport, ScenarioReport},
};

/// Body of a [`Host::test()`].
///
/// An [`Err`] (or a panic) is the failure signal for the [`Host`].
pub type TestBody =
    Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<(), ExecutionError>>>;

/// Body of a [`Host`] hook ([`Host::before_all()`], [`Host::after_each()`],
/// etc.).
pub type HookBody = Rc<dyn Fn() -> LocalBoxFuture<'static, ()>>;

/// Accessor for the display name of the test being executed, formatted as
/// `"suite > ... > test"`.
pub type CurrentTest = Rc<dyn Fn() -> Option<String>>;

/// Execution mode of a [`Host`] suite or test.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum TestMode {
    /// Executed as usual.
    #[default]
    #[display("run")]
    Run,

    /// Reported, but never executed.
    #[display("skip")]
    Skip,

    /// Executed, while everything not marked so is skipped.
    #[display("only")]
    Only,
}

/// Host test runner, providing imperative suite, test and hook primitives.
///
/// # Order guarantees
///
/// Implementors are free to schedule sibling tests concurrently, but must
/// run:
/// - [`Host::before_all()`] hooks of a suite once, before any of its tests;
/// - [`Host::after_all()`] hooks of a suite once, after all of its tests;
/// - [`Host::before_each()`] and [`Host::after_each()`] hooks of a suite
///   around every test of the suite (including the ones of nested suites).
///
/// Hooks of a suite in [`TestMode::Skip`] are never run. Bodies of tests in
/// [`TestMode::Skip`] are never polled.
pub trait Host {
    /// Declares a suite, registering its contents with the `body`.
    fn suite<F>(&mut self, title: &str, mode: TestMode, body: F)
    where
        F: FnOnce(&mut Self);

    /// Declares a test in the current suite.
    ///
    /// Once the `timeout` elapses, the [`Host`] may drop the `body` at its
    /// next suspension point and consider the test failed.
    fn test(
        &mut self,
        title: &str,
        mode: TestMode,
        timeout: Option<Duration>,
        body: TestBody,
    );

    /// Declares a hook running once before all the tests of the current
    /// suite.
    fn before_all(&mut self, body: HookBody);

    /// Declares a hook running once after all the tests of the current suite.
    fn after_all(&mut self, body: HookBody);

    /// Declares a hook running before every test of the current suite.
    fn before_each(&mut self, body: HookBody);

    /// Declares a hook running after every test of the current suite.
    fn after_each(&mut self, body: HookBody);

    /// Returns an accessor for the display name of the test being executed,
    /// if this [`Host`] supports it.
    fn current_test(&self) -> Option<CurrentTest> {
        None
    }
}

/// Appends the suite `title` to the `path`, unless it's empty.
pub(crate) fn nested(path: &[String], title: &str) -> Vec<String> {
    let mut path = path.to_vec();
    if !title.is_empty() {
        path.push(title.to_owned());
    }
    path
}

/// Formats the display name of a test declared in the suite `path`.
pub(crate) fn display_name(path: &[String], title: &str) -> String {
    path.iter()
        .map(String::as_str)
        .chain([title])
        .collect::<Vec<_>>()
        .join(" > ")
}
