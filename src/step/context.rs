// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution context of a matched [`gherkin::Step`].

use std::str::FromStr;

/// Name of a capturing group, if it has one.
pub type CaptureName = Option<String>;

/// Context for a [`Step`] function execution.
///
/// [`Step`]: super::Step
#[derive(Clone, Debug)]
pub struct Context {
    /// [`gherkin::Step`] matched to a [`Step`] function.
    ///
    /// [`Step`]: super::Step
    pub step: gherkin::Step,

    /// Matches of the [`Pattern`] against [`gherkin::Step::value`].
    ///
    /// The first element is always the whole match, the rest are capturing
    /// groups in order of their appearance.
    ///
    /// [`Pattern`]: super::Pattern
    pub matches: Vec<(CaptureName, String)>,
}

impl Context {
    /// Creates a new [`Context`].
    #[must_use]
    pub const fn new(
        step: gherkin::Step,
        matches: Vec<(CaptureName, String)>,
    ) -> Self {
        Self { step, matches }
    }

    /// Returns the captured value at the given `index` (`0` is the whole
    /// match).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.matches.get(index).map(|(_, v)| v.as_str())
    }

    /// Returns the value of the named capturing group.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the `n`th argument (`1`-based, skipping the whole match).
    ///
    /// Returns [`None`] if there is no such argument or it fails to parse.
    #[must_use]
    pub fn arg<T: FromStr>(&self, n: usize) -> Option<T> {
        self.get(n).and_then(|v| v.parse().ok())
    }

    /// Returns the [`gherkin::Table`] attached to the step, if any.
    #[must_use]
    pub fn table(&self) -> Option<&gherkin::Table> {
        self.step.table.as_ref()
    }

    /// Returns the doc-string attached to the step, if any.
    #[must_use]
    pub fn docstring(&self) -> Option<&str> {
        self.step.docstring.as_deref()
    }
}
