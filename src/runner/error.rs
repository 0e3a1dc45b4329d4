// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors happening while executing a [`TestPlan`].
//!
//! [`TestPlan`]: crate::plan::TestPlan

use std::{any::Any, borrow::Cow, time::Duration};

use derive_more::with_trait::{Display, Error, From};

use crate::{plan::ResolutionError, scope::HookKind};

/// Failure of a single scenario (or a suite hook).
///
/// Aborts only the remaining phases of the scenario it happens in.
#[derive(Clone, Debug, Display, Error, From, Eq, PartialEq)]
pub enum ExecutionError {
    /// Scenario failed to resolve its steps, so it never ran.
    #[display("{_0}")]
    Resolution(ResolutionError),

    /// [`World`] failed to be created.
    ///
    /// [`World`]: crate::World
    #[display("Scenario `{scenario}`: failed to initialize World: {message}")]
    #[from(ignore)]
    World {
        /// Title of the scenario.
        scenario: String,

        /// Reported error.
        message: String,
    },

    /// Step panicked.
    #[display("Scenario `{scenario}`: step `{step}` failed: {message}")]
    #[from(ignore)]
    Step {
        /// Title of the scenario.
        scenario: String,

        /// Literal text of the step.
        step: String,

        /// Panic message.
        message: String,
    },

    /// Hook panicked.
    #[display(
        "{}{kind} hook failed: {message}",
        scenario.as_ref().map(|s| format!("Scenario `{s}`: ")).unwrap_or_default(),
    )]
    #[from(ignore)]
    Hook {
        /// Kind of the failed hook.
        kind: HookKind,

        /// Title of the scenario, for per-scenario hooks.
        scenario: Option<String>,

        /// Panic message.
        message: String,
    },

    /// Setup hook of some enclosing suite failed, so the scenario never ran.
    #[display("Scenario `{scenario}`: not run, because of a failed setup hook")]
    #[from(ignore)]
    Setup {
        /// Title of the scenario.
        scenario: String,
    },

    /// Scenario exceeded its timeout.
    #[display(
        "Scenario `{scenario}`: timed out after {}",
        humantime::format_duration(*timeout),
    )]
    #[from(ignore)]
    Timeout {
        /// Title of the scenario.
        scenario: String,

        /// Exceeded timeout.
        timeout: Duration,
    },

    /// Host runner finished the test without completing its body.
    #[display("Scenario `{scenario}`: dropped by the host runner unfinished")]
    #[from(ignore)]
    Dropped {
        /// Title of the scenario.
        scenario: String,
    },
}

/// Coerces the given panic payload into a message.
#[must_use]
pub fn coerce_error(err: &(dyn Any + Send)) -> Cow<'static, str> {
    err.downcast_ref::<String>()
        .map(|s| s.clone().into())
        .or_else(|| err.downcast_ref::<&str>().map(|s| (*s).to_owned().into()))
        .unwrap_or_else(|| "(Could not resolve panic payload)".into())
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn coerces_panic_payloads() {
        let str = panic::catch_unwind(|| panic!("static")).unwrap_err();
        let string =
            panic::catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        let other = panic::catch_unwind(|| panic::panic_any(42)).unwrap_err();

        assert_eq!(coerce_error(&*str), "static");
        assert_eq!(coerce_error(&*string), "formatted 1");
        assert_eq!(coerce_error(&*other), "(Could not resolve panic payload)");
    }

    #[test]
    fn displays_context() {
        let err = ExecutionError::Hook {
            kind: HookKind::After,
            scenario: Some("eating".into()),
            message: "oops".into(),
        };
        assert_eq!(err.to_string(), "Scenario `eating`: after hook failed: oops");

        let err = ExecutionError::Timeout {
            scenario: "eating".into(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "Scenario `eating`: timed out after 1s 500ms",
        );
    }
}
