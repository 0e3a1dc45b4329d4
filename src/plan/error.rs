// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors of resolving [`gherkin::Step`]s against declared patterns.

use derive_more::with_trait::{Display, Error};
use itertools::Itertools as _;

/// Error of resolving a single [`gherkin::Step`] of a scenario.
///
/// Scoped to the scenario it happens in: the scenario is marked as broken
/// while the rest of the plan is built as usual.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
pub enum ResolutionError {
    /// No declared pattern matches the step.
    #[display("Scenario `{scenario}`: no step matches `{step}`")]
    Unresolved {
        /// Title of the scenario.
        scenario: String,

        /// Literal text of the step.
        step: String,
    },

    /// More than one declared pattern matches the step.
    #[display(
        "Scenario `{scenario}`: step `{step}` is ambiguous, it matches {}",
        patterns.iter().map(|p| format!("`{p}`")).join(", "),
    )]
    Ambiguous {
        /// Title of the scenario.
        scenario: String,

        /// Literal text of the step.
        step: String,

        /// Every colliding pattern, sorted.
        patterns: Vec<String>,
    },
}

impl ResolutionError {
    /// Returns the title of the scenario this error happened in.
    #[must_use]
    pub fn scenario(&self) -> &str {
        match self {
            Self::Unresolved { scenario, .. }
            | Self::Ambiguous { scenario, .. } => scenario,
        }
    }

    /// Returns the literal text of the offending step.
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::Unresolved { step, .. } | Self::Ambiguous { step, .. } => {
                step
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguity_lists_every_pattern() {
        let err = ResolutionError::Ambiguous {
            scenario: "eating".into(),
            step: "I eat 5".into(),
            patterns: vec!["I eat {int}".into(), r"^I eat (\d+)$".into()],
        };

        assert_eq!(
            err.to_string(),
            "Scenario `eating`: step `I eat 5` is ambiguous, it matches \
             `I eat {int}`, `^I eat (\\d+)$`",
        );
        assert_eq!(err.scenario(), "eating");
        assert_eq!(err.step(), "I eat 5");
    }
}
