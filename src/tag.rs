// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Tag expression][0] filtering of scenarios.
//!
//! [0]: https://cucumber.io/docs/cucumber/api#tag-expressions

use derive_more::with_trait::{Display, Error};
use gherkin::tagexpr::TagOperation;
use sealed::sealed;

/// Extension of a [`TagOperation`] allowing to evaluate it.
#[sealed]
pub trait Ext {
    /// Evaluates this [`TagOperation`] for the given `tags` (without the
    /// leading `@`).
    #[must_use]
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone;
}

#[sealed]
impl Ext for TagOperation {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::And(l, r) => l.eval(tags.clone()) & r.eval(tags),
            Self::Or(l, r) => l.eval(tags.clone()) | r.eval(tags),
            Self::Not(t) => !t.eval(tags),
            Self::Tag(t) => tags.into_iter().any(|tag| tag.as_ref() == t),
        }
    }
}

/// Error of parsing a tag expression.
#[derive(Clone, Debug, Display, Error)]
#[display("invalid tag expression `{expression}`: {reason}")]
pub struct ParseError {
    /// Source of the invalid expression.
    pub expression: String,

    /// Human-readable reason of the failure.
    pub reason: String,
}

/// Parses a tag expression like `@smoke and not @slow`.
///
/// # Errors
///
/// If the `expr` isn't a valid tag expression.
pub fn parse(expr: &str) -> Result<TagOperation, ParseError> {
    expr.parse().map_err(|e: <TagOperation as std::str::FromStr>::Err| {
        ParseError { expression: expr.to_owned(), reason: e.to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_boolean_grammar() {
        let op = parse("@smoke and not (@slow or @wip)").unwrap();

        assert!(op.eval(["smoke"]));
        assert!(op.eval(["smoke", "fast"]));
        assert!(!op.eval(["smoke", "slow"]));
        assert!(!op.eval(["wip"]));
        assert!(!op.eval(Vec::<String>::new()));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse("@smoke and and").unwrap_err();

        assert_eq!(err.expression, "@smoke and and");
    }
}
