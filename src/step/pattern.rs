// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Patterns [`gherkin::Step`]s are matched against.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

use cucumber_expressions::Expression;
use derive_more::with_trait::{Display, Error};
use regex::Regex;

use super::CaptureName;

/// [`Regex`] wrapper comparing and hashing by its source string.
#[derive(Clone, Debug, Display)]
#[display("{_0}")]
pub struct HashableRegex(Regex);

impl From<Regex> for HashableRegex {
    fn from(re: Regex) -> Self {
        Self(re)
    }
}

impl Hash for HashableRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

impl PartialEq for HashableRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for HashableRegex {}

impl PartialOrd for HashableRegex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HashableRegex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_str().cmp(other.0.as_str())
    }
}

impl Deref for HashableRegex {
    type Target = Regex;

    fn deref(&self) -> &Regex {
        &self.0
    }
}

/// Entry of a step catalogue, matched against [`gherkin::Step::value`]s.
///
/// Two [`Pattern`]s are considered the same declaration whenever their
/// [`Pattern::as_str()`] representations are equal, regardless of kind.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Text matched verbatim, producing no arguments.
    Literal(String),

    /// Arbitrary [`Regex`], matched unanchored.
    Regex(HashableRegex),

    /// [Cucumber Expression][0] along with the [`Regex`] it expands into.
    ///
    /// [0]: https://github.com/cucumber/cucumber-expressions
    Expression {
        /// Source of the expression.
        source: String,

        /// Anchored [`Regex`] the expression expands into.
        regex: HashableRegex,
    },
}

impl Pattern {
    /// Creates a [`Pattern::Literal`].
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Creates a [`Pattern::Regex`].
    #[must_use]
    pub fn regex(re: Regex) -> Self {
        Self::Regex(re.into())
    }

    /// Parses the given [Cucumber Expression][0] into a
    /// [`Pattern::Expression`].
    ///
    /// # Errors
    ///
    /// If the `expr` is not a valid [Cucumber Expression][0].
    ///
    /// [0]: https://github.com/cucumber/cucumber-expressions
    pub fn expression(expr: &str) -> Result<Self, PatternError> {
        let regex = Expression::regex(expr).map_err(|e| PatternError {
            pattern: expr.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self::Expression { source: expr.to_owned(), regex: regex.into() })
    }

    /// Returns the source string identifying this [`Pattern`].
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Expression { source: s, .. } => s,
            Self::Regex(re) => re.as_str(),
        }
    }

    /// Matches the given `text`, returning the captured arguments on success.
    ///
    /// The first returned element is always the whole match.
    #[must_use]
    pub fn captures(&self, text: &str) -> Option<Vec<(CaptureName, String)>> {
        match self {
            Self::Literal(lit) => {
                (lit == text).then(|| vec![(None, text.to_owned())])
            }
            Self::Regex(re) | Self::Expression { regex: re, .. } => {
                let caps = re.captures(text)?;
                Some(
                    re.capture_names()
                        .zip(caps.iter())
                        .map(|(name, m)| {
                            (
                                name.map(str::to_owned),
                                m.map(|m| m.as_str().to_owned())
                                    .unwrap_or_default(),
                            )
                        })
                        .collect(),
                )
            }
        }
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Self::regex(re)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "\"{s}\""),
            Self::Regex(re) => write!(f, "/{re}/"),
            Self::Expression { source, .. } => write!(f, "{{{source}}}"),
        }
    }
}

/// Error of parsing a [`Pattern::Expression`].
#[derive(Clone, Debug, Display, Error)]
#[display("invalid Cucumber Expression `{pattern}`: {reason}")]
pub struct PatternError {
    /// Source of the invalid expression.
    pub pattern: String,

    /// Human-readable reason of the failure.
    pub reason: String,
}
