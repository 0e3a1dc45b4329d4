// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI (command line interface) configuration of a [`Harness`].
//!
//! [`Harness`]: crate::Harness

use std::time::Duration;

use clap::{Args, Parser};
use gherkin::tagexpr::TagOperation;
use regex::Regex;

use crate::writer::Coloring;

/// Root CLI options of a [`Harness`], applied with [`Harness::with_cli()`].
///
/// May be extended with custom CLI options.
///
/// # Example
///
/// ```rust
/// # use std::time::Duration;
/// #
/// # use cucumber_plan::cli;
/// #
/// #[derive(clap::Args)]
/// struct CustomOpts {
///     /// Database to run scenarios against.
///     #[arg(long)]
///     database: Option<String>,
/// }
///
/// let opts = cli::Opts::<CustomOpts>::try_parse_from([
///     "tests",
///     "--timeout=2s",
///     "--database=memory",
/// ])
/// .unwrap();
///
/// assert_eq!(opts.timeout, Some(Duration::from_secs(2)));
/// assert_eq!(opts.custom.database.as_deref(), Some("memory"));
/// ```
///
/// [`Harness`]: crate::Harness
/// [`Harness::with_cli()`]: crate::Harness::with_cli
#[derive(Clone, Debug, Default, Parser)]
#[command(
    name = "cucumber-plan",
    about = "Run the scenarios of the test plan",
    long_about = None,
)]
pub struct Opts<Custom = Empty>
where
    Custom: Args,
{
    /// Regex to filter scenarios by their name.
    #[arg(
        id = "name",
        long = "name",
        short = 'n',
        value_name = "regex",
        visible_alias = "scenario-name"
    )]
    pub re_filter: Option<Regex>,

    /// Tag expression to filter scenarios by.
    ///
    /// Note: Tags from Feature, Rule, Scenario and Examples are merged
    /// together on filtering, so be careful about conflicting tags on
    /// different levels.
    #[arg(id = "tags", long = "tags", short = 't', value_name = "tagexpr")]
    pub tags_filter: Option<TagOperation>,

    /// Timeout of a single scenario.
    #[arg(
        long,
        value_name = "duration",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Option<Duration>,

    /// Number of sibling scenarios to concurrently execute.
    #[arg(long, short, value_name = "int")]
    pub concurrency: Option<usize>,

    /// Coloring policy for a console output.
    #[arg(long, value_name = "auto|always|never", default_value = "auto")]
    pub color: Coloring,

    /// Additional custom CLI options.
    #[command(flatten)]
    pub custom: Custom,
}

impl<Custom: Args> Opts<Custom> {
    /// Shortcut for [`clap::Parser::parse()`], which doesn't require the trait
    /// being imported.
    #[must_use]
    pub fn parsed() -> Self {
        <Self as Parser>::parse()
    }

    /// Shortcut for [`clap::Parser::try_parse_from()`], which doesn't require
    /// the trait being imported.
    ///
    /// # Errors
    ///
    /// If the given arguments don't represent valid [`Opts`].
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(args)
    }
}

/// Empty CLI options.
#[derive(Args, Clone, Copy, Debug, Default)]
#[group(skip)]
pub struct Empty;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters() {
        let opts = Opts::<Empty>::try_parse_from([
            "tests",
            "-n",
            "^eating",
            "--tags",
            "@fast and not @wip",
        ])
        .unwrap();

        assert_eq!(opts.re_filter.unwrap().as_str(), "^eating");
        assert!(opts.tags_filter.is_some());
        assert_eq!(opts.color, Coloring::Auto);
    }

    #[test]
    fn parses_execution_options() {
        let opts = Opts::<Empty>::try_parse_from([
            "tests",
            "--timeout",
            "1s 500ms",
            "-c",
            "4",
            "--color=never",
        ])
        .unwrap();

        assert_eq!(opts.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(opts.concurrency, Some(4));
        assert_eq!(opts.color, Coloring::Never);
    }

    #[test]
    fn rejects_invalid_options() {
        assert!(Opts::<Empty>::try_parse_from(["tests", "-n", "("]).is_err());
        assert!(
            Opts::<Empty>::try_parse_from(["tests", "--timeout", "soon"])
                .is_err(),
        );
        assert!(
            Opts::<Empty>::try_parse_from(["tests", "--color", "pink"])
                .is_err(),
        );
    }
}
