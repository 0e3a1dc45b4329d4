// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Thin adapter to the [Gherkin] parser.
//!
//! Discovering `.feature` files is left to the caller.
//!
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference

use std::{path::Path, sync::Arc};

use derive_more::{Display, Error, From};
use gherkin::GherkinEnv;

/// Result of parsing [Gherkin] documents.
///
/// [Gherkin]: https://cucumber.io/docs/gherkin/reference
pub type Result<T> = std::result::Result<T, Error>;

/// Error of parsing a [Gherkin] document.
///
/// [Gherkin]: https://cucumber.io/docs/gherkin/reference
#[derive(Clone, Debug, Display, Error, From)]
pub enum Error {
    /// Failed to parse a [`Feature`] from text.
    ///
    /// [`Feature`]: gherkin::Feature
    #[display("Failed to parse feature: {_0}")]
    Parsing(Arc<gherkin::ParseError>),

    /// Failed to read or parse a [`Feature`] file.
    ///
    /// [`Feature`]: gherkin::Feature
    #[display("Failed to parse feature file: {_0}")]
    File(Arc<gherkin::ParseFileError>),
}

/// Parses a [`gherkin::Feature`] from the given `text`.
///
/// # Errors
///
/// If the `text` isn't a valid [Gherkin] document.
///
/// [Gherkin]: https://cucumber.io/docs/gherkin/reference
pub fn parse_str(text: &str) -> Result<gherkin::Feature> {
    gherkin::Feature::parse(text, GherkinEnv::default())
        .map_err(|e| Arc::new(e).into())
}

/// Parses a [`gherkin::Feature`] from the file at the given `path`.
///
/// # Errors
///
/// If the file cannot be read or isn't a valid [Gherkin] document.
///
/// [Gherkin]: https://cucumber.io/docs/gherkin/reference
pub fn parse_path(path: impl AsRef<Path>) -> Result<gherkin::Feature> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "parsing feature file");
    gherkin::Feature::parse_path(path, GherkinEnv::default())
        .map_err(|e| Arc::new(e).into())
}

/// Parses [`gherkin::Feature`]s from the files at the given `paths`, keeping
/// their order.
///
/// # Errors
///
/// On the first file failing to be parsed.
pub fn parse_paths<I>(paths: I) -> Result<Vec<gherkin::Feature>>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    paths.into_iter().map(parse_path).collect()
}
