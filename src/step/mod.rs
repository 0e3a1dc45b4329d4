// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step callbacks, their matching [`Pattern`]s and the [`Context`] a matched
//! [`gherkin::Step`] is executed with.

mod context;
mod pattern;

use futures::future::LocalBoxFuture;

pub use self::{
    context::{CaptureName, Context},
    pattern::{HashableRegex, Pattern, PatternError},
};

/// Alias for a [`gherkin::Step`] function that returns a [`LocalBoxFuture`].
///
/// Panicking inside the returned [`Future`] is the only failure signal.
///
/// [`Future`]: std::future::Future
pub type Step<World> =
    for<'a> fn(&'a mut World, Context) -> LocalBoxFuture<'a, ()>;
