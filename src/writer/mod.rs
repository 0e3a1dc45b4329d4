// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reporting [`Subscriber`]s.
//!
//! [`Subscriber`]: crate::observer::Subscriber

pub mod basic;
pub mod log;
pub mod out;
pub mod summary;

#[doc(inline)]
pub use self::{
    basic::Basic,
    log::Log,
    out::{Coloring, Styles, WriteStrExt},
    summary::{Stats, Summary, Totals},
};
