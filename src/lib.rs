// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scoped step and hook registry, [Gherkin] test plan builder and host-runner
//! execution adapter in the [Cucumber] tradition.
//!
//! The flow of a run:
//! 1. Steps and hooks are declared in a [`ScopeRegistry`], nested into
//!    feature, rule, scenario, outline and background scopes mirroring the
//!    [Gherkin] document. The registry is then frozen into a [`ScopeTree`].
//! 2. A [`plan::Builder`] compiles parsed [`gherkin::Feature`]s against the
//!    [`ScopeTree`] into an immutable [`TestPlan`]: outlines are expanded,
//!    every step is resolved to exactly one binding (innermost declaration
//!    wins), hook chains are assembled and tag/mode filtering is applied.
//! 3. A [`runner::Adapter`] declares the [`TestPlan`] in some [`runner::Host`]
//!    test runner (the built-in [`runner::Basic`] one by default) and executes
//!    scenarios inside the test bodies the host calls.
//! 4. Every node transition is emitted as an [`Event`] to the
//!    [`observer::Subscriber`]s, like the console [`writer::Basic`].
//!
//! [`Harness`] ties all of these together.
//!
//! [Cucumber]: https://cucumber.io
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![forbid(non_ascii_idents, unsafe_code)]
#![warn(
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::doc_markdown,
    clippy::missing_const_for_fn,
    clippy::todo,
    clippy::unwrap_used,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod cli;
pub mod event;
pub mod harness;
pub mod observer;
pub mod parser;
pub mod plan;
pub mod runner;
pub mod scope;
pub mod step;
pub mod tag;
pub mod world;
pub mod writer;

pub use gherkin;

#[doc(inline)]
pub use self::{
    event::Event,
    harness::Harness,
    plan::TestPlan,
    runner::RunReport,
    scope::{ScopeRegistry, ScopeTree},
    world::World,
};
