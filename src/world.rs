// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`World`] trait definition and the per-[scenario][0] factory built from it.
//!
//! [0]: https://cucumber.io/docs/gherkin/reference#example

use std::{fmt::Display, future::Future, rc::Rc};

use futures::{future::LocalBoxFuture, FutureExt as _};

/// Represents a user-defined state living on a per-[scenario][0] basis.
///
/// A fresh instance is created for every executed [scenario][0] and dropped
/// once it finishes, so no [`World`] is ever observed by two [scenarios][0].
/// State meant to outlive a [scenario][0] belongs in `setup`/`teardown`
/// hooks of the enclosing scope instead.
///
/// [0]: https://cucumber.io/docs/gherkin/reference#example
pub trait World: Sized + 'static {
    /// Error of creating a new [`World`] instance.
    type Error: Display;

    /// Creates a new [`World`] instance.
    fn new() -> impl Future<Output = Result<Self, Self::Error>>;
}

/// Factory producing a fresh [`World`] for each executed scenario.
///
/// Creation errors are reported as their [`Display`] representation.
pub type Factory<W> =
    Rc<dyn Fn() -> LocalBoxFuture<'static, Result<W, String>>>;

/// Returns the [`Factory`] delegating to [`World::new()`].
#[must_use]
pub fn factory<W: World>() -> Factory<W> {
    Rc::new(|| {
        async { W::new().await.map_err(|e| e.to_string()) }.boxed_local()
    })
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[derive(Debug)]
    struct Counter(u8);

    impl World for Counter {
        type Error = &'static str;

        async fn new() -> Result<Self, Self::Error> {
            Ok(Self(7))
        }
    }

    struct Broken;

    impl World for Broken {
        type Error = String;

        async fn new() -> Result<Self, Self::Error> {
            Err("no database".to_owned())
        }
    }

    #[test]
    fn factory_creates_fresh_instances() {
        let make = factory::<Counter>();

        let mut first = block_on(make()).unwrap();
        first.0 += 1;
        let second = block_on(make()).unwrap();

        assert_eq!(first.0, 8);
        assert_eq!(second.0, 7);
    }

    #[test]
    fn factory_reports_creation_error() {
        let make = factory::<Broken>();

        let err = block_on(make()).err().unwrap();

        assert_eq!(err, "no database");
    }
}
