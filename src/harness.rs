// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level [`Harness`] tying scopes, planning and execution together.

use std::{fmt, mem, rc::Rc, time::Duration};

use clap::Args;
use gherkin::tagexpr::TagOperation;
use regex::Regex;

use crate::{
    cli,
    event::Status,
    observer::{Dispatcher, Subscriber},
    plan::{Builder, TestPlan},
    runner::{self, Adapter, RunReport},
    scope::{ConfigError, ScopeRegistry},
    world::{self, Factory},
    writer::{self, Coloring, Summary},
    World,
};

/// Top-level builder of a run: declares scopes, configures filtering and
/// execution, and runs [`gherkin::Feature`]s through the built-in
/// [`runner::Basic`] host.
///
/// By default, the console [`writer::Basic`] reports the run with a
/// [`Summary`] at the end.
///
/// # Example
///
/// ```rust
/// # use cucumber_plan::{step::Context, Harness, World};
/// # use futures::{future::LocalBoxFuture, FutureExt as _};
/// #
/// #[derive(Debug, Default)]
/// struct Counter(u32);
///
/// impl World for Counter {
///     type Error = std::convert::Infallible;
///
///     async fn new() -> Result<Self, Self::Error> {
///         Ok(Self::default())
///     }
/// }
///
/// fn increment(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
///     async move { w.0 += 1 }.boxed_local()
/// }
///
/// # futures::executor::block_on(async {
/// let feature = cucumber_plan::parser::parse_str(
///     "Feature: Counter\n  Scenario: once\n    When it is incremented\n",
/// )
/// .unwrap();
///
/// let report = Harness::<Counter>::new()
///     .quiet()
///     .scopes(|r| r.step("it is incremented", increment))
///     .unwrap()
///     .run([feature])
///     .await
///     .unwrap();
///
/// assert!(!report.execution_has_failed());
/// # });
/// ```
pub struct Harness<W> {
    registry: ScopeRegistry<W>,
    factory: Factory<W>,
    tags: Option<TagOperation>,
    name: Option<Regex>,
    timeout: Option<Duration>,
    host: runner::basic::Config,
    coloring: Coloring,
    console: bool,
    dispatcher: Dispatcher,
}

impl<W> fmt::Debug for Harness<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("registry", &self.registry)
            .field("tags", &self.tags)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("host", &self.host)
            .field("coloring", &self.coloring)
            .field("console", &self.console)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl<W: World> Default for Harness<W> {
    fn default() -> Self {
        Self::with_factory(world::factory::<W>())
    }
}

impl<W: World> Harness<W> {
    /// Creates a new [`Harness`] creating `W`orlds with [`World::new()`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<W: 'static> Harness<W> {
    /// Creates a new [`Harness`] creating `W`orlds with the given
    /// [`Factory`].
    #[must_use]
    pub fn with_factory(factory: Factory<W>) -> Self {
        Self {
            registry: ScopeRegistry::new(),
            factory,
            tags: None,
            name: None,
            timeout: None,
            host: runner::basic::Config::default(),
            coloring: Coloring::Auto,
            console: true,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Declares scopes, steps and hooks in the underlying [`ScopeRegistry`].
    ///
    /// # Errors
    ///
    /// If the declaration fails with a [`ConfigError`].
    pub fn scopes(
        mut self,
        f: impl FnOnce(&mut ScopeRegistry<W>) -> Result<(), ConfigError>,
    ) -> Result<Self, ConfigError> {
        f(&mut self.registry)?;
        Ok(self)
    }

    /// Returns the underlying [`ScopeRegistry`] for declaring scopes, steps
    /// and hooks directly.
    #[must_use]
    pub fn registry_mut(&mut self) -> &mut ScopeRegistry<W> {
        &mut self.registry
    }

    /// Applies the given [`cli::Opts`] on top of the current configuration.
    ///
    /// Options absent from the command line keep their current values.
    #[must_use]
    pub fn with_cli<Custom: Args>(mut self, opts: cli::Opts<Custom>) -> Self {
        let cli::Opts {
            re_filter,
            tags_filter,
            timeout,
            concurrency,
            color,
            custom: _,
        } = opts;
        if re_filter.is_some() {
            self.name = re_filter;
        }
        if tags_filter.is_some() {
            self.tags = tags_filter;
        }
        if timeout.is_some() {
            self.timeout = timeout;
        }
        if let Some(max) = concurrency {
            self.host.concurrency = max;
        }
        if color != Coloring::Auto {
            self.coloring = color;
        }
        self
    }

    /// Only executes scenarios whose effective tags satisfy the given
    /// expression.
    #[must_use]
    pub fn filter_tags(mut self, op: impl Into<Option<TagOperation>>) -> Self {
        self.tags = op.into();
        self
    }

    /// Only executes scenarios whose titles match the given [`Regex`].
    #[must_use]
    pub fn filter_name(mut self, re: impl Into<Option<Regex>>) -> Self {
        self.name = re.into();
        self
    }

    /// Sets the timeout of a single scenario.
    #[must_use]
    pub fn timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Limits the number of concurrently executed sibling scenarios.
    #[must_use]
    pub fn concurrency(mut self, max: usize) -> Self {
        self.host.concurrency = max;
        self
    }

    /// Sets the [`Coloring`] policy of the console output.
    #[must_use]
    pub fn coloring(mut self, color: Coloring) -> Self {
        self.coloring = color;
        self
    }

    /// Disables the console output.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    /// Subscribes the given [`Subscriber`] to the lifecycle events of the
    /// run, after the already subscribed ones.
    #[must_use]
    pub fn subscribe(mut self, subscriber: impl Subscriber + 'static) -> Self {
        self.dispatcher.subscribe(subscriber);
        self
    }

    /// Freezes the declared scopes and builds a [`TestPlan`] of the given
    /// `features` without executing it.
    ///
    /// # Errors
    ///
    /// If some scope is left open.
    pub fn plan<I>(self, features: I) -> Result<TestPlan<W>, ConfigError>
    where
        I: IntoIterator<Item = gherkin::Feature>,
    {
        let Self { registry, tags, name, .. } = self;
        Self::build(registry, tags, name, features)
    }

    fn build<I>(
        registry: ScopeRegistry<W>,
        tags: Option<TagOperation>,
        name: Option<Regex>,
        features: I,
    ) -> Result<TestPlan<W>, ConfigError>
    where
        I: IntoIterator<Item = gherkin::Feature>,
    {
        let tree = registry.finalize()?;
        Ok(Builder::new(&tree)
            .filter_tags(tags)
            .filter_name(name)
            .build(features))
    }

    /// Plans and executes the given `features`, returning a [`RunReport`].
    ///
    /// # Errors
    ///
    /// If some scope is left open.
    pub async fn run<I>(self, features: I) -> Result<RunReport, ConfigError>
    where
        I: IntoIterator<Item = gherkin::Feature>,
    {
        self.execute(features, Summary::new()).await
    }

    /// Plans and executes the given `features`.
    ///
    /// # Panics
    ///
    /// If the configuration is invalid, or some scenario or hook has failed.
    pub async fn run_and_exit<I>(self, features: I)
    where
        I: IntoIterator<Item = gherkin::Feature>,
    {
        let summary = Summary::new();
        let report = match self.execute(features, summary.clone()).await {
            Ok(report) => report,
            Err(e) => panic!("{e}"),
        };

        let failed = report.count(Status::Failed);
        let hook_errors = summary.totals().hook_errors;
        if failed > 0 || hook_errors > 0 {
            let mut msg = Vec::with_capacity(2);
            if failed > 0 {
                msg.push(format!(
                    "{failed} scenario{} failed",
                    if failed == 1 { "" } else { "s" },
                ));
            }
            if hook_errors > 0 {
                msg.push(format!(
                    "{hook_errors} hook error{}",
                    if hook_errors == 1 { "" } else { "s" },
                ));
            }
            panic!("{}", msg.join(", "));
        }
    }

    async fn execute<I>(
        mut self,
        features: I,
        summary: Summary,
    ) -> Result<RunReport, ConfigError>
    where
        I: IntoIterator<Item = gherkin::Feature>,
    {
        let mut dispatcher = mem::take(&mut self.dispatcher);
        dispatcher.subscribe(summary.clone());
        if self.console {
            dispatcher.subscribe(
                writer::Basic::stdout()
                    .coloring(self.coloring)
                    .with_summary(summary),
            );
        }

        let Self { registry, factory, tags, name, timeout, host, .. } = self;
        let plan = Self::build(registry, tags, name, features)?;
        tracing::debug!(
            scenarios = plan.scenarios().len(),
            unmatched_scopes = plan.unmatched_scopes.len(),
            "test plan built",
        );

        let adapter =
            Adapter::new(plan, factory, Rc::new(dispatcher)).timeout(timeout);
        let mut host = runner::Basic::new(host);
        adapter.register(&mut host);
        let outcome = host.run().await;
        if !outcome.hook_failures.is_empty() {
            tracing::warn!(
                failures = ?outcome.hook_failures,
                "host hooks failed outside of scenarios",
            );
        }

        Ok(adapter.report())
    }
}
