// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronous fan-out of [`Lifecycle`] events to [`Subscriber`]s.

use std::{
    cell::{Cell, RefCell},
    fmt, io,
    panic::{self, AssertUnwindSafe},
};

use derive_more::{Display, Error, From};

use crate::{
    event::{Event, Lifecycle, Metadata, Phase, Source, Status},
    plan::NodeId,
    runner::{coerce_error, ExecutionError},
    scope::HookKind,
};

/// Error of a [`Subscriber`] handling an [`Event`].
///
/// Never affects the execution outcome, being only logged and counted by the
/// [`Dispatcher`].
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Failed to write the output.
    #[display("failed to write output: {_0}")]
    Io(io::Error),

    /// Any other failure.
    #[display("{_0}")]
    #[from(ignore)]
    Other(#[error(not(source))] String),
}

impl Error {
    /// Creates an [`Error::Other`] out of the given `msg`.
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Observer of [`Lifecycle`] events.
///
/// Every method has a no-op default, so an implementor only overrides the
/// callbacks it's interested in. [`Subscriber::on_event()`] routes an
/// [`Event`] to the callback of its kind, and may be overridden to observe
/// everything at once.
#[expect(unused_variables, reason = "default no-op implementations")]
pub trait Subscriber {
    /// Handles any [`Event`], routing it to the callback of its kind.
    ///
    /// # Errors
    ///
    /// If the routed callback fails.
    fn on_event(&mut self, event: &Event<Lifecycle>) -> Result<(), Error> {
        let meta = event.meta();
        match &event.value {
            Lifecycle::Started => self.on_started(meta),
            Lifecycle::Finished => self.on_finished(meta),
            Lifecycle::Feature { node, feature, phase } => {
                self.on_feature(meta, *node, feature, *phase)
            }
            Lifecycle::Rule { node, rule, phase } => {
                self.on_rule(meta, *node, rule, *phase)
            }
            Lifecycle::Outline { node, outline, phase } => {
                self.on_outline(meta, *node, outline, *phase)
            }
            Lifecycle::Examples { node, examples, phase } => {
                self.on_examples(meta, *node, examples, *phase)
            }
            Lifecycle::Scenario { node, scenario, title, phase, .. } => {
                self.on_scenario(meta, *node, scenario, title, *phase)
            }
            Lifecycle::Background { scenario, step, phase } => {
                self.on_background(meta, *scenario, step, *phase)
            }
            Lifecycle::Step { scenario, step, phase } => {
                self.on_step(meta, *scenario, step, *phase)
            }
            Lifecycle::Hook { node, kind, phase } => {
                self.on_hook(meta, *node, *kind, *phase)
            }
            Lifecycle::Status { node, status } => {
                self.on_status(meta, *node, *status)
            }
            Lifecycle::Error { node, error } => {
                self.on_error(meta, *node, error)
            }
        }
    }

    /// Handles [`Lifecycle::Started`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_started(&mut self, meta: Metadata) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Finished`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_finished(&mut self, meta: Metadata) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Feature`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_feature(
        &mut self,
        meta: Metadata,
        node: NodeId,
        feature: &Source<gherkin::Feature>,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Rule`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_rule(
        &mut self,
        meta: Metadata,
        node: NodeId,
        rule: &Source<gherkin::Rule>,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Outline`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_outline(
        &mut self,
        meta: Metadata,
        node: NodeId,
        outline: &Source<gherkin::Scenario>,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Examples`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_examples(
        &mut self,
        meta: Metadata,
        node: NodeId,
        examples: &Source<gherkin::Examples>,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Scenario`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_scenario(
        &mut self,
        meta: Metadata,
        node: NodeId,
        scenario: &Source<gherkin::Scenario>,
        title: &str,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Background`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_background(
        &mut self,
        meta: Metadata,
        scenario: NodeId,
        step: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Step`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_step(
        &mut self,
        meta: Metadata,
        scenario: NodeId,
        step: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Hook`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_hook(
        &mut self,
        meta: Metadata,
        node: Option<NodeId>,
        kind: HookKind,
        phase: Phase,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Status`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_status(
        &mut self,
        meta: Metadata,
        node: NodeId,
        status: Status,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Handles [`Lifecycle::Error`].
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn on_error(
        &mut self,
        meta: Metadata,
        node: Option<NodeId>,
        error: &ExecutionError,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Delivers every [`Event`] synchronously to all the registered
/// [`Subscriber`]s in their registration order.
///
/// A [`Subscriber`] failing (or panicking) is logged and counted, while the
/// delivery goes on to the remaining ones.
#[derive(Default)]
pub struct Dispatcher {
    subscribers: RefCell<Vec<Box<dyn Subscriber>>>,
    failures: Cell<usize>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &self.len())
            .field("failures", &self.failures.get())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a new [`Dispatcher`] without any [`Subscriber`]s.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the given [`Subscriber`] after all the already registered
    /// ones.
    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) {
        self.subscribers.get_mut().push(Box::new(subscriber));
    }

    /// Returns the number of registered [`Subscriber`]s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Indicates whether there are no registered [`Subscriber`]s.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of failed deliveries so far.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.get()
    }

    /// Wraps the given `value` into a new [`Event`] and delivers it.
    pub fn emit(&self, value: Lifecycle) {
        self.dispatch(&Event::new(value));
    }

    /// Delivers the given [`Event`] to every [`Subscriber`].
    pub fn dispatch(&self, event: &Event<Lifecycle>) {
        let Ok(mut subscribers) = self.subscribers.try_borrow_mut() else {
            tracing::error!(
                id = event.id,
                "event emitted while being dispatched, dropping it",
            );
            self.failures.set(self.failures.get() + 1);
            return;
        };
        for (n, sub) in subscribers.iter_mut().enumerate() {
            let res =
                panic::catch_unwind(AssertUnwindSafe(|| sub.on_event(event)));
            let err = match res {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", coerce_error(&*panic)),
            };
            tracing::warn!(
                subscriber = n,
                id = event.id,
                "subscriber failed to handle event: {err}",
            );
            self.failures.set(self.failures.get() + 1);
        }
    }
}
