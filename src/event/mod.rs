// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Key occurrences in a lifecycle of a [`TestPlan`] execution.
//!
//! Every occurrence is an immutable [`Event`] wrapping a [`Lifecycle`] value,
//! referring to the [`TestPlan`] node it's about by its [`NodeId`] and to the
//! document node by its [`Source`].
//!
//! [`TestPlan`]: crate::plan::TestPlan

mod source;

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use derive_more::with_trait::{AsRef, Debug, Deref, DerefMut, Display};

use crate::{plan::NodeId, runner::ExecutionError, scope::HookKind};

pub use self::source::Source;

/// Source of [`Event::id`]s, shared by all the runs in the process.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Arbitrary event, paired with its identity and time of happening.
#[derive(AsRef, Clone, Copy, Debug, Deref, DerefMut)]
#[non_exhaustive]
pub struct Event<T: ?Sized> {
    /// Monotonically increasing identifier of this [`Event`].
    pub id: u64,

    /// [`SystemTime`] when this [`Event`] has happened.
    pub at: SystemTime,

    /// Actual value of this [`Event`].
    #[as_ref]
    #[deref]
    #[deref_mut]
    pub value: T,
}

impl<T> Event<T> {
    /// Creates a new [`Event`] out of the given `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            value,
        }
    }

    /// Unwraps the inner [`Event::value`] loosing all the attached metadata.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Returns the detached metadata of this [`Event`], keeping the value.
    #[must_use]
    pub const fn meta(&self) -> Metadata {
        Event { id: self.id, at: self.at, value: () }
    }

    /// Splits this [`Event`] to the inner [`Event::value`] and its detached
    /// metadata.
    #[must_use]
    pub fn split(self) -> (T, Metadata) {
        self.replace(())
    }

    /// Replaces the inner [`Event::value`] with the given one, returning the
    /// old one along.
    #[must_use]
    pub fn replace<V>(self, value: V) -> (T, Event<V>) {
        let event = Event { id: self.id, at: self.at, value };
        (self.value, event)
    }
}

/// Shortcut for a detached metadata of an arbitrary [`Event`].
pub type Metadata = Event<()>;

impl Metadata {
    /// Wraps the given `value` with this [`Event`] metadata.
    #[must_use]
    pub fn wrap<V>(self, value: V) -> Event<V> {
        self.replace(value).1
    }
}

/// Status of a [`TestPlan`] node execution.
///
/// [`TestPlan`]: crate::plan::TestPlan
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
pub enum Status {
    /// Not executed (yet, or at all because of being skipped by its mode or
    /// a filter).
    #[default]
    #[display("pending")]
    Pending,

    /// Being executed right now.
    #[display("running")]
    Running,

    /// Executed successfully.
    #[display("passed")]
    Passed,

    /// Executed with a failure, or failed to be resolved.
    #[display("failed")]
    Failed,

    /// Not executed because of a preceding failure.
    #[display("skipped")]
    Skipped,
}

impl Status {
    /// Indicates whether this [`Status`] may still change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Phase of a single [`TestPlan`] node execution.
///
/// [`TestPlan`]: crate::plan::TestPlan
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Phase {
    /// Execution has started.
    #[display("started")]
    Started,

    /// Execution has finished with the given [`Status`].
    #[display("finished ({_0})")]
    Finished(Status),
}

/// Single occurrence in a lifecycle of a [`TestPlan`] execution.
///
/// Every node gets exactly one [`Phase::Started`] occurrence followed by
/// exactly one [`Phase::Finished`] occurrence, whether the node ran any user
/// code or not.
///
/// [`TestPlan`]: crate::plan::TestPlan
#[derive(Clone, Debug)]
pub enum Lifecycle {
    /// Run has started.
    Started,

    /// [`gherkin::Feature`] event.
    Feature {
        /// [`NodeId`] of the feature.
        node: NodeId,

        /// Source [`gherkin::Feature`].
        feature: Source<gherkin::Feature>,

        /// Execution phase.
        phase: Phase,
    },

    /// [`gherkin::Rule`] event.
    Rule {
        /// [`NodeId`] of the rule.
        node: NodeId,

        /// Source [`gherkin::Rule`].
        rule: Source<gherkin::Rule>,

        /// Execution phase.
        phase: Phase,
    },

    /// [Scenario Outline][0] event.
    ///
    /// [0]: https://cucumber.io/docs/gherkin/reference#scenario-outline
    Outline {
        /// [`NodeId`] of the outline.
        node: NodeId,

        /// Source (unexpanded) outline.
        outline: Source<gherkin::Scenario>,

        /// Execution phase.
        phase: Phase,
    },

    /// [`gherkin::Examples`] group event.
    Examples {
        /// [`NodeId`] of the examples group.
        node: NodeId,

        /// Source [`gherkin::Examples`].
        examples: Source<gherkin::Examples>,

        /// Execution phase.
        phase: Phase,
    },

    /// Executable scenario event.
    Scenario {
        /// [`NodeId`] of the scenario.
        node: NodeId,

        /// Executed (already expanded) [`gherkin::Scenario`].
        scenario: Source<gherkin::Scenario>,

        /// Title the scenario is registered under in the host runner.
        title: String,

        /// Effective tags of the scenario.
        tags: Vec<String>,

        /// Execution phase.
        phase: Phase,
    },

    /// [`gherkin::Background`] step event.
    Background {
        /// [`NodeId`] of the scenario the step runs in.
        scenario: NodeId,

        /// Executed [`gherkin::Step`].
        step: Source<gherkin::Step>,

        /// Execution phase.
        phase: Phase,
    },

    /// Scenario step event.
    Step {
        /// [`NodeId`] of the scenario the step runs in.
        scenario: NodeId,

        /// Executed [`gherkin::Step`].
        step: Source<gherkin::Step>,

        /// Execution phase.
        phase: Phase,
    },

    /// Hook event.
    Hook {
        /// [`NodeId`] of the scenario (for [`HookKind::Before`] and
        /// [`HookKind::After`]) or the suite (for [`HookKind::Setup`] and
        /// [`HookKind::Teardown`]) the hook runs for.
        ///
        /// [`None`] for suite hooks of the whole run.
        node: Option<NodeId>,

        /// Kind of the hook.
        kind: HookKind,

        /// Execution phase.
        phase: Phase,
    },

    /// [`ExecutionResult`] of a node received its terminal [`Status`].
    ///
    /// [`ExecutionResult`]: crate::runner::ExecutionResult
    Status {
        /// [`NodeId`] of the node.
        node: NodeId,

        /// New [`Status`].
        status: Status,
    },

    /// Something failed.
    Error {
        /// [`NodeId`] of the node the failure is attributed to.
        ///
        /// [`None`] for suite hooks of the whole run.
        node: Option<NodeId>,

        /// The failure itself.
        error: ExecutionError,
    },

    /// Run has finished.
    Finished,
}

impl Lifecycle {
    /// Returns the [`Phase`] of this [`Lifecycle`] occurrence, if it has one.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::Feature { phase, .. }
            | Self::Rule { phase, .. }
            | Self::Outline { phase, .. }
            | Self::Examples { phase, .. }
            | Self::Scenario { phase, .. }
            | Self::Background { phase, .. }
            | Self::Step { phase, .. }
            | Self::Hook { phase, .. } => Some(*phase),
            Self::Started
            | Self::Finished
            | Self::Status { .. }
            | Self::Error { .. } => None,
        }
    }

    /// Replaces the [`Phase`] of this [`Lifecycle`] occurrence, if it has
    /// one.
    #[must_use]
    pub fn with_phase(mut self, new: Phase) -> Self {
        match &mut self {
            Self::Feature { phase, .. }
            | Self::Rule { phase, .. }
            | Self::Outline { phase, .. }
            | Self::Examples { phase, .. }
            | Self::Scenario { phase, .. }
            | Self::Background { phase, .. }
            | Self::Step { phase, .. }
            | Self::Hook { phase, .. } => *phase = new,
            Self::Started
            | Self::Finished
            | Self::Status { .. }
            | Self::Error { .. } => {}
        }
        self
    }

    /// Returns the [`NodeId`] this [`Lifecycle`] occurrence is about, if
    /// any.
    #[must_use]
    pub const fn node(&self) -> Option<NodeId> {
        match self {
            Self::Feature { node, .. }
            | Self::Rule { node, .. }
            | Self::Outline { node, .. }
            | Self::Examples { node, .. }
            | Self::Scenario { node, .. }
            | Self::Status { node, .. } => Some(*node),
            Self::Background { scenario, .. } | Self::Step { scenario, .. } => {
                Some(*scenario)
            }
            Self::Hook { node, .. } | Self::Error { node, .. } => *node,
            Self::Started | Self::Finished => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, Lifecycle, Phase, Status};

    #[test]
    fn ids_are_monotonic() {
        let first = Event::new(());
        let second = Event::new(());

        assert!(first.id < second.id);
        assert!(first.at <= second.at);
    }

    #[test]
    fn split_keeps_metadata() {
        let event = Event::new(Lifecycle::Started);
        let id = event.id;

        let (value, meta) = event.split();
        let rewrapped = meta.wrap(value);

        assert_eq!(rewrapped.id, id);
        assert!(matches!(rewrapped.value, Lifecycle::Started));
    }

    #[test]
    fn only_running_is_not_terminal() {
        assert!(!Status::Running.is_terminal());
        for s in [Status::Pending, Status::Passed, Status::Failed, Status::Skipped]
        {
            assert!(s.is_terminal(), "{s}");
        }
        assert_eq!(Phase::Finished(Status::Passed).to_string(), "finished (passed)");
    }
}
