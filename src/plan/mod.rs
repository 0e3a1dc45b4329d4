// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Immutable [`TestPlan`] compiled from parsed [`gherkin::Feature`]s and a
//! [`ScopeTree`].
//!
//! Every executable node of the plan carries everything needed to run it:
//! resolved [`StepBinding`]s, its [`HookChain`] and its [`State`]. Nothing is
//! looked up in the [`ScopeTree`] afterwards.
//!
//! [`ScopeTree`]: crate::scope::ScopeTree

mod builder;
mod error;
pub mod expand;
mod table;

use std::fmt;

use derive_more::with_trait::Display;

use crate::{
    event::Source,
    scope::{Hook, Mode, ScopeId, ScopeKind, SuiteHook},
    step::{self, CaptureName, Pattern},
};

pub use self::{builder::Builder, error::ResolutionError, table::PatternTable};

/// Identifier of a [`TestPlan`] node, assigned in document order.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("node#{_0}")]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the index of this [`NodeId`].
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Reason of a scenario not being executed.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SkipReason {
    /// Marked with `@skip` (directly or by some enclosing node or scope).
    #[display("marked as skipped")]
    Mode,

    /// Rejected by the tag or name filter.
    #[display("filtered out")]
    Filtered,

    /// Some sibling (or its descendant) is marked with `@only`.
    #[display("excluded by @only")]
    NotOnly,
}

/// Resolution outcome of a scenario.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum State {
    /// Every step is resolved and the scenario is due to run.
    Ready,

    /// Scenario is reported, but never runs any user code.
    Skipped(SkipReason),

    /// Some steps failed to resolve, so the scenario is reported as failed
    /// without running any user code.
    Broken(Vec<ResolutionError>),
}

impl State {
    /// Indicates whether this is [`State::Ready`].
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Indicates whether this is [`State::Skipped`].
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// [`gherkin::Step`] resolved to exactly one declared step.
pub struct StepBinding<World> {
    /// Resolved step.
    pub step: Source<gherkin::Step>,

    /// Indicates whether the step comes from a [`gherkin::Background`].
    pub background: bool,

    /// [`Pattern`] the step matched.
    pub pattern: Pattern,

    /// Scope the matched step was declared in.
    pub scope: ScopeId,

    /// Arguments extracted by the [`Pattern`].
    pub matches: Vec<(CaptureName, String)>,

    /// Step function to call.
    pub func: step::Step<World>,
}

impl<World> StepBinding<World> {
    /// Creates the [`step::Context`] this step is executed with.
    #[must_use]
    pub fn context(&self) -> step::Context {
        step::Context::new((*self.step).clone(), self.matches.clone())
    }
}

// Manual implementation is required to omit the redundant `World: Clone` trait
// bound imposed by `#[derive(Clone)]`.
impl<World> Clone for StepBinding<World> {
    fn clone(&self) -> Self {
        Self {
            step: self.step.clone(),
            background: self.background,
            pattern: self.pattern.clone(),
            scope: self.scope,
            matches: self.matches.clone(),
            func: self.func,
        }
    }
}

impl<World> fmt::Debug for StepBinding<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepBinding")
            .field("step", &self.step.value)
            .field("background", &self.background)
            .field("pattern", &self.pattern)
            .field("scope", &self.scope)
            .field("matches", &self.matches)
            .finish_non_exhaustive()
    }
}

/// Scenario hook along with the scope it was declared in.
pub struct HookBinding<World> {
    /// Scope the hook was declared in.
    pub scope: ScopeId,

    /// Hook function.
    pub hook: Hook<World>,
}

// Manual implementation is required to omit the redundant `World: Clone` trait
// bound imposed by `#[derive(Clone)]`.
impl<World> Clone for HookBinding<World> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<World> Copy for HookBinding<World> {}

impl<World> fmt::Debug for HookBinding<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookBinding({}, {:p})", self.scope, self.hook)
    }
}

/// Ordered scenario hooks applicable to a single scenario.
///
/// Hooks declared closer to the scenario run closer to its steps:
/// [`HookChain::before`] goes from the outermost scope inwards, while
/// [`HookChain::after`] goes from the innermost scope outwards (and in
/// reverse registration order within one scope).
pub struct HookChain<World> {
    /// Hooks to run before the steps, in execution order.
    pub before: Vec<HookBinding<World>>,

    /// Hooks to run after the steps, in execution order.
    pub after: Vec<HookBinding<World>>,
}

impl<World> Default for HookChain<World> {
    fn default() -> Self {
        Self { before: Vec::new(), after: Vec::new() }
    }
}

impl<World> Clone for HookChain<World> {
    fn clone(&self) -> Self {
        Self { before: self.before.clone(), after: self.after.clone() }
    }
}

impl<World> fmt::Debug for HookChain<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain")
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

/// Once-per-suite hooks of a feature, a rule or the whole plan.
#[derive(Clone, Default)]
pub struct SuiteHooks {
    /// Scope the hooks were declared in, if any.
    pub scope: Option<ScopeId>,

    /// Setup hooks, in execution order.
    pub setup: Vec<SuiteHook>,

    /// Teardown hooks, in execution order (reverse of registration).
    pub teardown: Vec<SuiteHook>,
}

impl SuiteHooks {
    /// Indicates whether there are no hooks at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.setup.is_empty() && self.teardown.is_empty()
    }
}

impl fmt::Debug for SuiteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteHooks")
            .field("scope", &self.scope)
            .field("setup", &self.setup.len())
            .field("teardown", &self.teardown.len())
            .finish()
    }
}

/// Single executable scenario: either a plain one or a row of an outline.
pub struct ScenarioNode<World> {
    /// ID of this node.
    pub id: NodeId,

    /// Title the scenario is registered under in a host runner.
    pub title: String,

    /// Executed scenario (already expanded, in case of an outline row).
    pub scenario: Source<gherkin::Scenario>,

    /// Most specific scope declared for this scenario, if any.
    pub scope: Option<ScopeId>,

    /// Effective tags: union of all the tags along the document path and
    /// the scope chain.
    pub tags: Vec<String>,

    /// Effective [`Mode`].
    pub mode: Mode,

    /// Background steps (first) and own steps, in execution order.
    ///
    /// Contains only the successfully resolved steps.
    pub steps: Vec<StepBinding<World>>,

    /// Scenario hooks to run around the steps.
    pub hooks: HookChain<World>,

    /// Resolution outcome.
    pub state: State,

    /// Outline placeholders left unsubstituted.
    pub unmatched_placeholders: Vec<String>,
}

// Manual implementation is required to omit the redundant `World: Clone` trait
// bound imposed by `#[derive(Clone)]`.
impl<World> Clone for ScenarioNode<World> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            title: self.title.clone(),
            scenario: self.scenario.clone(),
            scope: self.scope,
            tags: self.tags.clone(),
            mode: self.mode,
            steps: self.steps.clone(),
            hooks: self.hooks.clone(),
            state: self.state.clone(),
            unmatched_placeholders: self.unmatched_placeholders.clone(),
        }
    }
}

impl<World> fmt::Debug for ScenarioNode<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioNode")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("scope", &self.scope)
            .field("tags", &self.tags)
            .field("mode", &self.mode)
            .field("steps", &self.steps)
            .field("hooks", &self.hooks)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<World> ScenarioNode<World> {
    /// Returns the background steps of this scenario.
    pub fn background_steps(&self) -> impl Iterator<Item = &StepBinding<World>> {
        self.steps.iter().filter(|s| s.background)
    }

    /// Returns the own (non-background) steps of this scenario.
    pub fn own_steps(&self) -> impl Iterator<Item = &StepBinding<World>> {
        self.steps.iter().filter(|s| !s.background)
    }
}

/// Group of scenarios expanded from a single [`gherkin::Examples`].
#[derive(Debug)]
pub struct ExamplesNode<World> {
    /// ID of this node.
    pub id: NodeId,

    /// Title the group is registered under in a host runner.
    pub title: String,

    /// Source [`gherkin::Examples`].
    pub examples: Source<gherkin::Examples>,

    /// Expanded scenarios, one per row.
    pub scenarios: Vec<ScenarioNode<World>>,
}

/// [Scenario Outline][0] with its expanded [`ExamplesNode`]s.
///
/// [0]: https://cucumber.io/docs/gherkin/reference#scenario-outline
#[derive(Debug)]
pub struct OutlineNode<World> {
    /// ID of this node.
    pub id: NodeId,

    /// Title the outline is registered under in a host runner.
    pub title: String,

    /// Source (unexpanded) outline.
    pub outline: Source<gherkin::Scenario>,

    /// Scope declared for this outline, if any.
    pub scope: Option<ScopeId>,

    /// Example groups in document order.
    pub examples: Vec<ExamplesNode<World>>,
}

/// [`gherkin::Rule`] with its children.
#[derive(Debug)]
pub struct RuleNode<World> {
    /// ID of this node.
    pub id: NodeId,

    /// Source [`gherkin::Rule`].
    pub rule: Source<gherkin::Rule>,

    /// Scope declared for this rule, if any.
    pub scope: Option<ScopeId>,

    /// Once-per-suite hooks of the rule scope.
    pub hooks: SuiteHooks,

    /// Children in document order (never containing other rules).
    pub items: Vec<Item<World>>,
}

/// Child of a [`FeatureNode`] or a [`RuleNode`].
#[derive(Debug)]
pub enum Item<World> {
    /// Plain scenario.
    Scenario(ScenarioNode<World>),

    /// Scenario outline.
    Outline(OutlineNode<World>),

    /// Rule.
    Rule(RuleNode<World>),
}

impl<World> Item<World> {
    /// Iterates over all the [`ScenarioNode`]s of this [`Item`].
    #[must_use]
    pub fn scenarios(&self) -> Vec<&ScenarioNode<World>> {
        match self {
            Self::Scenario(s) => vec![s],
            Self::Outline(o) => {
                o.examples.iter().flat_map(|e| &e.scenarios).collect()
            }
            Self::Rule(r) => r.items.iter().flat_map(Self::scenarios).collect(),
        }
    }

    /// Indicates whether none of the scenarios of this [`Item`] is going to
    /// run any user code.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.scenarios().iter().all(|s| s.state.is_skipped())
    }

    fn scenarios_mut(&mut self) -> Vec<&mut ScenarioNode<World>> {
        match self {
            Self::Scenario(s) => vec![s],
            Self::Outline(o) => {
                o.examples.iter_mut().flat_map(|e| &mut e.scenarios).collect()
            }
            Self::Rule(r) => {
                r.items.iter_mut().flat_map(Self::scenarios_mut).collect()
            }
        }
    }
}

/// [`gherkin::Feature`] with its children.
#[derive(Debug)]
pub struct FeatureNode<World> {
    /// ID of this node.
    pub id: NodeId,

    /// Source [`gherkin::Feature`].
    pub feature: Source<gherkin::Feature>,

    /// Scope declared for this feature, if any.
    pub scope: Option<ScopeId>,

    /// Once-per-suite hooks of the feature scope.
    pub hooks: SuiteHooks,

    /// Children in document order.
    pub items: Vec<Item<World>>,
}

impl<World> FeatureNode<World> {
    /// Iterates over all the [`ScenarioNode`]s of this feature.
    #[must_use]
    pub fn scenarios(&self) -> Vec<&ScenarioNode<World>> {
        self.items.iter().flat_map(Item::scenarios).collect()
    }

    /// Indicates whether none of the scenarios of this feature is going to run
    /// any user code.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.items.iter().all(Item::is_skipped)
    }
}

/// Scope declared in a [`ScopeTree`] without any matching document node.
///
/// [`ScopeTree`]: crate::scope::ScopeTree
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnmatchedScope {
    /// ID of the scope.
    pub id: ScopeId,

    /// Kind of the scope.
    pub kind: ScopeKind,

    /// Name of the scope.
    pub name: String,
}

/// Declared step never used by any scenario of the plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnusedStep {
    /// Scope the step is declared in.
    pub scope: ScopeId,

    /// Pattern string of the step.
    pub pattern: String,
}

/// Fully resolved, immutable tree of executable nodes.
#[derive(Debug)]
pub struct TestPlan<World> {
    /// Once-per-run hooks declared in the root scope.
    pub hooks: SuiteHooks,

    /// Features in input order.
    pub features: Vec<FeatureNode<World>>,

    /// Scopes with no matching document node.
    pub unmatched_scopes: Vec<UnmatchedScope>,

    /// Declared steps no scenario resolved to.
    pub unused_steps: Vec<UnusedStep>,
}

impl<World> TestPlan<World> {
    /// Iterates over all the [`ScenarioNode`]s of this plan in document
    /// order.
    #[must_use]
    pub fn scenarios(&self) -> Vec<&ScenarioNode<World>> {
        self.features.iter().flat_map(FeatureNode::scenarios).collect()
    }

    /// Returns all the [`ResolutionError`]s of broken scenarios.
    #[must_use]
    pub fn resolution_errors(&self) -> Vec<&ResolutionError> {
        self.scenarios()
            .into_iter()
            .filter_map(|s| match &s.state {
                State::Broken(errs) => Some(errs),
                State::Ready | State::Skipped(_) => None,
            })
            .flatten()
            .collect()
    }

    /// Finds a [`ScenarioNode`] by its title.
    #[must_use]
    pub fn scenario(&self, title: &str) -> Option<&ScenarioNode<World>> {
        self.scenarios().into_iter().find(|s| s.title == title)
    }
}
